use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use serde_json::Value;
use tracing::info;

use super::factory::{self, Resource};
use super::request_base_url;
use crate::database::models::{booking_expansions, Role, BOOKING_SCHEMA, TOUR_SCHEMA};
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::{protected, restricted, ApiResponse, ApiResult, CurrentUser};
use crate::services::{CheckoutRequest, LineItem, PaymentError};
use crate::state::AppState;

const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];

pub fn resource() -> Resource {
    Resource::new(&BOOKING_SCHEMA)
        .expand_one(booking_expansions)
        .expand_many(booking_expansions)
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let bookings = resource();

    Router::new()
        .route("/checkout-session/:tourId", protected(state, get(checkout_session)))
        .route(
            "/",
            restricted(
                state,
                STAFF,
                factory::get_all(bookings.clone()).merge(factory::create_one(bookings.clone())),
            ),
        )
        .route(
            "/:id",
            restricted(
                state,
                STAFF,
                factory::get_one(bookings.clone())
                    .merge(factory::update_one(bookings.clone()))
                    .merge(factory::delete_one(bookings)),
            ),
        )
}

/// Builds the hosted checkout request for one tour bought by `customer`.
pub fn checkout_request(tour: &Document, customer: &CurrentUser, base_url: &str) -> CheckoutRequest {
    let text = |key: &str| tour.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let price = tour.get("price").and_then(Value::as_f64).unwrap_or_default();
    let tour_id = text("id");

    CheckoutRequest {
        line_items: vec![LineItem {
            name: format!("{} Tour", text("name")),
            description: text("summary"),
            amount: (price * 100.0).round() as i64,
            currency: "usd".to_string(),
            quantity: 1,
        }],
        success_url: format!("{}/?tour={}&user={}&price={}", base_url, tour_id, customer.id, price),
        cancel_url: format!("{}/tour/{}", base_url, tour_id),
        customer_email: customer.email.clone(),
        client_reference_id: tour_id,
    }
}

/// GET /bookings/checkout-session/:tourId
pub async fn checkout_session(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    headers: HeaderMap,
    customer: CurrentUser,
) -> ApiResult {
    let tour = state
        .store
        .find_by_id(&TOUR_SCHEMA, &tour_id)
        .await?
        .ok_or_else(ApiError::no_document)?;

    let request = checkout_request(&tour, &customer, &request_base_url(&headers));
    let session = state
        .payments
        .create_checkout_session(&request)
        .await
        .map_err(|err| match err {
            PaymentError::NotConfigured => ApiError::operational(
                StatusCode::SERVICE_UNAVAILABLE,
                "Payments are not available right now",
            ),
            other => ApiError::unknown(other),
        })?;

    info!("Checkout session created for tour {} by {}", tour_id, customer.id);
    Ok(ApiResponse::success().with("session", session))
}
