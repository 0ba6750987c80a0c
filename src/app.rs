use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::handlers::{bookings, reviews, tours, users};
use crate::middleware::{normalize_errors, ApiResponse, ApiResult};
use crate::state::AppState;

/// Full application router: `/health` plus the versioned API under `/api/v1`.
pub fn app(state: AppState) -> Router {
    let environment = state.config.environment;

    let api = Router::new()
        .nest("/tours", tours::routes(&state))
        .nest("/users", users::routes(&state))
        .nest("/reviews", reviews::routes(&state))
        .nest("/bookings", bookings::routes(&state));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .fallback(not_found)
        // Global middleware
        .layer(from_fn_with_state(environment, normalize_errors))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> ApiResult {
    match state.store.health_check().await {
        Ok(()) => Ok(ApiResponse::success().data(
            "health",
            json!({ "database": "ok", "timestamp": chrono::Utc::now() }),
        )),
        Err(err) => {
            tracing::warn!("Health check failed: {}", err);
            Err(ApiError::operational(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable"))
        }
    }
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", uri))
}
