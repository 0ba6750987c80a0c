use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::{json, Value};

use super::factory::{self, Resource};
use super::{auth, JsonBody};
use crate::database::models::{Role, USER_SCHEMA};
use crate::database::Document;
use crate::error::ApiError;
use crate::filter::Projection;
use crate::middleware::{protected, restricted, ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

const ADMIN: &[Role] = &[Role::Admin];

/// Fields a user may change about themselves through `updateMe`.
const SELF_EDITABLE: [&str; 2] = ["name", "email"];

pub fn resource() -> Resource {
    Resource::new(&USER_SCHEMA)
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let users = resource();

    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password))
        .route("/updateMyPassword", protected(state, patch(auth::update_my_password)))
        .route("/me", protected(state, get(me)))
        .route("/updateMe", protected(state, patch(update_me)))
        .route("/deleteMe", protected(state, delete(delete_me)))
        .route(
            "/",
            restricted(state, ADMIN, factory::get_all(users.clone()).merge(post(create_user))),
        )
        .route(
            "/:id",
            restricted(
                state,
                ADMIN,
                factory::get_one(users.clone())
                    .merge(factory::update_one(users.clone()))
                    .merge(factory::delete_one(users)),
            ),
        )
}

/// GET /users/me
pub async fn me(State(state): State<AppState>, current: CurrentUser) -> ApiResult {
    let user = resource().read(&state, &current.id).await?;
    Ok(ApiResponse::document(user))
}

/// PATCH /users/updateMe
pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody,
) -> ApiResult {
    if body.contains_key("password") || body.contains_key("passwordConfirm") {
        return Err(ApiError::bad_request(
            "This route is not allowed for password updates. Please use /updateMyPassword route",
        ));
    }

    let filtered: Document = body
        .into_iter()
        .filter(|(key, _)| SELF_EDITABLE.contains(&key.as_str()))
        .collect();

    let user = state
        .store
        .update_by_id(&USER_SCHEMA, &current.id, filtered)
        .await?
        .ok_or_else(ApiError::no_document)?;
    let user = USER_SCHEMA.present(user, &Projection::default());
    Ok(ApiResponse::success().data("user", Value::Object(user)))
}

/// DELETE /users/deleteMe
pub async fn delete_me(State(state): State<AppState>, current: CurrentUser) -> ApiResult {
    let patch = json!({ "active": false });
    let patch = patch.as_object().cloned().unwrap_or_default();
    state.store.update_by_id(&USER_SCHEMA, &current.id, patch).await?;
    tracing::info!("User {} deactivated their account", current.id);
    Ok(ApiResponse::no_content())
}

/// POST /users
pub async fn create_user() -> ApiError {
    ApiError::operational(
        StatusCode::INTERNAL_SERVER_ERROR,
        "This route is not defined! Please use /signup instead",
    )
}
