pub mod auth;
pub mod errors;
pub mod response;
pub mod restrict;

pub use auth::{extract_token, is_logged_in, protect, CurrentUser, JWT_COOKIE};
pub use errors::normalize_errors;
pub use response::{ApiResponse, ApiResult};
pub use restrict::{restrict_to, AllowedRoles};

use axum::{middleware::from_fn_with_state, routing::MethodRouter};

use crate::database::models::Role;
use crate::state::AppState;

/// Wraps a route with [`protect`]
pub fn protected(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), protect))
}

/// Wraps a route with [`protect`] followed by [`restrict_to`] for `roles`
pub fn restricted(
    state: &AppState,
    roles: &'static [Role],
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    protected(state, route.route_layer(from_fn_with_state(AllowedRoles(roles), restrict_to)))
}
