use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::auth::CurrentUser;
use crate::database::models::Role;
use crate::error::ApiError;

/// Allow-list for [`restrict_to`]
#[derive(Clone, Copy, Debug)]
pub struct AllowedRoles(pub &'static [Role]);

impl AllowedRoles {
    pub fn permits(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

/// Role gate; must run after `protect`. A missing principal counts as not logged in.
pub async fn restrict_to(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(ApiError::not_logged_in)?;

    if !allowed.permits(user.role) {
        warn!("User {} with role {} denied {} {}", user.id, user.role, request.method(), request.uri().path());
        return Err(ApiError::forbidden("You don't have permission to perform this action"));
    }
    Ok(next.run(request).await)
}
