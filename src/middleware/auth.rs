use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::changed_password_after;
use crate::database::models::schema::parse_date;
use crate::database::models::{Role, USER_SCHEMA};
use crate::database::{Document, StoreError};
use crate::error::ApiError;
use crate::state::AppState;

pub const JWT_COOKIE: &str = "jwt";

/// Authenticated principal attached to the request by [`protect`] or [`is_logged_in`]
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub document: Document,
}

impl CurrentUser {
    pub fn from_document(document: Document) -> Result<Self, ApiError> {
        let text = |key: &str| document.get(key).and_then(Value::as_str).map(str::to_string);
        let id = text("id").ok_or_else(|| ApiError::unknown(StoreError::Malformed("user without id".into())))?;
        let role = text("role")
            .as_deref()
            .unwrap_or("user")
            .parse::<Role>()
            .map_err(|e| ApiError::unknown(anyhow::anyhow!(e)))?;
        Ok(Self {
            name: text("name").unwrap_or_default(),
            email: text("email").unwrap_or_default(),
            id,
            role,
            document,
        })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(ApiError::not_logged_in)
    }
}

/// Token from `Authorization: Bearer <token>`, falling back to the `jwt` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(JWT_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Verifies the token and loads its user, failing with the matching reason.
pub async fn resolve_user(state: &AppState, token: &str) -> Result<CurrentUser, ApiError> {
    let claims = state.tokens.verify(token)?;

    let user = match state.store.find_by_id(&USER_SCHEMA, &claims.id).await {
        Ok(user) => user,
        Err(StoreError::Cast { .. }) => None,
        Err(err) => return Err(err.into()),
    };
    let Some(user) = user else {
        return Err(ApiError::unauthorized("The user belonging to this token does no longer exist"));
    };

    let changed_at = user
        .get("passwordChangedAt")
        .and_then(Value::as_str)
        .and_then(parse_date);
    if changed_password_after(changed_at, claims.iat) {
        return Err(ApiError::unauthorized("User recently changed password! Please log in again"));
    }

    CurrentUser::from_document(user)
}

/// Rejects the request unless it carries a valid token for an existing user
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or_else(ApiError::not_logged_in)?;

    let user = resolve_user(&state, &token).await.map_err(|err| {
        warn!("Rejected credentials for {}: {}", request.uri().path(), err.kind());
        err
    })?;

    debug!("Authenticated {} ({}) for {}", user.id, user.role, request.uri().path());
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Attaches the principal when the token resolves; never fails
pub async fn is_logged_in(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        match resolve_user(&state, &token).await {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(err) => debug!("Continuing without principal: {}", err.kind()),
        }
    }
    next.run(request).await
}
