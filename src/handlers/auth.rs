use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{body_str, request_base_url, JsonBody};
use crate::auth::password::{
    generate_reset_token, hash_password, hash_reset_token, validate_new_password, verify_password,
};
use crate::database::models::{timestamp, USER_SCHEMA};
use crate::database::store::document_id;
use crate::database::Document;
use crate::error::ApiError;
use crate::filter::{FilterOp, FilterWhereInfo, Projection};
use crate::middleware::{ApiResponse, CurrentUser, JWT_COOKIE};
use crate::services::Recipient;
use crate::state::AppState;

/// Token in the body and in the `jwt` cookie, with the rendered user.
pub type TokenResponse = (CookieJar, ApiResponse);

/// Signs a token for `user` and builds the cookie and the response around it.
pub fn create_send_token(
    state: &AppState,
    user: Document,
    status: StatusCode,
) -> Result<TokenResponse, ApiError> {
    let token = state.tokens.sign(document_id(&user)?)?;
    let security = &state.config.security;

    let cookie = Cookie::build((JWT_COOKIE, token.clone()))
        .http_only(true)
        .secure(security.secure_cookies)
        .path("/")
        .max_age(time::Duration::days(security.jwt_cookie_expires_in_days))
        .build();

    let user = USER_SCHEMA.present(user, &Projection::default());
    let body = ApiResponse::success()
        .with("token", token)
        .data("user", Value::Object(user))
        .with_status(status);
    Ok((CookieJar::new().add(cookie), body))
}

fn as_patch(value: Value) -> Document {
    match value {
        Value::Object(doc) => doc,
        _ => Document::new(),
    }
}

/// POST /users/signup
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<TokenResponse, ApiError> {
    let password = body_str(&body, "password");
    validate_new_password(password, body_str(&body, "passwordConfirm"))?;
    let hashed = hash_password(password.unwrap_or_default())?;

    // Roles are granted by admins through /users/:id; signup always creates a plain user
    let mut doc = Document::new();
    for key in ["name", "email"] {
        if let Some(value) = body.get(key) {
            doc.insert(key.to_string(), value.clone());
        }
    }
    doc.insert("password".to_string(), Value::String(hashed));

    let user = state.store.insert(&USER_SCHEMA, doc).await?;
    info!("Signed up user {}", document_id(&user)?);

    let url = format!("{}/me", request_base_url(&headers));
    if let Err(err) = state.mailer.send_welcome(&Recipient::from_document(&user), &url).await {
        warn!("Welcome email not delivered: {}", err);
    }

    create_send_token(&state, user, StatusCode::CREATED)
}

/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<TokenResponse, ApiError> {
    let (Some(email), Some(password)) = (body_str(&body, "email"), body_str(&body, "password")) else {
        return Err(ApiError::bad_request("Please provide email and password"));
    };
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Please provide email and password"));
    }

    let user = state
        .store
        .find_one(&USER_SCHEMA, &[FilterWhereInfo::eq("email", email.trim())])
        .await?;
    let authenticated = user.filter(|user| {
        body_str(user, "password").map_or(false, |hash| verify_password(password, hash))
    });
    let Some(user) = authenticated else {
        return Err(ApiError::unauthorized("Incorect email or password"));
    };

    create_send_token(&state, user, StatusCode::OK)
}

/// GET /users/logout
pub async fn logout() -> TokenResponse {
    let cookie = Cookie::build((JWT_COOKIE, "loggedout"))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(10))
        .build();
    (CookieJar::new().add(cookie), ApiResponse::success())
}

/// POST /users/forgotPassword
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<ApiResponse, ApiError> {
    let user = match body_str(&body, "email") {
        Some(email) => {
            state
                .store
                .find_one(&USER_SCHEMA, &[FilterWhereInfo::eq("email", email.trim())])
                .await?
        }
        None => None,
    };
    let Some(user) = user else {
        return Err(ApiError::not_found("There is no user with email address"));
    };
    let id = document_id(&user)?.to_string();

    let (raw, hashed) = generate_reset_token();
    let expires = Utc::now() + Duration::minutes(state.config.security.password_reset_expires_minutes);
    let patch = json!({
        "passwordResetToken": hashed,
        "passwordResetExpires": timestamp(expires),
    });
    state.store.update_by_id(&USER_SCHEMA, &id, as_patch(patch)).await?;

    let reset_url = format!("{}/api/v1/users/resetPassword/{}", request_base_url(&headers), raw);
    if let Err(err) = state
        .mailer
        .send_password_reset(&Recipient::from_document(&user), &reset_url)
        .await
    {
        warn!("Password reset email for {} failed: {}", id, err);
        let rollback = json!({ "passwordResetToken": null, "passwordResetExpires": null });
        state.store.update_by_id(&USER_SCHEMA, &id, as_patch(rollback)).await?;
        return Err(ApiError::operational(
            StatusCode::INTERNAL_SERVER_ERROR,
            "There was an error when sending the email. Please try again",
        ));
    }

    Ok(ApiResponse::success().with("message", "Token sent to email"))
}

/// PATCH /users/resetPassword/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<TokenResponse, ApiError> {
    let now = Utc::now();
    let conditions = [
        FilterWhereInfo::eq("passwordResetToken", hash_reset_token(&token)),
        FilterWhereInfo {
            column: "passwordResetExpires".to_string(),
            operator: FilterOp::Gt,
            data: Value::String(timestamp(now)),
        },
    ];
    let Some(user) = state.store.find_one(&USER_SCHEMA, &conditions).await? else {
        return Err(ApiError::bad_request("Token is invalid or has expired"));
    };

    let password = body_str(&body, "password");
    validate_new_password(password, body_str(&body, "passwordConfirm"))?;
    let patch = json!({
        "password": hash_password(password.unwrap_or_default())?,
        "passwordChangedAt": timestamp(now - Duration::seconds(1)),
        "passwordResetToken": null,
        "passwordResetExpires": null,
    });

    let user = state
        .store
        .update_by_id(&USER_SCHEMA, document_id(&user)?, as_patch(patch))
        .await?
        .ok_or_else(ApiError::no_document)?;
    create_send_token(&state, user, StatusCode::OK)
}

/// PATCH /users/updateMyPassword
pub async fn update_my_password(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody,
) -> Result<TokenResponse, ApiError> {
    let stored = body_str(&current.document, "password").unwrap_or_default();
    let candidate = body_str(&body, "passwordCurrent").unwrap_or_default();
    if !verify_password(candidate, stored) {
        return Err(ApiError::unauthorized("Your current password is wrong"));
    }

    let password = body_str(&body, "password");
    validate_new_password(password, body_str(&body, "passwordConfirm"))?;
    let patch = json!({
        "password": hash_password(password.unwrap_or_default())?,
        "passwordChangedAt": timestamp(Utc::now() - Duration::seconds(1)),
    });

    let user = state
        .store
        .update_by_id(&USER_SCHEMA, &current.id, as_patch(patch))
        .await?
        .ok_or_else(ApiError::no_document)?;
    create_send_token(&state, user, StatusCode::OK)
}
