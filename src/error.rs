// HTTP API Error Types
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::filter::FilterError;

/// Every failure a handler or middleware can surface to a client.
///
/// All variants except `Unknown` are operational: expected, with a message that is safe to show.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation(String),
    DuplicateKey(String),
    Cast(String),

    // 401 Unauthorized
    TokenInvalid,
    TokenExpired,
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    /// Operational error carrying its own status
    Operational { status: StatusCode, message: String },

    /// Programming or infrastructure failure, masked in production
    Unknown(anyhow::Error),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateKey(_) | ApiError::Cast(_) => StatusCode::BAD_REQUEST,
            ApiError::TokenInvalid | ApiError::TokenExpired | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Operational { status, .. } => *status,
            ApiError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; unknown errors are never described
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::DuplicateKey(msg)
            | ApiError::Cast(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg) => msg,
            ApiError::TokenInvalid => "Invalid token. Please log in again",
            ApiError::TokenExpired => "Your token has expired. Please log in again!",
            ApiError::Operational { message, .. } => message,
            ApiError::Unknown(_) => "Something went wrong",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::DuplicateKey(_) => "DuplicateKeyError",
            ApiError::Cast(_) => "CastError",
            ApiError::TokenInvalid => "TokenInvalid",
            ApiError::TokenExpired => "TokenExpired",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Operational { .. } => "OperationalError",
            ApiError::Unknown(_) => "Unknown",
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Unknown(_))
    }

    /// `fail` for client errors, `error` for server errors
    pub fn status_label(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Body sent in production: operational message or a generic mask.
    pub fn production_body(&self) -> Value {
        json!({
            "status": self.status_label(),
            "message": self.message(),
        })
    }

    /// Body sent in development: full message, classification and the error chain.
    pub fn development_body(&self) -> Value {
        let (message, stack) = match self {
            ApiError::Unknown(err) => (err.to_string(), format!("{:?}", err)),
            other => (other.message().to_string(), format!("{:?}", other)),
        };
        json!({
            "status": self.status_label(),
            "message": message,
            "error": {
                "kind": self.kind(),
                "statusCode": self.status_code().as_u16(),
                "isOperational": self.is_operational(),
            },
            "stack": stack,
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Operational { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Operational { status, message: message.into() }
    }

    pub fn unknown(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Unknown(err.into())
    }

    pub fn not_logged_in() -> Self {
        Self::unauthorized("You are not logged in! Please log in to get access.")
    }

    pub fn no_document() -> Self {
        Self::not_found("No document found with that ID")
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation { errors } => {
                ApiError::Validation(format!("Invalid input data. {}", errors.join(". ")))
            }
            StoreError::DuplicateKey { field, value } => ApiError::DuplicateKey(format!(
                "Duplicate {} value: {}. Please use another value!",
                field, value
            )),
            StoreError::Cast { path, value } => ApiError::Cast(format!("Invalid {}: {}", path, value)),
            StoreError::Filter(err) => err.into(),
            other => ApiError::unknown(other),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenInvalid => ApiError::TokenInvalid,
            AuthError::TokenExpired => ApiError::TokenExpired,
            other => ApiError::unknown(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::operational(rejection.status(), rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unknown(err) => write!(f, "{}", err),
            other => write!(f, "{}", other.message()),
        }
    }
}

impl std::error::Error for ApiError {}

/// The original error, attached to the response so the normalizer can re-render it.
#[derive(Clone, Debug)]
pub struct ErrorReport(pub Arc<ApiError>);

// Automatic HTTP response conversion for Axum.
// The body defaults to the masked production shape until the normalizer rewrites it.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.production_body())).into_response();
        response.extensions_mut().insert(ErrorReport(Arc::new(self)));
        response
    }
}
