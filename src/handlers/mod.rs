// Route handlers grouped by resource.
//
// factory     generic CRUD handlers parametrized by a `Resource`
// auth        signup, login, logout, password reset and update
// users       me / updateMe / deleteMe plus admin user management
// tours       tours and the nested reviews collection
// reviews     reviews
// bookings    checkout session plus admin booking management
pub mod auth;
pub mod bookings;
pub mod factory;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{header, HeaderMap},
    Json,
};
use serde_json::Value;

use crate::database::Document;
use crate::error::ApiError;

/// JSON request body that must be an object.
#[derive(Debug)]
pub struct JsonBody(pub Document);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        match value {
            Value::Object(doc) => Ok(JsonBody(doc)),
            _ => Err(ApiError::bad_request("Request body must be a JSON object")),
        }
    }
}

/// `<scheme>://<host>` of the incoming request, honouring `X-Forwarded-Proto`.
pub fn request_base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", scheme, host)
}

/// Decoded query-string pairs in request order; repeated keys are kept.
pub fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    match raw {
        Some(raw) => url::form_urlencoded::parse(raw.as_bytes()).into_owned().collect(),
        None => Vec::new(),
    }
}

/// String field of a request body; non-strings read as absent.
pub fn body_str<'a>(body: &'a Document, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}
