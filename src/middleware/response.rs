use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{Map, Value};

use crate::database::Document;

/// Success envelope: `{"status": "success", ...}` with optional `results` and `data`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Map<String, Value>>,
}

impl ApiResponse {
    /// Create an empty successful response with default 200 status
    pub fn success() -> Self {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::String("success".to_string()));
        Self { status: StatusCode::OK, body: Some(body) }
    }

    /// Adds a top-level key next to `status`
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(body) = self.body.as_mut() {
            body.insert(key.to_string(), value.into());
        }
        self
    }

    /// Adds `data.<key>`
    pub fn data(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(body) = self.body.as_mut() {
            let data = body
                .entry("data".to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(data) = data {
                data.insert(key.to_string(), value.into());
            }
        }
        self
    }

    /// Single document under `data.data`
    pub fn document(doc: Document) -> Self {
        Self::success().data("data", Value::Object(doc))
    }

    /// Document list under `data.data` with its `results` count
    pub fn documents(docs: Vec<Document>) -> Self {
        let results = docs.len();
        let docs: Vec<Value> = docs.into_iter().map(Value::Object).collect();
        Self::success().with("results", results).data("data", docs)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Create a 201 Created response
    pub fn created(self) -> Self {
        self.with_status(StatusCode::CREATED)
    }

    /// Create a 204 No Content response
    pub fn no_content() -> Self {
        Self { status: StatusCode::NO_CONTENT, body: None }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) if self.status != StatusCode::NO_CONTENT => {
                (self.status, Json(Value::Object(body))).into_response()
            }
            _ => self.status.into_response(),
        }
    }
}

pub type ApiResult = Result<ApiResponse, crate::error::ApiError>;
