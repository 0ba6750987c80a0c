use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::config::Environment;
use crate::error::{ApiError, ErrorReport};

/// Terminal error normalization.
///
/// Any response carrying an [`ErrorReport`] is re-rendered for the configured environment:
/// production shows operational messages and masks the rest, development adds the
/// classification and the error chain. Failures produced by the router itself carry no report
/// and get one here: a wrong method on a known path is answered like an unknown route.
pub async fn normalize_errors(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().clone();
    let response = next.run(request).await;
    let status = response.status();
    let report = match response.extensions().get::<ErrorReport>().cloned() {
        Some(report) => report,
        None if status == StatusCode::METHOD_NOT_ALLOWED => {
            ErrorReport(Arc::new(ApiError::not_found(format!("Can't find {} on this server!", uri))))
        }
        None if status.is_client_error() || status.is_server_error() => ErrorReport(Arc::new(
            ApiError::operational(status, status.canonical_reason().unwrap_or("Request failed")),
        )),
        None => return response,
    };
    let err = &report.0;

    if !err.is_operational() {
        error!("ERROR 💥 {:?}", err);
    }

    let body = if environment.is_production() {
        err.production_body()
    } else {
        err.development_body()
    };

    let mut normalized = (err.status_code(), Json(body)).into_response();
    normalized.extensions_mut().insert(report);
    normalized
}
