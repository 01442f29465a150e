//! Application error type mapping to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The request body is not a dialog event.
    Validation(String),
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
        };

        let body = json!({
            "errors": [{
                "code": code,
                "message": message,
            }],
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
