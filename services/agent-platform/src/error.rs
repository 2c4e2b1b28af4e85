//! HTTP error envelope for the agent platform
//!
//! Same wire shape as the exchange:
//! `{ "error": { "code", "message", "details" }, "timestamp" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code_and_status(&self) -> (&'static str, StatusCode) {
        match self {
            ApiError::InvalidParameters(_) => ("INVALID_PARAMETERS", StatusCode::BAD_REQUEST),
            ApiError::NotFound(_) => ("NOT_FOUND", StatusCode::NOT_FOUND),
            ApiError::Conflict(_) => ("CONFLICT", StatusCode::CONFLICT),
            ApiError::Internal(_) => ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.code_and_status();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "details": {},
            },
            "timestamp": Utc::now(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        assert_eq!(
            ApiError::NotFound("x".into()).code_and_status(),
            ("NOT_FOUND", StatusCode::NOT_FOUND)
        );
        assert_eq!(
            ApiError::Conflict("x".into()).code_and_status(),
            ("CONFLICT", StatusCode::CONFLICT)
        );
    }
}
