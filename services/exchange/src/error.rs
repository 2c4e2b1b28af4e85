//! HTTP error envelope
//!
//! Every error crossing the boundary renders as
//! `{ "error": { "code", "message", "details" }, "timestamp" }` with the
//! status from the stable code table.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use types::errors::{ErrorCode, ExchangeError};

/// Central error type for the exchange API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Exchange(#[from] ExchangeError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Exchange(e) => e.code(),
            ApiError::Unauthorized(_) => ErrorCode::Unauthorized,
            ApiError::Forbidden(_) => ErrorCode::Forbidden,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            ApiError::RateLimited => ErrorCode::RateLimited,
        }
    }

    fn details(&self) -> Value {
        match self {
            ApiError::Exchange(ExchangeError::InsufficientFunds {
                available,
                required,
            }) => json!({ "available": available, "required": required }),
            ApiError::Exchange(ExchangeError::InsufficientShares {
                available,
                required,
            }) => json!({ "available": available, "required": required }),
            _ => json!({}),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(code = code.as_str(), error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "details": self.details(),
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
    fn test_exchange_error_maps_through() {
        let err = ApiError::Exchange(ExchangeError::UnknownTicker("ZZZZ".into()));
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_insufficient_funds_details() {
        let err = ApiError::Exchange(ExchangeError::InsufficientFunds {
            available: "50.00".into(),
            required: "100.00".into(),
        });
        assert_eq!(err.details()["available"], "50.00");
        assert_eq!(err.details()["required"], "100.00");
    }

    #[test]
    fn test_rate_limited_code() {
        assert_eq!(ApiError::RateLimited.code(), ErrorCode::RateLimited);
    }
}
