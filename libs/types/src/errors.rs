//! Error taxonomy with stable wire codes
//!
//! Every error that crosses the HTTP boundary maps to one of the stable
//! codes below. Validation and pre-check errors never mutate state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameters,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InsufficientFunds,
    InsufficientShares,
    SettlementFailed,
    RateLimited,
    InternalError,
}

impl ErrorCode {
    /// HTTP status for this code
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidParameters => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::InsufficientFunds => 400,
            ErrorCode::InsufficientShares => 400,
            ErrorCode::SettlementFailed => 500,
            ErrorCode::RateLimited => 429,
            ErrorCode::InternalError => 500,
        }
    }

    /// The literal code string used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCode::InsufficientShares => "INSUFFICIENT_SHARES",
            ErrorCode::SettlementFailed => "SETTLEMENT_FAILED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Domain errors raised by the exchange core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: String, required: String },

    #[error("Insufficient shares: have {available}, need {required}")]
    InsufficientShares { available: String, required: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// Map to the stable wire code
    pub fn code(&self) -> ErrorCode {
        match self {
            ExchangeError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            ExchangeError::UnknownTicker(_)
            | ExchangeError::OrderNotFound(_)
            | ExchangeError::AccountNotFound(_) => ErrorCode::NotFound,
            ExchangeError::Forbidden(_) => ErrorCode::Forbidden,
            ExchangeError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            ExchangeError::InsufficientShares { .. } => ErrorCode::InsufficientShares,
            ExchangeError::Conflict(_) => ErrorCode::Conflict,
            ExchangeError::SettlementFailed(_) => ErrorCode::SettlementFailed,
            ExchangeError::Internal(_) => ErrorCode::InternalError,
        }
    }
}
