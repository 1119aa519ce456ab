// src/error.rs
use crate::models::RateCategory;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Rate {rate} exceeds ceiling {ceiling} for category {category}")]
    RateExceedsLimit {
        category: RateCategory,
        rate: Decimal,
        ceiling: Decimal,
    },

    #[error("Negative rate {rate} for category {category}")]
    NegativeRate {
        category: RateCategory,
        rate: Decimal,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Duplicate charge reference: {0}")]
    DuplicateTick(String),

    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("No rate configured for operator {0}")]
    RateNotFound(i64),

    #[error("Concurrent session limit exceeded")]
    ConcurrentLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    pub fn error_code(&self) -> &str {
        match self {
            BillingError::InsufficientBalance { .. } => "insufficient_balance",
            BillingError::RateExceedsLimit { .. } => "rate_exceeds_limit",
            BillingError::NegativeRate { .. } => "negative_rate",
            BillingError::SessionNotFound(_) => "session_not_found",
            BillingError::DuplicateTick(_) => "duplicate_tick",
            BillingError::AccountNotFound(_) => "account_not_found",
            BillingError::RateNotFound(_) => "rate_not_found",
            BillingError::ConcurrentLimitExceeded => "concurrent_limit_exceeded",
            BillingError::InvalidRequest(_) => "invalid_request",
            BillingError::Internal(_) => "internal_error",
        }
    }

    /// Recoverable errors are surfaced to the end user (a top-up fixes them);
    /// the rest indicate misconfiguration or a caller bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BillingError::InsufficientBalance { .. })
    }
}
