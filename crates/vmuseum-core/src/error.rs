//! Error types for the marketplace core.

use thiserror::Error;

/// Core errors for value construction and session decoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    #[error("negative amount: {0}")]
    NegativeAmount(String),

    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    #[error("session data error: {0}")]
    Session(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
