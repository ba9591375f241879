//! Error types for the marketplace.

use vmuseum_core::{describe, ArtifactId, CoreError, Problem, Role};
use vmuseum_store::StoreError;
use thiserror::Error;

/// Why a checkout did not go through.
///
/// On any of these the cart is left as it was and nothing was purchased.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart had no entries; no transaction was opened.
    #[error("your cart is empty")]
    EmptyCart,

    /// One or more entries cannot be fulfilled. Every problem found is listed.
    #[error("checkout failed: {}", describe(.0))]
    Validation(Vec<Problem>),

    /// No customer identity in the session.
    #[error("no customer in session")]
    MissingSession,

    /// A line total could not be computed.
    #[error("pricing error: {0}")]
    Pricing(#[from] CoreError),

    /// Storage failure, including lock timeouts and failed commits.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CheckoutError {
    /// The validation problems, if this is a validation failure.
    pub fn problems(&self) -> &[Problem] {
        match self {
            CheckoutError::Validation(problems) => problems,
            _ => &[],
        }
    }

    /// Whether the same checkout may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Storage(e) if e.is_transient())
    }
}

/// Errors from marketplace operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The session lacks the role the operation needs.
    #[error("unauthorized: requires {required} role")]
    Unauthorized { required: Role, actual: Option<Role> },

    /// An artist tried to act on another artist's artifact.
    #[error("unauthorized: artifact {0} belongs to another artist")]
    NotOwner(ArtifactId),

    /// Artifact not found.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(ArtifactId),

    /// Rejected input.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Checkout failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Core type error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;
