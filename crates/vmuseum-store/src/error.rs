//! Error types for the store module.

use rusqlite::ErrorCode;
use thiserror::Error;

use vmuseum_core::ArtifactId;

/// Errors that can occur during store operations.
///
/// Any of these aborts the surrounding transaction; nothing it wrote is
/// visible afterwards.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// A lock could not be acquired within the busy timeout.
    #[error("lock wait timed out: {0}")]
    LockTimeout(String),

    /// A schema constraint rejected the write (e.g. stock would go negative).
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Artifact not found.
    #[error("artifact not found: {0}")]
    NotFound(ArtifactId),

    /// Storage is unavailable (connection lost, commit refused).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lock protecting a shared handle was poisoned by a panic.
    #[error("store lock poisoned")]
    Poisoned,

    /// The blocking task running the operation failed.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::LockTimeout(_) | StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::LockTimeout(err.to_string())
            }
            Some(ErrorCode::ConstraintViolation) => StoreError::Constraint(err.to_string()),
            Some(ErrorCode::CannotOpen) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Database(err),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
