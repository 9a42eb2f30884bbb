//! Store error types.

use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A load was started while another one was still in flight.
    #[error("A usage refresh is already in progress")]
    ConcurrencyViolation,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if this error only means "someone else is already loading".
    pub fn is_concurrency_violation(&self) -> bool {
        matches!(self, StoreError::ConcurrencyViolation)
    }
}
