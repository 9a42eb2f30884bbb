//! Core error types for `UsageBar`.

use thiserror::Error;

/// Core error type for `UsageBar` model construction.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value could not be turned into a valid model.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
