//! Fetch and parse error types.

use std::time::Duration;
use thiserror::Error;
use usagebar_core::CoreError;

// ============================================================================
// Transport Error
// ============================================================================

/// Failure to obtain a raw payload from the upstream source.
///
/// Every variant is recoverable; the message is what dashboards display.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The upstream could not be reached.
    #[error("network unreachable: {0}")]
    Unreachable(String),

    /// The upstream answered with a non-success status.
    #[error("request failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request did not complete in time.
    #[error("timeout")]
    Timeout {
        /// How long we waited.
        after: Duration,
    },

    /// Credentials were rejected.
    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// The upstream returned nothing.
    #[error("empty response")]
    EmptyBody,

    /// The configured command is not on `PATH`.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// The configured command exited unsuccessfully.
    #[error("command exited with code {code}: {stderr}")]
    CommandFailed {
        /// Exit code, -1 when killed by a signal.
        code: i32,
        /// Trimmed standard error.
        stderr: String,
    },

    /// The fetcher itself is misconfigured.
    #[error("invalid fetcher configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// Maps a reqwest error onto the transport taxonomy.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { after: timeout }
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Unreachable(err.to_string())
        }
    }

    /// Returns true if the failure is about credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationRejected(_))
    }
}

// ============================================================================
// Parse Error
// ============================================================================

/// The payload does not match any known usage schema.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload body is blank.
    #[error("empty payload")]
    Empty,

    /// The body claims to be JSON but is not.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but unusable.
    #[error("malformed {field}: {value}")]
    Malformed {
        /// Field name.
        field: &'static str,
        /// Offending raw value.
        value: String,
    },

    /// Text payload with no recognizable usage sections.
    #[error("unrecognized usage format")]
    UnrecognizedFormat,

    /// Snapshot construction rejected the values.
    #[error(transparent)]
    Invalid(#[from] CoreError),
}
