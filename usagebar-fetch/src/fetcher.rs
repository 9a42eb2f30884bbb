//! The usage fetcher seam.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::payload::RawPayload;

/// Issues the upstream "get current usage" request.
///
/// Each call performs exactly one outbound request; retry policy belongs to
/// the caller. Implementations must be cancel-safe: dropping the future
/// returned by [`fetch`](Self::fetch) aborts the request and nothing is
/// delivered.
///
/// ## Implementing a Fetcher
///
/// ```ignore
/// struct FixtureFetcher(String);
///
/// #[async_trait]
/// impl UsageFetcher for FixtureFetcher {
///     fn id(&self) -> &str {
///         "fixture"
///     }
///
///     async fn fetch(&self) -> Result<RawPayload, TransportError> {
///         Ok(RawPayload::json(self.0.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait UsageFetcher: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &str;

    /// Fetches one raw payload.
    async fn fetch(&self) -> Result<RawPayload, TransportError>;
}
