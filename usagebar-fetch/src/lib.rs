// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # UsageBar Fetch
//!
//! Fetching and parsing of raw usage data for the UsageBar dashboard.
//!
//! ## Fetchers
//!
//! [`fetcher::UsageFetcher`] issues exactly one outbound request per call and
//! never retries. Dropping the returned future cancels the request.
//!
//! - [`host::http::HttpUsageFetcher`] - GET against a usage endpoint
//! - [`host::process::CommandUsageFetcher`] - Runs a CLI and captures stdout
//!
//! ## Parsing
//!
//! [`parser::UsageParser`] turns a [`payload::RawPayload`] into a
//! [`usagebar_core::UsageSnapshot`]. It is pure and needs no network.
//!
//! ## Example
//!
//! ```ignore
//! use usagebar_fetch::{HttpUsageFetcher, UsageFetcher, UsageParser};
//!
//! let fetcher = HttpUsageFetcher::new("https://api.example.com/usage", None, timeout)?;
//! let payload = fetcher.fetch().await?;
//! let snapshot = UsageParser::new().parse(&payload)?;
//! ```

pub mod error;
pub mod fetcher;
pub mod host;
pub mod parser;
pub mod payload;

pub use error::{ParseError, TransportError};
pub use fetcher::UsageFetcher;
pub use host::{http::HttpUsageFetcher, process::CommandUsageFetcher};
pub use parser::UsageParser;
pub use payload::{PayloadFormat, RawPayload};
