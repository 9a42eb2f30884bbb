//! Fetcher implementations backed by host facilities.
//!
//! - [`http`] - HTTP endpoint via reqwest
//! - [`process`] - External CLI via tokio processes

pub mod http;
pub mod process;
