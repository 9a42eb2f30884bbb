// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `UsageBar` Core
//!
//! Core types for the `UsageBar` usage dashboard.
//!
//! This crate holds the values that flow between the fetcher, the parser and
//! the state store:
//!
//! - [`UsageSnapshot`] - Immutable usage reading (session, weekly, sonnet)
//! - [`SnapshotBuilder`] - Clamping constructor for snapshots
//! - [`UsageMeter`] / [`MeterKind`] - Per-quota view used by renderers
//! - [`UsageState`] - Loading / snapshot / error triple observed by consumers
//! - [`DisplayPhase`] - What a dashboard should render for a given state
//! - [`CoreError`] - Construction errors

pub mod error;
pub mod models;

pub use error::CoreError;

pub use models::{
    clamp_percent, DisplayPhase, MeterKind, SnapshotBuilder, UsageMeter, UsageSnapshot,
    UsageState, APPROACHING_LIMIT_PERCENT,
};
