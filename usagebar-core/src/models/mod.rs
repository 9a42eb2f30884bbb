//! Domain models for `UsageBar`.
//!
//! - [`snapshot`] - `UsageSnapshot`, its builder and meter views
//! - [`state`] - `UsageState` and the derived `DisplayPhase`

mod snapshot;
mod state;

pub use snapshot::{
    clamp_percent, MeterKind, SnapshotBuilder, UsageMeter, UsageSnapshot,
    APPROACHING_LIMIT_PERCENT,
};
pub use state::{DisplayPhase, UsageState};
#[cfg(test)]
mod serde_tests;
