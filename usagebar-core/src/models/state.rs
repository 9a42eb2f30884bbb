//! Observable usage state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::snapshot::UsageSnapshot;

/// The single observable state a dashboard renders.
///
/// Consumers only ever hold copies; the state store owns the live value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageState {
    /// A fetch is in flight.
    pub is_loading: bool,
    /// Last successfully parsed snapshot, kept across failures.
    pub snapshot: Option<UsageSnapshot>,
    /// Message from the most recent failed refresh.
    pub error_message: Option<String>,
}

impl UsageState {
    /// Returns true if a snapshot is available.
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Returns true if the retained snapshot is older than `threshold`.
    ///
    /// A state without a snapshot is never stale; it has nothing to show.
    pub fn is_stale(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| s.is_stale(threshold, now))
    }

    /// Returns what a dashboard should render for this state.
    pub fn phase(&self) -> DisplayPhase<'_> {
        if self.is_loading && self.snapshot.is_none() {
            return DisplayPhase::Loading;
        }
        if let Some(message) = &self.error_message {
            return DisplayPhase::Error(message);
        }
        match &self.snapshot {
            Some(snapshot) => DisplayPhase::Ready(snapshot),
            None => DisplayPhase::Empty,
        }
    }
}

/// Rendering decision derived from a [`UsageState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayPhase<'a> {
    /// First fetch in progress, nothing to show yet.
    Loading,
    /// The last refresh failed.
    Error(&'a str),
    /// A snapshot is available.
    Ready(&'a UsageSnapshot),
    /// Nothing fetched yet.
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> UsageSnapshot {
        UsageSnapshot::builder()
            .session(10.0, "")
            .weekly(20.0, "")
            .build_at(Utc.timestamp_opt(100, 0).unwrap())
            .unwrap()
    }

    #[test]
    fn test_initial_state_is_empty() {
        let state = UsageState::default();
        assert!(!state.is_loading);
        assert!(state.snapshot.is_none());
        assert!(state.error_message.is_none());
        assert_eq!(state.phase(), DisplayPhase::Empty);
    }

    #[test]
    fn test_loading_without_snapshot() {
        let state = UsageState {
            is_loading: true,
            ..Default::default()
        };
        assert_eq!(state.phase(), DisplayPhase::Loading);
    }

    #[test]
    fn test_loading_with_snapshot_keeps_showing_data() {
        let snap = snapshot();
        let state = UsageState {
            is_loading: true,
            snapshot: Some(snap.clone()),
            error_message: None,
        };
        assert_eq!(state.phase(), DisplayPhase::Ready(&snap));
    }

    #[test]
    fn test_error_takes_precedence() {
        let state = UsageState {
            is_loading: false,
            snapshot: Some(snapshot()),
            error_message: Some("timeout".to_string()),
        };
        assert_eq!(state.phase(), DisplayPhase::Error("timeout"));
    }

    #[test]
    fn test_staleness_needs_snapshot() {
        let now = Utc.timestamp_opt(10_000, 0).unwrap();
        assert!(!UsageState::default().is_stale(Duration::seconds(1), now));

        let state = UsageState {
            snapshot: Some(snapshot()),
            ..Default::default()
        };
        assert!(state.is_stale(Duration::seconds(60), now));
        assert!(!state.is_stale(Duration::days(1), now));
    }
}
