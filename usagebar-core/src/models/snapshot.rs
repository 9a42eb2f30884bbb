//! Usage snapshot types.
//!
//! A [`UsageSnapshot`] is one complete usage reading. It is never mutated
//! after construction; a newer reading replaces it wholesale.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lower bound for every usage percentage.
const MIN_PERCENT: f64 = 0.0;

/// Upper bound for every usage percentage.
const MAX_PERCENT: f64 = 100.0;

/// Usage above this percentage counts as approaching the limit.
pub const APPROACHING_LIMIT_PERCENT: f64 = 80.0;

/// Clamps a percentage into `[0, 100]`.
///
/// NaN maps to 0 so callers never observe an out-of-range value.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        MIN_PERCENT
    } else {
        value.clamp(MIN_PERCENT, MAX_PERCENT)
    }
}

// ============================================================================
// Usage Snapshot
// ============================================================================

/// An immutable, fully-formed usage reading.
///
/// - **Session** = rolling session window (5 hours)
/// - **Weekly** = weekly window across all models
/// - **Sonnet** = weekly Sonnet-only window, 0 when not applicable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SnapshotRecord")]
pub struct UsageSnapshot {
    session_percentage: f64,
    session_reset_label: String,
    weekly_percentage: f64,
    weekly_reset_label: String,
    sonnet_percentage: f64,
    last_updated: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Starts building a snapshot.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Session usage percentage in `[0, 100]`.
    pub fn session_percentage(&self) -> f64 {
        self.session_percentage
    }

    /// Human-readable session reset time, empty when unknown.
    pub fn session_reset_label(&self) -> &str {
        &self.session_reset_label
    }

    /// Weekly (all models) usage percentage in `[0, 100]`.
    pub fn weekly_percentage(&self) -> f64 {
        self.weekly_percentage
    }

    /// Human-readable weekly reset time, empty when unknown.
    pub fn weekly_reset_label(&self) -> &str {
        &self.weekly_reset_label
    }

    /// Weekly Sonnet-only usage percentage, 0 when not applicable.
    pub fn sonnet_percentage(&self) -> f64 {
        self.sonnet_percentage
    }

    /// When this reading was taken.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Returns true if the Sonnet meter should be shown.
    pub fn has_sonnet(&self) -> bool {
        self.sonnet_percentage > MIN_PERCENT
    }

    /// Returns a copy of this snapshot stamped with a different time.
    #[must_use]
    pub fn with_last_updated(&self, last_updated: DateTime<Utc>) -> Self {
        Self {
            last_updated,
            ..self.clone()
        }
    }

    /// Returns the meters a dashboard renders, in display order.
    ///
    /// The Sonnet meter is omitted when its percentage is 0.
    pub fn meters(&self) -> Vec<UsageMeter> {
        let mut meters = vec![
            UsageMeter {
                kind: MeterKind::Session,
                percentage: self.session_percentage,
                reset_label: self.session_reset_label.clone(),
            },
            UsageMeter {
                kind: MeterKind::Weekly,
                percentage: self.weekly_percentage,
                reset_label: self.weekly_reset_label.clone(),
            },
        ];
        if self.has_sonnet() {
            meters.push(UsageMeter {
                kind: MeterKind::Sonnet,
                percentage: self.sonnet_percentage,
                reset_label: String::new(),
            });
        }
        meters
    }

    /// Returns the highest usage percentage across all meters.
    pub fn max_percentage(&self) -> f64 {
        self.session_percentage
            .max(self.weekly_percentage)
            .max(self.sonnet_percentage)
    }

    /// Returns true if any meter is approaching its limit (>80%).
    pub fn is_approaching_limit(&self) -> bool {
        self.max_percentage() > APPROACHING_LIMIT_PERCENT
    }

    /// Returns how old this reading is relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_updated
    }

    /// Returns true if this reading is older than `threshold`.
    pub fn is_stale(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > threshold
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`UsageSnapshot`].
///
/// Every percentage is clamped into `[0, 100]` on build. Non-finite inputs
/// are rejected.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    session_percentage: f64,
    session_reset_label: String,
    weekly_percentage: f64,
    weekly_reset_label: String,
    sonnet_percentage: f64,
}

impl SnapshotBuilder {
    /// Sets the session percentage and reset label.
    #[must_use]
    pub fn session(mut self, percentage: f64, reset_label: impl Into<String>) -> Self {
        self.session_percentage = percentage;
        self.session_reset_label = reset_label.into();
        self
    }

    /// Sets the weekly percentage and reset label.
    #[must_use]
    pub fn weekly(mut self, percentage: f64, reset_label: impl Into<String>) -> Self {
        self.weekly_percentage = percentage;
        self.weekly_reset_label = reset_label.into();
        self
    }

    /// Sets the Sonnet-only percentage.
    #[must_use]
    pub fn sonnet(mut self, percentage: f64) -> Self {
        self.sonnet_percentage = percentage;
        self
    }

    /// Builds the snapshot stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if any percentage is not finite.
    pub fn build(self) -> Result<UsageSnapshot, CoreError> {
        self.build_at(Utc::now())
    }

    /// Builds the snapshot stamped with `last_updated`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if any percentage is not finite.
    pub fn build_at(self, last_updated: DateTime<Utc>) -> Result<UsageSnapshot, CoreError> {
        let session = finite("session", self.session_percentage)?;
        let weekly = finite("weekly", self.weekly_percentage)?;
        let sonnet = finite("sonnet", self.sonnet_percentage)?;

        Ok(UsageSnapshot {
            session_percentage: clamp_percent(session),
            session_reset_label: self.session_reset_label.trim().to_string(),
            weekly_percentage: clamp_percent(weekly),
            weekly_reset_label: self.weekly_reset_label.trim().to_string(),
            sonnet_percentage: clamp_percent(sonnet),
            last_updated,
        })
    }
}

fn finite(field: &str, value: f64) -> Result<f64, CoreError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::InvalidData(format!(
            "{field} percentage is not a finite number: {value}"
        )))
    }
}

/// Wire form of a snapshot; deserialization funnels through the builder.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord {
    session_percentage: f64,
    #[serde(default)]
    session_reset_label: String,
    weekly_percentage: f64,
    #[serde(default)]
    weekly_reset_label: String,
    #[serde(default)]
    sonnet_percentage: f64,
    last_updated: DateTime<Utc>,
}

impl TryFrom<SnapshotRecord> for UsageSnapshot {
    type Error = CoreError;

    fn try_from(record: SnapshotRecord) -> Result<Self, Self::Error> {
        UsageSnapshot::builder()
            .session(record.session_percentage, record.session_reset_label)
            .weekly(record.weekly_percentage, record.weekly_reset_label)
            .sonnet(record.sonnet_percentage)
            .build_at(record.last_updated)
    }
}

// ============================================================================
// Meters
// ============================================================================

/// Which quota a meter describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    /// Current session window.
    Session,
    /// Weekly limit across all models.
    Weekly,
    /// Weekly Sonnet-only limit.
    Sonnet,
}

impl MeterKind {
    /// Card title shown by dashboards.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Session => "Current Session",
            Self::Weekly => "Weekly Limit (All Models)",
            Self::Sonnet => "Weekly (Sonnet Only)",
        }
    }
}

/// One quota meter derived from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageMeter {
    /// Which quota this is.
    pub kind: MeterKind,
    /// Used percentage in `[0, 100]`.
    pub percentage: f64,
    /// Reset label, empty when unknown.
    pub reset_label: String,
}

impl UsageMeter {
    /// Returns `"Resets <label>"`, or `None` when the label is empty.
    pub fn reset_text(&self) -> Option<String> {
        if self.reset_label.is_empty() {
            None
        } else {
            Some(format!("Resets {}", self.reset_label))
        }
    }

    /// Fill fraction for a progress bar, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        clamp_percent(self.percentage) / MAX_PERCENT
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(42.5), 42.5);
        assert_eq!(clamp_percent(110.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(f64::INFINITY), 100.0);
    }

    #[test]
    fn test_builder_clamps_every_percentage() {
        let snapshot = UsageSnapshot::builder()
            .session(-12.0, "2h")
            .weekly(110.0, "")
            .sonnet(250.0)
            .build_at(at(0))
            .unwrap();

        assert_eq!(snapshot.session_percentage(), 0.0);
        assert_eq!(snapshot.weekly_percentage(), 100.0);
        assert_eq!(snapshot.sonnet_percentage(), 100.0);
        assert_eq!(snapshot.session_reset_label(), "2h");
        assert_eq!(snapshot.weekly_reset_label(), "");
    }

    #[test]
    fn test_builder_rejects_non_finite() {
        let result = UsageSnapshot::builder()
            .session(f64::NAN, "")
            .weekly(10.0, "")
            .build_at(at(0));
        assert!(matches!(result, Err(CoreError::InvalidData(_))));
    }

    #[test]
    fn test_meters_suppress_zero_sonnet() {
        let snapshot = UsageSnapshot::builder()
            .session(42.0, "2h")
            .weekly(10.0, "Mon 9am")
            .build_at(at(0))
            .unwrap();

        let kinds: Vec<_> = snapshot.meters().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MeterKind::Session, MeterKind::Weekly]);
        assert!(!snapshot.has_sonnet());
    }

    #[test]
    fn test_meters_include_sonnet_when_used() {
        let snapshot = UsageSnapshot::builder()
            .session(1.0, "")
            .weekly(2.0, "")
            .sonnet(0.5)
            .build_at(at(0))
            .unwrap();

        let meters = snapshot.meters();
        assert_eq!(meters.len(), 3);
        assert_eq!(meters[2].kind, MeterKind::Sonnet);
        assert_eq!(meters[2].reset_text(), None);
    }

    #[test]
    fn test_reset_text() {
        let meter = UsageMeter {
            kind: MeterKind::Session,
            percentage: 10.0,
            reset_label: "2h".to_string(),
        };
        assert_eq!(meter.reset_text().as_deref(), Some("Resets 2h"));
        assert!((meter.fraction() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_limits_and_staleness() {
        let snapshot = UsageSnapshot::builder()
            .session(85.0, "")
            .weekly(20.0, "")
            .build_at(at(1_000))
            .unwrap();

        assert!(snapshot.is_approaching_limit());
        assert_eq!(snapshot.max_percentage(), 85.0);
        assert!(!snapshot.is_stale(Duration::seconds(60), at(1_030)));
        assert!(snapshot.is_stale(Duration::seconds(60), at(1_061)));
    }

    #[test]
    fn test_with_last_updated_keeps_values() {
        let snapshot = UsageSnapshot::builder()
            .session(5.0, "1h")
            .weekly(6.0, "")
            .build_at(at(10))
            .unwrap();
        let restamped = snapshot.with_last_updated(at(20));

        assert_eq!(restamped.last_updated(), at(20));
        assert_eq!(restamped.session_percentage(), 5.0);
        assert_eq!(snapshot.last_updated(), at(10));
    }
}
