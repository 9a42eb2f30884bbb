//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};
use usagebar_core::{MeterKind, UsageMeter, UsageSnapshot, UsageState};

use crate::Cli;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for the current state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOutput {
    pub is_loading: bool,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Usage meters of a snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput {
    pub session: MeterOutput,
    pub weekly: MeterOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sonnet: Option<MeterOutput>,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// A single usage meter.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterOutput {
    pub title: &'static str,
    pub used_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets: Option<String>,
}

impl From<&UsageMeter> for MeterOutput {
    fn from(meter: &UsageMeter) -> Self {
        Self {
            title: meter.kind.title(),
            used_percent: meter.percentage,
            resets: (!meter.reset_label.is_empty()).then(|| meter.reset_label.clone()),
        }
    }
}

impl From<&UsageSnapshot> for UsageOutput {
    fn from(snapshot: &UsageSnapshot) -> Self {
        let meters = snapshot.meters();
        let find = |kind: MeterKind| meters.iter().find(|m| m.kind == kind).map(MeterOutput::from);

        Self {
            session: MeterOutput {
                title: MeterKind::Session.title(),
                used_percent: snapshot.session_percentage(),
                resets: non_empty(snapshot.session_reset_label()),
            },
            weekly: MeterOutput {
                title: MeterKind::Weekly.title(),
                used_percent: snapshot.weekly_percentage(),
                resets: non_empty(snapshot.weekly_reset_label()),
            },
            sonnet: find(MeterKind::Sonnet),
            updated_at: snapshot.last_updated(),
        }
    }
}

fn non_empty(label: &str) -> Option<String> {
    (!label.is_empty()).then(|| label.to_string())
}

// ============================================================================
// Serialization helpers
// ============================================================================

fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Creates a formatter honouring the global `--pretty` flag.
    pub fn for_cli(cli: &Cli) -> Self {
        Self::new(cli.pretty)
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a usage state.
    pub fn format_state(
        &self,
        state: &UsageState,
        stale_after: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.format(&Self::state_to_output(state, stale_after, now))
    }

    /// Converts a state to its JSON shape.
    pub fn state_to_output(
        state: &UsageState,
        stale_after: Option<Duration>,
        now: DateTime<Utc>,
    ) -> StateOutput {
        StateOutput {
            is_loading: state.is_loading,
            stale: stale_after.is_some_and(|threshold| state.is_stale(threshold, now)),
            usage: state.snapshot.as_ref().map(UsageOutput::from),
            error: state.error_message.clone(),
        }
    }
}
