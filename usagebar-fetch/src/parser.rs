//! Usage payload parser.
//!
//! Converts a [`RawPayload`] into a [`UsageSnapshot`]. Three payload shapes
//! are understood:
//!
//! 1. Flat JSON:
//!    `{"session": 42, "sessionReset": "2h", "weekly": 64, "weeklyReset": "", "sonnet": 0}`
//! 2. Windowed JSON as served by the OAuth usage endpoint:
//!    `{"five_hour": {"utilization": 42, "resets_at": "..."}, "seven_day": {...}, "seven_day_sonnet": {...}}`
//! 3. The text usage screen printed by the vendor CLI:
//!
//! ```text
//! Current session
//! █████▌   42% used
//! Resets 7pm (Europe/Berlin)
//!
//! Current week (all models)
//! ███      18% used
//! Resets Oct 20, 9am (Europe/Berlin)
//! ```
//!
//! `last_updated` is always the parse time, never a server-provided value.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};
use usagebar_core::UsageSnapshot;

use crate::error::ParseError;
use crate::payload::{PayloadFormat, RawPayload};

// ============================================================================
// Regex Patterns
// ============================================================================

/// Pattern for "XX% used"
static PERCENT_USED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*used").expect("Invalid regex")
});

/// Pattern for "XX% left" or "XX% remaining"
static PERCENT_LEFT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:left|remaining)").expect("Invalid regex")
});

/// Pattern for "Resets <time>" or "Reset: <time>"
static RESET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bresets?\b:?\s+(.+?)\s*$").expect("Invalid regex")
});

/// Keys that mark the windowed JSON shape.
const WINDOW_KEYS: &[&str] = &["five_hour", "fiveHour", "seven_day", "sevenDay"];

// ============================================================================
// Parser
// ============================================================================

/// Stateless usage payload parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageParser;

impl UsageParser {
    /// Creates a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parses a payload, stamping the snapshot with the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if required fields are absent or malformed.
    pub fn parse(&self, payload: &RawPayload) -> Result<UsageSnapshot, ParseError> {
        self.parse_at(payload, Utc::now())
    }

    /// Parses a payload, stamping the snapshot with `now`.
    ///
    /// Identical inputs always produce identical snapshots.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if required fields are absent or malformed.
    pub fn parse_at(
        &self,
        payload: &RawPayload,
        now: DateTime<Utc>,
    ) -> Result<UsageSnapshot, ParseError> {
        if payload.is_blank() {
            return Err(ParseError::Empty);
        }

        debug!(len = payload.body().len(), format = ?payload.format(), "Parsing usage payload");

        let fields = match payload.format() {
            PayloadFormat::Json => parse_json(payload.body(), now),
            PayloadFormat::Text => parse_text(payload.body()),
        }
        .inspect_err(|e| warn!(error = %e, "Failed to parse usage payload"))?;

        let snapshot = UsageSnapshot::builder()
            .session(fields.session, fields.session_reset)
            .weekly(fields.weekly, fields.weekly_reset)
            .sonnet(fields.sonnet)
            .build_at(now)?;

        debug!(
            session = snapshot.session_percentage(),
            weekly = snapshot.weekly_percentage(),
            sonnet = snapshot.sonnet_percentage(),
            "Usage payload parsed"
        );

        Ok(snapshot)
    }
}

/// Values extracted from a payload before clamping.
#[derive(Debug, Default)]
struct UsageFields {
    session: f64,
    session_reset: String,
    weekly: f64,
    weekly_reset: String,
    sonnet: f64,
}

// ============================================================================
// JSON Shapes
// ============================================================================

/// Flat usage document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatPayload {
    #[serde(default, alias = "sessionPercentage", alias = "session_percentage")]
    session: Option<Value>,
    #[serde(default, alias = "sessionResetLabel", alias = "session_reset")]
    session_reset: Option<Value>,
    #[serde(default, alias = "weeklyPercentage", alias = "weekly_percentage")]
    weekly: Option<Value>,
    #[serde(default, alias = "weeklyResetLabel", alias = "weekly_reset")]
    weekly_reset: Option<Value>,
    #[serde(default, alias = "sonnetPercentage", alias = "sonnet_percentage")]
    sonnet: Option<Value>,
}

/// Windowed usage document.
#[derive(Debug, Deserialize)]
struct WindowedPayload {
    #[serde(default, alias = "fiveHour")]
    five_hour: Option<WindowRecord>,
    #[serde(default, alias = "sevenDay")]
    seven_day: Option<WindowRecord>,
    #[serde(default, alias = "sevenDaySonnet")]
    seven_day_sonnet: Option<WindowRecord>,
}

/// One window of the windowed document.
#[derive(Debug, Deserialize)]
struct WindowRecord {
    #[serde(default)]
    utilization: Option<Value>,
    #[serde(default, alias = "resetsAt")]
    resets_at: Option<String>,
}

fn parse_json(body: &str, now: DateTime<Utc>) -> Result<UsageFields, ParseError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let Value::Object(map) = &value else {
        return Err(ParseError::Malformed {
            field: "payload",
            value: value.to_string(),
        });
    };

    if WINDOW_KEYS.iter().any(|k| map.contains_key(*k)) {
        let windowed: WindowedPayload =
            serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        parse_windowed(windowed, now)
    } else {
        let flat: FlatPayload =
            serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        parse_flat(flat)
    }
}

fn parse_flat(flat: FlatPayload) -> Result<UsageFields, ParseError> {
    Ok(UsageFields {
        session: percent("session", flat.session.as_ref())?
            .ok_or(ParseError::MissingField("session"))?,
        session_reset: label("sessionReset", flat.session_reset.as_ref())?,
        weekly: percent("weekly", flat.weekly.as_ref())?
            .ok_or(ParseError::MissingField("weekly"))?,
        weekly_reset: label("weeklyReset", flat.weekly_reset.as_ref())?,
        sonnet: percent("sonnet", flat.sonnet.as_ref())?.unwrap_or(0.0),
    })
}

fn parse_windowed(windowed: WindowedPayload, now: DateTime<Utc>) -> Result<UsageFields, ParseError> {
    let session = windowed
        .five_hour
        .ok_or(ParseError::MissingField("five_hour"))?;
    let weekly = windowed
        .seven_day
        .ok_or(ParseError::MissingField("seven_day"))?;

    let sonnet = match windowed.seven_day_sonnet {
        Some(window) => percent("seven_day_sonnet.utilization", window.utilization.as_ref())?
            .unwrap_or(0.0),
        None => 0.0,
    };

    Ok(UsageFields {
        session: percent("five_hour.utilization", session.utilization.as_ref())?
            .ok_or(ParseError::MissingField("five_hour.utilization"))?,
        session_reset: reset_label(session.resets_at.as_deref(), now),
        weekly: percent("seven_day.utilization", weekly.utilization.as_ref())?
            .ok_or(ParseError::MissingField("seven_day.utilization"))?,
        weekly_reset: reset_label(weekly.resets_at.as_deref(), now),
        sonnet,
    })
}

/// Reads a percentage from a JSON number or a numeric string like `"42%"`.
fn percent(field: &'static str, value: Option<&Value>) -> Result<Option<f64>, ParseError> {
    let malformed = |v: &Value| ParseError::Malformed {
        field,
        value: v.to_string(),
    };

    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v @ Value::Number(n)) => n.as_f64().ok_or_else(|| malformed(v))?,
        Some(v @ Value::String(s)) => {
            let trimmed = s.trim();
            let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
            digits.parse::<f64>().map_err(|_| malformed(v))?
        }
        Some(v) => return Err(malformed(v)),
    };

    if parsed.is_finite() {
        Ok(Some(parsed))
    } else {
        Err(ParseError::Malformed {
            field,
            value: parsed.to_string(),
        })
    }
}

/// Reads a reset label; absent and null both mean "unknown".
fn label(field: &'static str, value: Option<&Value>) -> Result<String, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(v) => Err(ParseError::Malformed {
            field,
            value: v.to_string(),
        }),
    }
}

/// Turns a reset timestamp into a countdown label relative to `now`.
///
/// Unparseable timestamps are passed through verbatim.
fn reset_label(resets_at: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = resets_at.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(reset) => humanize_until(reset.with_timezone(&Utc), now),
        Err(_) => raw.to_string(),
    }
}

/// Formats the time until `reset` as "2h 15m", "3d 4h" or "45m".
///
/// Returns an empty label once the reset is in the past.
fn humanize_until(reset: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (reset - now).num_seconds();
    if secs <= 0 {
        return String::new();
    }

    let minutes = (secs + 59) / 60;
    let days = minutes / (24 * 60);
    let hours = (minutes % (24 * 60)) / 60;
    let mins = minutes % 60;

    match (days, hours, mins) {
        (0, 0, m) => format!("{m}m"),
        (0, h, 0) => format!("{h}h"),
        (0, h, m) => format!("{h}h {m}m"),
        (d, 0, _) => format!("{d}d"),
        (d, h, _) => format!("{d}d {h}h"),
    }
}

// ============================================================================
// Text Shape
// ============================================================================

/// Sections of the CLI usage screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Session,
    Weekly,
    Sonnet,
    Other,
}

impl Section {
    fn from_header(line: &str) -> Option<Self> {
        let lower = line.to_lowercase();
        if lower.contains("current session") {
            Some(Self::Session)
        } else if lower.contains("current week") {
            if lower.contains("sonnet") {
                Some(Self::Sonnet)
            } else if lower.contains("all models") || !lower.contains('(') {
                Some(Self::Weekly)
            } else {
                Some(Self::Other)
            }
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct SectionReading {
    percentage: Option<f64>,
    reset: Option<String>,
}

fn parse_text(body: &str) -> Result<UsageFields, ParseError> {
    let text = strip_ansi_escapes::strip_str(body);

    let mut session = SectionReading::default();
    let mut weekly = SectionReading::default();
    let mut sonnet = SectionReading::default();
    let mut current: Option<Section> = None;
    let mut saw_section = false;

    for line in text.lines() {
        if let Some(section) = Section::from_header(line) {
            current = Some(section);
            saw_section = true;
        }

        let reading = match current {
            Some(Section::Session) => &mut session,
            Some(Section::Weekly) => &mut weekly,
            Some(Section::Sonnet) => &mut sonnet,
            Some(Section::Other) | None => continue,
        };

        if reading.percentage.is_none() {
            if let Some(caps) = PERCENT_USED_RE.captures(line) {
                reading.percentage = caps[1].parse().ok();
            } else if let Some(caps) = PERCENT_LEFT_RE.captures(line) {
                reading.percentage = caps[1].parse::<f64>().ok().map(|left| 100.0 - left);
            }
        }
        if reading.reset.is_none() {
            if let Some(caps) = RESET_RE.captures(line) {
                reading.reset = Some(caps[1].trim().to_string());
            }
        }
    }

    if !saw_section {
        return Err(ParseError::UnrecognizedFormat);
    }

    Ok(UsageFields {
        session: session
            .percentage
            .ok_or(ParseError::MissingField("session"))?,
        session_reset: session.reset.unwrap_or_default(),
        weekly: weekly.percentage.ok_or(ParseError::MissingField("weekly"))?,
        weekly_reset: weekly.reset.unwrap_or_default(),
        sonnet: sonnet.percentage.unwrap_or(0.0),
    })
}

// ============================================================================
// Tests
// ============================================================================
