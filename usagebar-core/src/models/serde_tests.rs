//! Serde tests for core types.
//!
//! These pin the camelCase wire shape and check that deserialization goes
//! through the same clamping as the builder.

use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::{MeterKind, UsageSnapshot, UsageState};

fn sample() -> UsageSnapshot {
    UsageSnapshot::builder()
        .session(42.0, "2h")
        .weekly(64.5, "Mon 9am")
        .sonnet(12.0)
        .build_at(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
        .unwrap()
}

// ============================================================================
// UsageSnapshot Serde Tests
// ============================================================================

#[test]
fn test_snapshot_serializes_camel_case() {
    let value = serde_json::to_value(sample()).unwrap();

    assert_eq!(value["sessionPercentage"], json!(42.0));
    assert_eq!(value["sessionResetLabel"], json!("2h"));
    assert_eq!(value["weeklyPercentage"], json!(64.5));
    assert_eq!(value["weeklyResetLabel"], json!("Mon 9am"));
    assert_eq!(value["sonnetPercentage"], json!(12.0));
    assert_eq!(value["lastUpdated"], json!("2025-01-01T12:00:00Z"));
}

#[test]
fn test_snapshot_serde_roundtrip() {
    let snapshot = sample();
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: UsageSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);
}

#[test]
fn test_snapshot_deserialize_clamps() {
    let parsed: UsageSnapshot = serde_json::from_value(json!({
        "sessionPercentage": 140.0,
        "weeklyPercentage": -3.0,
        "lastUpdated": "2025-01-01T00:00:00Z"
    }))
    .unwrap();

    assert_eq!(parsed.session_percentage(), 100.0);
    assert_eq!(parsed.weekly_percentage(), 0.0);
    assert_eq!(parsed.sonnet_percentage(), 0.0);
    assert_eq!(parsed.session_reset_label(), "");
}

#[test]
fn test_snapshot_deserialize_requires_percentages() {
    let result: Result<UsageSnapshot, _> = serde_json::from_value(json!({
        "sessionPercentage": 10.0,
        "lastUpdated": "2025-01-01T00:00:00Z"
    }));
    assert!(result.is_err());
}

// ============================================================================
// UsageState / MeterKind Serde Tests
// ============================================================================

#[test]
fn test_state_serializes_camel_case() {
    let state = UsageState {
        is_loading: false,
        snapshot: Some(sample()),
        error_message: Some("timeout".to_string()),
    };
    let value = serde_json::to_value(&state).unwrap();

    assert_eq!(value["isLoading"], json!(false));
    assert_eq!(value["errorMessage"], json!("timeout"));
    assert_eq!(value["snapshot"]["sessionPercentage"], json!(42.0));
}

#[test]
fn test_empty_state_serializes_nulls() {
    let value = serde_json::to_value(UsageState::default()).unwrap();
    assert_eq!(value["snapshot"], serde_json::Value::Null);
    assert_eq!(value["errorMessage"], serde_json::Value::Null);
}

#[test]
fn test_meter_kind_snake_case() {
    assert_eq!(serde_json::to_string(&MeterKind::Session).unwrap(), r#""session""#);
    let kind: MeterKind = serde_json::from_str(r#""sonnet""#).unwrap();
    assert_eq!(kind, MeterKind::Sonnet);
}
