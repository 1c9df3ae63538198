use super::*;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

#[test]
fn test_snapshot_truncates_to_millis() {
    let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
    let snapshot = Snapshot::new("acc-1", ts, dec!(100), dec!(10));

    assert_eq!(snapshot.captured_at_ms(), 1_700_000_000_123);
    assert_eq!(snapshot.captured_at.timestamp_subsec_nanos(), 123_000_000);
}

#[test]
fn test_truncate_is_stable() {
    let ts = Utc.timestamp_opt(1_700_000_000, 999_999_999).unwrap();
    let once = truncate_to_millis(ts);
    assert_eq!(truncate_to_millis(once), once);
    assert_eq!(from_epoch_millis(once.timestamp_millis()), Some(once));
}

#[test]
fn test_snapshot_serializes_camel_case() {
    let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let snapshot = Snapshot::new("acc-1", ts, dec!(1250.5), dec!(300));
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["accountId"], "acc-1");
    assert!(json.get("buyingPower").is_some());
    assert!(json.get("capturedAt").is_some());
}
