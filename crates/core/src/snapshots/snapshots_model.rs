//! Snapshot domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Truncates a timestamp to millisecond precision.
///
/// Snapshot identity is `(account_id, captured_at)` at millisecond resolution,
/// so every timestamp entering the store goes through this first.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Converts epoch milliseconds back into a UTC timestamp.
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// One immutable valuation observation for an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub account_id: String,
    pub captured_at: DateTime<Utc>,
    /// Portfolio mark-to-market value.
    pub value: Decimal,
    /// Available uninvested capital.
    pub buying_power: Decimal,
}

impl Snapshot {
    pub fn new(
        account_id: impl Into<String>,
        captured_at: DateTime<Utc>,
        value: Decimal,
        buying_power: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            captured_at: truncate_to_millis(captured_at),
            value,
            buying_power,
        }
    }

    pub fn captured_at_ms(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }
}

/// Result of appending a snapshot to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppendOutcome {
    /// A new snapshot was written.
    Appended,
    /// A snapshot already existed at that timestamp; nothing was written.
    Duplicate,
}

/// Current valuation of an account as reported by the valuation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub value: Decimal,
    pub buying_power: Decimal,
}

impl Valuation {
    pub fn new(value: Decimal, buying_power: Decimal) -> Self {
        Self {
            value,
            buying_power,
        }
    }
}
