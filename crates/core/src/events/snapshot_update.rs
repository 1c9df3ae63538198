//! Snapshot update payload.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::constants::{PRIVATE_CHANNEL_PREFIX, PUBLISH_DECIMAL_PRECISION};
use crate::snapshots::Snapshot;

/// Real-time update emitted after a successful capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotUpdate {
    pub account_id: String,
    pub value: Decimal,
    pub buying_power: Decimal,
    pub timestamp_ms: i64,
}

impl SnapshotUpdate {
    /// Name of the private channel this update is delivered on.
    pub fn channel(&self) -> String {
        channel_for_account(&self.account_id)
    }
}

impl From<&Snapshot> for SnapshotUpdate {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            account_id: snapshot.account_id.clone(),
            value: round_for_publish(snapshot.value),
            buying_power: round_for_publish(snapshot.buying_power),
            timestamp_ms: snapshot.captured_at_ms(),
        }
    }
}

pub fn channel_for_account(account_id: &str) -> String {
    format!("{}.{}", PRIVATE_CHANNEL_PREFIX, account_id)
}

fn round_for_publish(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PUBLISH_DECIMAL_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}
