//! Tier lookup and bucket assignment.
//!
//! Ages are measured against the compaction run's `now`, so a snapshot moves
//! into coarser tiers as it ages across successive runs.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use super::{RetentionPolicy, RetentionTier};
use crate::constants::MILLIS_PER_MINUTE;

/// Where a snapshot of a given age falls in the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TierAssignment {
    /// Inside the fine window; never compacted.
    NoCompaction,
    Tier { index: usize, bucket_minutes: u32 },
}

/// Identity of one epoch-aligned bucket within a tier width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketId {
    pub bucket_minutes: u32,
    /// Bucket start, in minutes since the Unix epoch.
    pub start_minute: i64,
}

impl BucketId {
    /// First millisecond after the bucket.
    pub fn end_ms(&self) -> i64 {
        (self.start_minute + i64::from(self.bucket_minutes)) * MILLIS_PER_MINUTE
    }
}

impl RetentionTier {
    /// Orders this tier relative to `age`: `Greater` when the tier lies
    /// entirely above it, `Less` when entirely below, `Equal` when
    /// `min_age_days <= age < max_age_days`.
    pub fn compare_age(&self, age: Duration) -> Ordering {
        if age < Duration::days(i64::from(self.min_age_days)) {
            return Ordering::Greater;
        }
        match self.max_age_days {
            Some(max) if age >= Duration::days(i64::from(max)) => Ordering::Less,
            _ => Ordering::Equal,
        }
    }
}

impl RetentionPolicy {
    /// Classifies a snapshot age. Ages below `fine_days` (including negative
    /// ages from clock skew) are never compacted.
    pub fn evaluate(&self, age: Duration) -> TierAssignment {
        if age < Duration::days(i64::from(self.fine_days())) {
            return TierAssignment::NoCompaction;
        }
        match self.tiers().binary_search_by(|tier| tier.compare_age(age)) {
            Ok(index) => TierAssignment::Tier {
                index,
                bucket_minutes: self.tiers()[index].bucket_minutes,
            },
            Err(_) => TierAssignment::NoCompaction,
        }
    }

    /// Bucket of a snapshot captured at `captured_at`, as seen at `now`.
    /// `None` when the snapshot is in the fine window.
    pub fn assign_bucket(&self, captured_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<BucketId> {
        match self.evaluate(now - captured_at) {
            TierAssignment::NoCompaction => None,
            TierAssignment::Tier { bucket_minutes, .. } => Some(BucketId {
                bucket_minutes,
                start_minute: bucket_key(captured_at, bucket_minutes),
            }),
        }
    }
}

/// `floor(captured_at_minutes / b) * b`, epoch-aligned.
///
/// Euclidean division keeps pre-epoch timestamps in the bucket below them.
pub fn bucket_key(captured_at: DateTime<Utc>, bucket_minutes: u32) -> i64 {
    let width = i64::from(bucket_minutes.max(1));
    let minutes = captured_at.timestamp_millis().div_euclid(MILLIS_PER_MINUTE);
    minutes.div_euclid(width) * width
}
