//! Pure bucket planning over a slice of snapshots.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::retention::{BucketId, RetentionPolicy};
use crate::snapshots::Snapshot;

/// What compaction will do to a batch of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionPlan {
    /// Timestamps to delete, ascending.
    pub delete: Vec<DateTime<Utc>>,
    /// Buckets that held two or more eligible snapshots, ascending.
    pub collapsed: Vec<BucketId>,
    /// Snapshots inside the fine window.
    pub fine: usize,
}

impl CompactionPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
    }

    pub fn buckets_collapsed(&self) -> usize {
        self.collapsed.len()
    }
}

/// Groups eligible snapshots by bucket and keeps the latest `captured_at` of
/// each bucket. Equal timestamps keep the first in input order.
///
/// Snapshots of different accounts must not be mixed in one call.
pub fn plan_compaction(
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    snapshots: &[Snapshot],
) -> CompactionPlan {
    let mut plan = CompactionPlan::default();
    let mut buckets: BTreeMap<BucketId, Vec<&Snapshot>> = BTreeMap::new();

    for snapshot in snapshots {
        match policy.assign_bucket(snapshot.captured_at, now) {
            Some(bucket) => buckets.entry(bucket).or_default().push(snapshot),
            None => plan.fine += 1,
        }
    }

    for (bucket, members) in buckets.iter().filter(|(_, m)| m.len() > 1) {
        let mut keep = 0;
        for (i, candidate) in members.iter().enumerate() {
            if candidate.captured_at > members[keep].captured_at {
                keep = i;
            }
        }
        // Deletes are keyed by timestamp, so a twin of the survivor must stay too.
        let survivor = members[keep].captured_at;
        plan.collapsed.push(*bucket);
        plan.delete.extend(
            members
                .iter()
                .map(|s| s.captured_at)
                .filter(|ts| *ts != survivor),
        );
    }

    plan.delete.sort();
    plan
}
