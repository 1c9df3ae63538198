//! Repository traits for the snapshot store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AppendOutcome, Snapshot};
use crate::errors::Result;

/// Repository trait for the per-account snapshot log.
///
/// Implementations must serialize conflicting writes for the same account so
/// a capture append and a compaction delete cannot interleave.
#[async_trait]
pub trait SnapshotRepositoryTrait: Send + Sync {
    /// Append a snapshot.
    ///
    /// Returns `Duplicate` without writing if a snapshot already exists at the
    /// same `captured_at`. Fails with `ConstraintViolation` if `captured_at` is
    /// earlier than the account's latest snapshot.
    async fn append(&self, snapshot: &Snapshot) -> Result<AppendOutcome>;

    /// Delete the snapshots of one account at exactly the given timestamps.
    /// Returns the number of rows removed.
    async fn delete(&self, account_id: &str, captured_at: &[DateTime<Utc>]) -> Result<usize>;

    /// Snapshots with `from <= captured_at < to`, ascending by `captured_at`.
    fn query_range(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>>;

    /// Most recent snapshot of an account.
    fn latest(&self, account_id: &str) -> Result<Option<Snapshot>>;

    /// Timestamp of the oldest snapshot of an account.
    fn earliest_captured_at(&self, account_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Accounts owning at least one snapshot captured strictly before `cutoff`.
    fn accounts_with_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;

    /// Number of snapshots stored for an account.
    fn count(&self, account_id: &str) -> Result<usize>;
}
