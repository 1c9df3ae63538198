use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use super::plan_compaction;
use crate::constants::{DEFAULT_COMPACTION_CONCURRENCY, MILLIS_PER_MINUTE, SCAN_WINDOW_MINUTES};
use crate::errors::{Error, Result};
use crate::jobs::{ArchiveWatermark, JobCursor, JobName, JobRunReport, JobRunStatus};
use crate::retention::{bucket_key, BucketId, RetentionPolicy};
use crate::snapshots::{from_epoch_millis, truncate_to_millis, Snapshot, SnapshotRepositoryTrait};

#[derive(Debug, Clone, Copy)]
pub struct CompactionOptions {
    /// Accounts compacted in parallel within a run.
    pub concurrency: usize,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_COMPACTION_CONCURRENCY,
        }
    }
}

/// Totals for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountCompaction {
    pub scanned: usize,
    pub buckets_collapsed: usize,
    pub deleted: usize,
}

pub struct CompactionService {
    repository: Arc<dyn SnapshotRepositoryTrait>,
    policy: RetentionPolicy,
    options: CompactionOptions,
}

impl CompactionService {
    pub fn new(
        repository: Arc<dyn SnapshotRepositoryTrait>,
        policy: RetentionPolicy,
        options: CompactionOptions,
    ) -> Self {
        Self {
            repository,
            policy,
            options,
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// First instant that is still inside the fine window at `now`.
    /// Everything captured strictly before it is eligible.
    fn fine_window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.policy.fine_days())) + Duration::milliseconds(1)
    }

    /// Start of the oldest archive bucket that can still change after a
    /// run at `now`. Everything before it is already in the archive tier.
    fn archive_watermark(&self, now: DateTime<Utc>) -> Option<ArchiveWatermark> {
        let tier = self.policy.archive_tier()?;
        let cutoff = now - Duration::days(i64::from(tier.min_age_days));
        let through =
            from_epoch_millis(bucket_key(cutoff, tier.bucket_minutes) * MILLIS_PER_MINUTE)?;
        Some(ArchiveWatermark {
            through,
            bucket_minutes: tier.bucket_minutes,
        })
    }

    /// Compacts every account holding snapshots older than the fine window.
    ///
    /// Accounts that failed last run are worked on first and rescanned from
    /// their earliest snapshot. Others start at the cursor's archive
    /// watermark. A failing account is reported and left for the next run.
    pub async fn run(&self, now: DateTime<Utc>, cursor: JobCursor) -> (JobRunReport, JobCursor) {
        let now = truncate_to_millis(now);
        let report = JobRunReport::new(JobName::Compaction, now);

        let accounts = match self
            .repository
            .accounts_with_snapshots_before(self.fine_window_start(now))
        {
            Ok(accounts) => cursor.prioritize(accounts),
            Err(e) => {
                warn!("Snapshot compaction aborted: could not list accounts: {}", e);
                let report = report.abort(&e).finish();
                return (report.clone(), cursor.advance(&report));
            }
        };
        debug!("Compacting snapshots for {} accounts", accounts.len());

        let archive_width = self.policy.archive_tier().map(|t| t.bucket_minutes);
        let results: Vec<(String, Result<AccountCompaction>)> = stream::iter(accounts)
            .map(|account_id| {
                let resume_from =
                    archive_width.and_then(|width| cursor.resume_point(&account_id, width));
                async move {
                    let result = self.compact_account(&account_id, now, resume_from).await;
                    (account_id, result)
                }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut report = report;
        for (account_id, result) in results {
            report.accounts_processed += 1;
            match result {
                Ok(totals) => {
                    report.snapshots_scanned += totals.scanned;
                    report.buckets_collapsed += totals.buckets_collapsed;
                    report.snapshots_deleted += totals.deleted;
                }
                Err(e) => {
                    warn!("Snapshot compaction failed for account {}: {}", account_id, e);
                    report.record_failure(&account_id, &e);
                }
            }
        }

        let report = report.finish();
        info!(
            "Snapshot compaction finished: {} accounts, {} scanned, {} deleted in {} buckets, {} failed",
            report.accounts_processed,
            report.snapshots_scanned,
            report.snapshots_deleted,
            report.buckets_collapsed,
            report.accounts_failed
        );
        let mut cursor = cursor.advance(&report);
        if report.status == JobRunStatus::Completed {
            cursor.archived_through = self.archive_watermark(now);
        }
        (report, cursor)
    }

    /// Compacts one account's history as seen at `now`, reading from
    /// `resume_from` (or the earliest snapshot) up to the fine window.
    ///
    /// History is read in day-long epoch-aligned windows. The survivor of a
    /// bucket that runs past a window's end is carried into the next window,
    /// so buckets of any width are planned as a whole while each read stays
    /// one window wide. Windows already written stay written if a later one
    /// fails.
    pub async fn compact_account(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
        resume_from: Option<DateTime<Utc>>,
    ) -> Result<AccountCompaction> {
        let mut totals = AccountCompaction::default();
        let Some(earliest) = self.repository.earliest_captured_at(account_id)? else {
            return Ok(totals);
        };
        let start = resume_from.map_or(earliest, |from| from.max(earliest));

        let end_ms = self.fine_window_start(now).timestamp_millis();
        let window_ms = SCAN_WINDOW_MINUTES * MILLIS_PER_MINUTE;
        let mut window_start = start.timestamp_millis().div_euclid(window_ms) * window_ms;
        let mut carry: Vec<Snapshot> = Vec::new();
        // Collapsed buckets that are still open, so each is counted once.
        let mut counted: HashSet<BucketId> = HashSet::new();

        while window_start < end_ms {
            let window_end = window_start.saturating_add(window_ms).min(end_ms);
            let (from, to) = match (from_epoch_millis(window_start), from_epoch_millis(window_end)) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    return Err(Error::Unexpected(format!(
                        "scan window {}..{} is out of range",
                        window_start, window_end
                    )))
                }
            };

            let read = self.repository.query_range(account_id, from, to)?;
            totals.scanned += read.len();
            let mut batch = std::mem::take(&mut carry);
            batch.extend(read);

            let plan = plan_compaction(&self.policy, now, &batch);
            if !plan.is_empty() {
                let deleted = self.repository.delete(account_id, &plan.delete).await?;
                if deleted != plan.delete.len() {
                    debug!(
                        "Account {}: planned {} deletions in {}..{}, store removed {}",
                        account_id,
                        plan.delete.len(),
                        from,
                        to,
                        deleted
                    );
                }
                totals.deleted += deleted;
            }
            for bucket in &plan.collapsed {
                if counted.insert(*bucket) {
                    totals.buckets_collapsed += 1;
                }
            }
            counted.retain(|bucket| bucket.end_ms() > window_end);

            carry = batch
                .into_iter()
                .filter(|s| plan.delete.binary_search(&s.captured_at).is_err())
                .filter(|s| {
                    self.policy
                        .assign_bucket(s.captured_at, now)
                        .is_some_and(|bucket| bucket.end_ms() > window_end)
                })
                .collect();

            window_start = window_end;
        }

        if totals.deleted > 0 {
            debug!(
                "Account {}: removed {} of {} scanned snapshots",
                account_id, totals.deleted, totals.scanned
            );
        }
        Ok(totals)
    }
}
