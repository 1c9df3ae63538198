//! Job run models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// The two scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    Capture,
    Compaction,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Capture => "snapshot_capture",
            JobName::Compaction => "snapshot_compaction",
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "snapshot_capture" | "capture" => Ok(JobName::Capture),
            "snapshot_compaction" | "compaction" => Ok(JobName::Compaction),
            other => Err(Error::InvalidConfigValue(format!("unknown job '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum JobRunStatus {
    Completed,
    /// The run stopped before reaching every account.
    Aborted { reason: String },
}

/// One account that failed within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFailure {
    pub account_id: String,
    pub kind: String,
    pub message: String,
}

impl AccountFailure {
    pub fn new(account_id: &str, error: &Error) -> Self {
        Self {
            account_id: account_id.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Summary of one capture or compaction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunReport {
    pub job: JobName,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobRunStatus,
    pub accounts_processed: usize,
    pub accounts_failed: usize,
    pub failures: Vec<AccountFailure>,
    pub snapshots_appended: usize,
    pub duplicates_skipped: usize,
    pub updates_published: usize,
    pub publish_failures: usize,
    pub snapshots_scanned: usize,
    pub buckets_collapsed: usize,
    pub snapshots_deleted: usize,
}

impl JobRunReport {
    pub fn new(job: JobName, started_at: DateTime<Utc>) -> Self {
        Self {
            job,
            started_at,
            finished_at: started_at,
            status: JobRunStatus::Completed,
            accounts_processed: 0,
            accounts_failed: 0,
            failures: Vec::new(),
            snapshots_appended: 0,
            duplicates_skipped: 0,
            updates_published: 0,
            publish_failures: 0,
            snapshots_scanned: 0,
            buckets_collapsed: 0,
            snapshots_deleted: 0,
        }
    }

    pub fn record_failure(&mut self, account_id: &str, error: &Error) {
        self.accounts_failed += 1;
        self.failures.push(AccountFailure::new(account_id, error));
    }

    pub fn abort(mut self, error: &Error) -> Self {
        self.status = JobRunStatus::Aborted {
            reason: error.to_string(),
        };
        self
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now().max(self.started_at);
        self
    }

    pub fn failed_accounts(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.account_id.clone()).collect()
    }
}

/// Result of asking the runner to run a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum JobRunOutcome {
    /// A previous run of the same job still held the lock; nothing was done.
    Skipped { job: JobName },
    Finished(JobRunReport),
}

impl JobRunOutcome {
    pub fn report(&self) -> Option<&JobRunReport> {
        match self {
            JobRunOutcome::Skipped { .. } => None,
            JobRunOutcome::Finished(report) => Some(report),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, JobRunOutcome::Skipped { .. })
    }
}

/// Archive history a completed compaction run left final.
///
/// Every `bucket_minutes` bucket ending at or before `through` held at most
/// one snapshot when the run finished. No snapshot can join those buckets
/// later, so a run using the same archive width can start reading there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveWatermark {
    pub through: DateTime<Utc>,
    pub bucket_minutes: u32,
}

/// Explicit per-job state carried from one run to the next.
///
/// Loaded before a run, passed into the service, and returned updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCursor {
    pub job: JobName,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_status: Option<JobRunStatus>,
    pub runs: u64,
    /// Accounts that failed in the last run; worked on first next time.
    pub retry_accounts: Vec<String>,
    /// Compaction only.
    #[serde(default)]
    pub archived_through: Option<ArchiveWatermark>,
}

impl JobCursor {
    pub fn new(job: JobName) -> Self {
        Self {
            job,
            last_started_at: None,
            last_finished_at: None,
            last_status: None,
            runs: 0,
            retry_accounts: Vec::new(),
            archived_through: None,
        }
    }

    /// Cursor state after `report`.
    ///
    /// An aborted run reached no account, so the previous retry list and
    /// watermark carry over.
    pub fn advance(self, report: &JobRunReport) -> Self {
        let retry_accounts = match report.status {
            JobRunStatus::Completed => report.failed_accounts(),
            JobRunStatus::Aborted { .. } => self.retry_accounts,
        };
        Self {
            job: self.job,
            last_started_at: Some(report.started_at),
            last_finished_at: Some(report.finished_at),
            last_status: Some(report.status.clone()),
            runs: self.runs + 1,
            retry_accounts,
            archived_through: self.archived_through,
        }
    }

    /// Where compaction of `account_id` may start reading, given the current
    /// archive width. `None` means the whole history.
    pub fn resume_point(
        &self,
        account_id: &str,
        archive_bucket_minutes: u32,
    ) -> Option<DateTime<Utc>> {
        if self.retry_accounts.iter().any(|a| a == account_id) {
            return None;
        }
        self.archived_through
            .filter(|w| w.bucket_minutes == archive_bucket_minutes)
            .map(|w| w.through)
    }

    /// Orders `accounts` so that the ones to retry come first. Duplicates are
    /// dropped; retry accounts missing from `accounts` are ignored.
    pub fn prioritize(&self, accounts: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::with_capacity(accounts.len());
        let available: HashSet<&String> = accounts.iter().collect();
        let mut ordered = Vec::with_capacity(accounts.len());

        for account_id in &self.retry_accounts {
            if available.contains(account_id) && seen.insert(account_id.clone()) {
                ordered.push(account_id.clone());
            }
        }
        for account_id in &accounts {
            if seen.insert(account_id.clone()) {
                ordered.push(account_id.clone());
            }
        }
        ordered
    }
}
