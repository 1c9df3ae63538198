use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::{ActiveAccountSupplier, ValuationSource};
use crate::constants::{DEFAULT_CAPTURE_CONCURRENCY, DEFAULT_VALUATION_TIMEOUT_MS};
use crate::errors::{Error, Result};
use crate::events::{SnapshotUpdate, SnapshotUpdatePublisher};
use crate::jobs::{JobCursor, JobName, JobRunReport};
use crate::snapshots::{truncate_to_millis, AppendOutcome, Snapshot, SnapshotRepositoryTrait};

#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    /// Upper bound on one valuation call.
    pub valuation_timeout: Duration,
    /// Accounts processed in parallel within a run.
    pub concurrency: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            valuation_timeout: Duration::from_millis(DEFAULT_VALUATION_TIMEOUT_MS),
            concurrency: DEFAULT_CAPTURE_CONCURRENCY,
        }
    }
}

enum AccountCapture {
    Appended { published: bool },
    Duplicate,
}

pub struct CaptureService {
    repository: Arc<dyn SnapshotRepositoryTrait>,
    valuation_source: Arc<dyn ValuationSource>,
    account_supplier: Arc<dyn ActiveAccountSupplier>,
    publisher: Arc<dyn SnapshotUpdatePublisher>,
    options: CaptureOptions,
}

impl CaptureService {
    pub fn new(
        repository: Arc<dyn SnapshotRepositoryTrait>,
        valuation_source: Arc<dyn ValuationSource>,
        account_supplier: Arc<dyn ActiveAccountSupplier>,
        publisher: Arc<dyn SnapshotUpdatePublisher>,
        options: CaptureOptions,
    ) -> Self {
        Self {
            repository,
            valuation_source,
            account_supplier,
            publisher,
            options,
        }
    }

    /// Captures one snapshot per active account, all stamped with `now`.
    ///
    /// Per-account failures are recorded in the report and never stop the
    /// other accounts. Only a failing account supplier aborts the run.
    pub async fn run(&self, now: DateTime<Utc>, cursor: JobCursor) -> (JobRunReport, JobCursor) {
        let now = truncate_to_millis(now);
        let report = JobRunReport::new(JobName::Capture, now);

        let accounts = match self.account_supplier.active_accounts().await {
            Ok(accounts) => cursor.prioritize(accounts),
            Err(e) => {
                warn!("Snapshot capture aborted: could not load active accounts: {}", e);
                let report = report.abort(&e).finish();
                return (report.clone(), cursor.advance(&report));
            }
        };
        debug!("Capturing snapshots for {} accounts at {}", accounts.len(), now);

        let results: Vec<(String, Result<AccountCapture>)> = stream::iter(accounts)
            .map(|account_id| async move {
                let result = self.capture_account(&account_id, now).await;
                (account_id, result)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut report = report;
        for (account_id, result) in results {
            report.accounts_processed += 1;
            match result {
                Ok(AccountCapture::Appended { published }) => {
                    report.snapshots_appended += 1;
                    if published {
                        report.updates_published += 1;
                    } else {
                        report.publish_failures += 1;
                    }
                }
                Ok(AccountCapture::Duplicate) => report.duplicates_skipped += 1,
                Err(e) => {
                    warn!("Snapshot capture failed for account {}: {}", account_id, e);
                    report.record_failure(&account_id, &e);
                }
            }
        }

        let report = report.finish();
        info!(
            "Snapshot capture finished: {} accounts, {} appended, {} duplicates, {} failed",
            report.accounts_processed,
            report.snapshots_appended,
            report.duplicates_skipped,
            report.accounts_failed
        );
        let cursor = cursor.advance(&report);
        (report, cursor)
    }

    async fn capture_account(&self, account_id: &str, now: DateTime<Utc>) -> Result<AccountCapture> {
        let valuation = self.valuate(account_id).await?;
        let snapshot = Snapshot::new(account_id, now, valuation.value, valuation.buying_power);

        match self.repository.append(&snapshot).await? {
            AppendOutcome::Duplicate => {
                debug!(
                    "Snapshot for account {} at {} already exists, skipping",
                    account_id, now
                );
                Ok(AccountCapture::Duplicate)
            }
            AppendOutcome::Appended => {
                // The snapshot is durable at this point; a failed publish only
                // costs the real-time update.
                let published = match self.publisher.publish(SnapshotUpdate::from(&snapshot)).await
                {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Failed to publish snapshot update for {}: {}", account_id, e);
                        false
                    }
                };
                Ok(AccountCapture::Appended { published })
            }
        }
    }

    async fn valuate(&self, account_id: &str) -> Result<crate::snapshots::Valuation> {
        let timeout = self.options.valuation_timeout;
        match tokio::time::timeout(timeout, self.valuation_source.valuate(account_id)).await {
            Ok(Ok(valuation)) => Ok(valuation),
            Ok(Err(e @ Error::ValuationUnavailable { .. })) => Err(e),
            Ok(Err(e)) => Err(Error::valuation_unavailable(account_id, e.to_string())),
            Err(_) => Err(Error::valuation_unavailable(
                account_id,
                format!("timed out after {}ms", timeout.as_millis()),
            )),
        }
    }
}
