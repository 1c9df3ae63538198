use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;

use super::{JobCursor, JobCursorRepositoryTrait, JobLockRegistry, JobName, JobRunOutcome};
use crate::capture::CaptureService;
use crate::compaction::CompactionService;
use crate::errors::Result;

/// Entry point for "run capture now" and "run compaction now".
///
/// Safe to invoke redundantly: a run that cannot take its job's lock returns
/// `Skipped` without touching the store.
#[derive(Clone)]
pub struct SnapshotJobRunner {
    capture: Arc<CaptureService>,
    compaction: Arc<CompactionService>,
    cursors: Arc<dyn JobCursorRepositoryTrait>,
    locks: JobLockRegistry,
}

impl SnapshotJobRunner {
    pub fn new(
        capture: Arc<CaptureService>,
        compaction: Arc<CompactionService>,
        cursors: Arc<dyn JobCursorRepositoryTrait>,
        locks: JobLockRegistry,
    ) -> Self {
        Self {
            capture,
            compaction,
            cursors,
            locks,
        }
    }

    pub fn locks(&self) -> &JobLockRegistry {
        &self.locks
    }

    pub async fn run_capture(&self, now: DateTime<Utc>) -> JobRunOutcome {
        self.run(JobName::Capture, now).await
    }

    pub async fn run_compaction(&self, now: DateTime<Utc>) -> JobRunOutcome {
        self.run(JobName::Compaction, now).await
    }

    pub async fn run(&self, job: JobName, now: DateTime<Utc>) -> JobRunOutcome {
        let Some(_guard) = self.locks.try_acquire(job) else {
            info!("Skipping {} run: previous run still in progress", job);
            return JobRunOutcome::Skipped { job };
        };

        let cursor = self.load_cursor_or_default(job);
        let (report, cursor) = match job {
            JobName::Capture => self.capture.run(now, cursor).await,
            JobName::Compaction => self.compaction.run(now, cursor).await,
        };

        if let Err(e) = self.cursors.save_cursor(&cursor).await {
            warn!("Failed to persist {} cursor: {}", job, e);
        }
        JobRunOutcome::Finished(report)
    }

    /// Persisted cursor of `job`, or a fresh one if none was stored yet.
    pub fn cursor(&self, job: JobName) -> Result<JobCursor> {
        Ok(self
            .cursors
            .load_cursor(job)?
            .unwrap_or_else(|| JobCursor::new(job)))
    }

    fn load_cursor_or_default(&self, job: JobName) -> JobCursor {
        match self.cursor(job) {
            Ok(cursor) => cursor,
            Err(e) => {
                // A missing cursor only loses retry ordering.
                warn!("Failed to load {} cursor, starting fresh: {}", job, e);
                JobCursor::new(job)
            }
        }
    }
}
