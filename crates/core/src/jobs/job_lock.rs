//! Run-scoped mutual exclusion keyed by job name.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::JobName;

/// Process-wide registry of jobs currently running.
///
/// Capture and compaction use different keys, so they never block each other;
/// a second run of the same job fails to acquire and is skipped.
#[derive(Clone, Default)]
pub struct JobLockRegistry {
    held: Arc<Mutex<HashSet<JobName>>>,
}

impl JobLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<JobName>> {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims `job`, or returns `None` if a run already holds it.
    pub fn try_acquire(&self, job: JobName) -> Option<JobLockGuard> {
        if !self.lock().insert(job) {
            return None;
        }
        Some(JobLockGuard {
            registry: self.clone(),
            job,
        })
    }

    pub fn is_held(&self, job: JobName) -> bool {
        self.lock().contains(&job)
    }
}

/// Releases the job on drop, whatever path the run exits through.
pub struct JobLockGuard {
    registry: JobLockRegistry,
    job: JobName,
}

impl JobLockGuard {
    pub fn job(&self) -> JobName {
        self.job
    }
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.job);
    }
}
