//! Jobs module - run reports, per-job cursors, no-overlap locks, and the
//! runner that ties them around the capture and compaction services.

mod job_lock;
mod job_model;
mod job_runner;
mod job_traits;

pub use job_lock::{JobLockGuard, JobLockRegistry};
pub use job_model::*;
pub use job_runner::SnapshotJobRunner;
pub use job_traits::{InMemoryJobCursorRepository, JobCursorRepositoryTrait};
