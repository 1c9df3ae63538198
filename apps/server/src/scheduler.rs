//! Background schedulers for snapshot capture and compaction.
//!
//! Each tick spawns the run instead of awaiting it, so a run that outlasts
//! its interval makes the next tick skip on the job lock rather than queue.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};

use tidemark_core::jobs::{JobName, JobRunOutcome, JobRunStatus};

use crate::main_lib::AppState;

/// Starts the capture scheduler. The first run happens immediately.
pub fn start_capture_scheduler(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    start_scheduler(state, JobName::Capture, Instant::now(), period)
}

/// Starts the compaction scheduler. The first run happens one period after start.
pub fn start_compaction_scheduler(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    start_scheduler(state, JobName::Compaction, Instant::now() + period, period)
}

fn start_scheduler(
    state: Arc<AppState>,
    job: JobName,
    first_tick: Instant,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("{} scheduler started ({}s interval)", job, period.as_secs());

        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let state = state.clone();
            tokio::spawn(async move {
                let outcome = state.runner.run(job, Utc::now()).await;
                log_outcome(&outcome);
            });
        }
    })
}

fn log_outcome(outcome: &JobRunOutcome) {
    match outcome {
        JobRunOutcome::Skipped { job } => {
            debug!("Scheduled {} run skipped: previous run still in progress", job)
        }
        JobRunOutcome::Finished(report) => match &report.status {
            JobRunStatus::Completed => debug!(
                "Scheduled {} run finished in {}ms",
                report.job,
                (report.finished_at - report.started_at).num_milliseconds()
            ),
            JobRunStatus::Aborted { reason } => {
                tracing::warn!("Scheduled {} run aborted: {}", report.job, reason)
            }
        },
    }
}
