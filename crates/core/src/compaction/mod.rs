//! Compaction module - collapses aged snapshots to one per bucket.

mod compaction_planner;
mod compaction_service;

pub use compaction_planner::{plan_compaction, CompactionPlan};
pub use compaction_service::{AccountCompaction, CompactionOptions, CompactionService};

#[cfg(test)]
mod compaction_service_tests;
