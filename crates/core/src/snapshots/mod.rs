//! Snapshots module - the append-only valuation history per account.

mod snapshots_memory;
mod snapshots_model;
mod snapshots_traits;

pub use snapshots_memory::InMemorySnapshotRepository;
pub use snapshots_model::*;
pub use snapshots_traits::SnapshotRepositoryTrait;

#[cfg(test)]
mod snapshots_model_tests;
