//! Tidemark Core - portfolio snapshot capture and retention compaction.
//!
//! This crate contains the domain model and the two background jobs that
//! maintain the per-account valuation history. It is database-agnostic and
//! defines traits that are implemented by the `storage-sqlite` crate.

pub mod capture;
pub mod compaction;
pub mod constants;
pub mod errors;
pub mod events;
pub mod jobs;
pub mod retention;
pub mod snapshots;

// Re-export the snapshot model, it is used by every other module
pub use snapshots::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
