//! SQLite storage implementation for Tidemark.
//!
//! This crate provides all database-related functionality using Diesel ORM
//! with SQLite. It implements the repository traits defined in
//! `tidemark-core`:
//! - Database connection pooling and the single writer actor
//! - Diesel migrations
//! - The snapshot log and the job cursor store
//!
//! ```text
//! core (capture, compaction, jobs)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod jobs;
pub mod snapshots;

pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};
pub use errors::{IntoCore, StorageError};
pub use jobs::JobCursorRepository;
pub use snapshots::SnapshotRepository;

pub use tidemark_core::errors::{DatabaseError, Error, Result};
