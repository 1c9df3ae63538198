//! Repository traits for job cursors.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{JobCursor, JobName};
use crate::errors::Result;

/// Persistence for per-job cursors.
#[async_trait]
pub trait JobCursorRepositoryTrait: Send + Sync {
    /// Cursor stored by the last run of `job`, if any.
    fn load_cursor(&self, job: JobName) -> Result<Option<JobCursor>>;

    /// Insert or replace the cursor of `cursor.job`.
    async fn save_cursor(&self, cursor: &JobCursor) -> Result<()>;
}

/// In-memory cursor store for tests and embedding.
#[derive(Clone, Default)]
pub struct InMemoryJobCursorRepository {
    cursors: Arc<Mutex<HashMap<JobName, JobCursor>>>,
}

impl InMemoryJobCursorRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobCursorRepositoryTrait for InMemoryJobCursorRepository {
    fn load_cursor(&self, job: JobName) -> Result<Option<JobCursor>> {
        Ok(self
            .cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&job)
            .cloned())
    }

    async fn save_cursor(&self, cursor: &JobCursor) -> Result<()> {
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(cursor.job, cursor.clone());
        Ok(())
    }
}
