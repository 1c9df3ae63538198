use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use super::model::JobCursorDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::job_cursors::dsl as jc;
use tidemark_core::errors::Result;
use tidemark_core::jobs::{JobCursor, JobCursorRepositoryTrait, JobName};

/// SQLite-backed store for per-job cursors.
pub struct JobCursorRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl JobCursorRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl JobCursorRepositoryTrait for JobCursorRepository {
    fn load_cursor(&self, job: JobName) -> Result<Option<JobCursor>> {
        let mut conn = get_connection(&self.pool)?;
        jc::job_cursors
            .filter(jc::job_name.eq(job.as_str()))
            .select(JobCursorDB::as_select())
            .first::<JobCursorDB>(&mut conn)
            .optional()
            .into_core()?
            .map(JobCursor::try_from)
            .transpose()
    }

    async fn save_cursor(&self, cursor: &JobCursor) -> Result<()> {
        let row = JobCursorDB::from_domain(cursor, Utc::now())?;
        self.writer
            .exec(move |conn| {
                diesel::replace_into(jc::job_cursors)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
