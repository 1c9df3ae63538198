//! Database model for job cursors.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use tidemark_core::errors::{Error, Result};
use tidemark_core::jobs::{ArchiveWatermark, JobCursor, JobRunStatus};

/// Row of `job_cursors`. `last_status` and `retry_accounts` hold JSON.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::job_cursors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobCursorDB {
    pub job_name: String,
    pub last_started_at: Option<i64>,
    pub last_finished_at: Option<i64>,
    pub last_status: Option<String>,
    pub runs: i64,
    pub retry_accounts: String,
    pub archived_through: Option<i64>,
    pub archive_bucket_minutes: Option<i32>,
    pub updated_at: i64,
}

impl JobCursorDB {
    pub fn from_domain(cursor: &JobCursor, updated_at: DateTime<Utc>) -> Result<Self> {
        let last_status = cursor
            .last_status
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        Ok(Self {
            job_name: cursor.job.as_str().to_string(),
            last_started_at: cursor.last_started_at.map(|ts| ts.timestamp_millis()),
            last_finished_at: cursor.last_finished_at.map(|ts| ts.timestamp_millis()),
            last_status,
            runs: i64::try_from(cursor.runs).unwrap_or(i64::MAX),
            retry_accounts: serde_json::to_string(&cursor.retry_accounts)?,
            archived_through: cursor
                .archived_through
                .map(|w| w.through.timestamp_millis()),
            archive_bucket_minutes: cursor
                .archived_through
                .and_then(|w| i32::try_from(w.bucket_minutes).ok()),
            updated_at: updated_at.timestamp_millis(),
        })
    }
}

impl TryFrom<JobCursorDB> for JobCursor {
    type Error = Error;

    fn try_from(db: JobCursorDB) -> Result<Self> {
        let last_status = db
            .last_status
            .as_deref()
            .map(serde_json::from_str::<JobRunStatus>)
            .transpose()?;
        // A half-written watermark is dropped; the next run rescans in full.
        let archived_through = match (db.archived_through, db.archive_bucket_minutes) {
            (Some(ms), Some(minutes)) => DateTime::from_timestamp_millis(ms)
                .zip(u32::try_from(minutes).ok())
                .map(|(through, bucket_minutes)| ArchiveWatermark {
                    through,
                    bucket_minutes,
                }),
            _ => None,
        };
        Ok(JobCursor {
            job: db.job_name.parse()?,
            last_started_at: db.last_started_at.and_then(DateTime::from_timestamp_millis),
            last_finished_at: db.last_finished_at.and_then(DateTime::from_timestamp_millis),
            last_status,
            runs: u64::try_from(db.runs).unwrap_or_default(),
            retry_accounts: serde_json::from_str(&db.retry_accounts)?,
            archived_through,
        })
    }
}
