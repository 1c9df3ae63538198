use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{max, min};
use diesel::prelude::*;
use log::debug;
use std::sync::Arc;

use super::model::SnapshotDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::portfolio_snapshots::dsl as ps;
use crate::utils::chunk_for_sqlite;
use tidemark_core::errors::{Error, Result};
use tidemark_core::snapshots::{AppendOutcome, Snapshot, SnapshotRepositoryTrait};

/// SQLite-backed snapshot log.
///
/// Reads go straight to the pool. Appends and deletes go through the shared
/// writer actor, each in its own immediate transaction.
pub struct SnapshotRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SnapshotRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn load_rows(rows: Vec<SnapshotDB>) -> Result<Vec<Snapshot>> {
        rows.into_iter().map(Snapshot::try_from).collect()
    }
}

#[async_trait]
impl SnapshotRepositoryTrait for SnapshotRepository {
    async fn append(&self, snapshot: &Snapshot) -> Result<AppendOutcome> {
        let row = SnapshotDB::from(snapshot);

        self.writer
            .exec(move |conn| {
                let existing: i64 = ps::portfolio_snapshots
                    .filter(ps::account_id.eq(&row.account_id))
                    .filter(ps::captured_at.eq(row.captured_at))
                    .count()
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                if existing > 0 {
                    return Ok(AppendOutcome::Duplicate);
                }

                let latest: Option<i64> = ps::portfolio_snapshots
                    .filter(ps::account_id.eq(&row.account_id))
                    .select(max(ps::captured_at))
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                if let Some(latest) = latest {
                    if row.captured_at < latest {
                        return Err(Error::ConstraintViolation(format!(
                            "snapshot for account {} at {}ms is older than the latest one at {}ms",
                            row.account_id, row.captured_at, latest
                        )));
                    }
                }

                let inserted = diesel::insert_or_ignore_into(ps::portfolio_snapshots)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(if inserted == 0 {
                    AppendOutcome::Duplicate
                } else {
                    AppendOutcome::Appended
                })
            })
            .await
    }

    async fn delete(&self, account_id: &str, captured_at: &[DateTime<Utc>]) -> Result<usize> {
        if captured_at.is_empty() {
            return Ok(0);
        }
        let target_account = account_id.to_string();
        let keys: Vec<i64> = captured_at.iter().map(|ts| ts.timestamp_millis()).collect();

        let deleted = self
            .writer
            .exec(move |conn| {
                let mut deleted = 0usize;
                for chunk in chunk_for_sqlite(&keys) {
                    deleted += diesel::delete(
                        ps::portfolio_snapshots
                            .filter(ps::account_id.eq(&target_account))
                            .filter(ps::captured_at.eq_any(chunk.to_vec())),
                    )
                    .execute(conn)
                    .map_err(StorageError::from)?;
                }
                Ok(deleted)
            })
            .await?;

        debug!("Deleted {} snapshots of account {}", deleted, account_id);
        Ok(deleted)
    }

    fn query_range(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = ps::portfolio_snapshots
            .filter(ps::account_id.eq(account_id))
            .filter(ps::captured_at.ge(from.timestamp_millis()))
            .filter(ps::captured_at.lt(to.timestamp_millis()))
            .order(ps::captured_at.asc())
            .select(SnapshotDB::as_select())
            .load::<SnapshotDB>(&mut conn)
            .into_core()?;
        Self::load_rows(rows)
    }

    fn latest(&self, account_id: &str) -> Result<Option<Snapshot>> {
        let mut conn = get_connection(&self.pool)?;
        ps::portfolio_snapshots
            .filter(ps::account_id.eq(account_id))
            .order(ps::captured_at.desc())
            .select(SnapshotDB::as_select())
            .first::<SnapshotDB>(&mut conn)
            .optional()
            .into_core()?
            .map(Snapshot::try_from)
            .transpose()
    }

    fn earliest_captured_at(&self, account_id: &str) -> Result<Option<DateTime<Utc>>> {
        let mut conn = get_connection(&self.pool)?;
        let earliest: Option<i64> = ps::portfolio_snapshots
            .filter(ps::account_id.eq(account_id))
            .select(min(ps::captured_at))
            .get_result(&mut conn)
            .into_core()?;
        Ok(earliest.and_then(DateTime::from_timestamp_millis))
    }

    fn accounts_with_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let accounts = ps::portfolio_snapshots
            .filter(ps::captured_at.lt(cutoff.timestamp_millis()))
            .select(ps::account_id)
            .distinct()
            .order(ps::account_id.asc())
            .load::<String>(&mut conn)
            .into_core()?;
        Ok(accounts)
    }

    fn count(&self, account_id: &str) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let total: i64 = ps::portfolio_snapshots
            .filter(ps::account_id.eq(account_id))
            .count()
            .get_result(&mut conn)
            .into_core()?;
        Ok(usize::try_from(total).unwrap_or_default())
    }
}
