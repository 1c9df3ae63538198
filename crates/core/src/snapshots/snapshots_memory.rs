//! In-memory snapshot store.
//!
//! Used by tests and by embedders that do not need durability. A single mutex
//! guards the whole map, which trivially serializes writes per account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{AppendOutcome, Snapshot, SnapshotRepositoryTrait};
use crate::errors::{Error, Result};

#[derive(Default)]
struct MemoryState {
    series: HashMap<String, BTreeMap<i64, Snapshot>>,
    failing_accounts: HashSet<String>,
    mutations: usize,
}

/// Snapshot store backed by a `BTreeMap` per account.
#[derive(Clone, Default)]
pub struct InMemorySnapshotRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts snapshots directly, bypassing the append ordering rule.
    /// Does not count as a mutation.
    pub fn seed(&self, snapshots: impl IntoIterator<Item = Snapshot>) {
        let mut state = self.lock();
        for snapshot in snapshots {
            state
                .series
                .entry(snapshot.account_id.clone())
                .or_default()
                .insert(snapshot.captured_at_ms(), snapshot);
        }
    }

    /// Makes every operation on `account_id` fail with `StoreUnavailable`.
    pub fn fail_account(&self, account_id: &str) {
        self.lock().failing_accounts.insert(account_id.to_string());
    }

    pub fn restore_account(&self, account_id: &str) {
        self.lock().failing_accounts.remove(account_id);
    }

    /// Number of successful writes (appends and deletes that changed data).
    pub fn mutation_count(&self) -> usize {
        self.lock().mutations
    }

    /// Every snapshot of an account, ascending.
    pub fn all(&self, account_id: &str) -> Vec<Snapshot> {
        self.lock()
            .series
            .get(account_id)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(state: &MemoryState, account_id: &str) -> Result<()> {
        if state.failing_accounts.contains(account_id) {
            return Err(Error::StoreUnavailable(format!(
                "account {} is not reachable",
                account_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotRepositoryTrait for InMemorySnapshotRepository {
    async fn append(&self, snapshot: &Snapshot) -> Result<AppendOutcome> {
        let mut state = self.lock();
        Self::check_available(&state, &snapshot.account_id)?;

        let key = snapshot.captured_at_ms();
        let series = state.series.entry(snapshot.account_id.clone()).or_default();
        if series.contains_key(&key) {
            return Ok(AppendOutcome::Duplicate);
        }
        if let Some((&latest, _)) = series.last_key_value() {
            if key < latest {
                return Err(Error::ConstraintViolation(format!(
                    "snapshot for account {} at {} is older than the latest one",
                    snapshot.account_id, snapshot.captured_at
                )));
            }
        }
        series.insert(key, snapshot.clone());
        state.mutations += 1;
        Ok(AppendOutcome::Appended)
    }

    async fn delete(&self, account_id: &str, captured_at: &[DateTime<Utc>]) -> Result<usize> {
        let mut state = self.lock();
        Self::check_available(&state, account_id)?;

        let removed = match state.series.get_mut(account_id) {
            Some(series) => captured_at
                .iter()
                .filter(|ts| series.remove(&ts.timestamp_millis()).is_some())
                .count(),
            None => 0,
        };
        if removed > 0 {
            state.mutations += 1;
        }
        Ok(removed)
    }

    fn query_range(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        let state = self.lock();
        Self::check_available(&state, account_id)?;

        let (from, to) = (from.timestamp_millis(), to.timestamp_millis());
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(state
            .series
            .get(account_id)
            .map(|s| s.range(from..to).map(|(_, v)| v.clone()).collect())
            .unwrap_or_default())
    }

    fn latest(&self, account_id: &str) -> Result<Option<Snapshot>> {
        let state = self.lock();
        Self::check_available(&state, account_id)?;
        Ok(state
            .series
            .get(account_id)
            .and_then(|s| s.last_key_value())
            .map(|(_, v)| v.clone()))
    }

    fn earliest_captured_at(&self, account_id: &str) -> Result<Option<DateTime<Utc>>> {
        let state = self.lock();
        Self::check_available(&state, account_id)?;
        Ok(state
            .series
            .get(account_id)
            .and_then(|s| s.first_key_value())
            .map(|(_, v)| v.captured_at))
    }

    fn accounts_with_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let state = self.lock();
        let cutoff = cutoff.timestamp_millis();
        let mut accounts: Vec<String> = state
            .series
            .iter()
            .filter(|(_, s)| s.keys().next().is_some_and(|&first| first < cutoff))
            .map(|(account_id, _)| account_id.clone())
            .collect();
        accounts.sort();
        Ok(accounts)
    }

    fn count(&self, account_id: &str) -> Result<usize> {
        let state = self.lock();
        Self::check_available(&state, account_id)?;
        Ok(state.series.get(account_id).map_or(0, BTreeMap::len))
    }
}
