//! Update publisher trait and implementations.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::SnapshotUpdate;
use crate::errors::{Error, Result};

/// Sink for snapshot updates.
///
/// Publishing is best-effort: capture logs a failed publish and keeps the
/// snapshot it already wrote.
#[async_trait]
pub trait SnapshotUpdatePublisher: Send + Sync {
    async fn publish(&self, update: SnapshotUpdate) -> Result<()>;
}

/// No-op implementation for contexts that don't deliver updates.
#[derive(Clone, Default)]
pub struct NoOpSnapshotPublisher;

#[async_trait]
impl SnapshotUpdatePublisher for NoOpSnapshotPublisher {
    async fn publish(&self, _update: SnapshotUpdate) -> Result<()> {
        Ok(())
    }
}

/// Mock publisher for testing - collects updates and can be told to fail.
#[derive(Clone, Default)]
pub struct MockSnapshotPublisher {
    updates: Arc<Mutex<Vec<SnapshotUpdate>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockSnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every call fails.
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.set_failing(true);
        publisher
    }

    pub fn set_failing(&self, failing: bool) {
        *self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = failing;
    }

    /// Returns all collected updates.
    pub fn updates(&self) -> Vec<SnapshotUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.updates().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotUpdatePublisher for MockSnapshotPublisher {
    async fn publish(&self, update: SnapshotUpdate) -> Result<()> {
        let failing = *self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing {
            return Err(Error::Publish(format!(
                "channel {} rejected the update",
                update.channel()
            )));
        }
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(update);
        Ok(())
    }
}
