use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use tidemark_core::errors::{Error, Result};
use tidemark_core::events::{SnapshotUpdate, SnapshotUpdatePublisher};

/// Event emitted after every captured snapshot.
pub const SNAPSHOT_UPDATE: &str = "snapshot:update";

/// Serializable envelope that carries event names and optional payloads.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub name: &'static str,
    pub payload: Option<Value>,
}

impl ServerEvent {
    pub fn with_payload(name: &'static str, payload: Value) -> Self {
        Self {
            name,
            payload: Some(payload),
        }
    }
}

/// Lightweight broadcast bus that fans out events to any connected clients.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Returns how many listeners received the event.
    pub fn publish(&self, event: ServerEvent) -> usize {
        // No listeners is fine; lagging listeners drop old events.
        self.sender.send(event).unwrap_or(0)
    }
}

/// Delivers snapshot updates on the event bus, tagged with the account's
/// private channel.
#[derive(Clone)]
pub struct EventBusPublisher {
    bus: EventBus,
}

impl EventBusPublisher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl SnapshotUpdatePublisher for EventBusPublisher {
    async fn publish(&self, update: SnapshotUpdate) -> Result<()> {
        let channel = update.channel();
        let body = serde_json::to_value(&update).map_err(|e| Error::Publish(e.to_string()))?;
        let delivered = self.bus.publish(ServerEvent::with_payload(
            SNAPSHOT_UPDATE,
            json!({ "channel": channel, "update": body }),
        ));
        tracing::trace!("Snapshot update on {} reached {} listeners", channel, delivered);
        Ok(())
    }
}
