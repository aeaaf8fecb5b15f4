//! Lifecycle events raised by the model lifecycle manager
//!
//! The core only promises to call `EventDispatcher::dispatch` at the
//! documented points; what subscribers do with the event is outside it.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::attributes::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelEventKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for ModelEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelEventKind::Created => write!(f, "created"),
            ModelEventKind::Updated => write!(f, "updated"),
            ModelEventKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// `<entity>:<kind>` plus the row snapshot it concerns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEvent {
    pub name: String,
    pub kind: ModelEventKind,
    pub entity: String,
    pub payload: Value,
}

impl ModelEvent {
    pub fn new(entity: &str, kind: ModelEventKind, snapshot: Record) -> Self {
        Self {
            name: format!("{}:{}", entity, kind),
            kind,
            entity: entity.to_string(),
            payload: Value::Object(snapshot),
        }
    }

    pub fn created(entity: &str, snapshot: Record) -> Self {
        Self::new(entity, ModelEventKind::Created, snapshot)
    }

    pub fn updated(entity: &str, snapshot: Record) -> Self {
        Self::new(entity, ModelEventKind::Updated, snapshot)
    }

    pub fn deleted(entity: &str, snapshot: Record) -> Self {
        Self::new(entity, ModelEventKind::Deleted, snapshot)
    }
}

/// Outward event surface.
///
/// Dispatch cannot fail: by the time an event is raised the write has
/// already reached the adapter.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: ModelEvent);
}

/// Drops every event after a trace line
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatcher;

#[async_trait]
impl EventDispatcher for NullDispatcher {
    async fn dispatch(&self, event: ModelEvent) {
        tracing::trace!("Dropping model event '{}'", event.name);
    }
}

/// Fans events out to every live subscriber
#[derive(Debug, Clone)]
pub struct BroadcastDispatcher {
    sender: broadcast::Sender<ModelEvent>,
}

impl BroadcastDispatcher {
    /// `capacity` bounds how far a slow subscriber may lag before it starts
    /// missing events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventDispatcher for BroadcastDispatcher {
    async fn dispatch(&self, event: ModelEvent) {
        let name = event.name.clone();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!("Dispatched '{}' to {} subscriber(s)", name, receivers),
            Err(_) => tracing::trace!("No subscribers for '{}'", name),
        }
    }
}
