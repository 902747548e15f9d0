//! Append-only event storage.
//!
//! The store lives for the lifetime of the process; nothing is persisted.
//! It keeps insertion order and never filters: callers that want a subset
//! filter the snapshot returned by [`EventStore::list_all`].

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::Event;

#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Append one event. Each append is atomic with respect to concurrent appends.
    async fn append(&self, event: Event);

    /// Owned snapshot of every stored event, in insertion order.
    async fn list_all(&self) -> Vec<Event>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: Event) {
        let mut events = self.events.write().await;
        events.push(event);
        tracing::debug!("Event store now holds {} events", events.len());
    }

    async fn list_all(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }
}
