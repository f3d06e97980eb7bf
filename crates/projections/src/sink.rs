//! Destinations for events emitted by projections.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use event_store::{EventId, EventStore, EventStoreExt, NewEvent};
use tokio::sync::Mutex;

use crate::Result;

/// Metadata key naming the event that caused an emitted event.
pub const CAUSED_BY: &str = "$causedBy";
/// Metadata key naming the projection that emitted an event.
pub const EMITTED_BY: &str = "$projection";

/// An event a projection wants written to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub event_id: EventId,
    pub stream_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EmittedEvent {
    pub fn new(
        stream_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            stream_id: stream_id.into(),
            event_type: event_type.into(),
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Links this event to its cause and gives it an ID derived from it.
    ///
    /// Re-emitting for the same cause from the same projection yields the
    /// same ID.
    pub fn caused_by(mut self, cause: EventId, projection: &str) -> Self {
        self.event_id = cause.derive(projection);
        self.metadata
            .insert(CAUSED_BY.to_string(), serde_json::json!(cause.to_string()));
        self.metadata
            .insert(EMITTED_BY.to_string(), serde_json::json!(projection));
        self
    }

    fn into_new_event(self) -> NewEvent {
        let mut event = NewEvent::new(self.event_type, self.payload).with_id(self.event_id);
        event.metadata = self.metadata;
        event
    }
}

/// Receives events emitted by projections, in processing order.
#[async_trait]
pub trait EmissionSink: Send + Sync {
    async fn emit(&self, event: EmittedEvent) -> Result<()>;
}

/// Keeps emitted events in memory.
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<EmittedEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything emitted so far.
    pub async fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().await.clone()
    }

    /// Takes everything emitted so far, leaving the sink empty.
    pub async fn drain(&self) -> Vec<EmittedEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }
}

#[async_trait]
impl EmissionSink for CollectingSink {
    async fn emit(&self, event: EmittedEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Appends emitted events to an event store.
///
/// An event whose ID is already in the target stream is not written again,
/// so replaying a projection over the log leaves its output streams as they were.
pub struct EventStoreSink<S: EventStore> {
    store: S,
}

impl<S: EventStore> EventStoreSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: EventStore> EmissionSink for EventStoreSink<S> {
    async fn emit(&self, event: EmittedEvent) -> Result<()> {
        if self
            .store
            .contains_event(&event.stream_id, event.event_id)
            .await?
        {
            tracing::trace!(
                stream_id = %event.stream_id,
                event_id = %event.event_id,
                "event already emitted"
            );
            return Ok(());
        }

        let stream_id = event.stream_id.clone();
        self.store
            .append_event(&stream_id, event.into_new_event())
            .await?;
        Ok(())
    }
}
