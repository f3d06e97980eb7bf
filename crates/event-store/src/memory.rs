use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::store::{AppendOptions, EventStore, EventStream, validate_append};
use crate::stream::category_of;
use crate::{EventStoreError, NewEvent, Position, RecordedEvent, Result};

#[derive(Default)]
struct Log {
    events: Vec<RecordedEvent>,
    stream_lengths: HashMap<String, u64>,
}

/// In-memory event log.
///
/// Keeps every event in a single vector in append order, so the index of an
/// event in the vector is its global position.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.events.clear();
        log.stream_lengths.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        stream_id: &str,
        events: Vec<NewEvent>,
        options: AppendOptions,
    ) -> Result<Vec<RecordedEvent>> {
        validate_append(stream_id, &events)?;

        let mut log = self.log.write().await;
        let current_length = log.stream_lengths.get(stream_id).copied().unwrap_or(0);

        if let Some(expected) = options.expected_length
            && expected != current_length
        {
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id: stream_id.to_string(),
                expected,
                actual: current_length,
            });
        }

        let recorded_at = Utc::now();
        let mut next_position = log.events.len() as u64;
        let mut recorded = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            recorded.push(RecordedEvent {
                event_id: event.event_id,
                position: Position::new(next_position),
                stream_id: stream_id.to_string(),
                stream_revision: current_length + offset as u64,
                event_type: event.event_type,
                payload: event.payload,
                recorded_at,
                metadata: event.metadata,
            });
            next_position += 1;
        }

        log.stream_lengths
            .insert(stream_id.to_string(), current_length + recorded.len() as u64);
        log.events.extend(recorded.iter().cloned());

        tracing::trace!(stream_id, count = recorded.len(), "appended events");
        metrics::counter!("event_store_events_appended").increment(recorded.len() as u64);

        Ok(recorded)
    }

    async fn read_stream(&self, stream_id: &str) -> Result<Vec<RecordedEvent>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.stream_id == stream_id)
            .cloned()
            .collect())
    }

    async fn read_category(&self, category: &str) -> Result<Vec<RecordedEvent>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| category_of(&e.stream_id) == category)
            .cloned()
            .collect())
    }

    async fn read_all_from(&self, from: Position, limit: usize) -> Result<Vec<RecordedEvent>> {
        let log = self.log.read().await;
        let start = usize::try_from(from.as_u64()).unwrap_or(usize::MAX);
        Ok(log.events.iter().skip(start).take(limit).cloned().collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.log.read().await.events.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn last_position(&self) -> Result<Option<Position>> {
        let log = self.log.read().await;
        Ok(log.events.last().map(|e| e.position))
    }
}
