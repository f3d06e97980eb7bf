use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{EventId, EventStoreError, NewEvent, Position, RecordedEvent, Result};

/// Options for appending events to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected number of events already in the stream, for optimistic
    /// concurrency control. If None, no check is performed.
    pub expected_length: Option<u64>,
}

impl AppendOptions {
    /// Creates options with no length check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stream to hold exactly `length` events.
    pub fn expect_length(length: u64) -> Self {
        Self {
            expected_length: Some(length),
        }
    }

    /// Creates options expecting the stream to not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_length: Some(0),
        }
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RecordedEvent>> + Send>>;

/// Core trait for event log implementations.
///
/// The log is a single append-only sequence partitioned into named streams.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to the end of a stream.
    ///
    /// Events are appended atomically - either all succeed or none do.
    /// Returns the recorded events with their assigned positions.
    async fn append(
        &self,
        stream_id: &str,
        events: Vec<NewEvent>,
        options: AppendOptions,
    ) -> Result<Vec<RecordedEvent>>;

    /// Retrieves all events of one stream in revision order.
    async fn read_stream(&self, stream_id: &str) -> Result<Vec<RecordedEvent>>;

    /// Retrieves the events of every stream in a category, in log order.
    async fn read_category(&self, category: &str) -> Result<Vec<RecordedEvent>>;

    /// Retrieves up to `limit` events starting at `from`, in log order.
    async fn read_all_from(&self, from: Position, limit: usize) -> Result<Vec<RecordedEvent>>;

    /// Streams all events in the log, in log order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Returns the position of the last appended event, if any.
    async fn last_position(&self) -> Result<Option<Position>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event without a concurrency check.
    async fn append_event(&self, stream_id: &str, event: NewEvent) -> Result<RecordedEvent> {
        let mut recorded = self
            .append(stream_id, vec![event], AppendOptions::new())
            .await?;
        recorded
            .pop()
            .ok_or_else(|| EventStoreError::EmptyAppend(stream_id.to_string()))
    }

    /// Checks if a stream already holds an event with the given ID.
    async fn contains_event(&self, stream_id: &str, event_id: EventId) -> Result<bool> {
        Ok(self
            .read_stream(stream_id)
            .await?
            .iter()
            .any(|e| e.event_id == event_id))
    }

    /// Checks if a stream has any events.
    async fn stream_exists(&self, stream_id: &str) -> Result<bool> {
        Ok(!self.read_stream(stream_id).await?.is_empty())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a stream name and batch before appending.
pub fn validate_append(stream_id: &str, events: &[NewEvent]) -> Result<()> {
    if stream_id.is_empty() || crate::stream::parse_category_stream(stream_id).is_some() {
        return Err(EventStoreError::InvalidStream(stream_id.to_string()));
    }
    if events.is_empty() {
        return Err(EventStoreError::EmptyAppend(stream_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_batch() {
        let result = validate_append("Merchant-1", &[]);
        assert!(matches!(result, Err(EventStoreError::EmptyAppend(_))));
    }

    #[test]
    fn validate_rejects_category_streams() {
        let events = vec![NewEvent::new("Test", serde_json::json!({}))];
        let result = validate_append("$ce-Merchant", &events);
        assert!(matches!(result, Err(EventStoreError::InvalidStream(_))));

        let result = validate_append("", &events);
        assert!(matches!(result, Err(EventStoreError::InvalidStream(_))));
    }

    #[test]
    fn validate_accepts_entity_stream() {
        let events = vec![NewEvent::new("Test", serde_json::json!({}))];
        assert!(validate_append("Merchant-1", &events).is_ok());
    }

    #[test]
    fn append_options_constructors() {
        assert_eq!(AppendOptions::new().expected_length, None);
        assert_eq!(AppendOptions::expect_new().expected_length, Some(0));
        assert_eq!(AppendOptions::expect_length(3).expected_length, Some(3));
    }
}
