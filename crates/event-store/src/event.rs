use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Derives a deterministic ID for an event caused by this one.
    ///
    /// The same cause and namespace always yield the same ID, which lets
    /// writers recognise an event they already emitted when a log is replayed.
    pub fn derive(&self, namespace: &str) -> Self {
        Self(Uuid::new_v5(&self.0, namespace.as_bytes()))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Global position of an event in the log.
///
/// Positions start at 0 and increase by 1 for every appended event,
/// regardless of stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    /// Creates a position from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The position of the first event in the log.
    pub fn start() -> Self {
        Self(0)
    }

    /// Returns the following position.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw position value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event as stored in the log, with the metadata assigned on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Global position in the log.
    pub position: Position,

    /// The stream the event was written to (e.g. "MerchantArchive-6be48c04...").
    pub stream_id: String,

    /// Zero-based revision of the event within its stream.
    pub stream_revision: u64,

    /// The type name of the event (e.g. "ManualDepositMadeEvent").
    pub event_type: String,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// When the event was appended.
    pub recorded_at: DateTime<Utc>,

    /// Additional metadata about the event.
    pub metadata: HashMap<String, serde_json::Value>,
}

/// An event waiting to be appended to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_id: EventId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NewEvent {
    /// Creates a new event with a fresh ID and no metadata.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Creates a new event from a serializable payload.
    pub fn from_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    /// Overrides the generated event ID.
    pub fn with_id(mut self, id: EventId) -> Self {
        self.event_id = id;
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
