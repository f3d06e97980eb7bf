use thiserror::Error;

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// An append carried no events.
    #[error("Cannot append an empty batch to stream {0}")]
    EmptyAppend(String),

    /// The stream name is not writable (empty, or a `$ce-` category stream).
    #[error("Invalid stream name: {0:?}")]
    InvalidStream(String),

    /// A concurrency conflict occurred when appending events.
    #[error("Concurrency conflict on stream {stream_id}: expected revision {expected}, found {actual}")]
    ConcurrencyConflict {
        stream_id: String,
        expected: u64,
        actual: u64,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
