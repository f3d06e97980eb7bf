//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to serialize or deserialize an event payload.
    #[error("Event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A dispatcher shard stopped accepting events.
    #[error("Shard {0} is closed")]
    ShardClosed(usize),

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
