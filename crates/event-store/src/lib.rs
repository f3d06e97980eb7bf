//! Append-only event log with named streams and category reads.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;
pub mod stream;

pub use error::{EventStoreError, Result};
pub use event::{EventId, NewEvent, Position, RecordedEvent};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
