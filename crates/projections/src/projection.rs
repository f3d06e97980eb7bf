//! Core projection trait, position tracking, and event source selection.

use async_trait::async_trait;
use event_store::stream::{category_of, category_stream, parse_category_stream};
use event_store::{Position, RecordedEvent};

use crate::Result;

/// Tracks how far a projection has read the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Number of events delivered to this projection.
    pub events_processed: u64,
    /// The next log position this projection has not seen.
    pub checkpoint: Position,
}

impl ProjectionPosition {
    /// Creates a new position at the start of the log.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Advances the position past `position`.
    ///
    /// The checkpoint never moves backwards, so concurrent delivery of
    /// events from different shards cannot rewind it.
    pub fn advance(&self, position: Position) -> Self {
        Self {
            events_processed: self.events_processed + 1,
            checkpoint: self.checkpoint.max(position.next()),
        }
    }

    /// Returns true if the event at `position` has not been delivered yet.
    pub fn is_behind(&self, position: Position) -> bool {
        self.checkpoint <= position
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position({}, checkpoint {})",
            self.events_processed, self.checkpoint
        )
    }
}

/// Which streams a projection consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// Every stream in the log.
    All,
    /// A single stream.
    Stream(String),
    /// Every stream of one category, i.e. the `$ce-<category>` stream.
    Category(String),
    /// Every stream of any of several categories.
    Categories(Vec<String>),
}

impl EventSource {
    /// Parses a subscription name: `$all`, `$ce-<category>`, or a plain stream id.
    pub fn parse(name: &str) -> Self {
        if name == "$all" {
            EventSource::All
        } else if let Some(category) = parse_category_stream(name) {
            EventSource::Category(category.to_string())
        } else {
            EventSource::Stream(name.to_string())
        }
    }

    /// Builds a source over several categories.
    pub fn categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventSource::Categories(categories.into_iter().map(Into::into).collect())
    }

    /// Returns true if events written to `stream_id` belong to this source.
    pub fn matches(&self, stream_id: &str) -> bool {
        match self {
            EventSource::All => true,
            EventSource::Stream(s) => s == stream_id,
            EventSource::Category(c) => category_of(stream_id) == c,
            EventSource::Categories(cs) => {
                let category = category_of(stream_id);
                cs.iter().any(|c| c == category)
            }
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::All => f.write_str("$all"),
            EventSource::Stream(s) => f.write_str(s),
            EventSource::Category(c) => f.write_str(&category_stream(c)),
            EventSource::Categories(cs) => {
                let names: Vec<String> = cs.iter().map(|c| category_stream(c)).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

/// A projection that processes events and updates a read model.
///
/// Every event in the log is offered to every projection; a projection
/// ignores events outside its [`EventSource`] but still advances past them.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Returns the streams this projection consumes.
    fn source(&self) -> EventSource {
        EventSource::All
    }

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &RecordedEvent) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
