//! Projection processor for feeding events to projections.

use event_store::{EventStore, Position, RecordedEvent};
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Number of events read from the log per batch during catch-up.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Reads the event log and delivers events to projections.
///
/// The processor supports:
/// - Catch-up: reads the log from the lowest checkpoint until no new events
///   remain, including events the projections emitted during the pass
/// - Single event delivery: delivers one event to every projection behind it
/// - Rebuild: resets all projections and replays from the start of the log
///
/// Catch-up passes are serialized so that an event is never delivered to a
/// projection twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    batch_size: usize,
    catch_up_lock: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            catch_up_lock: Mutex::new(()),
        }
    }

    /// Sets the number of events read per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        tracing::debug!(
            projection = projection.name(),
            source = %projection.source(),
            "projection registered"
        );
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Returns the event store this processor reads from.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs catch-up processing and returns the number of events read.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up_lock.lock().await;

        let mut from = self.lowest_checkpoint().await;
        let mut events_read: u64 = 0;

        loop {
            let batch = self.store.read_all_from(from, self.batch_size).await?;
            let Some(last) = batch.last() else {
                break;
            };
            from = last.position.next();

            for event in &batch {
                self.deliver(event).await?;
            }
            events_read += batch.len() as u64;
        }

        tracing::info!(events_read, "catch-up complete");
        Ok(events_read)
    }

    /// Delivers a single event to every projection that has not seen it.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, position = %event.position))]
    pub async fn process_event(&self, event: &RecordedEvent) -> Result<()> {
        self.deliver(event).await
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }

    async fn deliver(&self, event: &RecordedEvent) -> Result<()> {
        for projection in &self.projections {
            if projection.position().await.is_behind(event.position) {
                projection.handle(event).await?;
                metrics::counter!("projections_events_processed").increment(1);
            }
        }
        Ok(())
    }

    async fn lowest_checkpoint(&self) -> Position {
        let mut lowest: Option<Position> = None;
        for projection in &self.projections {
            let checkpoint = projection.position().await.checkpoint;
            lowest = Some(lowest.map_or(checkpoint, |l| l.min(checkpoint)));
        }
        lowest.unwrap_or_default()
    }
}
