//! Concurrent delivery of events to one projection, partitioned by merchant.
//!
//! Each shard is a tokio task fed by a bounded channel. An event is routed by
//! a hash of the merchant key in its payload, so every event for one merchant
//! is handled by the same task in the order it was dispatched, while
//! different merchants are handled concurrently. Events without a merchant
//! key go to shard 0.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use domain::merchant_key;
use event_store::RecordedEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::projection::Projection;
use crate::{ProjectionError, Result};

/// Fans events out to a fixed set of worker tasks.
pub struct ShardedDispatcher {
    senders: Vec<mpsc::Sender<RecordedEvent>>,
    workers: Vec<JoinHandle<u64>>,
}

impl ShardedDispatcher {
    /// Spawns `shards` workers, each buffering up to `capacity` events.
    pub fn spawn(projection: Arc<dyn Projection>, shards: usize, capacity: usize) -> Self {
        let shards = shards.max(1);
        let mut senders = Vec::with_capacity(shards);
        let mut workers = Vec::with_capacity(shards);

        for shard in 0..shards {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.push(tx);
            workers.push(tokio::spawn(run_shard(shard, Arc::clone(&projection), rx)));
        }

        tracing::debug!(shards, projection = projection.name(), "dispatcher started");
        Self { senders, workers }
    }

    pub fn shard_count(&self) -> usize {
        self.senders.len()
    }

    /// Returns the shard an event is routed to.
    pub fn shard_for(&self, event: &RecordedEvent) -> usize {
        match merchant_key(&event.payload) {
            Some(merchant_id) => {
                let mut hasher = DefaultHasher::new();
                merchant_id.hash(&mut hasher);
                (hasher.finish() % self.senders.len() as u64) as usize
            }
            None => 0,
        }
    }

    /// Queues an event on its shard, waiting if the shard is full.
    pub async fn dispatch(&self, event: RecordedEvent) -> Result<()> {
        let shard = self.shard_for(&event);
        self.senders[shard]
            .send(event)
            .await
            .map_err(|_| ProjectionError::ShardClosed(shard))
    }

    /// Closes every shard, waits for queued events to drain, and returns
    /// the number of events handled.
    pub async fn shutdown(self) -> Result<u64> {
        drop(self.senders);

        let mut handled = 0;
        for (shard, worker) in self.workers.into_iter().enumerate() {
            handled += worker.await.map_err(|err| {
                tracing::error!(shard, error = %err, "shard worker failed");
                ProjectionError::ShardClosed(shard)
            })?;
        }
        Ok(handled)
    }
}

async fn run_shard(
    shard: usize,
    projection: Arc<dyn Projection>,
    mut rx: mpsc::Receiver<RecordedEvent>,
) -> u64 {
    let mut handled = 0;
    while let Some(event) = rx.recv().await {
        if let Err(err) = projection.handle(&event).await {
            tracing::error!(
                shard,
                stream_id = %event.stream_id,
                position = %event.position,
                error = %err,
                "event handling failed"
            );
        }
        handled += 1;
    }
    tracing::debug!(shard, handled, "shard stopped");
    handled
}
