//! Merchant aggregator: multiplexes merchant and transaction events into one
//! archive stream per merchant.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::MerchantId;
use domain::merchant_key;
use event_store::RecordedEvent;
use event_store::stream::entity_stream;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{EventSource, Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::sink::{EmissionSink, EmittedEvent};

/// Categories the aggregator reads from.
pub const SOURCE_CATEGORIES: [&str; 2] = ["MerchantAggregate", "TransactionAggregate"];

/// Category of the per-merchant archive streams.
pub const ARCHIVE_CATEGORY: &str = "MerchantArchive";

const PROJECTION_NAME: &str = "MerchantAggregator";

/// Returns the archive stream of a merchant.
pub fn archive_stream(merchant_id: &MerchantId) -> String {
    entity_stream(ARCHIVE_CATEGORY, &merchant_id.compact())
}

struct AggregatorState {
    forwarded: HashMap<MerchantId, u64>,
    position: ProjectionPosition,
}

/// Republishes every source event that names a merchant to that merchant's
/// archive stream, unchanged.
#[derive(Clone)]
pub struct MerchantAggregator {
    source: EventSource,
    sink: Arc<dyn EmissionSink>,
    state: Arc<RwLock<AggregatorState>>,
}

impl MerchantAggregator {
    pub fn new(sink: Arc<dyn EmissionSink>) -> Self {
        Self {
            source: EventSource::categories(SOURCE_CATEGORIES),
            sink,
            state: Arc::new(RwLock::new(AggregatorState {
                forwarded: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Number of events forwarded for a merchant.
    pub async fn forwarded_count(&self, merchant_id: &MerchantId) -> u64 {
        self.state
            .read()
            .await
            .forwarded
            .get(merchant_id)
            .copied()
            .unwrap_or(0)
    }

    async fn forward(&self, event: &RecordedEvent) -> Result<bool> {
        let Some(merchant_id) = merchant_key(&event.payload) else {
            tracing::trace!(
                stream_id = %event.stream_id,
                event_type = %event.event_type,
                "no merchant key, not forwarded"
            );
            return Ok(false);
        };

        let mut emitted = EmittedEvent::new(
            archive_stream(&merchant_id),
            event.event_type.clone(),
            event.payload.clone(),
        );
        emitted.metadata = event.metadata.clone();
        let emitted = emitted.caused_by(event.event_id, PROJECTION_NAME);

        self.sink.emit(emitted).await?;
        metrics::counter!("events_emitted", "projection" => PROJECTION_NAME).increment(1);

        *self
            .state
            .write()
            .await
            .forwarded
            .entry(merchant_id)
            .or_insert(0) += 1;
        Ok(true)
    }
}

#[async_trait]
impl Projection for MerchantAggregator {
    fn name(&self) -> &'static str {
        "MerchantAggregator"
    }

    fn source(&self) -> EventSource {
        self.source.clone()
    }

    #[tracing::instrument(skip(self, event), fields(stream_id = %event.stream_id))]
    async fn handle(&self, event: &RecordedEvent) -> Result<()> {
        if self.source.matches(&event.stream_id) {
            self.forward(event).await?;
        }

        let mut state = self.state.write().await;
        state.position = state.position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.forwarded.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for MerchantAggregator {
    fn name(&self) -> &'static str {
        "MerchantAggregator"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.forwarded.len())
            .unwrap_or(0)
    }
}
