//! Routes estate transaction traffic into one subscription stream per estate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EstateId;
use domain::estate_key;
use event_store::RecordedEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{EventSource, Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::sink::{EmissionSink, EmittedEvent};

/// Categories the builder reads from.
pub const SOURCE_CATEGORIES: [&str; 2] = ["EstateAggregate", "TransactionAggregate"];

/// Prefix of every subscription stream name.
pub const SUBSCRIPTION_STREAM_PREFIX: &str = "TransactionProcessorSubscriptionStream_";

const PROJECTION_NAME: &str = "SubscriptionStreamBuilder";

/// Where an estate's events are routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstateRoute {
    /// Estate name with spaces removed, used in the stream name.
    pub name: String,
    /// Estate name as registered.
    pub filtered_name: String,
}

impl EstateRoute {
    pub fn new(estate_name: &str) -> Self {
        Self {
            name: estate_name.chars().filter(|c| !c.is_whitespace()).collect(),
            filtered_name: estate_name.to_string(),
        }
    }

    /// The stream this estate's events are written to.
    pub fn stream(&self) -> String {
        format!("{SUBSCRIPTION_STREAM_PREFIX}{}", self.name)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EstateCreated {
    #[serde(alias = "estateId")]
    estate_id: EstateId,
    #[serde(alias = "estateName")]
    estate_name: String,
}

fn is_estate_created(event_type: &str) -> bool {
    let short = event_type.rsplit('.').next().unwrap_or(event_type);
    short == "EstateCreatedEvent" || short == "EstateCreated"
}

struct BuilderState {
    estates: HashMap<EstateId, EstateRoute>,
    position: ProjectionPosition,
}

/// Projection that learns estate names and republishes each estate's
/// transaction events to `TransactionProcessorSubscriptionStream_<name>`.
#[derive(Clone)]
pub struct SubscriptionStreamBuilder {
    source: EventSource,
    sink: Arc<dyn EmissionSink>,
    state: Arc<RwLock<BuilderState>>,
}

impl SubscriptionStreamBuilder {
    pub fn new(sink: Arc<dyn EmissionSink>) -> Self {
        Self {
            source: EventSource::categories(SOURCE_CATEGORIES),
            sink,
            state: Arc::new(RwLock::new(BuilderState {
                estates: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Gets the route of a known estate.
    pub async fn get_estate(&self, estate_id: &EstateId) -> Option<EstateRoute> {
        self.state.read().await.estates.get(estate_id).cloned()
    }

    async fn route(&self, event: &RecordedEvent) -> Result<()> {
        if is_estate_created(&event.event_type) {
            let created = match EstateCreated::deserialize(&event.payload) {
                Ok(c) => c,
                Err(err) => {
                    tracing::warn!(error = %err, "malformed estate event dropped");
                    return Ok(());
                }
            };
            let route = EstateRoute::new(&created.estate_name);
            tracing::debug!(estate_id = %created.estate_id, stream = %route.stream(), "estate registered");
            self.state
                .write()
                .await
                .estates
                .insert(created.estate_id, route);
            return Ok(());
        }

        let Some(estate_id) = estate_key(&event.payload) else {
            return Ok(());
        };
        let Some(route) = self.get_estate(&estate_id).await else {
            tracing::trace!(estate_id = %estate_id, "event for unknown estate not routed");
            return Ok(());
        };

        let mut emitted =
            EmittedEvent::new(route.stream(), event.event_type.clone(), event.payload.clone());
        emitted.metadata = event.metadata.clone();
        self.sink
            .emit(emitted.caused_by(event.event_id, PROJECTION_NAME))
            .await?;
        metrics::counter!("events_emitted", "projection" => PROJECTION_NAME).increment(1);
        Ok(())
    }
}

#[async_trait]
impl Projection for SubscriptionStreamBuilder {
    fn name(&self) -> &'static str {
        "SubscriptionStreamBuilder"
    }

    fn source(&self) -> EventSource {
        self.source.clone()
    }

    #[tracing::instrument(skip(self, event), fields(stream_id = %event.stream_id))]
    async fn handle(&self, event: &RecordedEvent) -> Result<()> {
        if self.source.matches(&event.stream_id) {
            self.route(event).await?;
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
        state.estates.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for SubscriptionStreamBuilder {
    fn name(&self) -> &'static str {
        "SubscriptionStreamBuilder"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.estates.len()).unwrap_or(0)
    }
}
