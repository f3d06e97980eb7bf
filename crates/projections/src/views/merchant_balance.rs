//! Merchant balance read model: settled and available balance per merchant.
//!
//! Every event on the source streams is handled in five steps: extract the
//! merchant key from the payload, decode, run the ledger transition, write the
//! new state back, and emit the derived balance-change event. Events that
//! cannot be applied are dropped with a diagnostic and never stop the projection.

use std::sync::Arc;

use async_trait::async_trait;
use common::MerchantId;
use domain::{BalanceChanged, DecodeError, MerchantLedgerState, Outcome, decode, transition};
use event_store::RecordedEvent;
use event_store::stream::entity_stream;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{EventSource, Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::sink::{EmissionSink, EmittedEvent};
use crate::store::LedgerStore;

/// Category the balance projection reads by default.
pub const DEFAULT_SOURCE_CATEGORY: &str = "MerchantArchive";

/// Category of the streams balance-change events are written to.
pub const HISTORY_CATEGORY: &str = "MerchantBalanceHistory";

const PROJECTION_NAME: &str = "MerchantBalance";

/// Returns the stream a merchant's balance-change events are written to.
pub fn history_stream(merchant_id: &MerchantId) -> String {
    entity_stream(HISTORY_CATEGORY, &merchant_id.compact())
}

/// Projection maintaining one [`MerchantLedgerState`] per merchant.
#[derive(Clone)]
pub struct MerchantBalanceProjection {
    source: EventSource,
    ledgers: LedgerStore,
    sink: Arc<dyn EmissionSink>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl MerchantBalanceProjection {
    /// Creates a projection over `$ce-MerchantArchive` emitting to `sink`.
    pub fn new(sink: Arc<dyn EmissionSink>) -> Self {
        Self {
            source: EventSource::Category(DEFAULT_SOURCE_CATEGORY.to_string()),
            ledgers: LedgerStore::new(),
            sink,
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Reads from `source` instead of the default category.
    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    /// Gets the ledger of a merchant.
    pub async fn get_merchant(&self, merchant_id: &MerchantId) -> Option<MerchantLedgerState> {
        self.ledgers.get(merchant_id).await
    }

    /// Gets every merchant ledger, ordered by merchant ID.
    pub async fn get_all_merchants(&self) -> Vec<MerchantLedgerState> {
        self.ledgers.all().await
    }

    /// Applies one event to the ledger of the merchant it names.
    ///
    /// Returns the derived balance change, if the event produced one.
    #[tracing::instrument(
        skip(self, event),
        fields(stream_id = %event.stream_id, event_type = %event.event_type)
    )]
    pub async fn apply(&self, event: &RecordedEvent) -> Option<BalanceChanged> {
        let ledger_event = match decode(&event.event_type, &event.payload) {
            Ok(e) => e,
            Err(err @ DecodeError::UnrecognizedEventType(_)) => {
                tracing::trace!(error = %err, "event ignored");
                drop_event(err.kind());
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed event dropped");
                drop_event(err.kind());
                return None;
            }
        };

        let merchant_id = ledger_event.merchant_id().clone();
        let current = self.ledgers.get(&merchant_id).await;
        let step = transition(current, &ledger_event);

        for violation in &step.violations {
            tracing::warn!(
                merchant_id = %merchant_id,
                kind = violation.kind(),
                "{violation}"
            );
            metrics::counter!("merchant_balance_anomalies", "kind" => violation.kind())
                .increment(1);
        }

        tracing::debug!(
            merchant_id = %merchant_id,
            event = ledger_event.kind().type_name(),
            outcome = step.outcome.as_str(),
            "ledger transition"
        );
        if step.outcome == Outcome::Rejected {
            drop_event(Outcome::Rejected.as_str());
        }

        match step.state {
            Some(state) => self.ledgers.put(merchant_id.clone(), state).await,
            None => {
                tracing::debug!(merchant_id = %merchant_id, "event for unknown merchant dropped");
                drop_event(Outcome::UnknownMerchant.as_str());
            }
        }

        let change = step.change?;
        self.emit(event, &change).await;
        Some(change)
    }

    async fn emit(&self, cause: &RecordedEvent, change: &BalanceChanged) {
        let payload = match serde_json::to_value(change) {
            Ok(p) => p,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize balance change");
                return;
            }
        };

        let emitted = EmittedEvent::new(
            history_stream(&change.merchant_id),
            BalanceChanged::EVENT_TYPE,
            payload,
        )
        .caused_by(cause.event_id, PROJECTION_NAME);

        match self.sink.emit(emitted).await {
            Ok(()) => {
                metrics::counter!("merchant_balance_changes_emitted").increment(1);
                metrics::counter!("events_emitted", "projection" => PROJECTION_NAME).increment(1);
            }
            Err(err) => {
                tracing::error!(
                    merchant_id = %change.merchant_id,
                    error = %err,
                    "failed to emit balance change"
                );
            }
        }
    }
}

fn drop_event(reason: &'static str) {
    metrics::counter!("merchant_balance_events_dropped", "reason" => reason).increment(1);
}

#[async_trait]
impl Projection for MerchantBalanceProjection {
    fn name(&self) -> &'static str {
        "MerchantBalanceProjection"
    }

    fn source(&self) -> EventSource {
        self.source.clone()
    }

    async fn handle(&self, event: &RecordedEvent) -> Result<()> {
        if self.source.matches(&event.stream_id) {
            self.apply(event).await;
        }

        let mut position = self.position.write().await;
        *position = position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.ledgers.clear().await;
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for MerchantBalanceProjection {
    fn name(&self) -> &'static str {
        "MerchantBalanceProjection"
    }

    fn count(&self) -> usize {
        self.ledgers.try_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use chrono::Utc;
    use domain::BalanceReference;
    use event_store::{EventId, Position};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::collections::HashMap;

    const ESTATE: &str = "435613ac-a468-47a3-ac4f-649d89764c22";
    const MERCHANT: &str = "6be48c04-a00e-4985-a50c-e27461ca47e1";
    const ARCHIVE: &str = "MerchantArchive-6be48c04a00e4985a50ce27461ca47e1";

    struct Harness {
        projection: MerchantBalanceProjection,
        sink: CollectingSink,
        next: u64,
    }

    impl Harness {
        fn new() -> Self {
            let sink = CollectingSink::new();
            Self {
                projection: MerchantBalanceProjection::new(Arc::new(sink.clone())),
                sink,
                next: 0,
            }
        }

        async fn feed(&mut self, stream_id: &str, event_type: &str, payload: serde_json::Value) {
            let event = RecordedEvent {
                event_id: EventId::new(),
                position: Position::new(self.next),
                stream_id: stream_id.to_string(),
                stream_revision: self.next,
                event_type: event_type.to_string(),
                payload,
                recorded_at: Utc::now(),
                metadata: HashMap::new(),
            };
            self.next += 1;
            self.projection.handle(&event).await.unwrap();
        }

        async fn ledger(&self) -> MerchantLedgerState {
            self.projection.get_merchant(&MERCHANT.into()).await.unwrap()
        }

        async fn last_change(&self) -> BalanceChanged {
            let events = self.sink.events().await;
            let last = events.last().unwrap();
            serde_json::from_value(last.payload.clone()).unwrap()
        }
    }

    fn created() -> serde_json::Value {
        json!({"EstateId": ESTATE, "MerchantId": MERCHANT, "MerchantName": "Test Merchant 1"})
    }

    fn deposit(amount: f64) -> serde_json::Value {
        json!({
            "EstateId": ESTATE, "MerchantId": MERCHANT, "Amount": amount,
            "DepositDateTime": "2024-01-01T10:00:00"
        })
    }

    fn started(tx: &str, amount: f64) -> serde_json::Value {
        json!({
            "EstateId": ESTATE, "MerchantId": MERCHANT, "TransactionId": tx,
            "TransactionAmount": amount, "TransactionType": "Sale",
            "TransactionDateTime": "2024-01-01T11:00:00"
        })
    }

    fn completed(tx: &str, success: bool) -> serde_json::Value {
        json!({
            "EstateId": ESTATE, "MerchantId": MERCHANT, "TransactionId": tx,
            "IsAuthorised": success
        })
    }

    #[tokio::test]
    async fn creation_emits_zero_balances() {
        let mut h = Harness::new();
        h.feed(ARCHIVE, "MerchantCreatedEvent", created()).await;

        let ledger = h.ledger().await;
        assert_eq!(ledger.balance, dec!(0));
        assert_eq!(ledger.merchant_name, "Test Merchant 1");

        let events = h.sink.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stream_id, "MerchantBalanceHistory-6be48c04a00e4985a50ce27461ca47e1");
        assert_eq!(events[0].event_type, "MerchantBalanceChangedEvent");
        assert_eq!(h.last_change().await.reference, BalanceReference::MerchantCreated);
    }

    #[tokio::test]
    async fn deposit_then_successful_sale() {
        let mut h = Harness::new();
        h.feed(ARCHIVE, "MerchantCreatedEvent", created()).await;
        h.feed(ARCHIVE, "ManualDepositMadeEvent", deposit(5000.0)).await;
        h.feed(ARCHIVE, "TransactionHasStartedEvent", started("t1", 100.0)).await;

        let ledger = h.ledger().await;
        assert_eq!(ledger.balance, dec!(5000));
        assert_eq!(ledger.available_balance, dec!(4900));
        assert_eq!(h.last_change().await.change_amount, dec!(0));

        h.feed(ARCHIVE, "TransactionHasBeenCompletedEvent", completed("t1", true)).await;

        let ledger = h.ledger().await;
        assert_eq!(ledger.balance, dec!(4900));
        assert_eq!(ledger.available_balance, dec!(4900));
        assert!(ledger.in_flight_transactions.is_empty());

        let change = h.last_change().await;
        assert_eq!(change.change_amount, dec!(100));
        assert_eq!(change.reference, BalanceReference::TransactionCompleted);
        assert_eq!(h.sink.len().await, 4);
    }

    #[tokio::test]
    async fn failed_sale_releases_reservation() {
        let mut h = Harness::new();
        h.feed(ARCHIVE, "MerchantCreatedEvent", created()).await;
        h.feed(ARCHIVE, "ManualDepositMadeEvent", deposit(5000.0)).await;
        h.feed(ARCHIVE, "TransactionHasStartedEvent", started("t1", 100.0)).await;
        h.feed(ARCHIVE, "TransactionHasBeenCompletedEvent", completed("t1", false)).await;

        let ledger = h.ledger().await;
        assert_eq!(ledger.balance, dec!(5000));
        assert_eq!(ledger.available_balance, dec!(5000));
        assert_eq!(h.last_change().await.change_amount, dec!(100));
    }

    #[tokio::test]
    async fn unknown_merchant_is_dropped_without_emission() {
        let mut h = Harness::new();
        h.feed(ARCHIVE, "ManualDepositMadeEvent", deposit(10.0)).await;

        assert!(h.projection.get_merchant(&MERCHANT.into()).await.is_none());
        assert!(h.sink.is_empty().await);
        assert_eq!(h.projection.position().await.events_processed, 1);
    }

    #[tokio::test]
    async fn unrecognized_and_malformed_events_are_dropped() {
        let mut h = Harness::new();
        h.feed(ARCHIVE, "MerchantCreatedEvent", created()).await;
        h.feed(ARCHIVE, "SomethingElseEvent", json!({"MerchantId": MERCHANT})).await;
        h.feed(ARCHIVE, "ManualDepositMadeEvent", json!({"MerchantId": MERCHANT})).await;

        assert_eq!(h.ledger().await.balance, dec!(0));
        assert_eq!(h.sink.len().await, 1);
        assert_eq!(h.projection.position().await.events_processed, 3);
    }

    #[tokio::test]
    async fn events_outside_source_are_skipped_but_advance_position() {
        let mut h = Harness::new();
        h.feed("MerchantAggregate-6be48c04a00e4985a50ce27461ca47e1", "MerchantCreatedEvent", created())
            .await;

        assert!(h.projection.get_merchant(&MERCHANT.into()).await.is_none());
        let position = h.projection.position().await;
        assert_eq!(position.checkpoint, Position::new(1));
    }

    #[tokio::test]
    async fn duplicate_creation_keeps_balances() {
        let mut h = Harness::new();
        h.feed(ARCHIVE, "MerchantCreatedEvent", created()).await;
        h.feed(ARCHIVE, "ManualDepositMadeEvent", deposit(250.0)).await;
        h.feed(ARCHIVE, "MerchantCreatedEvent", created()).await;

        assert_eq!(h.ledger().await.balance, dec!(250));
        let change = h.last_change().await;
        assert_eq!(change.reference, BalanceReference::MerchantCreated);
        assert_eq!(change.balance, dec!(250));
        assert_eq!(change.change_amount, dec!(0));
    }

    #[tokio::test]
    async fn reset_clears_ledgers() {
        let mut h = Harness::new();
        h.feed(ARCHIVE, "MerchantCreatedEvent", created()).await;
        assert_eq!(ReadModel::count(&h.projection), 1);

        h.projection.reset().await.unwrap();
        assert!(h.projection.get_all_merchants().await.is_empty());
        assert_eq!(h.projection.position().await, ProjectionPosition::zero());
    }

    #[test]
    fn history_stream_strips_dashes() {
        assert_eq!(
            history_stream(&MERCHANT.into()),
            "MerchantBalanceHistory-6be48c04a00e4985a50ce27461ca47e1"
        );
    }
}
