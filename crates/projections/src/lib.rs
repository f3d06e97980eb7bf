//! Projections that turn the event log into merchant read models.
//!
//! This crate provides the read side:
//! - [`Projection`] trait and [`EventSource`] for selecting which streams a projection consumes
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - [`LedgerStore`] holding one ledger per merchant
//! - [`EmissionSink`] implementations receiving the events projections emit
//! - [`ShardedDispatcher`] for handling different merchants concurrently
//! - Three projections: merchant balance, merchant aggregator, subscription stream builder

pub mod dispatch;
pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod sink;
pub mod store;
pub mod views;

pub use dispatch::ShardedDispatcher;
pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{EventSource, Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use sink::{CollectingSink, EmissionSink, EmittedEvent, EventStoreSink};
pub use store::LedgerStore;
pub use views::{
    EstateRoute, MerchantAggregator, MerchantBalanceProjection, SubscriptionStreamBuilder,
    history_stream,
};
