//! HTTP host for the merchant balance projections.
//!
//! Accepts raw events into the log, runs the projections incrementally after
//! every write, and serves merchant balances, balance history and estate
//! routes, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{
    EmissionSink, EventSource, EventStoreSink, MerchantAggregator, MerchantBalanceProjection,
    ProjectionProcessor, SubscriptionStreamBuilder,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub event_store: S,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    pub balances: MerchantBalanceProjection,
    pub aggregator: MerchantAggregator,
    pub subscription_streams: SubscriptionStreamBuilder,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/streams/{stream}", post(routes::streams::append::<S>))
        .route("/merchants", get(routes::merchants::list::<S>))
        .route("/merchants/{id}/balance", get(routes::merchants::balance::<S>))
        .route("/merchants/{id}/history", get(routes::merchants::history::<S>))
        .route("/estates/{id}", get(routes::estates::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: the three projections, emitting back into
/// `event_store`, registered on one processor.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let sink: Arc<dyn EmissionSink> = Arc::new(EventStoreSink::new(event_store.clone()));

    let aggregator = MerchantAggregator::new(Arc::clone(&sink));
    let balances = MerchantBalanceProjection::new(Arc::clone(&sink))
        .with_source(EventSource::Category(config.merchant_category.clone()));
    let subscription_streams = SubscriptionStreamBuilder::new(sink);

    let mut processor = ProjectionProcessor::new(event_store.clone());
    processor.register(Box::new(aggregator.clone()));
    processor.register(Box::new(balances.clone()));
    processor.register(Box::new(subscription_streams.clone()));

    Arc::new(AppState {
        event_store,
        projection_processor: Arc::new(processor),
        balances,
        aggregator,
        subscription_streams,
    })
}
