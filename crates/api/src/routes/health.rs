//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use projections::ReadModel;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub projections: usize,
    pub merchants: usize,
    pub archived_merchants: usize,
    pub estates: usize,
}

/// GET /health: returns system health status.
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        projections: state.projection_processor.projection_count(),
        merchants: state.balances.count(),
        archived_merchants: state.aggregator.count(),
        estates: state.subscription_streams.count(),
    })
}
