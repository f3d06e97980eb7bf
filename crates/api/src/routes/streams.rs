//! Event ingestion endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use event_store::{EventId, EventStore, EventStoreExt, NewEvent};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendEventRequest {
    pub event_type: String,
    pub data: serde_json::Value,
    /// Client-chosen event ID; a fresh one is generated when absent.
    pub event_id: Option<EventId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendEventResponse {
    pub event_id: String,
    pub stream_id: String,
    pub position: u64,
    pub stream_revision: u64,
}

/// POST /streams/:stream: append a raw event, then bring the projections up to date.
#[tracing::instrument(skip(state, req), fields(event_type = %req.event_type))]
pub async fn append<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(stream): Path<String>,
    Json(req): Json<AppendEventRequest>,
) -> Result<(StatusCode, Json<AppendEventResponse>), ApiError> {
    if req.event_type.trim().is_empty() {
        return Err(ApiError::BadRequest("eventType must not be empty".to_string()));
    }

    let mut event = NewEvent::new(req.event_type, req.data);
    if let Some(id) = req.event_id {
        event = event.with_id(id);
    }

    let recorded = state.event_store.append_event(&stream, event).await?;
    metrics::counter!("api_events_ingested").increment(1);

    state.projection_processor.run_catch_up().await?;

    Ok((
        StatusCode::CREATED,
        Json(AppendEventResponse {
            event_id: recorded.event_id.to_string(),
            stream_id: recorded.stream_id,
            position: recorded.position.as_u64(),
            stream_revision: recorded.stream_revision,
        }),
    ))
}
