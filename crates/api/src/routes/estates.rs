//! Estate subscription stream lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::EstateId;
use event_store::EventStore;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstateResponse {
    pub estate_id: String,
    pub name: String,
    pub filtered_name: String,
    pub subscription_stream: String,
}

/// GET /estates/:id: the subscription stream an estate's events are routed to.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<EstateResponse>, ApiError> {
    let estate_id = EstateId::from(id.as_str());
    let route = state
        .subscription_streams
        .get_estate(&estate_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Estate {id} not found")))?;

    Ok(Json(EstateResponse {
        estate_id: estate_id.to_string(),
        subscription_stream: route.stream(),
        name: route.name,
        filtered_name: route.filtered_name,
    }))
}
