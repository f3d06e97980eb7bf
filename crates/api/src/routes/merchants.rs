//! Merchant balance queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::MerchantId;
use domain::MerchantLedgerState;
use event_store::EventStore;
use projections::history_stream;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

/// One entry of a merchant's balance history.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceHistoryEntry {
    pub event_id: String,
    pub position: u64,
    pub recorded_at: String,
    pub change: serde_json::Value,
}

/// GET /merchants: every merchant ledger, ordered by merchant ID.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<MerchantLedgerState>> {
    Json(state.balances.get_all_merchants().await)
}

/// GET /merchants/:id/balance: the current ledger of one merchant.
#[tracing::instrument(skip(state))]
pub async fn balance<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<MerchantLedgerState>, ApiError> {
    let merchant_id = parse_merchant_id(&id)?;
    state
        .balances
        .get_merchant(&merchant_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Merchant {id} not found")))
}

/// GET /merchants/:id/history: the balance-change events emitted for a merchant.
#[tracing::instrument(skip(state))]
pub async fn history<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<BalanceHistoryEntry>>, ApiError> {
    let merchant_id = parse_merchant_id(&id)?;
    if state.balances.get_merchant(&merchant_id).await.is_none() {
        return Err(ApiError::NotFound(format!("Merchant {id} not found")));
    }

    let events = state
        .event_store
        .read_stream(&history_stream(&merchant_id))
        .await?;

    Ok(Json(
        events
            .into_iter()
            .map(|e| BalanceHistoryEntry {
                event_id: e.event_id.to_string(),
                position: e.position.as_u64(),
                recorded_at: e.recorded_at.to_rfc3339(),
                change: e.payload,
            })
            .collect(),
    ))
}

fn parse_merchant_id(id: &str) -> Result<MerchantId, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("Merchant ID must not be empty".to_string()));
    }
    Ok(MerchantId::from(id))
}
