//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Event log error.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),
    /// Projection processing error.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::EventStore(err) => event_store_status(err),
            ApiError::Projection(ProjectionError::EventStore(err)) => event_store_status(err),
            ApiError::Projection(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

fn event_store_status(err: &EventStoreError) -> StatusCode {
    match err {
        EventStoreError::InvalidStream(_) | EventStoreError::EmptyAppend(_) => {
            StatusCode::BAD_REQUEST
        }
        EventStoreError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        EventStoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
