use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use exemaker_core::{QueueError, SanitizedConfig};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{collect_queue_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body shared by all endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Maps queue errors onto HTTP statuses.
pub fn queue_error(e: QueueError) -> ApiError {
    let status = match &e {
        QueueError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
        QueueError::JobNotFound(_) => StatusCode::NOT_FOUND,
        QueueError::DuplicateSource { .. } | QueueError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
    };
    api_error(status, e.to_string())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus scrape endpoint
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_queue_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
