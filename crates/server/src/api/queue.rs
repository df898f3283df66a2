//! Queue control handlers.

use axum::{extract::State, http::StatusCode, Json};
use exemaker_core::{QueueSummary, RunState};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::handlers::{queue_error, ApiError};
use crate::state::AppState;

/// Response describing the queue as a whole
#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub run_state: RunState,
    pub summary: QueueSummary,
    pub max_concurrent_jobs: usize,
}

fn status_of(state: &AppState) -> QueueStatusResponse {
    let queue = state.queue();
    QueueStatusResponse {
        run_state: queue.run_state(),
        summary: queue.summary(),
        max_concurrent_jobs: queue.config().max_concurrent_jobs,
    }
}

/// Get the run state and job counts
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<QueueStatusResponse> {
    Json(status_of(&state))
}

/// Start processing pending jobs
pub async fn start(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<QueueStatusResponse>), ApiError> {
    state.queue().start().map_err(queue_error)?;
    info!("Queue started via API");
    Ok((StatusCode::ACCEPTED, Json(status_of(&state))))
}

/// Cancel every job that has not finished.
///
/// Returns immediately; running jobs report `cancelled` once their process
/// has exited.
pub async fn cancel(State(state): State<Arc<AppState>>) -> (StatusCode, Json<QueueStatusResponse>) {
    state.queue().cancel_all();
    info!("Cancel requested via API");
    (StatusCode::ACCEPTED, Json(status_of(&state)))
}
