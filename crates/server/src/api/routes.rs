use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::middleware::metrics_middleware;
use super::{handlers, jobs, queue, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors_origins = state.sanitized_config().server.cors_origins;

    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Jobs
        .route("/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/jobs/{id}",
            get(jobs::get_job)
                .put(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/jobs/{id}/log", get(jobs::get_job_log))
        // Queue control
        .route("/queue", get(queue::get_status))
        .route("/queue/start", post(queue::start))
        .route("/queue/cancel", post(queue::cancel))
        // Event stream
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http());

    if cors_origins.is_empty() {
        router
    } else {
        router.layer(build_cors_layer(&cors_origins))
    }
}

/// Build a CORS layer for the configured origins; `"*"` allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
