use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exemaker_core::{
    config_path_from_env, load_config, validate_config, BroadcastSink, JobQueue, NoIconConverter,
    RunState, TokioProcessRunner, TracingSink,
};
use exemaker_server::{api::create_router, metrics::MetricsSink, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extra time allowed on shutdown beyond the cancel grace period for forced
/// kills and cleanup.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("exemaker {} starting", VERSION);

    // Load configuration
    let config_path = config_path_from_env();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    // Short fingerprint so log excerpts can be matched to a config
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "Configuration loaded (fingerprint {}): packager {} -m {}, {} concurrent job(s)",
        &config_hash[..16],
        config.packager.python_path.display(),
        config.packager.module,
        config.queue.max_concurrent_jobs
    );

    // Compose the queue: real processes, no icon conversion, events fanned out
    // to the log, metrics and WebSocket clients
    let events = BroadcastSink::new(config.server.event_buffer);
    let runner = Arc::new(TokioProcessRunner::new(config.queue.runner_config()));
    let queue = JobQueue::builder(runner)
        .config(config.queue.clone())
        .packager(config.packager.clone())
        .icon_converter(Arc::new(NoIconConverter))
        .sink(Arc::new(TracingSink))
        .sink(Arc::new(MetricsSink))
        .sink(Arc::new(events.clone()))
        .build();

    let state = Arc::new(AppState::new(config.clone(), queue.clone(), events));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(queue.clone()))
        .await
        .context("Server error")?;

    // Let cancelled packager processes go away before exiting
    let limit = config.queue.cancel_grace_period() + SHUTDOWN_SLACK;
    match tokio::time::timeout(limit, queue.wait_until_finished()).await {
        Ok(RunState::Running) | Err(_) => {
            warn!("Jobs still running after {:?}; exiting anyway", limit)
        }
        Ok(run_state) => info!("Queue settled ({})", run_state),
    }

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel all outstanding jobs.
async fn shutdown_signal(queue: JobQueue) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown requested, cancelling outstanding jobs");
    queue.cancel_all();
}
