//! Prometheus metrics for observability.
//!
//! Covers HTTP traffic, WebSocket clients and the job queue. Queue counters
//! are fed by [`MetricsSink`]; per-status gauges are refreshed from a queue
//! summary right before each scrape.

use once_cell::sync::Lazy;
use prometheus::{
    core::Collector, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::error;

use exemaker_core::{JobSink, QueueEvent, RunState};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "exemaker_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .expect("valid histogram definition")
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("exemaker_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid counter definition")
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "exemaker_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .expect("valid gauge definition")
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "exemaker_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .expect("valid gauge definition")
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "exemaker_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .expect("valid counter definition")
});

/// WebSocket messages sent by event type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("exemaker_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .expect("valid counter definition")
});

/// WebSocket lag events (when a client falls behind the event stream).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "exemaker_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .expect("valid counter definition")
});

// =============================================================================
// Queue Metrics
// =============================================================================

/// Jobs accepted into the queue.
pub static JOBS_ENQUEUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "exemaker_jobs_enqueued_total",
        "Total jobs enqueued since startup",
    )
    .expect("valid counter definition")
});

/// Jobs that reached a terminal status, by status.
pub static JOBS_FINISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "exemaker_jobs_finished_total",
            "Jobs that reached a terminal status",
        ),
        &["status"],
    )
    .expect("valid counter definition")
});

/// Packager output lines captured, by stream.
pub static OUTPUT_LINES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "exemaker_output_lines_total",
            "Packager output lines captured",
        ),
        &["stream"],
    )
    .expect("valid counter definition")
});

/// Jobs by current status (collected dynamically).
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("exemaker_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .expect("valid gauge definition")
});

/// Whether a run is in progress (1) or not (0).
pub static QUEUE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "exemaker_queue_running",
        "Whether the queue is running (1) or not (0)",
    )
    .expect("valid gauge definition")
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        // WebSocket
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(WS_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_MESSAGES_SENT.clone()),
        Box::new(WS_LAG_EVENTS.clone()),
        // Queue
        Box::new(JOBS_ENQUEUED_TOTAL.clone()),
        Box::new(JOBS_FINISHED_TOTAL.clone()),
        Box::new(OUTPUT_LINES_TOTAL.clone()),
        Box::new(JOBS_BY_STATUS.clone()),
        Box::new(QUEUE_RUNNING.clone()),
    ];

    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refreshes gauges from the queue's current state.
pub fn collect_queue_metrics(state: &AppState) {
    let queue = state.queue();
    let summary = queue.summary();

    for (status, count) in [
        ("pending", summary.pending),
        ("running", summary.running),
        ("succeeded", summary.succeeded),
        ("failed", summary.failed),
        ("cancelled", summary.cancelled),
    ] {
        JOBS_BY_STATUS
            .with_label_values(&[status])
            .set(count as i64);
    }

    QUEUE_RUNNING.set(i64::from(queue.run_state() == RunState::Running));
}

/// Label used for an event in per-type metrics.
pub fn event_type(event: &QueueEvent) -> &'static str {
    match event {
        QueueEvent::JobAdded { .. } => "job_added",
        QueueEvent::StatusChanged { .. } => "status_changed",
        QueueEvent::Log(_) => "log",
        QueueEvent::Progress { .. } => "progress",
        QueueEvent::RunStateChanged { .. } => "run_state_changed",
    }
}

/// Queue sink that turns events into counter increments.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSink;

impl JobSink for MetricsSink {
    fn notify(&self, event: &QueueEvent) {
        match event {
            QueueEvent::JobAdded { .. } => JOBS_ENQUEUED_TOTAL.inc(),
            QueueEvent::StatusChanged { new, .. } if new.is_terminal() => {
                JOBS_FINISHED_TOTAL.with_label_values(&[new.name()]).inc()
            }
            QueueEvent::Log(record) => OUTPUT_LINES_TOTAL
                .with_label_values(&[record.stream.to_string().as_str()])
                .inc(),
            _ => {}
        }
    }
}

static JOB_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid job id pattern")
});

/// Normalize a path for metric labels (replace job ids with a placeholder).
pub fn normalize_path(path: &str) -> String {
    JOB_ID_PATTERN.replace_all(path, "{id}").into_owned()
}
