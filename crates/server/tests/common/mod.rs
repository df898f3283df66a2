//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! whose job queue launches scripted fake processes instead of the real
//! packager, so the full HTTP surface can be exercised without Python.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use exemaker_core::{
    testing::MockRunner, BroadcastSink, Config, JobQueue, QueueConfig, RunState,
};
use exemaker_server::state::AppState;

/// Re-export fixtures for test convenience
pub use exemaker_core::testing::fixtures;

/// Test fixture for API testing with a mock process runner.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_job_creation() {
///     let fixture = TestFixture::new();
///     let script = fixture.script("app.py");
///
///     let response = fixture.post("/api/v1/jobs", json!({ "source": script })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock runner - script exit codes, output and hangs per source
    pub runner: Arc<MockRunner>,
    /// The queue behind the router
    pub queue: JobQueue,
    /// Event fan-out the WebSocket endpoint subscribes to
    pub events: BroadcastSink,
    /// Scratch directory for scripts and outputs
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default queue settings.
    pub fn new() -> Self {
        Self::with_queue_config(QueueConfig::default())
    }

    /// Create a test fixture with custom queue settings.
    pub fn with_queue_config(queue_config: QueueConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let runner = Arc::new(MockRunner::new());
        let events = BroadcastSink::new(256);

        let config = Config {
            queue: queue_config.clone(),
            ..Default::default()
        };

        let queue = JobQueue::builder(runner.clone())
            .config(queue_config)
            .sink(Arc::new(events.clone()))
            .build();

        let state = Arc::new(AppState::new(config, queue.clone(), events.clone()));
        let router = exemaker_server::api::create_router(state);

        Self {
            router,
            runner,
            queue,
            events,
            temp_dir,
        }
    }

    /// Create a script in the scratch directory and return its path as a string.
    pub fn script(&self, name: &str) -> String {
        fixtures::script(self.temp_dir.path(), name)
            .to_string_lossy()
            .into_owned()
    }

    /// Wait until the current run has finished.
    pub async fn wait_until_finished(&self) -> RunState {
        tokio::time::timeout(Duration::from_secs(5), self.queue.wait_until_finished())
            .await
            .expect("queue did not finish in time")
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse { status, body }
    }
}
