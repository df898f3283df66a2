//! HTTP and WebSocket front for the exemaker job queue.

pub mod api;
pub mod metrics;
pub mod state;
