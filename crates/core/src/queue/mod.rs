//! Job queue: holds the ordered set of jobs, dispatches them to the process
//! runner and reports everything that happens to registered sinks.
//!
//! Run lifecycle: `Idle -> Running -> {Completed, CancelledAll}`. Jobs are
//! dispatched in enqueue order, one at a time unless
//! [`QueueConfig::max_concurrent_jobs`] allows more.

mod config;
mod events;
mod orchestrator;
pub mod progress;
mod types;

pub use config::QueueConfig;
pub use events::{BroadcastSink, ChannelSink, JobSink, QueueEvent, TracingSink};
pub use orchestrator::{JobQueue, JobQueueBuilder};
pub use types::{
    Artifact, JobSnapshot, JobStatus, LogRecord, QueueError, QueueSummary, RunState,
};
