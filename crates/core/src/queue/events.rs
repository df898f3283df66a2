//! Queue events and the sinks that consume them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::job::JobId;
use crate::runner::StreamTag;

use super::types::{JobSnapshot, JobStatus, LogRecord, RunState};

/// Notification emitted by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A job was enqueued.
    JobAdded { job: JobSnapshot },
    /// A job moved between statuses.
    StatusChanged {
        job_id: JobId,
        old: JobStatus,
        new: JobStatus,
    },
    /// A job produced an output line.
    Log(LogRecord),
    /// A job's progress estimate increased.
    Progress { job_id: JobId, percent: u8 },
    /// The queue's run state changed.
    RunStateChanged { old: RunState, new: RunState },
}

impl QueueEvent {
    /// The job this event refers to, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::JobAdded { job } => Some(job.id),
            Self::StatusChanged { job_id, .. } | Self::Progress { job_id, .. } => Some(*job_id),
            Self::Log(record) => Some(record.job_id),
            Self::RunStateChanged { .. } => None,
        }
    }
}

/// Consumer of queue events.
///
/// Called while the queue holds its state lock: implementations must return
/// quickly, must not block and must not call back into the queue.
pub trait JobSink: Send + Sync {
    fn notify(&self, event: &QueueEvent);
}

/// Forwards events into a bounded mpsc channel, dropping them when full.
pub struct ChannelSink {
    tx: mpsc::Sender<QueueEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<QueueEvent>) -> Self {
        Self {
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Creates a sink together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<QueueEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Number of events dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl JobSink for ChannelSink {
    fn notify(&self, event: &QueueEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!("Event channel full, {} events dropped so far", dropped);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event channel closed, dropping event");
            }
        }
    }
}

/// Fans events out to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<QueueEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl JobSink for BroadcastSink {
    fn notify(&self, event: &QueueEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}

/// Writes every event to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl JobSink for TracingSink {
    fn notify(&self, event: &QueueEvent) {
        match event {
            QueueEvent::JobAdded { job } => {
                info!("Job {} queued: {}", job.id, job.descriptor.source.display())
            }
            QueueEvent::StatusChanged { job_id, old, new } => match new {
                JobStatus::Failed { exit_code, error } => warn!(
                    "Job {} {} -> failed (exit code {:?}): {}",
                    job_id, old, exit_code, error
                ),
                JobStatus::Succeeded {
                    artifact: Some(artifact),
                } => info!(
                    "Job {} {} -> succeeded: {} ({} bytes)",
                    job_id,
                    old,
                    artifact.path.display(),
                    artifact.size_bytes
                ),
                _ => info!("Job {} {} -> {}", job_id, old, new),
            },
            QueueEvent::Log(record) => match record.stream {
                StreamTag::Stdout => info!("[{}] {}", record.job_id, record.text),
                StreamTag::Stderr => info!("[{} stderr] {}", record.job_id, record.text),
            },
            QueueEvent::Progress { job_id, percent } => {
                debug!("Job {} progress {}%", job_id, percent)
            }
            QueueEvent::RunStateChanged { old, new } => info!("Queue {} -> {}", old, new),
        }
    }
}
