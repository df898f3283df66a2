//! Sink that records every event for test assertions.

use std::sync::Mutex;

use crate::job::JobId;
use crate::queue::{JobSink, JobStatus, QueueEvent, RunState};

/// Records queue events in the order they were emitted.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events that mention `job_id`.
    pub fn events_for(&self, job_id: JobId) -> Vec<QueueEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.job_id() == Some(job_id))
            .collect()
    }

    /// Statuses `job_id` moved into, in order.
    pub fn statuses(&self, job_id: JobId) -> Vec<JobStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::StatusChanged { job_id: id, new, .. } if id == job_id => Some(new),
                _ => None,
            })
            .collect()
    }

    /// Progress percentages reported for `job_id`, in order.
    pub fn progress(&self, job_id: JobId) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::Progress { job_id: id, percent } if id == job_id => Some(percent),
                _ => None,
            })
            .collect()
    }

    /// Run states the queue moved into, in order.
    pub fn run_states(&self) -> Vec<RunState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::RunStateChanged { new, .. } => Some(new),
                _ => None,
            })
            .collect()
    }

    /// Jobs in the order they entered `Running`.
    pub fn started_order(&self) -> Vec<JobId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::StatusChanged {
                    job_id,
                    new: JobStatus::Running,
                    ..
                } => Some(job_id),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl JobSink for RecordingSink {
    fn notify(&self, event: &QueueEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
