//! Types for the job queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::job::{JobDescriptor, JobError, JobId};
use crate::runner::StreamTag;

/// Errors returned synchronously by queue operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A pending or running job already packages this script.
    #[error("a pending or running job already uses {}", .path.display())]
    DuplicateSource { path: PathBuf },

    /// The operation is not allowed in the current job or queue state.
    #[error("cannot {operation} while {state}")]
    InvalidState { operation: String, state: String },

    /// No job with this id exists.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// The job descriptor failed validation.
    #[error(transparent)]
    InvalidConfiguration(#[from] JobError),
}

impl QueueError {
    pub fn invalid_state(operation: impl Into<String>, state: impl fmt::Display) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }
}

/// The executable a successful job produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    /// File size, or the summed size of the output directory.
    pub size_bytes: u64,
}

/// Lifecycle status of one job.
///
/// `Pending -> Running -> {Succeeded, Failed, Cancelled}`; a pending job can
/// also go straight to `Failed` or `Cancelled` if it never launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded {
        artifact: Option<Artifact>,
    },
    Failed {
        exit_code: Option<i32>,
        /// Launch error, validation error or captured stderr tail.
        error: String,
    },
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }

    /// Pending or running: the job still owns its source path.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State of the queue as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    CancelledAll,
}

impl RunState {
    /// Whether a new run may be started from this state.
    pub fn can_start(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::CancelledAll)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CancelledAll => "cancelled_all",
        };
        write!(f, "{}", name)
    }
}

/// One captured output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub job_id: JobId,
    pub timestamp: DateTime<Utc>,
    pub stream: StreamTag,
    pub text: String,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub descriptor: JobDescriptor,
    pub status: JobStatus,
    /// Coarse progress estimate, 0-100.
    pub progress: u8,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueSummary {
    pub(crate) fn add(&mut self, status: &JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Succeeded { .. } => self.succeeded += 1,
            JobStatus::Failed { .. } => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded { artifact: None }.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed {
            exit_code: Some(1),
            error: String::new()
        }
        .is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(JobStatus::Failed {
            exit_code: Some(1),
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["exit_code"], 1);

        let json = serde_json::to_value(JobStatus::Pending).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "pending" }));
    }

    #[test]
    fn test_run_state_transitions_allowed() {
        assert!(RunState::Idle.can_start());
        assert!(RunState::Completed.can_start());
        assert!(RunState::CancelledAll.can_start());
        assert!(!RunState::Running.can_start());
        assert!(RunState::CancelledAll.is_finished());
        assert!(!RunState::Idle.is_finished());
    }

    #[test]
    fn test_error_display() {
        let err = QueueError::invalid_state("remove job", JobStatus::Running);
        assert_eq!(err.to_string(), "cannot remove job while running");

        let err = QueueError::DuplicateSource {
            path: PathBuf::from("/work/app/main.py"),
        };
        assert_eq!(
            err.to_string(),
            "a pending or running job already uses /work/app/main.py"
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = QueueSummary::default();
        summary.add(&JobStatus::Pending);
        summary.add(&JobStatus::Cancelled);
        summary.add(&JobStatus::Cancelled);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.cancelled, 2);
    }
}
