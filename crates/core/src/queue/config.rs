//! Job queue configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::runner::RunnerConfig;

/// Configuration for the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of packager processes running at once.
    /// 1 runs jobs strictly one after another in enqueue order.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Time a cancelled process gets to exit before it is killed (milliseconds).
    #[serde(default = "default_cancel_grace_period")]
    pub cancel_grace_period_ms: u64,

    /// Number of trailing stderr lines attached to a failed job.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,

    /// Capacity of each process's output line channel.
    #[serde(default = "default_output_channel_capacity")]
    pub output_channel_capacity: usize,
}

fn default_max_concurrent_jobs() -> usize {
    1
}

fn default_cancel_grace_period() -> u64 {
    5000 // 5 seconds
}

fn default_stderr_tail_lines() -> usize {
    20
}

fn default_output_channel_capacity() -> usize {
    1024
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            cancel_grace_period_ms: default_cancel_grace_period(),
            stderr_tail_lines: default_stderr_tail_lines(),
            output_channel_capacity: default_output_channel_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn cancel_grace_period(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_period_ms)
    }

    /// Settings for a real process runner matching this queue.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            grace_period: self.cancel_grace_period(),
            channel_capacity: self.output_channel_capacity,
        }
    }
}
