//! Trait definitions for the runner module.

use async_trait::async_trait;

use super::error::RunnerError;
use super::handle::ProcessHandle;
use super::types::CommandSpec;

/// Launches external processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Starts `command` and returns a handle streaming its output.
    ///
    /// Fails with [`RunnerError::LaunchFailure`] when the process cannot be
    /// started at all; a process that starts and then fails is reported
    /// through the handle's exit result instead.
    async fn run(&self, command: &CommandSpec) -> Result<ProcessHandle, RunnerError>;
}
