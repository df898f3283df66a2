//! Process runner: launches one external process per job, streams its output
//! line by line and supports cancellation of the whole process tree.
//!
//! The [`ProcessRunner`] trait is the seam the queue depends on;
//! [`TokioProcessRunner`] is the real implementation and
//! [`MockRunner`](crate::testing::MockRunner) scripts fake processes for tests.

mod error;
mod handle;
mod tokio_runner;
mod traits;
mod types;

pub use error::RunnerError;
pub use handle::{Canceller, ProcessHandle};
pub use tokio_runner::{RunnerConfig, TokioProcessRunner};
pub use traits::ProcessRunner;
pub use types::{CommandSpec, ExitResult, OutputLine, StreamTag};
