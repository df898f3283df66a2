//! Handle to a running process.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::types::{ExitResult, OutputLine};

/// Cloneable cancellation signal for one process.
///
/// Cancelling is idempotent; later calls are no-ops.
#[derive(Debug, Clone, Default)]
pub struct Canceller {
    token: CancellationToken,
}

impl Canceller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// A launched process: its output stream, its cancel signal and its exit.
///
/// The line stream ends once both output pipes are closed, which happens at
/// the latest shortly after the process has exited.
pub struct ProcessHandle {
    pid: Option<u32>,
    lines: mpsc::Receiver<OutputLine>,
    canceller: Canceller,
    exit: JoinHandle<ExitResult>,
}

impl ProcessHandle {
    /// Assembles a handle from its parts. Runner implementations own the
    /// sending half of `lines` and resolve `exit` when the process ends.
    pub fn from_parts(
        pid: Option<u32>,
        lines: mpsc::Receiver<OutputLine>,
        canceller: Canceller,
        exit: JoinHandle<ExitResult>,
    ) -> Self {
        Self {
            pid,
            lines,
            canceller,
            exit,
        }
    }

    /// OS process id, if known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next output line, or `None` once the stream has ended.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Requests termination of the process tree.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Waits for the process to end. Unread output is discarded.
    pub async fn wait(self) -> ExitResult {
        let Self {
            lines,
            canceller,
            exit,
            ..
        } = self;
        drop(lines);

        match exit.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Process supervisor task failed: {}", e);
                ExitResult {
                    code: None,
                    cancelled: canceller.is_cancelled(),
                }
            }
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("cancelled", &self.canceller.is_cancelled())
            .finish()
    }
}
