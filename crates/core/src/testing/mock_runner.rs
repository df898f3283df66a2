//! Mock process runner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};

use crate::runner::{
    Canceller, CommandSpec, ExitResult, OutputLine, ProcessHandle, ProcessRunner, RunnerError,
};

/// What a fake process does once launched.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Print `lines`, then exit with `code`.
    Exit { lines: Vec<OutputLine>, code: i32 },
    /// Print `lines`, then run until cancelled.
    HangUntilCancelled { lines: Vec<OutputLine> },
    /// Print `lines`, then wait for `gate` to be notified before exiting with `code`.
    Gated {
        lines: Vec<OutputLine>,
        code: i32,
        gate: Arc<Notify>,
    },
    /// Fail to launch.
    LaunchFailure,
}

impl MockBehavior {
    pub fn exit(code: i32, lines: Vec<OutputLine>) -> Self {
        Self::Exit { lines, code }
    }

    pub fn success() -> Self {
        Self::exit(0, Vec::new())
    }

    pub fn hang() -> Self {
        Self::HangUntilCancelled { lines: Vec::new() }
    }

    /// Exits with `code` once `gate.notify_one()` is called.
    pub fn gated(code: i32, gate: Arc<Notify>) -> Self {
        Self::Gated {
            lines: Vec::new(),
            code,
            gate,
        }
    }

    fn lines(&self) -> Vec<OutputLine> {
        match self {
            Self::Exit { lines, .. }
            | Self::HangUntilCancelled { lines }
            | Self::Gated { lines, .. } => lines.clone(),
            Self::LaunchFailure => Vec::new(),
        }
    }
}

/// A launch attempt recorded for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedLaunch {
    pub command: CommandSpec,
    /// The script being packaged (the final argument).
    pub source: PathBuf,
    /// Contents of the `--version-file` at launch time, if one was passed.
    pub version_file: Option<String>,
    /// Whether the icon passed with `--icon=` existed at launch time.
    pub icon_present: Option<bool>,
}

/// Mock implementation of the ProcessRunner trait.
///
/// Behaviour is chosen per script path; unknown scripts use the default
/// behaviour, which exits successfully without output.
#[derive(Debug)]
pub struct MockRunner {
    behaviors: Arc<RwLock<HashMap<PathBuf, MockBehavior>>>,
    default_behavior: Arc<RwLock<MockBehavior>>,
    launches: Arc<RwLock<Vec<RecordedLaunch>>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(RwLock::new(HashMap::new())),
            default_behavior: Arc::new(RwLock::new(MockBehavior::success())),
            launches: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the behaviour for jobs packaging `source`.
    pub async fn set_behavior(&self, source: &Path, behavior: MockBehavior) {
        self.behaviors
            .write()
            .await
            .insert(source.to_path_buf(), behavior);
    }

    /// Sets the behaviour for scripts without a specific one.
    pub async fn set_default_behavior(&self, behavior: MockBehavior) {
        *self.default_behavior.write().await = behavior;
    }

    /// All launch attempts, in order.
    pub async fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.read().await.clone()
    }

    /// Scripts launched so far, in order.
    pub async fn launched_sources(&self) -> Vec<PathBuf> {
        self.launches
            .read()
            .await
            .iter()
            .map(|l| l.source.clone())
            .collect()
    }

    /// Fake processes currently alive.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of fake processes alive at the same time.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn record(command: &CommandSpec) -> RecordedLaunch {
        let version_file = command
            .args
            .iter()
            .find_map(|a| a.strip_prefix("--version-file="))
            .and_then(|p| std::fs::read_to_string(p).ok());
        let icon_present = command
            .args
            .iter()
            .find_map(|a| a.strip_prefix("--icon="))
            .map(|p| Path::new(p).is_file());

        RecordedLaunch {
            command: command.clone(),
            source: command.args.last().map(PathBuf::from).unwrap_or_default(),
            version_file,
            icon_present,
        }
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, command: &CommandSpec) -> Result<ProcessHandle, RunnerError> {
        let launch = Self::record(command);
        let behavior = match self.behaviors.read().await.get(&launch.source) {
            Some(behavior) => behavior.clone(),
            None => self.default_behavior.read().await.clone(),
        };
        self.launches.write().await.push(launch);

        if matches!(behavior, MockBehavior::LaunchFailure) {
            return Err(RunnerError::launch(
                &command.program,
                std::io::Error::new(std::io::ErrorKind::NotFound, "mock launch failure"),
            ));
        }

        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(64);
        let canceller = Canceller::new();
        let token = canceller.clone();
        let running = self.running.clone();

        let exit = tokio::spawn(async move {
            for line in behavior.lines() {
                if tx.send(line).await.is_err() {
                    break;
                }
            }

            let result = match behavior {
                MockBehavior::Exit { code, .. } => {
                    tokio::task::yield_now().await;
                    if token.is_cancelled() {
                        ExitResult::cancelled()
                    } else {
                        ExitResult::exited(code)
                    }
                }
                MockBehavior::HangUntilCancelled { .. } => {
                    token.cancelled().await;
                    ExitResult::cancelled()
                }
                MockBehavior::Gated { code, gate, .. } => {
                    tokio::select! {
                        _ = gate.notified() => ExitResult::exited(code),
                        _ = token.cancelled() => ExitResult::cancelled(),
                    }
                }
                MockBehavior::LaunchFailure => ExitResult::exited(-1),
            };

            drop(tx);
            running.fetch_sub(1, Ordering::SeqCst);
            result
        });

        Ok(ProcessHandle::from_parts(None, rx, canceller, exit))
    }
}
