//! Process runner built on `tokio::process`.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use super::error::RunnerError;
use super::handle::{Canceller, ProcessHandle};
use super::traits::ProcessRunner;
use super::types::{CommandSpec, ExitResult, OutputLine, StreamTag};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// How long to wait for the process to go away after a forced kill.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// How long output pumps may keep draining after the process has exited.
/// Orphaned grandchildren holding the pipes open are cut off after this.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings for [`TokioProcessRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Time between the polite stop request and the forced kill.
    pub grace_period: Duration,
    /// Capacity of the per-process output line channel.
    pub channel_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            channel_capacity: 1024,
        }
    }
}

/// Runs commands as real child processes.
///
/// On unix each child leads its own process group so cancellation reaches
/// everything the packager spawns: SIGTERM first, SIGKILL after the grace
/// period. On Windows the tree is killed with `taskkill /T /F`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    config: RunnerConfig,
}

impl TokioProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn build_command(command: &CommandSpec) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    fn name(&self) -> &str {
        "tokio"
    }

    async fn run(&self, command: &CommandSpec) -> Result<ProcessHandle, RunnerError> {
        let mut child = Self::build_command(command)
            .spawn()
            .map_err(|e| RunnerError::launch(&command.program, e))?;

        let pid = child.id();
        info!("Started process {:?}: {}", pid, command);

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, StreamTag::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, StreamTag::Stderr, tx.clone())));
        }
        drop(tx);

        let canceller = Canceller::new();
        let exit = tokio::spawn(supervise(
            child,
            canceller.clone(),
            pumps,
            self.config.grace_period,
        ));

        Ok(ProcessHandle::from_parts(pid, rx, canceller, exit))
    }
}

/// Forwards lines from one pipe until it closes or the receiver goes away.
async fn pump<R>(reader: R, stream: StreamTag, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // Packager output is not guaranteed to be UTF-8
                let text = String::from_utf8_lossy(&buf)
                    .trim_end_matches(|c| c == '\r' || c == '\n')
                    .to_string();
                if tx.send(OutputLine { stream, text }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Failed to read {} pipe: {}", stream, e);
                break;
            }
        }
    }
}

/// Waits for the child to exit or for cancellation, then drains the pumps.
async fn supervise(
    mut child: Child,
    canceller: Canceller,
    pumps: Vec<JoinHandle<()>>,
    grace_period: Duration,
) -> ExitResult {
    let code = tokio::select! {
        status = child.wait() => exit_code(status),
        _ = canceller.cancelled() => terminate(&mut child, grace_period).await,
    };

    for pump in pumps {
        let abort = pump.abort_handle();
        if timeout(DRAIN_TIMEOUT, pump).await.is_err() {
            debug!("Output still open after exit, closing stream");
            abort.abort();
        }
    }

    ExitResult {
        code,
        cancelled: canceller.is_cancelled(),
    }
}

fn exit_code(status: std::io::Result<ExitStatus>) -> Option<i32> {
    match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!("Failed to wait for process: {}", e);
            None
        }
    }
}

/// Stops the process tree: polite request, bounded grace period, forced kill.
async fn terminate(child: &mut Child, grace_period: Duration) -> Option<i32> {
    let Some(pid) = child.id() else {
        // Already reaped
        return exit_code(child.wait().await);
    };

    info!("Cancelling process {}", pid);
    request_stop(pid).await;

    match timeout(grace_period, child.wait()).await {
        Ok(status) => return exit_code(status),
        Err(_) => warn!(
            "Process {} still running after {}ms grace period, killing",
            pid,
            grace_period.as_millis()
        ),
    }

    force_kill(pid);
    if let Err(e) = child.start_kill() {
        debug!("start_kill failed for process {}: {}", pid, e);
    }

    match timeout(KILL_WAIT, child.wait()).await {
        Ok(status) => exit_code(status),
        Err(_) => {
            error!("Process {} did not exit after kill", pid);
            None
        }
    }
}

#[cfg(unix)]
async fn request_stop(pid: u32) {
    signal_group(pid, libc::SIGTERM);
}

#[cfg(windows)]
async fn request_stop(pid: u32) {
    // Windows has no polite signal for console-less children; kill the tree
    let result = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW)
        .status()
        .await;
    if let Err(e) = result {
        warn!("taskkill failed for process {}: {}", pid, e);
    }
}

#[cfg(not(any(unix, windows)))]
async fn request_stop(_pid: u32) {}

#[cfg(unix)]
fn force_kill(pid: u32) {
    signal_group(pid, libc::SIGKILL);
}

#[cfg(not(unix))]
fn force_kill(_pid: u32) {}

/// Sends `signal` to the process group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        debug!(
            "Failed to send signal {} to process group {}: {}",
            signal,
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").with_args(["-c", script])
    }

    async fn collect(handle: &mut ProcessHandle) -> Vec<OutputLine> {
        let mut lines = Vec::new();
        while let Some(line) = handle.next_line().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_streams_stdout_and_stderr() {
        let runner = TokioProcessRunner::default();
        let mut handle = runner
            .run(&sh("echo one; echo two 1>&2; printf 'three'"))
            .await
            .unwrap();

        let lines = collect(&mut handle).await;
        assert!(lines.contains(&OutputLine::stdout("one")));
        assert!(lines.contains(&OutputLine::stderr("two")));
        assert!(lines.contains(&OutputLine::stdout("three")));
        assert_eq!(handle.wait().await, ExitResult::exited(0));
    }

    #[tokio::test]
    async fn test_reports_nonzero_exit() {
        let runner = TokioProcessRunner::default();
        let mut handle = runner.run(&sh("exit 3")).await.unwrap();
        collect(&mut handle).await;
        assert_eq!(handle.wait().await, ExitResult::exited(3));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let runner = TokioProcessRunner::default();
        let err = runner
            .run(&CommandSpec::new("/nonexistent/definitely-not-here"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_working_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TokioProcessRunner::default();
        let mut handle = runner
            .run(&sh("pwd").with_working_dir(dir.path()))
            .await
            .unwrap();
        let lines = collect(&mut handle).await;
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::PathBuf::from(&lines[0].text).canonicalize().unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_long_running_process() {
        let runner = TokioProcessRunner::new(RunnerConfig {
            grace_period: Duration::from_millis(500),
            ..Default::default()
        });
        let handle = runner.run(&sh("echo started; sleep 30")).await.unwrap();
        handle.cancel();

        let result = timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("cancel should not hang");
        assert!(result.cancelled);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_cancel_escalates_when_term_is_ignored() {
        let runner = TokioProcessRunner::new(RunnerConfig {
            grace_period: Duration::from_millis(200),
            ..Default::default()
        });
        let mut handle = runner
            .run(&sh("trap '' TERM; echo ready; while true; do sleep 1; done"))
            .await
            .unwrap();

        assert_eq!(handle.next_line().await, Some(OutputLine::stdout("ready")));
        handle.cancel();

        let result = timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("forced kill should not hang");
        assert!(result.cancelled);
        assert_eq!(result.code, None);
    }
}
