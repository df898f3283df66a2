//! Job queue implementation.
//!
//! The queue is the only writer of job status and of the session log. Each
//! dispatched job runs in its own task that feeds output lines back into the
//! queue; the shared state sits behind one mutex that is never held across an
//! `.await`.

use chrono::Utc;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job::{JobDescriptor, JobError, JobId, OutputMode};
use crate::packager::{
    ArgumentBuilder, IconConverter, NoIconConverter, PackagerConfig, VersionResource,
};
use crate::runner::{CommandSpec, OutputLine, ProcessRunner, StreamTag};

use super::config::QueueConfig;
use super::events::{JobSink, QueueEvent};
use super::progress;
use super::types::{
    Artifact, JobSnapshot, JobStatus, LogRecord, QueueError, QueueSummary, RunState,
};

/// One job as tracked by the queue.
struct JobEntry {
    id: JobId,
    descriptor: JobDescriptor,
    status: JobStatus,
    progress: u8,
    enqueued_at: chrono::DateTime<Utc>,
    started_at: Option<chrono::DateTime<Utc>>,
    finished_at: Option<chrono::DateTime<Utc>>,
    /// Picked up by the dispatcher; the descriptor is frozen from here on.
    claimed: bool,
    /// Its task has not finished cleaning up yet.
    in_flight: bool,
    cancel: CancellationToken,
    stderr_tail: VecDeque<String>,
}

impl JobEntry {
    fn new(descriptor: JobDescriptor) -> Self {
        Self {
            id: JobId::new(),
            descriptor,
            status: JobStatus::Pending,
            progress: 0,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            claimed: false,
            in_flight: false,
            cancel: CancellationToken::new(),
            stderr_tail: VecDeque::new(),
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            descriptor: self.descriptor.clone(),
            status: self.status.clone(),
            progress: self.progress,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    /// Whether this job counts against the concurrency bound.
    fn occupies_slot(&self) -> bool {
        self.in_flight
    }

    /// Whether the job can still be edited or removed.
    fn is_unclaimed_pending(&self) -> bool {
        !self.claimed && self.status == JobStatus::Pending
    }
}

#[derive(Default)]
struct QueueState {
    jobs: Vec<JobEntry>,
    log: Vec<LogRecord>,
    run_state: RunState,
    cancel_requested: bool,
}

impl QueueState {
    fn find_mut(&mut self, id: JobId) -> Option<&mut JobEntry> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    fn has_active_source(&self, source: &Path, except: Option<JobId>) -> bool {
        self.jobs.iter().any(|j| {
            Some(j.id) != except && j.status.is_active() && j.descriptor.source == source
        })
    }
}

struct Inner {
    config: QueueConfig,
    packager: PackagerConfig,
    builder: ArgumentBuilder,
    runner: Arc<dyn ProcessRunner>,
    icons: Arc<dyn IconConverter>,
    sinks: Vec<Arc<dyn JobSink>>,
    state: Mutex<QueueState>,
    run_state_tx: watch::Sender<RunState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panicking sink must not take the whole queue down with it
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: QueueEvent) {
        for sink in &self.sinks {
            sink.notify(&event);
        }
    }

    /// Moves a job to `new`. Terminal statuses are final.
    fn set_status(&self, entry: &mut JobEntry, new: JobStatus) -> bool {
        if entry.status.is_terminal() {
            warn!(
                "Ignoring transition of job {} from {} to {}",
                entry.id, entry.status, new
            );
            return false;
        }

        let now = Utc::now();
        if new == JobStatus::Running {
            entry.started_at = Some(now);
        } else if new.is_terminal() {
            entry.finished_at = Some(now);
        }

        let old = std::mem::replace(&mut entry.status, new.clone());
        self.emit(QueueEvent::StatusChanged {
            job_id: entry.id,
            old,
            new,
        });
        true
    }

    fn set_run_state(&self, state: &mut QueueState, new: RunState) {
        let old = state.run_state;
        if old == new {
            return;
        }
        state.run_state = new;
        self.run_state_tx.send_replace(new);
        info!("Queue run state {} -> {}", old, new);
        self.emit(QueueEvent::RunStateChanged { old, new });
    }

    /// Ends the current run once nothing occupies a slot any more.
    fn maybe_finish(&self, state: &mut QueueState) {
        if state.run_state != RunState::Running {
            return;
        }
        if state.jobs.iter().any(JobEntry::occupies_slot) {
            return;
        }

        if state.cancel_requested {
            self.set_run_state(state, RunState::CancelledAll);
        } else if !state.jobs.iter().any(|j| j.status == JobStatus::Pending) {
            self.set_run_state(state, RunState::Completed);
        }
    }
}

/// Builder for [`JobQueue`].
pub struct JobQueueBuilder {
    config: QueueConfig,
    packager: PackagerConfig,
    runner: Arc<dyn ProcessRunner>,
    icons: Arc<dyn IconConverter>,
    sinks: Vec<Arc<dyn JobSink>>,
}

impl JobQueueBuilder {
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn packager(mut self, packager: PackagerConfig) -> Self {
        self.packager = packager;
        self
    }

    pub fn icon_converter(mut self, icons: Arc<dyn IconConverter>) -> Self {
        self.icons = icons;
        self
    }

    /// Registers a sink. Sinks are notified in registration order.
    pub fn sink(mut self, sink: Arc<dyn JobSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> JobQueue {
        let (run_state_tx, _) = watch::channel(RunState::Idle);
        JobQueue {
            inner: Arc::new(Inner {
                builder: ArgumentBuilder::new(&self.packager),
                config: self.config,
                packager: self.packager,
                runner: self.runner,
                icons: self.icons,
                sinks: self.sinks,
                state: Mutex::new(QueueState::default()),
                run_state_tx,
            }),
        }
    }
}

/// Ordered queue of packaging jobs with bounded-concurrency dispatch.
///
/// Cheap to clone; clones share the same queue. Operations that dispatch
/// jobs (`enqueue` while running, `start`) spawn tasks and must be called
/// from within a tokio runtime.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    /// Creates a queue with no sinks and no icon converter.
    pub fn new(config: QueueConfig, packager: PackagerConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self::builder(runner).config(config).packager(packager).build()
    }

    pub fn builder(runner: Arc<dyn ProcessRunner>) -> JobQueueBuilder {
        JobQueueBuilder {
            config: QueueConfig::default(),
            packager: PackagerConfig::default(),
            runner,
            icons: Arc::new(NoIconConverter),
            sinks: Vec::new(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Adds a job at the end of the queue.
    ///
    /// The descriptor is fully validated first. If a run is in progress the
    /// job is picked up as soon as a slot is free.
    pub fn enqueue(&self, descriptor: JobDescriptor) -> Result<JobId, QueueError> {
        descriptor.validate()?;

        let (id, running) = {
            let mut state = self.inner.lock();
            if state.has_active_source(&descriptor.source, None) {
                return Err(QueueError::DuplicateSource {
                    path: descriptor.source,
                });
            }

            let entry = JobEntry::new(descriptor);
            let id = entry.id;
            info!("Enqueued job {} for {}", id, entry.descriptor.source.display());
            self.inner.emit(QueueEvent::JobAdded {
                job: entry.snapshot(),
            });
            state.jobs.push(entry);
            (id, state.run_state == RunState::Running)
        };

        if running {
            self.dispatch();
        }
        Ok(id)
    }

    /// Removes a job that has not started yet.
    pub fn remove(&self, id: JobId) -> Result<JobSnapshot, QueueError> {
        let mut state = self.inner.lock();
        let idx = state
            .jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or(QueueError::JobNotFound(id))?;

        let entry = &state.jobs[idx];
        if !entry.is_unclaimed_pending() {
            return Err(QueueError::invalid_state("remove job", job_state(entry)));
        }

        let entry = state.jobs.remove(idx);
        info!("Removed job {}", id);
        self.inner.maybe_finish(&mut state);
        Ok(entry.snapshot())
    }

    /// Replaces the descriptor of a job that has not started yet.
    pub fn update(&self, id: JobId, descriptor: JobDescriptor) -> Result<JobSnapshot, QueueError> {
        descriptor.validate()?;

        let mut state = self.inner.lock();
        let entry = state
            .jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or(QueueError::JobNotFound(id))?;
        if !entry.is_unclaimed_pending() {
            return Err(QueueError::invalid_state("edit job", job_state(entry)));
        }
        if state.has_active_source(&descriptor.source, Some(id)) {
            return Err(QueueError::DuplicateSource {
                path: descriptor.source,
            });
        }

        let entry = state
            .find_mut(id)
            .ok_or(QueueError::JobNotFound(id))?;
        entry.descriptor = descriptor;
        debug!("Updated job {}", id);
        Ok(entry.snapshot())
    }

    /// Starts a run: `Idle`, `Completed` or `CancelledAll` -> `Running`.
    pub fn start(&self) -> Result<(), QueueError> {
        {
            let mut state = self.inner.lock();
            if !state.run_state.can_start() {
                return Err(QueueError::invalid_state("start queue", state.run_state));
            }
            if !state.jobs.iter().any(|j| j.status == JobStatus::Pending) {
                return Err(QueueError::invalid_state(
                    "start queue",
                    "no jobs are pending",
                ));
            }

            state.cancel_requested = false;
            self.inner.set_run_state(&mut state, RunState::Running);
        }

        self.dispatch();
        Ok(())
    }

    /// Cancels everything that has not finished.
    ///
    /// Jobs that never started become `Cancelled` immediately; running jobs
    /// are signalled and become `Cancelled` once their process has ended.
    /// Does not wait. Calling it again, or with nothing active, is a no-op.
    pub fn cancel_all(&self) {
        let mut state = self.inner.lock();
        if !state.jobs.iter().any(|j| j.status.is_active()) {
            return;
        }

        if state.run_state == RunState::Running {
            state.cancel_requested = true;
        }

        let mut cancelled = 0;
        let mut signalled = 0;
        for entry in state.jobs.iter_mut() {
            if entry.status == JobStatus::Pending {
                // A claimed job still preparing keeps its slot until its
                // task has cleaned up
                entry.cancel.cancel();
                if self.inner.set_status(entry, JobStatus::Cancelled) {
                    cancelled += 1;
                }
            } else if entry.occupies_slot() && !entry.cancel.is_cancelled() {
                entry.cancel.cancel();
                signalled += 1;
            }
        }

        info!(
            "Cancel requested: {} pending jobs cancelled, {} running jobs signalled",
            cancelled, signalled
        );
        self.inner.maybe_finish(&mut state);
    }

    /// All jobs in enqueue order.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.inner.lock().jobs.iter().map(JobEntry::snapshot).collect()
    }

    pub fn job(&self, id: JobId) -> Option<JobSnapshot> {
        self.inner
            .lock()
            .jobs
            .iter()
            .find(|j| j.id == id)
            .map(JobEntry::snapshot)
    }

    /// Output lines captured for one job, in emission order.
    pub fn log(&self, id: JobId) -> Result<Vec<LogRecord>, QueueError> {
        let state = self.inner.lock();
        if !state.jobs.iter().any(|j| j.id == id) {
            return Err(QueueError::JobNotFound(id));
        }
        Ok(state
            .log
            .iter()
            .filter(|r| r.job_id == id)
            .cloned()
            .collect())
    }

    /// Every output line captured this session.
    pub fn log_records(&self) -> Vec<LogRecord> {
        self.inner.lock().log.clone()
    }

    pub fn run_state(&self) -> RunState {
        self.inner.lock().run_state
    }

    pub fn summary(&self) -> QueueSummary {
        let state = self.inner.lock();
        let mut summary = QueueSummary::default();
        for entry in &state.jobs {
            summary.add(&entry.status);
        }
        summary
    }

    /// Subscribes to run state changes.
    pub fn watch_run_state(&self) -> watch::Receiver<RunState> {
        self.inner.run_state_tx.subscribe()
    }

    /// Waits until no run is in progress and returns the resulting state.
    pub async fn wait_until_finished(&self) -> RunState {
        let mut rx = self.watch_run_state();
        loop {
            let current = *rx.borrow_and_update();
            if current != RunState::Running {
                return current;
            }
            if rx.changed().await.is_err() {
                return self.run_state();
            }
        }
    }

    /// Claims pending jobs up to the concurrency bound and spawns them.
    fn dispatch(&self) {
        let claimed = {
            let mut state = self.inner.lock();
            if state.run_state != RunState::Running || state.cancel_requested {
                return;
            }

            let limit = self.inner.config.max_concurrent_jobs.max(1);
            let mut slots = state.jobs.iter().filter(|j| j.occupies_slot()).count();
            let mut in_use: Vec<PathBuf> = state
                .jobs
                .iter()
                .filter(|j| j.occupies_slot())
                .flat_map(|j| j.descriptor.write_locations())
                .collect();

            let mut claimed = Vec::new();
            for entry in state.jobs.iter_mut() {
                if slots >= limit {
                    break;
                }
                if !entry.is_unclaimed_pending() {
                    continue;
                }

                // Two packager runs writing to the same place must not overlap
                let locations = entry.descriptor.write_locations();
                if let Some(busy) = locations.iter().find(|l| in_use.contains(l)) {
                    debug!(
                        "Holding job {}: {} is in use",
                        entry.id,
                        busy.display()
                    );
                    continue;
                }

                entry.claimed = true;
                entry.in_flight = true;
                slots += 1;
                in_use.extend(locations);
                claimed.push((entry.id, entry.descriptor.clone(), entry.cancel.clone()));
            }

            self.inner.maybe_finish(&mut state);
            claimed
        };

        for (id, descriptor, cancel) in claimed {
            debug!("Dispatching job {}", id);
            let queue = self.clone();
            tokio::spawn(async move {
                queue.run_job(id, descriptor, cancel).await;
            });
        }
    }

    async fn run_job(&self, id: JobId, descriptor: JobDescriptor, cancel: CancellationToken) {
        let mut temp_files = Vec::new();
        let status = self
            .execute(id, descriptor, &cancel, &mut temp_files)
            .await;
        remove_temp_files(&temp_files).await;

        {
            let mut state = self.inner.lock();
            if let Some(entry) = state.find_mut(id) {
                entry.in_flight = false;
                if entry.status.is_terminal() {
                    debug!("Job {} was cancelled before launch, cleanup done", id);
                } else {
                    if matches!(status, JobStatus::Succeeded { .. }) && entry.progress < 100 {
                        entry.progress = 100;
                        self.inner.emit(QueueEvent::Progress {
                            job_id: id,
                            percent: 100,
                        });
                    }
                    self.inner.set_status(entry, status);
                }
            }
            self.inner.maybe_finish(&mut state);
        }

        self.dispatch();
    }

    /// Runs one job to completion and returns its terminal status.
    async fn execute(
        &self,
        id: JobId,
        mut job: JobDescriptor,
        cancel: &CancellationToken,
        temp_files: &mut Vec<PathBuf>,
    ) -> JobStatus {
        let prepared = tokio::select! {
            prepared = self.prepare(&mut job, temp_files) => prepared,
            _ = cancel.cancelled() => return JobStatus::Cancelled,
        };
        let command = match prepared {
            Ok(command) => command,
            Err(e) => {
                let e = e.into_configuration();
                warn!("Job {} failed pre-flight checks: {}", id, e);
                return JobStatus::Failed {
                    exit_code: None,
                    error: e.to_string(),
                };
            }
        };

        if cancel.is_cancelled() {
            return JobStatus::Cancelled;
        }

        info!("Job {} running: {}", id, command);
        let mut handle = match self.inner.runner.run(&command).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Job {} could not be launched: {}", id, e);
                return JobStatus::Failed {
                    exit_code: None,
                    error: e.to_string(),
                };
            }
        };

        {
            let mut state = self.inner.lock();
            if let Some(entry) = state.find_mut(id) {
                // Cancelled while launching; the select below stops it
                if entry.status == JobStatus::Pending {
                    self.inner.set_status(entry, JobStatus::Running);
                }
            }
        }

        let canceller = handle.canceller();
        loop {
            tokio::select! {
                _ = cancel.cancelled(), if !canceller.is_cancelled() => {
                    debug!("Job {} cancelled, stopping process", id);
                    canceller.cancel();
                }
                line = handle.next_line() => match line {
                    Some(line) => self.record_line(id, line),
                    None => break,
                },
            }
        }

        let exit = handle.wait().await;
        if exit.cancelled || cancel.is_cancelled() {
            JobStatus::Cancelled
        } else if exit.code == Some(0) {
            JobStatus::Succeeded {
                artifact: find_artifact(&job).await,
            }
        } else {
            JobStatus::Failed {
                exit_code: exit.code,
                error: self.failure_summary(id, exit.code),
            }
        }
    }

    /// Icon conversion, argument building and version file, in that order.
    async fn prepare(
        &self,
        job: &mut JobDescriptor,
        temp_files: &mut Vec<PathBuf>,
    ) -> Result<CommandSpec, JobError> {
        if job.icon_needs_conversion() {
            if let Some(icon) = job.icon.clone() {
                let dest = job.converted_icon_path();
                temp_files.push(dest.clone());
                let converted = self.inner.icons.convert(&icon, &dest).await?;
                debug!("Converted icon {} to {}", icon.display(), converted.display());
                job.converted_icon = Some(converted);
            }
        }

        let args = self.inner.builder.build(job)?;

        if let Some(resource) = VersionResource::from_job(job)? {
            let path = job.version_file_path();
            temp_files.push(path.clone());
            resource.write_to(&path).await.map_err(|e| {
                JobError::invalid(format!(
                    "failed to write version file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        Ok(self.inner.packager.command(job, args))
    }

    fn record_line(&self, id: JobId, line: OutputLine) {
        let tail_len = self.inner.config.stderr_tail_lines;
        let mut state = self.inner.lock();
        let QueueState { jobs, log, .. } = &mut *state;
        let Some(entry) = jobs.iter_mut().find(|j| j.id == id) else {
            return;
        };

        if line.stream == StreamTag::Stderr && tail_len > 0 {
            entry.stderr_tail.push_back(line.text.clone());
            while entry.stderr_tail.len() > tail_len {
                entry.stderr_tail.pop_front();
            }
        }

        let advanced = progress::estimate(&line.text).filter(|p| *p > entry.progress);

        let record = LogRecord {
            job_id: id,
            timestamp: Utc::now(),
            stream: line.stream,
            text: line.text,
        };
        log.push(record.clone());
        self.inner.emit(QueueEvent::Log(record));

        if let Some(percent) = advanced {
            entry.progress = percent;
            self.inner.emit(QueueEvent::Progress {
                job_id: id,
                percent,
            });
        }
    }

    fn failure_summary(&self, id: JobId, code: Option<i32>) -> String {
        let mut state = self.inner.lock();
        let tail = state
            .find_mut(id)
            .map(|entry| entry.stderr_tail.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();

        if !tail.is_empty() {
            return tail;
        }
        match code {
            Some(code) => format!("packager exited with code {}", code),
            None => "packager terminated without an exit code".to_string(),
        }
    }
}

/// Describes why a job can no longer be edited.
fn job_state(entry: &JobEntry) -> String {
    if entry.claimed && entry.status == JobStatus::Pending {
        "starting".to_string()
    } else {
        entry.status.to_string()
    }
}

/// Locates the executable a successful job produced.
async fn find_artifact(job: &JobDescriptor) -> Option<Artifact> {
    let path = job.expected_executable();
    let exists = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);

    if !exists {
        warn!(
            "Packager reported success but {} was not found",
            path.display()
        );
        return None;
    }

    let size_bytes = match job.output_mode {
        OutputMode::SingleFile => tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0),
        OutputMode::SingleDirectory => match path.parent() {
            Some(dir) => dir_size(dir).await,
            None => 0,
        },
    };

    Some(Artifact { path, size_bytes })
}

/// Total size of all files below `root`.
async fn dir_size(root: &Path) -> u64 {
    let mut total = 0;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read {}: {}", dir.display(), e);
                continue;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => pending.push(entry.path()),
                Ok(ft) if ft.is_file() => {
                    total += entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                }
                _ => {}
            }
        }
    }

    total
}

async fn remove_temp_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
