pub mod config;
pub mod job;
pub mod packager;
pub mod queue;
pub mod runner;
pub mod testing;

pub use config::{
    config_path_from_env, load_config, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig, ServerConfig,
};
pub use job::{
    split_extra_args, AuxDir, ConsoleMode, FileVersion, HiddenImports, JobDescriptor, JobError,
    JobId, OutputMode,
};
pub use packager::{build_arguments, ArgumentBuilder, IconConverter, NoIconConverter, PackagerConfig};
pub use queue::{
    Artifact, BroadcastSink, ChannelSink, JobQueue, JobQueueBuilder, JobSink, JobSnapshot,
    JobStatus, LogRecord, QueueConfig, QueueError, QueueEvent, QueueSummary, RunState,
    TracingSink,
};
pub use runner::{
    CommandSpec, ExitResult, OutputLine, ProcessHandle, ProcessRunner, RunnerConfig, RunnerError,
    StreamTag, TokioProcessRunner,
};
