//! Error types for the process runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while launching a process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The executable could not be started (missing binary, permissions, bad cwd).
    #[error("failed to launch {program}: {source}")]
    LaunchFailure {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    pub fn launch(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LaunchFailure {
            program: program.into(),
            source,
        }
    }

    /// Returns true if the executable itself could not be found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::LaunchFailure { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_failure_display() {
        let err = RunnerError::launch(
            "/usr/bin/python3",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(
            err.to_string(),
            "failed to launch /usr/bin/python3: no such file"
        );
        assert!(err.is_not_found());
    }
}
