//! Types shared by process runner implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory; inherits the current one when unset.
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line of process output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub stream: StreamTag,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: StreamTag::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: StreamTag::Stderr,
            text: text.into(),
        }
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitResult {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Whether cancellation was requested before the process ended.
    pub cancelled: bool,
}

impl ExitResult {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            code: None,
            cancelled: true,
        }
    }

    /// True only for a normal exit with code 0 and no cancellation.
    pub fn success(&self) -> bool {
        !self.cancelled && self.code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_spaced_args() {
        let cmd = CommandSpec::new("python3").with_args(["-m", "PyInstaller", "/my app/main.py"]);
        assert_eq!(cmd.to_string(), "python3 -m PyInstaller \"/my app/main.py\"");
    }

    #[test]
    fn test_exit_result_success() {
        assert!(ExitResult::exited(0).success());
        assert!(!ExitResult::exited(1).success());
        assert!(!ExitResult::cancelled().success());
        assert!(!ExitResult {
            code: Some(0),
            cancelled: true
        }
        .success());
    }
}
