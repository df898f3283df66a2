//! Configuration for the external packager.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::JobDescriptor;
use crate::runner::CommandSpec;

/// How the packager is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagerConfig {
    /// Python interpreter used to run the packager module.
    #[serde(default = "default_python_path")]
    pub python_path: PathBuf,

    /// Module run with `python -m`.
    #[serde(default = "default_module")]
    pub module: String,

    /// Emit `--clean` (drop packager caches before building).
    #[serde(default = "default_true")]
    pub clean: bool,

    /// Emit `--noconfirm` (overwrite previous output without prompting).
    #[serde(default = "default_true")]
    pub noconfirm: bool,
}

fn default_python_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("python")
    } else {
        PathBuf::from("python3")
    }
}

fn default_module() -> String {
    "PyInstaller".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            python_path: default_python_path(),
            module: default_module(),
            clean: true,
            noconfirm: true,
        }
    }
}

impl PackagerConfig {
    /// Creates a config using a specific interpreter.
    pub fn with_python(python_path: impl Into<PathBuf>) -> Self {
        Self {
            python_path: python_path.into(),
            ..Default::default()
        }
    }

    /// Sets the packager module name.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Wraps packager arguments into the full command for a job.
    ///
    /// The working directory is the script's directory so relative
    /// auxiliary paths resolve predictably.
    pub fn command(&self, job: &JobDescriptor, packager_args: Vec<String>) -> CommandSpec {
        let mut args = Vec::with_capacity(packager_args.len() + 2);
        args.push("-m".to_string());
        args.push(self.module.clone());
        args.extend(packager_args);

        CommandSpec::new(self.python_path.clone())
            .with_args(args)
            .with_working_dir(job.source_dir())
    }
}
