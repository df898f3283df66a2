//! Error types for job descriptors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while checking or preparing a job before launch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// One or more job parameters are malformed.
    #[error("invalid configuration: {}", .issues.join("; "))]
    InvalidConfiguration { issues: Vec<String> },

    /// The icon pre-processing step could not produce an `.ico` file.
    #[error("icon conversion failed for {path}: {reason}")]
    IconConversionFailed { path: PathBuf, reason: String },
}

impl JobError {
    /// Creates an invalid configuration error with a single issue.
    pub fn invalid(issue: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            issues: vec![issue.into()],
        }
    }

    /// Creates an icon conversion error.
    pub fn icon_conversion(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IconConversionFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the individual issues described by this error.
    pub fn issues(&self) -> Vec<String> {
        match self {
            Self::InvalidConfiguration { issues } => issues.clone(),
            Self::IconConversionFailed { .. } => vec![self.to_string()],
        }
    }

    /// Folds this error into an `InvalidConfiguration` for the owning job.
    pub fn into_configuration(self) -> Self {
        match self {
            Self::InvalidConfiguration { .. } => self,
            Self::IconConversionFailed { .. } => Self::InvalidConfiguration {
                issues: self.issues(),
            },
        }
    }
}
