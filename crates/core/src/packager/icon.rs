//! Icon pre-processing seam.
//!
//! The packager only accepts `.ico` icons. Jobs carrying a `.png` icon go
//! through an [`IconConverter`] before their arguments are built; the actual
//! image tooling lives outside this crate.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::job::JobError;

/// Converts a raster image into a Windows `.ico` file.
#[async_trait]
pub trait IconConverter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts `png` into an `.ico` at `dest` and returns the written path.
    async fn convert(&self, png: &Path, dest: &Path) -> Result<PathBuf, JobError>;
}

/// Converter used when no image tooling is available. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIconConverter;

#[async_trait]
impl IconConverter for NoIconConverter {
    fn name(&self) -> &str {
        "none"
    }

    async fn convert(&self, png: &Path, _dest: &Path) -> Result<PathBuf, JobError> {
        Err(JobError::icon_conversion(
            png,
            "no icon converter is configured; supply an .ico icon instead",
        ))
    }
}
