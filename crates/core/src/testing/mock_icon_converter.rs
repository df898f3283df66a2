//! Mock icon converter for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::job::JobError;
use crate::packager::IconConverter;

/// Mock implementation of the IconConverter trait.
///
/// Writes a placeholder `.ico` to the requested destination, or fails with a
/// configured reason.
#[derive(Debug, Default)]
pub struct MockIconConverter {
    fail_with: Option<String>,
    delay: Option<Duration>,
    conversions: Arc<RwLock<Vec<(PathBuf, PathBuf)>>>,
}

impl MockIconConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A converter whose every conversion fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Default::default()
        }
    }

    /// A converter that takes `delay` before writing each icon.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// `(png, dest)` pairs passed to `convert`, in order.
    pub async fn conversions(&self) -> Vec<(PathBuf, PathBuf)> {
        self.conversions.read().await.clone()
    }
}

#[async_trait]
impl IconConverter for MockIconConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(&self, png: &Path, dest: &Path) -> Result<PathBuf, JobError> {
        self.conversions
            .write()
            .await
            .push((png.to_path_buf(), dest.to_path_buf()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = &self.fail_with {
            return Err(JobError::icon_conversion(png, reason.clone()));
        }

        tokio::fs::write(dest, [0u8, 0, 1, 0])
            .await
            .map_err(|e| JobError::icon_conversion(png, e.to_string()))?;
        Ok(dest.to_path_buf())
    }
}
