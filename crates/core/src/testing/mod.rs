//! Testing utilities and mock implementations.
//!
//! These let the queue be exercised end to end without a Python
//! installation: [`MockRunner`] scripts fake packager processes,
//! [`RecordingSink`] captures every event and [`MockIconConverter`] stands in
//! for image tooling.
//!
//! # Example
//!
//! ```rust,ignore
//! use exemaker_core::testing::{fixtures, MockBehavior, MockRunner, RecordingSink};
//!
//! let runner = Arc::new(MockRunner::new());
//! runner.set_behavior(&script, MockBehavior::exit(1, vec![])).await;
//!
//! let queue = JobQueue::builder(runner.clone()).sink(sink.clone()).build();
//! ```

mod mock_icon_converter;
mod mock_runner;
mod recording_sink;

pub use mock_icon_converter::MockIconConverter;
pub use mock_runner::{MockBehavior, MockRunner, RecordedLaunch};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::job::JobDescriptor;

    /// Creates a small Python script in `dir` and returns its path.
    pub fn script(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create script directory");
        }
        std::fs::write(&path, "print('hello from exemaker')\n").expect("Failed to write script");
        path
    }

    /// Creates a directory (with one file in it) to bundle as auxiliary data.
    pub fn aux_dir(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::create_dir_all(&path).expect("Failed to create aux dir");
        std::fs::write(path.join("data.txt"), "payload").expect("Failed to write aux file");
        path
    }

    /// Creates a placeholder icon file with the given name.
    pub fn icon(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, [0u8; 16]).expect("Failed to write icon");
        path
    }

    /// A descriptor for a freshly created script.
    pub fn descriptor(dir: &Path, name: &str) -> JobDescriptor {
        JobDescriptor::new(script(dir, name))
    }
}
