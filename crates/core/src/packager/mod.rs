//! Packager module: everything needed to describe one invocation of the
//! external script-to-executable packager.
//!
//! - [`ArgumentBuilder`] maps a [`JobDescriptor`](crate::job::JobDescriptor)
//!   to the packager's command-line tokens (pure, no I/O)
//! - [`VersionResource`] renders the version metadata file the packager reads
//! - [`IconConverter`] is the seam for turning `.png` icons into `.ico`
//!
//! # Example
//!
//! ```ignore
//! use exemaker_core::job::JobDescriptor;
//! use exemaker_core::packager::{ArgumentBuilder, PackagerConfig};
//!
//! let config = PackagerConfig::default();
//! let job = JobDescriptor::new("/work/app/main.py").with_file_version("1.2.0.0");
//!
//! let args = ArgumentBuilder::new(&config).build(&job)?;
//! let command = config.command(&job, args);
//! ```

mod args;
mod config;
mod icon;
mod version_info;

pub use args::{build_arguments, ArgumentBuilder};
pub use config::PackagerConfig;
pub use icon::{IconConverter, NoIconConverter};
pub use version_info::VersionResource;
