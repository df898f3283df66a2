//! Job descriptors: the immutable-once-queued parameters of one packaging request.
//!
//! A [`JobDescriptor`] carries everything needed to turn a single Python script
//! into an executable. Validation collects every problem it finds instead of
//! stopping at the first one, so callers can report all issues at once.

mod error;
mod types;

pub use error::JobError;
pub use types::{
    split_extra_args, AuxDir, ConsoleMode, FileVersion, HiddenImports, JobDescriptor, JobId,
    OutputMode,
};
