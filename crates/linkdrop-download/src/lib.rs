//! Task supervision for linkdrop.
//!
//! Admits download requests, runs the external downloader for each one,
//! splits oversized artifacts and uploads the result through a
//! [`ChatTransport`](linkdrop_core::ChatTransport).
//!
//! - `registry` - admission, FIFO promotion and per-owner limits
//! - `exec` - tool selection, process control and progress parsing
//! - `progress` - throttled status edits and their text
//! - `split` - archive splitters
//! - `upload` - ordered uploads with flood retry
//! - `media` - video metadata and thumbnails
//! - `tools` - tool discovery and the updater

#![deny(unused_crate_dependencies)]

pub mod exec;
pub mod media;
pub mod progress;
pub mod registry;
pub mod split;
pub mod tools;
pub mod upload;

mod manager;

#[cfg(test)]
mod testing;

pub use manager::{
    CancelOutcome, JobOutcome, SupervisorDeps, TaskJob, TaskSupervisor, WorkerDeps, run_job,
};
pub use media::{FfmpegInspector, MediaInspector, build_media_inspector};
pub use progress::{ProgressReporter, ProgressThrottle};
pub use registry::{Admission, Cancellation, TaskLease, TaskRegistry};
pub use split::{ArchiveSplitter, SplitError, build_splitter};
pub use tools::{ToolStatus, ToolUpdater, UpdateError, UpdateReport, locate_tools, tool_version};
