//! Domain types, error taxonomy, settings and ports for linkdrop.
//!
//! This crate has no I/O. Adapters (`linkdrop-download`, `linkdrop-telegram`)
//! depend on it; it depends on none of them.

#![deny(unused_crate_dependencies)]

pub mod ports;
pub mod settings;
pub mod task;

// Re-export commonly used types for convenience
pub use ports::{ChatError, ChatTransport, FileKind, MediaInfo, OutgoingFile, UploadProgress};
pub use settings::{
    DEFAULT_CANCEL_GRACE, DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_MAX_DIRECT_SIZE,
    DEFAULT_STATUS_INTERVAL, Settings, SettingsError, SplitterKind, ToolPaths, validate_settings,
};
pub use task::{
    ChatId, MessageRef, OwnerId, ProgressSample, QueueSnapshot, QueuedTask, RejectReason, Task,
    TaskError, TaskEvent, TaskId, TaskRequest, TaskResult, TaskSource, TaskState, UploadPart,
};
