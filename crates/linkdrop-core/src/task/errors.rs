//! Task error types.
//!
//! These errors are serializable and do not depend on external error types
//! like `std::io::Error`. For I/O errors, the kind and message are captured
//! as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::TaskId;

/// Why an admission request was turned down.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The owner already has a queued or running task.
    OwnerBusy { active: TaskId },
}

/// Error type for task processing.
///
/// Every variant is caught at the per-task boundary and turned into a
/// terminal state plus one status edit; none of them stop the worker loop.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskError {
    /// The task was not admitted.
    #[error("Admission rejected: {reason:?}")]
    AdmissionRejected {
        /// Why the request was refused.
        reason: RejectReason,
    },

    /// The downloader exited non-zero or produced no output file.
    #[error("Download failed: {message}")]
    DownloadFailed {
        /// Detailed error message.
        message: String,
        /// Exit code of the tool, if it ran to completion.
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },

    /// The splitting tool exited non-zero or produced zero parts.
    #[error("Split failed: {message}")]
    SplitFailed {
        /// Detailed error message.
        message: String,
    },

    /// The chat transport rejected an upload.
    #[error("Upload failed: {message}")]
    UploadFailed {
        /// Detailed error message.
        message: String,
        /// 1-based part index when a split upload was aborted.
        #[serde(skip_serializing_if = "Option::is_none")]
        part: Option<u32>,
    },

    /// Cancelled by the requester or the bot owner.
    #[error("Task cancelled")]
    Cancelled,

    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "`NotFound`").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl TaskError {
    /// Create an owner-busy admission rejection.
    #[must_use]
    pub const fn owner_busy(active: TaskId) -> Self {
        Self::AdmissionRejected {
            reason: RejectReason::OwnerBusy { active },
        }
    }

    /// Create a download failure without an exit code.
    pub fn download(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
            exit_code: None,
        }
    }

    /// Create a download failure from a tool exit code.
    pub fn download_exit(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a split failure.
    pub fn split(message: impl Into<String>) -> Self {
        Self::SplitFailed {
            message: message.into(),
        }
    }

    /// Create an upload failure for a single-file upload.
    pub fn upload(message: impl Into<String>) -> Self {
        Self::UploadFailed {
            message: message.into(),
            part: None,
        }
    }

    /// Create an upload failure for one part of a split upload.
    pub fn upload_part(message: impl Into<String>, part: u32) -> Self {
        Self::UploadFailed {
            message: message.into(),
            part: Some(part),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short text for the final status message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AdmissionRejected {
                reason: RejectReason::OwnerBusy { active },
            } => {
                format!("You already have a task in progress ({active}). Wait for it to finish.")
            }
            Self::DownloadFailed {
                message,
                exit_code: Some(code),
            } => format!("Download failed (tool exited with status {code}): {message}"),
            Self::DownloadFailed { message, .. } => format!("Download failed: {message}"),
            Self::SplitFailed { message } => format!("Could not split the file: {message}"),
            Self::UploadFailed {
                message,
                part: Some(part),
            } => format!("Upload of part {part} failed: {message}"),
            Self::UploadFailed { message, .. } => format!("Upload failed: {message}"),
            Self::Cancelled => "Task cancelled.".to_string(),
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::Other { message } => message.clone(),
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Convenience result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;
