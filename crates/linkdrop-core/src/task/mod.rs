//! Task domain types, events, errors.
//!
//! Pure data types. No I/O, networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Identifiers, `Task` and its state machine
//! - `progress` - `ProgressSample`
//! - `upload` - `UploadPart`
//! - `errors` - `TaskError` taxonomy
//! - `queue` - Queue snapshot DTOs
//! - `events` - Lifecycle events

pub mod errors;
pub mod events;
pub mod progress;
pub mod queue;
pub mod types;
pub mod upload;

pub use errors::{RejectReason, TaskError, TaskResult};
pub use events::TaskEvent;
pub use progress::ProgressSample;
pub use queue::{QueueSnapshot, QueuedTask};
pub use types::{
    ChatId, MessageRef, OwnerId, ParseTaskIdError, Task, TaskId, TaskRequest, TaskSource,
    TaskState,
};
pub use upload::{UploadPart, is_contiguous};
