//! Task lifecycle events.

use serde::{Deserialize, Serialize};

use super::types::{OwnerId, TaskId, TaskState};

/// Events broadcast by the supervisor as tasks move through their lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Admitted but waiting for a free slot.
    Queued {
        id: TaskId,
        owner: OwnerId,
        /// 1-based position among queued tasks.
        position: u32,
    },
    /// Promoted to running.
    Started { id: TaskId, owner: OwnerId },
    /// Reached a terminal state and was evicted from the registry.
    Finished {
        id: TaskId,
        owner: OwnerId,
        state: TaskState,
    },
}

impl TaskEvent {
    #[must_use]
    pub const fn id(&self) -> TaskId {
        match self {
            Self::Queued { id, .. } | Self::Started { id, .. } | Self::Finished { id, .. } => *id,
        }
    }
}
