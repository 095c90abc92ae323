//! Queue snapshot DTOs.
//!
//! These types are "UI safe" - Clone + Debug + Serialize + Deserialize with no
//! infrastructure dependencies. The bot renders them for the `/queue` command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{OwnerId, TaskId, TaskState};

/// Snapshot of the registry for display.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Running tasks first, then queued tasks in FIFO order.
    pub items: Vec<QueuedTask>,
    /// Configured concurrency bound.
    pub max_running: u32,
    pub running_count: u32,
    pub queued_count: u32,
}

impl QueueSnapshot {
    #[must_use]
    pub const fn new(max_running: u32) -> Self {
        Self {
            items: Vec::new(),
            max_running,
            running_count: 0,
            queued_count: 0,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, id: TaskId) -> Option<&QueuedTask> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// A single task as shown in the queue listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedTask {
    pub id: TaskId,
    pub owner: OwnerId,
    /// Display name or last URL segment.
    pub label: String,
    pub state: TaskState,
    /// 1-based position among queued tasks; 0 while running.
    pub position: u32,
    pub submitted_at: DateTime<Utc>,
    /// Seconds spent running (0 while queued).
    pub elapsed_secs: u64,
}
