//! Minimum spacing between status edits of one task.

use std::time::Duration;
use tokio::time::Instant;

/// Tracks when a task's status message was last edited.
///
/// Reads the tokio clock, so paused-time tests drive it.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    last_edit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_edit: None,
            min_interval,
        }
    }

    /// True when nothing was emitted yet or the interval has elapsed.
    pub fn is_due(&self) -> bool {
        self.last_edit
            .is_none_or(|last| last.elapsed() >= self.min_interval)
    }

    /// Record an emission now.
    pub fn mark(&mut self) {
        self.last_edit = Some(Instant::now());
    }
}
