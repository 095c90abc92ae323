//! Rate-limited status message reporter.
//!
//! One reporter is shared by all workers. It owns the per-task throttle state
//! so callers only hand over the text they would like to show.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use linkdrop_core::{ChatTransport, MessageRef, TaskId};

use super::throttle::ProgressThrottle;
use crate::upload::with_flood_retry;

/// Per-task reporting state.
struct ReportState {
    throttle: ProgressThrottle,
    last_text: Option<String>,
}

/// Edits task status messages, at most once per interval unless forced.
///
/// An edit is sent when the text differs from the last text sent for the task
/// and either `force` is set, no edit happened yet, or the interval has elapsed.
/// Forced edits wait out flood control once. Transport failures are logged and
/// swallowed.
pub struct ProgressReporter {
    chat: Arc<dyn ChatTransport>,
    min_interval: Duration,
    states: Mutex<HashMap<TaskId, ReportState>>,
}

impl ProgressReporter {
    pub fn new(chat: Arc<dyn ChatTransport>, min_interval: Duration) -> Self {
        Self {
            chat,
            min_interval,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Report progress for a live task. The message keeps its cancel button.
    ///
    /// Returns `true` if an edit was delivered.
    pub async fn report(&self, task: TaskId, target: MessageRef, text: &str, force: bool) -> bool {
        self.send(task, target, text, force, Some(task)).await
    }

    /// Send the final edit of a task (no cancel button) and drop its state.
    pub async fn report_final(&self, task: TaskId, target: MessageRef, text: &str) -> bool {
        let sent = self.send(task, target, text, true, None).await;
        self.forget(task).await;
        sent
    }

    /// Drop per-task state.
    pub async fn forget(&self, task: TaskId) {
        self.states.lock().await.remove(&task);
    }

    async fn send(
        &self,
        task: TaskId,
        target: MessageRef,
        text: &str,
        force: bool,
        cancel_for: Option<TaskId>,
    ) -> bool {
        {
            let mut states = self.states.lock().await;
            let state = states.entry(task).or_insert_with(|| ReportState {
                throttle: ProgressThrottle::new(self.min_interval),
                last_text: None,
            });

            if state.last_text.as_deref() == Some(text) {
                return false;
            }
            if !force && !state.throttle.is_due() {
                return false;
            }

            state.throttle.mark();
            state.last_text = Some(text.to_string());
        }

        let edit = || self.chat.edit_message(target, text, cancel_for);
        let result = if force {
            with_flood_retry("edit status", edit).await
        } else {
            edit().await
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(task = %task, error = %e, "Status edit failed");
                false
            }
        }
    }
}
