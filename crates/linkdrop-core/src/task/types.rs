//! Core domain types for tasks.
//!
//! Pure data types with no I/O dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Process-unique identifier for a task.
///
/// Issued from a monotonic counter by the registry, so an id is never reused
/// while the process lives. Rendered as `#<n>` for chat output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw counter value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error returned when a task id cannot be parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task id: {0:?}")]
pub struct ParseTaskIdError(String);

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ParseTaskIdError(s.to_string()))
    }
}

/// Telegram user id of whoever requested a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat a task reports into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message that can be edited later (the task's status message).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat: ChatId,
    pub message_id: i64,
}

impl MessageRef {
    #[must_use]
    pub const fn new(chat: ChatId, message_id: i64) -> Self {
        Self { chat, message_id }
    }
}

/// What to fetch: the input URL and an optional display name for the result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSource {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl TaskSource {
    pub fn new(url: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.filter(|n| !n.trim().is_empty()),
        }
    }

    /// Parse `"<url>"` or `"<url> | <display name>"`.
    ///
    /// Returns `None` unless the URL uses `http` or `https`.
    pub fn parse(text: &str) -> Option<Self> {
        let (url, name) = match text.split_once(" | ") {
            Some((url, name)) => (url.trim(), Some(name.trim().to_string())),
            None => (text.trim(), None),
        };

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return None;
        }
        if url.contains(char::is_whitespace) {
            return None;
        }

        Some(Self::new(url, name))
    }

    /// Human-readable label: the display name, or the last path segment of the URL.
    pub fn label(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        let without_query = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .map_or_else(|| self.url.clone(), ToString::to_string)
    }
}

/// Everything the worker needs to know about where a task came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub source: TaskSource,
    pub chat: ChatId,
    pub status_message: MessageRef,
}

/// Lifecycle state of a task.
///
/// ```text
/// Queued -> Running -> Completed | Failed | Cancelled
/// Queued -> Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Cancelled,
    Failed,
    Completed,
}

impl TaskState {
    /// Terminal states never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed | Self::Completed)
    }

    /// Queued or running: counts against the per-owner limit.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work: one download-then-upload request.
#[derive(Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub owner: OwnerId,
    pub request: TaskRequest,
    pub state: TaskState,
    /// When the task was admitted.
    pub queued_at: Instant,
    /// Wall-clock admission time, for display.
    pub submitted_at: DateTime<Utc>,
    /// Set on `Queued -> Running`.
    pub started_at: Option<Instant>,
}

impl Task {
    pub fn new(id: TaskId, owner: OwnerId, request: TaskRequest) -> Self {
        Self {
            id,
            owner,
            request,
            state: TaskState::Queued,
            queued_at: Instant::now(),
            submitted_at: Utc::now(),
            started_at: None,
        }
    }

    /// Time spent running so far (zero while queued).
    pub fn elapsed(&self) -> Duration {
        self.started_at.map_or(Duration::ZERO, |t| t.elapsed())
    }
}
