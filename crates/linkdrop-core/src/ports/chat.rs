//! Chat transport port.
//!
//! The supervisor talks to the chat platform only through this trait. The
//! Telegram adapter lives in `linkdrop-telegram`; tests use in-memory fakes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::task::{ChatId, MessageRef, TaskId};

/// Extensions uploaded as playable video rather than a plain document.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "flv", "m4v"];

/// Sync upload progress callback: `(bytes_sent, bytes_total)`.
///
/// Called from inside the transport's body stream, so it must not block.
pub type UploadProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Errors surfaced by a chat transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// The platform asked us to back off before retrying.
    #[error("Flood control: retry after {0:?}")]
    RetryAfter(Duration),

    /// The platform rejected the request.
    #[error("API error: {0}")]
    Api(String),

    /// The request never got a response.
    #[error("Network error: {0}")]
    Network(String),

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ChatError {
    /// Backoff requested by the platform, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RetryAfter(d) => Some(*d),
            _ => None,
        }
    }
}

/// How a file is presented in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Document,
}

impl FileKind {
    /// Pick the kind from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                VIDEO_EXTENSIONS
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(ext))
            });
        if is_video { Self::Video } else { Self::Document }
    }
}

/// Stream properties of a video, as far as they could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    pub width: u32,
    pub height: u32,
}

/// A file ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub path: PathBuf,
    /// Name shown in the chat.
    pub file_name: String,
    pub caption: Option<String>,
    pub kind: FileKind,
    /// Sent along with videos so clients can show length and aspect ratio.
    pub media: Option<MediaInfo>,
    /// JPEG preview image.
    pub thumbnail: Option<PathBuf>,
}

impl OutgoingFile {
    /// Build from a path, deriving the name and kind from it.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
        let kind = FileKind::from_path(&path);
        Self {
            path,
            file_name,
            caption: None,
            kind,
            media: None,
            thumbnail: None,
        }
    }

    /// Force plain-document delivery (split archive volumes).
    #[must_use]
    pub const fn as_document(mut self) -> Self {
        self.kind = FileKind::Document;
        self
    }

    #[must_use]
    pub const fn with_media(mut self, media: MediaInfo) -> Self {
        self.media = Some(media);
        self
    }

    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<PathBuf>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Outbound chat operations used by the supervisor and the bot handlers.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a new message. With `cancel_for`, the message carries an inline
    /// cancel button for that task.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        cancel_for: Option<TaskId>,
    ) -> Result<MessageRef, ChatError>;

    /// Replace the text of an earlier message. The inline keyboard is dropped
    /// unless `cancel_for` is set.
    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        cancel_for: Option<TaskId>,
    ) -> Result<(), ChatError>;

    /// Upload a file, reporting progress through `progress`.
    async fn send_file(
        &self,
        chat: ChatId,
        file: &OutgoingFile,
        progress: UploadProgress,
    ) -> Result<(), ChatError>;

    /// Acknowledge an inline button press.
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_path(Path::new("/a/b.MP4")), FileKind::Video);
        assert_eq!(FileKind::from_path(Path::new("clip.webm")), FileKind::Video);
        assert_eq!(FileKind::from_path(Path::new("data.zip")), FileKind::Document);
        assert_eq!(FileKind::from_path(Path::new("noext")), FileKind::Document);
    }

    #[test]
    fn test_outgoing_file_from_path() {
        let file = OutgoingFile::from_path("/tmp/x/movie.mkv").with_caption("Movie");
        assert_eq!(file.file_name, "movie.mkv");
        assert_eq!(file.kind, FileKind::Video);
        assert_eq!(file.caption.as_deref(), Some("Movie"));
        assert_eq!(file.as_document().kind, FileKind::Document);
    }

    #[test]
    fn test_retry_after_accessor() {
        let err = ChatError::RetryAfter(Duration::from_secs(3));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(ChatError::Api("bad".into()).retry_after(), None);
    }
}
