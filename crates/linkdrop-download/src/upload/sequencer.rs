//! Chunked upload sequencer.
//!
//! Uploads one file, or the parts of a split artifact strictly in order, one
//! at a time. Each part is deleted right after its own successful upload; the
//! first failure aborts the sequence and leaves the rest to the task cleanup.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use linkdrop_core::task::is_contiguous;
use linkdrop_core::{
    ChatError, ChatId, ChatTransport, OutgoingFile, TaskError, TaskResult, UploadPart,
    UploadProgress,
};

use super::retry::with_flood_retry;

/// Upload progress state shared with the status bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadTick {
    /// `(k, n)` while uploading part `k` of `n`.
    pub part: Option<(u32, u32)>,
    pub sent: u64,
    pub total: u64,
    /// Monotonically increasing sequence number for change detection.
    pub seq: u64,
}

enum SendFailure {
    Cancelled,
    Chat(ChatError),
}

/// Sends files through the chat transport with flood retry and cancellation.
#[derive(Clone)]
pub struct UploadSequencer {
    chat: Arc<dyn ChatTransport>,
}

impl UploadSequencer {
    pub fn new(chat: Arc<dyn ChatTransport>) -> Self {
        Self { chat }
    }

    /// Upload a single file.
    pub async fn upload_file(
        &self,
        chat: ChatId,
        file: &OutgoingFile,
        cancel: &CancellationToken,
        progress: &watch::Sender<UploadTick>,
    ) -> TaskResult<()> {
        match self.send(chat, file, cancel, progress, None).await {
            Ok(()) => Ok(()),
            Err(SendFailure::Cancelled) => Err(TaskError::Cancelled),
            Err(SendFailure::Chat(e)) => Err(TaskError::upload(e.to_string())),
        }
    }

    /// Upload parts in `sequence_index` order. Returns the number uploaded.
    pub async fn upload_parts(
        &self,
        chat: ChatId,
        label: &str,
        parts: &[UploadPart],
        cancel: &CancellationToken,
        progress: &watch::Sender<UploadTick>,
    ) -> TaskResult<u32> {
        if parts.is_empty() || !is_contiguous(parts) {
            return Err(TaskError::split(
                "splitter produced no parts or a numbering gap",
            ));
        }
        let count = u32::try_from(parts.len()).unwrap_or(u32::MAX);

        for part in parts {
            if cancel.is_cancelled() {
                return Err(TaskError::Cancelled);
            }

            let index = part.sequence_index;
            let file = OutgoingFile::from_path(&part.path)
                .as_document()
                .with_caption(format!("{label} · part {index}/{count}"));

            match self.send(chat, &file, cancel, progress, Some((index, count))).await {
                Ok(()) => {}
                Err(SendFailure::Cancelled) => return Err(TaskError::Cancelled),
                Err(SendFailure::Chat(e)) => {
                    tracing::warn!(part = index, count, error = %e, "Part upload failed, aborting sequence");
                    return Err(TaskError::upload_part(e.to_string(), index));
                }
            }

            if let Err(e) = tokio::fs::remove_file(&part.path).await {
                tracing::warn!(part = index, path = %part.path.display(), error = %e, "Failed to delete uploaded part");
            }
            tracing::debug!(part = index, count, size = part.size_bytes, "Part uploaded");
        }

        Ok(count)
    }

    async fn send(
        &self,
        chat: ChatId,
        file: &OutgoingFile,
        cancel: &CancellationToken,
        progress: &watch::Sender<UploadTick>,
        part: Option<(u32, u32)>,
    ) -> Result<(), SendFailure> {
        let callback = progress_callback(progress.clone(), part);

        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(SendFailure::Cancelled),

            result = with_flood_retry("send_file", || {
                self.chat.send_file(chat, file, Arc::clone(&callback))
            }) => result.map_err(SendFailure::Chat),
        }
    }
}

/// Sync transport callback that writes into the watch channel.
fn progress_callback(tx: watch::Sender<UploadTick>, part: Option<(u32, u32)>) -> UploadProgress {
    Arc::new(move |sent: u64, total: u64| {
        // send_modify avoids clone and is infallible
        tx.send_modify(|tick| {
            tick.part = part;
            tick.sent = sent;
            tick.total = total;
            tick.seq += 1;
        });
    })
}
