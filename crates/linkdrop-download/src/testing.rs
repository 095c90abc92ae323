//! In-memory chat transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use linkdrop_core::{ChatError, ChatId, ChatTransport, MessageRef, OutgoingFile, TaskId, UploadProgress};

/// One recorded edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEdit {
    pub target: MessageRef,
    pub text: String,
    pub cancel_for: Option<TaskId>,
}

/// Records every call; file uploads succeed unless a scripted result says otherwise.
#[derive(Default)]
pub struct RecordingChat {
    pub edits: Mutex<Vec<RecordedEdit>>,
    pub files: Mutex<Vec<OutgoingFile>>,
    pub messages: Mutex<Vec<(ChatId, String)>>,
    file_results: Mutex<VecDeque<Result<(), ChatError>>>,
    edit_results: Mutex<VecDeque<Result<(), ChatError>>>,
    fail_edits: AtomicBool,
    next_message_id: AtomicI64,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for upcoming `send_file` calls, in order.
    pub fn script_files(&self, results: impl IntoIterator<Item = Result<(), ChatError>>) {
        self.file_results.lock().unwrap().extend(results);
    }

    /// Queue results for upcoming `edit_message` calls, in order.
    pub fn script_edits(&self, results: impl IntoIterator<Item = Result<(), ChatError>>) {
        self.edit_results.lock().unwrap().extend(results);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.text.clone())
            .collect()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.file_name.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        _cancel_for: Option<TaskId>,
    ) -> Result<MessageRef, ChatError> {
        self.messages.lock().unwrap().push((chat, text.to_string()));
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef::new(chat, id))
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        cancel_for: Option<TaskId>,
    ) -> Result<(), ChatError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(ChatError::Network("connection reset".into()));
        }
        let scripted = self.edit_results.lock().unwrap().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        self.edits.lock().unwrap().push(RecordedEdit {
            target,
            text: text.to_string(),
            cancel_for,
        });
        Ok(())
    }

    async fn send_file(
        &self,
        _chat: ChatId,
        file: &OutgoingFile,
        progress: UploadProgress,
    ) -> Result<(), ChatError> {
        let scripted = self.file_results.lock().unwrap().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        let size = std::fs::metadata(&file.path)
            .map_err(|e| ChatError::Io(e.to_string()))?
            .len();
        progress(size, size);
        self.files.lock().unwrap().push(file.clone());
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: &str, _text: &str) -> Result<(), ChatError> {
        Ok(())
    }
}
