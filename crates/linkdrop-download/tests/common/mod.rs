//! Shared fixtures for supervisor integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use linkdrop_core::{
    ChatError, ChatId, ChatTransport, MessageRef, OutgoingFile, TaskEvent, TaskId, UploadProgress,
};
use tokio::sync::broadcast;

/// Chat transport that records everything and always succeeds.
#[derive(Default)]
pub struct FakeChat {
    edits: Mutex<Vec<(MessageRef, String)>>,
    files: Mutex<Vec<String>>,
    next_id: AtomicI64,
}

impl FakeChat {
    pub fn edits_for(&self, target: MessageRef) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == target)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn files(&self) -> Vec<String> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeChat {
    async fn send_message(
        &self,
        chat: ChatId,
        _text: &str,
        _cancel_for: Option<TaskId>,
    ) -> Result<MessageRef, ChatError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef::new(chat, id))
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        _cancel_for: Option<TaskId>,
    ) -> Result<(), ChatError> {
        self.edits.lock().unwrap().push((target, text.to_string()));
        Ok(())
    }

    async fn send_file(
        &self,
        _chat: ChatId,
        file: &OutgoingFile,
        progress: UploadProgress,
    ) -> Result<(), ChatError> {
        let size = tokio::fs::metadata(&file.path)
            .await
            .map_err(|e| ChatError::Io(e.to_string()))?
            .len();
        progress(size / 2, size);
        progress(size, size);
        self.files.lock().unwrap().push(file.file_name.clone());
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: &str, _text: &str) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Write an executable `#!/bin/sh` script.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Wait for the `Finished` event of `id`.
pub async fn wait_finished(
    events: &mut broadcast::Receiver<TaskEvent>,
    id: TaskId,
) -> linkdrop_core::TaskState {
    tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            if let TaskEvent::Finished { id: done, state, .. } = events.recv().await.unwrap() {
                if done == id {
                    return state;
                }
            }
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Wait for the `Started` event of `id`.
pub async fn wait_started(events: &mut broadcast::Receiver<TaskEvent>, id: TaskId) {
    tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            if let TaskEvent::Started { id: started, .. } = events.recv().await.unwrap() {
                if started == id {
                    return;
                }
            }
        }
    })
    .await
    .expect("task did not start in time");
}

/// Entries left in a directory.
pub fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}
