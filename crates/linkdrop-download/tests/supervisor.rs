//! End-to-end supervisor tests with scripted downloaders.

#![cfg(unix)]

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use linkdrop_core::{
    ChatId, MessageRef, OwnerId, Settings, TaskError, TaskRequest, TaskSource, TaskState, ToolPaths,
};
use linkdrop_download::{
    CancelOutcome, SupervisorDeps, TaskSupervisor, build_media_inspector, build_splitter,
};

use common::{FakeChat, dir_entries, wait_finished, wait_started, write_script};

/// Wget stand-in: prints dot progress, then writes 1000 bytes to `-O <path>`.
const WGET_OK: &str = r#"
echo "Length: 1000 (1K) [video/mp4]" >&2
echo "     0K ........ ........ 45%  1.00M 5s" >&2
head -c 1000 /dev/zero > "$5"
echo "     0K ........ ........ 100%  1.00M 0s" >&2
"#;

const WGET_SLOW: &str = r#"
sleep 1
head -c 1000 /dev/zero > "$5"
"#;

const TOOL_FAILS: &str = r#"
echo "ERROR 404: Not Found." >&2
exit 2
"#;

const WGET_HANGS: &str = r#"
echo "Length: 1000 (1K) [video/mp4]" >&2
exec sleep 30
"#;

struct Harness {
    _scripts: tempfile::TempDir,
    downloads: tempfile::TempDir,
    chat: Arc<FakeChat>,
    supervisor: Arc<TaskSupervisor>,
}

impl Harness {
    fn new(direct: &str, extractor: &str, tweak: impl FnOnce(&mut Settings)) -> Self {
        let scripts = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();

        let mut settings = Settings {
            status_interval: Duration::ZERO,
            cancel_grace: Duration::from_secs(2),
            download_dir: downloads.path().to_path_buf(),
            tools: ToolPaths {
                direct: write_script(scripts.path(), "wget", direct),
                extractor: write_script(scripts.path(), "yt-dlp", extractor),
                ..ToolPaths::default()
            },
            ..Settings::default()
        };
        tweak(&mut settings);

        let chat = Arc::new(FakeChat::default());
        let supervisor = TaskSupervisor::new(SupervisorDeps {
            chat: chat.clone(),
            splitter: build_splitter(&settings),
            media: build_media_inspector(&settings),
            settings: Arc::new(settings),
        });

        Self {
            _scripts: scripts,
            downloads,
            chat,
            supervisor,
        }
    }

    fn download_dir(&self) -> &Path {
        self.downloads.path()
    }
}

fn request(url: &str, message_id: i64) -> TaskRequest {
    TaskRequest {
        source: TaskSource::new(url, None),
        chat: ChatId(42),
        status_message: MessageRef::new(ChatId(42), message_id),
    }
}

#[tokio::test]
async fn test_download_completes_and_uploads() {
    let h = Harness::new(WGET_OK, TOOL_FAILS, |_| {});
    let mut events = h.supervisor.subscribe();

    let req = request("https://example.com/movie.mp4", 1);
    let target = req.status_message;
    let admission = h.supervisor.submit(OwnerId(1), req).await.unwrap();
    assert!(admission.promoted());

    let state = wait_finished(&mut events, admission.task.id).await;
    assert_eq!(state, TaskState::Completed);

    assert_eq!(h.chat.files(), vec!["movie.mp4"]);
    let edits = h.chat.edits_for(target);
    assert!(edits.iter().any(|e| e.contains("Starting")));
    assert!(edits.iter().any(|e| e.contains("45.0%")));
    assert_eq!(
        edits.iter().filter(|e| e.contains("Completed")).count(),
        1
    );
    assert!(edits.last().unwrap().contains("Completed"));

    assert!(h.supervisor.snapshot().await.is_empty());
    assert_eq!(dir_entries(h.download_dir()), 0);
}

#[tokio::test]
async fn test_failed_download_reports_exit_status_and_output() {
    let h = Harness::new(TOOL_FAILS, TOOL_FAILS, |_| {});
    let mut events = h.supervisor.subscribe();

    let req = request("https://example.com/movie.mp4", 1);
    let target = req.status_message;
    let admission = h.supervisor.submit(OwnerId(1), req).await.unwrap();

    let state = wait_finished(&mut events, admission.task.id).await;
    assert_eq!(state, TaskState::Failed);

    assert!(h.chat.files().is_empty());
    let last = h.chat.edits_for(target).pop().unwrap();
    assert!(last.contains("Failed"));
    assert!(last.contains("status 2"));
    assert!(last.contains("ERROR 404"));
    assert_eq!(dir_entries(h.download_dir()), 0);
}

#[tokio::test]
async fn test_falls_back_to_extractor() {
    let extractor = r#"
echo "[download]  50.0% of 1000.00B at 1.00KiB/s ETA 00:01"
head -c 500 /dev/zero > "Some Title.mp4"
head -c 900 /dev/zero > "Some Title.mp4.part"
"#;
    let h = Harness::new(TOOL_FAILS, extractor, |_| {});
    let mut events = h.supervisor.subscribe();

    let admission = h
        .supervisor
        .submit(OwnerId(1), request("https://example.com/movie.mp4", 1))
        .await
        .unwrap();

    let state = wait_finished(&mut events, admission.task.id).await;
    assert_eq!(state, TaskState::Completed);
    assert_eq!(h.chat.files(), vec!["Some Title.mp4"]);
}

#[tokio::test]
async fn test_cancel_running_task() {
    let h = Harness::new(WGET_HANGS, TOOL_FAILS, |_| {});
    let mut events = h.supervisor.subscribe();

    let req = request("https://example.com/movie.mp4", 1);
    let target = req.status_message;
    let admission = h.supervisor.submit(OwnerId(1), req).await.unwrap();
    let id = admission.task.id;

    wait_started(&mut events, id).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let outcome = h.supervisor.cancel(id, OwnerId(1)).await;
    assert!(matches!(
        outcome,
        CancelOutcome::Cancelled {
            was_running: true,
            ..
        }
    ));

    let state = wait_finished(&mut events, id).await;
    assert_eq!(state, TaskState::Cancelled);
    assert!(h.chat.files().is_empty());
    assert!(h.chat.edits_for(target).last().unwrap().contains("Cancelled"));
    assert_eq!(dir_entries(h.download_dir()), 0);
}

#[tokio::test]
async fn test_owner_limit_and_fifo_promotion() {
    let h = Harness::new(WGET_SLOW, TOOL_FAILS, |s| s.max_concurrent_tasks = 1);
    let mut events = h.supervisor.subscribe();

    let first = h
        .supervisor
        .submit(OwnerId(1), request("https://example.com/a.mp4", 1))
        .await
        .unwrap();
    assert!(first.promoted());

    let rejected = h
        .supervisor
        .submit(OwnerId(1), request("https://example.com/b.mp4", 2))
        .await
        .unwrap_err();
    assert!(matches!(rejected, TaskError::AdmissionRejected { .. }));

    let req = request("https://example.com/c.mp4", 3);
    let second_target = req.status_message;
    let second = h.supervisor.submit(OwnerId(2), req).await.unwrap();
    assert_eq!(second.position, Some(1));
    assert!(h.chat.edits_for(second_target)[0].contains("Queued"));

    let snapshot = h.supervisor.snapshot().await;
    assert_eq!(snapshot.running_count, 1);
    assert_eq!(snapshot.queued_count, 1);

    assert_eq!(
        wait_finished(&mut events, first.task.id).await,
        TaskState::Completed
    );
    assert_eq!(
        wait_finished(&mut events, second.task.id).await,
        TaskState::Completed
    );
    assert_eq!(h.chat.files(), vec!["a.mp4", "c.mp4"]);
}

#[tokio::test]
async fn test_oversized_artifact_is_split() {
    let h = Harness::new(WGET_OK, TOOL_FAILS, |s| {
        s.max_direct_size = 999;
        s.split_volume_size = 400;
    });
    let mut events = h.supervisor.subscribe();

    let admission = h
        .supervisor
        .submit(OwnerId(1), request("https://example.com/movie.mp4", 1))
        .await
        .unwrap();

    let state = wait_finished(&mut events, admission.task.id).await;
    assert_eq!(state, TaskState::Completed);
    assert_eq!(
        h.chat.files(),
        vec!["movie.mp4.001", "movie.mp4.002", "movie.mp4.003"]
    );
    assert_eq!(dir_entries(h.download_dir()), 0);
}

#[tokio::test]
async fn test_shutdown_cancels_everything() {
    let h = Harness::new(WGET_HANGS, TOOL_FAILS, |s| s.max_concurrent_tasks = 1);
    let mut events = h.supervisor.subscribe();

    let running = h
        .supervisor
        .submit(OwnerId(1), request("https://example.com/a.mp4", 1))
        .await
        .unwrap();
    let queued = h
        .supervisor
        .submit(OwnerId(2), request("https://example.com/b.mp4", 2))
        .await
        .unwrap();
    wait_started(&mut events, running.task.id).await;

    assert!(h.supervisor.shutdown(Duration::from_secs(10)).await);
    assert!(h.supervisor.snapshot().await.is_empty());
    assert!(
        h.chat
            .edits_for(queued.task.request.status_message)
            .last()
            .unwrap()
            .contains("Cancelled")
    );
    assert_eq!(dir_entries(h.download_dir()), 0);
}
