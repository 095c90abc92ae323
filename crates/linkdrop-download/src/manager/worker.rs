//! Task worker pipeline.
//!
//! This module contains the per-task execution logic, isolated from the
//! registry. The worker operates on value types and cloned Arc dependencies,
//! with no access to the supervisor's locks.
//!
//! # Design Principles
//!
//! - Worker receives a `TaskJob` (value type) and `WorkerDeps` (cloned Arcs)
//! - Cancellation is handled via `tokio::select!` around every process and
//!   chat await
//! - The work directory is removed on every exit path
//! - The final status edit and slot release belong to the supervisor

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use linkdrop_core::{
    ChatTransport, FileKind, MessageRef, OutgoingFile, Settings, Task, TaskError, TaskId,
    TaskResult, TaskState,
};

use crate::exec::command::sanitize_file_name;
use crate::exec::{CommandSpec, ProcessAdapter, ToolSelector, parser_for};
use crate::media::{MediaInspector, describe_media};
use crate::progress::ProgressReporter;
use crate::progress::render::{render_download, render_splitting, render_starting, render_upload};
use crate::split::ArchiveSplitter;
use crate::upload::{UploadSequencer, UploadTick};

/// Output lines kept for failure messages.
const TAIL_LINES: usize = 3;

/// Leftovers of interrupted tools that are never the artifact.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".aria2", ".tmp"];

/// Dependencies for the task worker.
///
/// These are cloned Arc references, allowing the worker to operate
/// independently of the supervisor's state.
#[derive(Clone)]
pub struct WorkerDeps {
    pub chat: Arc<dyn ChatTransport>,
    pub reporter: Arc<ProgressReporter>,
    pub splitter: Arc<dyn ArchiveSplitter>,
    pub media: Arc<dyn MediaInspector>,
    pub selector: ToolSelector,
    pub adapter: ProcessAdapter,
    pub settings: Arc<Settings>,
}

/// A promoted task to be executed by the worker.
pub struct TaskJob {
    pub task: Task,
    pub cancel: CancellationToken,
}

/// How a job ended, before the registry has the final word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub state: TaskState,
    pub error: Option<TaskError>,
}

impl JobOutcome {
    pub const fn completed() -> Self {
        Self {
            state: TaskState::Completed,
            error: None,
        }
    }

    pub const fn cancelled() -> Self {
        Self {
            state: TaskState::Cancelled,
            error: None,
        }
    }

    pub const fn failed(error: TaskError) -> Self {
        Self {
            state: TaskState::Failed,
            error: Some(error),
        }
    }
}

/// Per-job context threaded through the pipeline steps.
struct JobContext<'a> {
    job: &'a TaskJob,
    deps: &'a WorkerDeps,
    label: String,
    started: Instant,
}

impl JobContext<'_> {
    const fn id(&self) -> TaskId {
        self.job.task.id
    }

    const fn target(&self) -> MessageRef {
        self.job.task.request.status_message
    }

    fn checkpoint(&self) -> TaskResult<()> {
        if self.job.cancel.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn report(&self, text: &str, force: bool) {
        self.deps
            .reporter
            .report(self.id(), self.target(), text, force)
            .await;
    }
}

/// Run a task to completion.
///
/// Executes download, size check, direct or split upload, and cleanup of the
/// work directory. Never panics on task errors; every failure becomes the
/// returned outcome.
pub async fn run_job(job: TaskJob, deps: WorkerDeps) -> JobOutcome {
    let ctx = JobContext {
        label: job.task.request.source.label(),
        job: &job,
        deps: &deps,
        started: Instant::now(),
    };
    let id = ctx.id();

    let work = match create_work_dir(&deps.settings.download_dir, id).await {
        Ok(work) => work,
        Err(e) => {
            tracing::error!(task = %id, error = %e, "Failed to create work directory");
            return JobOutcome::failed(e);
        }
    };

    let result = execute(&ctx, work.path()).await;

    let work_path = work.path().to_path_buf();
    if let Err(e) = work.close() {
        tracing::warn!(task = %id, path = %work_path.display(), error = %e, "Failed to remove work directory");
    }

    match result {
        Ok(()) => {
            tracing::info!(task = %id, elapsed = ?ctx.started.elapsed(), "Task completed");
            JobOutcome::completed()
        }
        Err(e) if e.is_cancelled() || job.cancel.is_cancelled() => {
            tracing::info!(task = %id, "Task cancelled");
            JobOutcome::cancelled()
        }
        Err(e) => {
            tracing::warn!(task = %id, error = %e, "Task failed");
            JobOutcome::failed(e)
        }
    }
}

async fn create_work_dir(parent: &Path, id: TaskId) -> TaskResult<tempfile::TempDir> {
    tokio::fs::create_dir_all(parent).await?;
    let work = tempfile::Builder::new()
        .prefix(&format!("task-{}-", id.get()))
        .tempdir_in(parent)?;
    tokio::fs::create_dir(work.path().join("download")).await?;
    Ok(work)
}

async fn execute(ctx: &JobContext<'_>, work: &Path) -> TaskResult<()> {
    let artifact = download(ctx, &work.join("download")).await?;
    ctx.checkpoint()?;

    let size = tokio::fs::metadata(&artifact).await?.len();
    tracing::info!(task = %ctx.id(), path = %artifact.display(), size, "Download finished");

    deliver(ctx, &artifact, size, work).await
}

/// Try each command plan in order; the first one that leaves a file wins.
async fn download(ctx: &JobContext<'_>, dir: &Path) -> TaskResult<PathBuf> {
    let plans = ctx
        .deps
        .selector
        .plan(&ctx.job.task.request.source, dir);
    let mut last_error = TaskError::download("no downloader available");

    for (attempt, spec) in plans.iter().enumerate() {
        ctx.checkpoint()?;
        if attempt > 0 {
            tracing::info!(task = %ctx.id(), tool = %spec.family, "Falling back to next downloader");
            clear_dir(dir).await?;
        }

        ctx.report(&render_starting(ctx.id(), &ctx.label, spec.family.as_str()), true)
            .await;

        match run_plan(ctx, spec).await {
            Ok(()) => match locate_artifact(dir).await? {
                Some(path) => return apply_display_name(ctx, path).await,
                None => {
                    last_error = TaskError::download(format!("{} produced no output file", spec.family));
                }
            },
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!(task = %ctx.id(), tool = %spec.family, error = %e, "Downloader failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Run one downloader, streaming its output into the reporter.
async fn run_plan(ctx: &JobContext<'_>, spec: &CommandSpec) -> TaskResult<()> {
    tracing::debug!(task = %ctx.id(), command = %spec.describe(), "Starting downloader");
    let mut process = ctx
        .deps
        .adapter
        .start(spec)
        .map_err(|e| TaskError::download(e.to_string()))?;
    let mut parser = parser_for(spec.family);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);
    let cancel = &ctx.job.cancel;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                if let Err(e) = process.cancel().await {
                    tracing::warn!(task = %ctx.id(), error = %e, "Failed to stop downloader");
                }
                return Err(TaskError::Cancelled);
            }

            line = process.next_line() => {
                let Some(line) = line else { break; };
                tracing::trace!(task = %ctx.id(), line = %line, "tool output");

                if let Some(sample) = parser.parse_line(&line) {
                    if !cancel.is_cancelled() {
                        let text = render_download(ctx.id(), &ctx.label, &sample, ctx.started.elapsed());
                        ctx.report(&text, false).await;
                    }
                } else {
                    if tail.len() == TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        }
    }

    let outcome = tokio::select! {
        biased;

        () = cancel.cancelled() => {
            if let Err(e) = process.cancel().await {
                tracing::warn!(task = %ctx.id(), error = %e, "Failed to stop downloader");
            }
            return Err(TaskError::Cancelled);
        }

        outcome = process.wait() => outcome.map_err(|e| TaskError::download(e.to_string()))?,
    };

    if outcome.success() {
        return Ok(());
    }

    let detail = Vec::from(tail).join(" | ");
    let message = if detail.is_empty() {
        format!("{} exited with status {:?}", spec.family, outcome.code)
    } else {
        format!("{}: {detail}", spec.family)
    };
    Err(TaskError::download_exit(message, outcome.code))
}

/// Largest regular file in `dir`, ignoring partial leftovers.
async fn locate_artifact(dir: &Path) -> TaskResult<Option<PathBuf>> {
    let mut best: Option<(u64, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        if best.as_ref().is_none_or(|(size, _)| metadata.len() > *size) {
            best = Some((metadata.len(), entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}

/// Rename the artifact to the requested display name, keeping its extension
/// when the name has none.
async fn apply_display_name(ctx: &JobContext<'_>, artifact: PathBuf) -> TaskResult<PathBuf> {
    let Some(display) = ctx.job.task.request.source.display_name.as_deref() else {
        return Ok(artifact);
    };

    let mut name = sanitize_file_name(display);
    if Path::new(&name).extension().is_none() {
        if let Some(ext) = artifact.extension() {
            name = format!("{name}.{}", ext.to_string_lossy());
        }
    }

    let renamed = artifact.with_file_name(&name);
    if renamed != artifact {
        tokio::fs::rename(&artifact, &renamed).await?;
    }
    Ok(renamed)
}

async fn clear_dir(dir: &Path) -> TaskResult<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

/// Upload the artifact directly, or split it and upload the parts.
async fn deliver(ctx: &JobContext<'_>, artifact: &Path, size: u64, work: &Path) -> TaskResult<()> {
    let (tx, rx) = watch::channel(UploadTick::default());
    let bridge = spawn_upload_bridge(ctx, rx);

    let result = if ctx.deps.settings.needs_split(size) {
        deliver_split(ctx, artifact, size, work, &tx).await
    } else {
        deliver_direct(ctx, artifact, size, work, &tx).await
    };

    // Stop the bridge before the supervisor sends the final edit
    drop(tx);
    bridge.abort();
    let _ = bridge.await;
    result
}

async fn deliver_direct(
    ctx: &JobContext<'_>,
    artifact: &Path,
    size: u64,
    work: &Path,
    tx: &watch::Sender<UploadTick>,
) -> TaskResult<()> {
    ctx.checkpoint()?;
    ctx.report(&render_upload(ctx.id(), &ctx.label, None, 0, size), true)
        .await;

    let mut file = OutgoingFile::from_path(artifact);
    if file.kind == FileKind::Video {
        file = with_video_details(ctx, file, work).await?;
    } else {
        file = file.with_caption(ctx.label.clone());
    }
    UploadSequencer::new(Arc::clone(&ctx.deps.chat))
        .upload_file(ctx.job.task.request.chat, &file, &ctx.job.cancel, tx)
        .await
}

/// Attach duration, resolution and a thumbnail when the tools can read them.
async fn with_video_details(
    ctx: &JobContext<'_>,
    mut file: OutgoingFile,
    work: &Path,
) -> TaskResult<OutgoingFile> {
    let media = &ctx.deps.media;
    let (info, thumbnail) = tokio::select! {
        biased;

        () = ctx.job.cancel.cancelled() => return Err(TaskError::Cancelled),

        found = async {
            tokio::join!(media.inspect(&file.path), media.thumbnail(&file.path, work))
        } => found,
    };
    tracing::debug!(task = %ctx.id(), ?info, thumbnail = thumbnail.is_some(), "Video details");

    let mut caption = ctx.label.clone();
    if let Some(info) = info {
        caption.push('\n');
        caption.push_str(&describe_media(&info));
        file = file.with_media(info);
    }
    if let Some(thumbnail) = thumbnail {
        file = file.with_thumbnail(thumbnail);
    }
    Ok(file.with_caption(caption))
}

async fn deliver_split(
    ctx: &JobContext<'_>,
    artifact: &Path,
    size: u64,
    work: &Path,
    tx: &watch::Sender<UploadTick>,
) -> TaskResult<()> {
    ctx.checkpoint()?;
    let splitter = &ctx.deps.splitter;
    ctx.report(
        &render_splitting(ctx.id(), &ctx.label, size, splitter.name()),
        true,
    )
    .await;

    let parts_dir = work.join("parts");
    tokio::fs::create_dir_all(&parts_dir).await?;

    let parts = tokio::select! {
        biased;

        () = ctx.job.cancel.cancelled() => return Err(TaskError::Cancelled),

        result = splitter.split(artifact, &parts_dir, ctx.deps.settings.split_volume_size) => {
            result.map_err(|e| TaskError::split(e.to_string()))?
        }
    };
    tracing::info!(task = %ctx.id(), parts = parts.len(), splitter = splitter.name(), "Artifact split");

    // The volumes hold all the data now
    if let Err(e) = tokio::fs::remove_file(artifact).await {
        tracing::warn!(task = %ctx.id(), error = %e, "Failed to remove split source");
    }

    UploadSequencer::new(Arc::clone(&ctx.deps.chat))
        .upload_parts(
            ctx.job.task.request.chat,
            &ctx.label,
            &parts,
            &ctx.job.cancel,
            tx,
        )
        .await
        .map(|_| ())
}

/// Spawn a bridge task that turns upload ticks into throttled status edits.
fn spawn_upload_bridge(ctx: &JobContext<'_>, mut rx: watch::Receiver<UploadTick>) -> JoinHandle<()> {
    let reporter = Arc::clone(&ctx.deps.reporter);
    let cancel = ctx.job.cancel.clone();
    let id = ctx.id();
    let target = ctx.target();
    let label = ctx.label.clone();

    tokio::spawn(async move {
        let mut last_seq = 0;
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                changed = rx.changed() => {
                    if changed.is_err() {
                        // Sender dropped (upload finished)
                        break;
                    }
                    let tick = *rx.borrow_and_update();
                    if tick.seq > last_seq {
                        last_seq = tick.seq;
                        let text = render_upload(id, &label, tick.part, tick.sent, tick.total);
                        reporter.report(id, target, &text, false).await;
                    }
                }
            }
        }
    })
}
