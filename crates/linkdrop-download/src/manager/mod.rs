//! Task supervisor.
//!
//! Owns the registry behind one lock and runs promoted tasks on a task
//! tracker. Each worker loop runs one task at a time and, when its slot is
//! released, continues with whatever the registry promoted next.
//!
//! # Architecture
//!
//! - **Registry**: pure state machine, only touched under `registry`
//! - **Worker**: executes download, split and upload for one task
//! - **Reporter**: shared throttled status edits
//!
//! # Finalization
//!
//! The supervisor, never the worker, records the outcome, sends the final
//! status edit and then releases the slot. A worker panic surfaces as a
//! `JoinError` and becomes a failed task.

mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio_util::task::TaskTracker;

use linkdrop_core::{
    ChatTransport, OwnerId, QueueSnapshot, Settings, Task, TaskError, TaskEvent, TaskId,
    TaskRequest, TaskState,
};

use crate::exec::{ProcessAdapter, ToolSelector};
use crate::media::MediaInspector;
use crate::progress::ProgressReporter;
use crate::progress::render::{render_final, render_queued};
use crate::registry::{Admission, TaskLease, TaskRegistry};
use crate::split::ArchiveSplitter;

pub use worker::{JobOutcome, TaskJob, WorkerDeps, run_job};

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 64;

/// External dependencies of the supervisor.
pub struct SupervisorDeps {
    pub chat: Arc<dyn ChatTransport>,
    pub splitter: Arc<dyn ArchiveSplitter>,
    pub media: Arc<dyn MediaInspector>,
    pub settings: Arc<Settings>,
}

/// Result of a cancel request.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The task was cancelled. A running task is still shutting down.
    Cancelled { task: Task, was_running: bool },
    /// No live task with this id.
    NotFound,
    /// The requester neither owns the task nor is the bot owner.
    NotPermitted,
    /// Already cancelled and waiting for its process to exit.
    AlreadyStopping,
}

/// Admits, runs and finalizes tasks.
pub struct TaskSupervisor {
    registry: Mutex<TaskRegistry>,
    worker: WorkerDeps,
    events: broadcast::Sender<TaskEvent>,
    tracker: TaskTracker,
    accepting: AtomicBool,
}

impl TaskSupervisor {
    pub fn new(deps: SupervisorDeps) -> Arc<Self> {
        let SupervisorDeps {
            chat,
            splitter,
            media,
            settings,
        } = deps;

        let reporter = Arc::new(ProgressReporter::new(
            Arc::clone(&chat),
            settings.status_interval,
        ));
        let worker = WorkerDeps {
            chat,
            reporter,
            splitter,
            media,
            selector: ToolSelector::new(&settings),
            adapter: ProcessAdapter::new(settings.cancel_grace),
            settings: Arc::clone(&settings),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Arc::new(Self {
            registry: Mutex::new(TaskRegistry::new(settings.max_concurrent_tasks)),
            worker,
            events,
            tracker: TaskTracker::new(),
            accepting: AtomicBool::new(true),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.worker.settings
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Admit a request.
    ///
    /// A promoted task starts immediately. A queued task gets its
    /// "queued" status edit here.
    pub async fn submit(
        self: &Arc<Self>,
        owner: OwnerId,
        request: TaskRequest,
    ) -> Result<Admission, TaskError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(TaskError::other("The bot is shutting down."));
        }

        let admission = self.registry.lock().await.admit(owner, request)?;
        let id = admission.task.id;

        if let Some(lease) = &admission.lease {
            tracing::info!(task = %id, owner = %owner, "Task admitted and started");
            self.spawn_worker(lease.clone());
            return Ok(admission);
        }

        let position = admission.position.unwrap_or(1);
        tracing::info!(task = %id, owner = %owner, position, "Task queued");
        let _ = self.events.send(TaskEvent::Queued {
            id,
            owner,
            position,
        });

        self.announce_queued(&admission.task, position).await;
        Ok(admission)
    }

    /// Send the "queued" edit unless the task has left the queue meanwhile.
    async fn announce_queued(&self, task: &Task, position: u32) -> bool {
        let still_queued = self
            .registry
            .lock()
            .await
            .get(task.id)
            .is_some_and(|t| t.state == TaskState::Queued);
        if !still_queued {
            tracing::debug!(task = %task.id, "Task left the queue before its queued edit");
            return false;
        }

        let text = render_queued(task.id, &task.request.source.label(), position);
        self.worker
            .reporter
            .report(task.id, task.request.status_message, &text, true)
            .await
    }

    /// Cancel a task on behalf of `requester`.
    ///
    /// Allowed for the task's owner and the bot owner. A queued task is
    /// finalized here; a running one by its worker.
    pub async fn cancel(&self, id: TaskId, requester: OwnerId) -> CancelOutcome {
        let cancellation = {
            let mut registry = self.registry.lock().await;
            let Some(task) = registry.get(id) else {
                return CancelOutcome::NotFound;
            };
            if task.owner != requester && !self.worker.settings.is_owner(requester.0) {
                return CancelOutcome::NotPermitted;
            }
            match registry.cancel_detailed(id) {
                Some(cancellation) => cancellation,
                None => return CancelOutcome::AlreadyStopping,
            }
        };

        tracing::info!(task = %id, requester = %requester, was_running = cancellation.was_running, "Task cancelled");
        if !cancellation.was_running {
            self.finalize_evicted(&cancellation.task).await;
        }

        CancelOutcome::Cancelled {
            task: cancellation.task,
            was_running: cancellation.was_running,
        }
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.registry.lock().await.snapshot()
    }

    /// Stop accepting tasks, cancel everything and wait for workers.
    ///
    /// Returns `false` if workers were still running after `grace`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.accepting.store(false, Ordering::SeqCst);
        let evicted = self.registry.lock().await.cancel_all();
        tracing::info!(evicted = evicted.len(), "Shutting down task supervisor");

        for task in &evicted {
            self.finalize_evicted(task).await;
        }

        self.tracker.close();
        let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        if !drained {
            tracing::warn!(grace = ?grace, "Workers still running after shutdown grace");
        }
        drained
    }

    fn spawn_worker(self: &Arc<Self>, lease: TaskLease) {
        let this = Arc::clone(self);
        self.tracker.spawn(async move { this.worker_loop(lease).await });
    }

    async fn worker_loop(self: Arc<Self>, first: TaskLease) {
        let mut next = Some(first);
        while let Some(lease) = next.take() {
            let mut promoted = self.run_task(lease).await.into_iter();
            next = promoted.next();
            for extra in promoted {
                self.spawn_worker(extra);
            }
        }
    }

    /// Run one promoted task and finalize it. Returns the tasks promoted into
    /// the freed slot.
    async fn run_task(&self, lease: TaskLease) -> Vec<TaskLease> {
        let TaskLease { task, cancel } = lease;
        let id = task.id;
        let owner = task.owner;
        let _ = self.events.send(TaskEvent::Started { id, owner });
        tracing::info!(task = %id, url = %task.request.source.url, "Task started");

        let job = TaskJob {
            task: task.clone(),
            cancel,
        };
        let outcome = match tokio::spawn(run_job(job, self.worker.clone())).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(task = %id, error = %e, "Task worker panicked");
                JobOutcome::failed(TaskError::other("Internal error while processing the task."))
            }
        };

        let state = self
            .registry
            .lock()
            .await
            .finish(id, outcome.state)
            .unwrap_or(outcome.state);

        let error = outcome.error.as_ref().filter(|_| state == TaskState::Failed);
        let text = render_final(
            id,
            &task.request.source.label(),
            state,
            error,
            task.elapsed(),
        );
        self.worker
            .reporter
            .report_final(id, task.request.status_message, &text)
            .await;

        let promoted = self.registry.lock().await.release_slot(id);
        let _ = self.events.send(TaskEvent::Finished { id, owner, state });
        tracing::debug!(task = %id, state = %state, promoted = promoted.len(), "Slot released");
        promoted
    }

    async fn finalize_evicted(&self, task: &Task) {
        let text = render_final(
            task.id,
            &task.request.source.label(),
            TaskState::Cancelled,
            None,
            Duration::ZERO,
        );
        self.worker
            .reporter
            .report_final(task.id, task.request.status_message, &text)
            .await;
        let _ = self.events.send(TaskEvent::Finished {
            id: task.id,
            owner: task.owner,
            state: TaskState::Cancelled,
        });
    }
}
