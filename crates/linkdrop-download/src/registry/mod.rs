//! Task registry.
//!
//! Pure state machine for admission, FIFO promotion and eviction. No I/O is
//! performed here; the supervisor owns the lock and performs side effects.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no IO, no tracing)
//! - One object owns every index; nothing is global
//! - A task holds a slot from promotion until `release_slot`, even after it
//!   was cancelled, so the bound covers processes still shutting down
//!
//! # Position Semantics
//!
//! - Position 0 = running
//! - Position 1+ = waiting in queue

// Queue lengths are always well under u32::MAX in practice
#![allow(clippy::cast_possible_truncation)]

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use linkdrop_core::{
    OwnerId, QueueSnapshot, QueuedTask, Task, TaskError, TaskId, TaskRequest, TaskState,
};

/// A running task handed to a worker, with its cancellation token.
#[derive(Debug, Clone)]
pub struct TaskLease {
    pub task: Task,
    pub cancel: CancellationToken,
}

/// Result of a successful admission.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Snapshot of the task right after admission.
    pub task: Task,
    /// 1-based queue position, `None` when promoted at once.
    pub position: Option<u32>,
    /// Set when the task was promoted at once.
    pub lease: Option<TaskLease>,
}

impl Admission {
    pub const fn promoted(&self) -> bool {
        self.lease.is_some()
    }
}

/// What a successful cancel did.
#[derive(Debug, Clone)]
pub struct Cancellation {
    /// Snapshot with state `Cancelled`.
    pub task: Task,
    /// `true` if the task was running; its worker finishes the cleanup.
    /// `false` if it was queued and has already been evicted.
    pub was_running: bool,
}

struct Entry {
    task: Task,
    cancel: CancellationToken,
    holds_slot: bool,
}

/// Manages task state.
///
/// This is a sync type with no internal locking; the caller
/// (`TaskSupervisor`) is responsible for synchronization.
pub struct TaskRegistry {
    entries: HashMap<TaskId, Entry>,
    queue: VecDeque<TaskId>,
    by_owner: HashMap<OwnerId, TaskId>,
    max_running: u32,
    slots_in_use: u32,
    next_id: u64,
}

impl TaskRegistry {
    /// Create a registry with the given concurrency bound (at least 1).
    pub fn new(max_running: u32) -> Self {
        Self {
            entries: HashMap::new(),
            queue: VecDeque::new(),
            by_owner: HashMap::new(),
            max_running: max_running.max(1),
            slots_in_use: 0,
            next_id: 1,
        }
    }

    /// Admit a task for `owner`.
    ///
    /// Rejected while the owner has a queued or running task. Otherwise the
    /// task starts `Queued` and is promoted at once if a slot is free.
    pub fn admit(&mut self, owner: OwnerId, request: TaskRequest) -> Result<Admission, TaskError> {
        if let Some(active) = self.active_task_of(owner) {
            return Err(TaskError::owner_busy(active));
        }

        let id = TaskId::new(self.next_id);
        self.next_id += 1;

        let task = Task::new(id, owner, request);
        self.entries.insert(
            id,
            Entry {
                task: task.clone(),
                cancel: CancellationToken::new(),
                holds_slot: false,
            },
        );
        self.by_owner.insert(owner, id);

        if self.slots_in_use < self.max_running {
            if let Some(lease) = self.promote(id) {
                return Ok(Admission {
                    task: lease.task.clone(),
                    position: None,
                    lease: Some(lease),
                });
            }
        }

        self.queue.push_back(id);
        let position = self.queue.len() as u32;
        Ok(Admission {
            task,
            position: Some(position),
            lease: None,
        })
    }

    /// Cancel a queued or running task. See [`Self::cancel_detailed`].
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.cancel_detailed(id).is_some()
    }

    /// Cancel a task.
    ///
    /// A queued task is evicted at once. A running task moves to `Cancelled`
    /// and its token fires; it keeps its slot until `release_slot`. Returns
    /// `None` for unknown or terminal tasks.
    pub fn cancel_detailed(&mut self, id: TaskId) -> Option<Cancellation> {
        let entry = self.entries.get_mut(&id)?;
        match entry.task.state {
            TaskState::Queued => {
                entry.task.state = TaskState::Cancelled;
                entry.cancel.cancel();
                let task = entry.task.clone();
                self.queue.retain(|queued| *queued != id);
                self.evict(id);
                Some(Cancellation {
                    task,
                    was_running: false,
                })
            }
            TaskState::Running => {
                entry.task.state = TaskState::Cancelled;
                entry.cancel.cancel();
                Some(Cancellation {
                    task: entry.task.clone(),
                    was_running: true,
                })
            }
            TaskState::Cancelled | TaskState::Failed | TaskState::Completed => None,
        }
    }

    /// Cancel everything. Returns the queued tasks that were evicted.
    pub fn cancel_all(&mut self) -> Vec<Task> {
        let queued: Vec<TaskId> = self.queue.iter().copied().collect();
        let running: Vec<TaskId> = self
            .entries
            .values()
            .filter(|e| e.task.state == TaskState::Running)
            .map(|e| e.task.id)
            .collect();

        for id in running {
            self.cancel_detailed(id);
        }
        queued
            .into_iter()
            .filter_map(|id| self.cancel_detailed(id).map(|c| c.task))
            .collect()
    }

    /// Record the outcome of a running task.
    ///
    /// `Running -> Completed | Failed`. A task already `Cancelled` stays so.
    /// Returns the resulting state, or `None` for unknown tasks.
    pub fn finish(&mut self, id: TaskId, outcome: TaskState) -> Option<TaskState> {
        let entry = self.entries.get_mut(&id)?;
        if entry.task.state.can_transition_to(outcome) && entry.task.state == TaskState::Running {
            entry.task.state = outcome;
        }
        Some(entry.task.state)
    }

    /// Evict a slot-holding task and promote queued tasks into free slots.
    ///
    /// Has an effect exactly once per promoted task; later calls and calls
    /// for tasks that never ran return an empty list.
    pub fn release_slot(&mut self, id: TaskId) -> Vec<TaskLease> {
        let holds_slot = self.entries.get(&id).is_some_and(|e| e.holds_slot);
        if !holds_slot {
            return Vec::new();
        }

        self.evict(id);
        self.slots_in_use = self.slots_in_use.saturating_sub(1);

        let mut promoted = Vec::new();
        while self.slots_in_use < self.max_running {
            let Some(next) = self.queue.pop_front() else {
                break;
            };
            promoted.extend(self.promote(next));
        }
        promoted
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.entries.get(&id).map(|e| &e.task)
    }

    /// Owner's queued or running task, if any.
    pub fn active_task_of(&self, owner: OwnerId) -> Option<TaskId> {
        let id = *self.by_owner.get(&owner)?;
        self.get(id)
            .filter(|task| task.state.is_active())
            .map(|task| task.id)
    }

    /// Number of tracked tasks (queued, running, or cancelled but not yet released).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tasks currently holding a slot.
    pub const fn running_count(&self) -> u32 {
        self.slots_in_use
    }

    pub fn queued_count(&self) -> u32 {
        self.queue.len() as u32
    }

    /// 1-based position of a queued task.
    pub fn position(&self, id: TaskId) -> Option<u32> {
        self.queue
            .iter()
            .position(|queued| *queued == id)
            .map(|i| i as u32 + 1)
    }

    /// Running tasks (oldest first) followed by the queue in FIFO order.
    pub fn snapshot(&self) -> QueueSnapshot {
        let mut running: Vec<&Task> = self
            .entries
            .values()
            .filter(|e| e.holds_slot)
            .map(|e| &e.task)
            .collect();
        running.sort_by_key(|t| t.id);

        let mut snapshot = QueueSnapshot::new(self.max_running);
        for task in running {
            snapshot.items.push(to_dto(task, 0));
        }
        for (i, id) in self.queue.iter().enumerate() {
            if let Some(entry) = self.entries.get(id) {
                snapshot.items.push(to_dto(&entry.task, i as u32 + 1));
            }
        }
        snapshot.running_count = self.slots_in_use;
        snapshot.queued_count = self.queue.len() as u32;
        snapshot
    }

    fn promote(&mut self, id: TaskId) -> Option<TaskLease> {
        let entry = self.entries.get_mut(&id)?;
        self.slots_in_use += 1;
        entry.holds_slot = true;
        entry.task.state = TaskState::Running;
        entry.task.started_at = Some(Instant::now());
        Some(TaskLease {
            task: entry.task.clone(),
            cancel: entry.cancel.clone(),
        })
    }

    fn evict(&mut self, id: TaskId) {
        if let Some(entry) = self.entries.remove(&id) {
            if self.by_owner.get(&entry.task.owner) == Some(&id) {
                self.by_owner.remove(&entry.task.owner);
            }
        }
    }
}

fn to_dto(task: &Task, position: u32) -> QueuedTask {
    QueuedTask {
        id: task.id,
        owner: task.owner,
        label: task.request.source.label(),
        state: task.state,
        position,
        submitted_at: task.submitted_at,
        elapsed_secs: task.elapsed().as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdrop_core::{ChatId, MessageRef, TaskSource};

    fn request(n: i64) -> TaskRequest {
        TaskRequest {
            source: TaskSource::new(format!("https://example.com/{n}.mp4"), None),
            chat: ChatId(n),
            status_message: MessageRef::new(ChatId(n), n),
        }
    }

    fn admit(registry: &mut TaskRegistry, owner: i64) -> Admission {
        registry.admit(OwnerId(owner), request(owner)).unwrap()
    }

    #[test]
    fn test_admit_promotes_when_slot_free() {
        let mut registry = TaskRegistry::new(2);
        let a = admit(&mut registry, 1);
        assert!(a.promoted());
        assert_eq!(a.task.state, TaskState::Running);
        assert!(a.task.started_at.is_some());
        assert_eq!(registry.running_count(), 1);
    }

    #[test]
    fn test_admit_queues_when_full() {
        let mut registry = TaskRegistry::new(1);
        admit(&mut registry, 1);
        let b = admit(&mut registry, 2);
        let c = admit(&mut registry, 3);

        assert!(!b.promoted());
        assert_eq!(b.task.state, TaskState::Queued);
        assert_eq!(b.position, Some(1));
        assert_eq!(c.position, Some(2));
        assert_eq!(registry.running_count(), 1);
        assert_eq!(registry.queued_count(), 2);
    }

    #[test]
    fn test_owner_limited_to_one_active_task() {
        let mut registry = TaskRegistry::new(5);
        let first = admit(&mut registry, 7);

        let err = registry.admit(OwnerId(7), request(7)).unwrap_err();
        assert_eq!(err, TaskError::owner_busy(first.task.id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_owner_limit_applies_to_queued_tasks() {
        let mut registry = TaskRegistry::new(1);
        admit(&mut registry, 1);
        admit(&mut registry, 2);
        assert!(registry.admit(OwnerId(2), request(2)).is_err());
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut registry = TaskRegistry::new(5);
        let a = admit(&mut registry, 1);
        registry.release_slot(a.task.id);
        let b = admit(&mut registry, 1);
        assert!(b.task.id > a.task.id);
    }

    #[test]
    fn test_release_promotes_fifo() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        let b = admit(&mut registry, 2);
        let c = admit(&mut registry, 3);

        registry.finish(a.task.id, TaskState::Completed);
        let promoted = registry.release_slot(a.task.id);
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].task.id, b.task.id);
        assert_eq!(promoted[0].task.state, TaskState::Running);
        assert_eq!(registry.position(c.task.id), Some(1));
        assert!(registry.get(a.task.id).is_none());
    }

    #[test]
    fn test_release_slot_is_effective_once() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        admit(&mut registry, 2);
        admit(&mut registry, 3);

        assert_eq!(registry.release_slot(a.task.id).len(), 1);
        assert!(registry.release_slot(a.task.id).is_empty());
        assert_eq!(registry.running_count(), 1);
        assert_eq!(registry.queued_count(), 1);
    }

    #[test]
    fn test_running_count_never_exceeds_bound() {
        let mut registry = TaskRegistry::new(3);
        let mut running = Vec::new();
        for owner in 0..10 {
            let admission = admit(&mut registry, owner);
            if let Some(lease) = admission.lease {
                running.push(lease.task.id);
            }
            assert!(registry.running_count() <= 3);
        }
        while let Some(id) = running.pop() {
            for lease in registry.release_slot(id) {
                running.push(lease.task.id);
            }
            assert!(registry.running_count() <= 3);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_queued_evicts_immediately() {
        let mut registry = TaskRegistry::new(1);
        admit(&mut registry, 1);
        let b = admit(&mut registry, 2);

        let cancelled = registry.cancel_detailed(b.task.id).unwrap();
        assert!(!cancelled.was_running);
        assert_eq!(cancelled.task.state, TaskState::Cancelled);
        assert!(registry.get(b.task.id).is_none());
        assert_eq!(registry.queued_count(), 0);
        assert!(registry.active_task_of(OwnerId(2)).is_none());
    }

    #[test]
    fn test_cancel_running_fires_token_and_keeps_slot() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        let lease = a.lease.unwrap();

        assert!(registry.cancel(a.task.id));
        assert!(lease.cancel.is_cancelled());
        assert_eq!(registry.get(a.task.id).unwrap().state, TaskState::Cancelled);
        assert_eq!(registry.running_count(), 1);

        // Owner may submit again while the cancelled task shuts down
        assert!(registry.admit(OwnerId(1), request(1)).is_ok());
    }

    #[test]
    fn test_second_cancel_is_noop() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        assert!(registry.cancel(a.task.id));
        assert!(!registry.cancel(a.task.id));
        assert!(!registry.cancel(TaskId::new(999)));
    }

    #[test]
    fn test_finish_keeps_cancelled() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        registry.cancel(a.task.id);
        assert_eq!(
            registry.finish(a.task.id, TaskState::Completed),
            Some(TaskState::Cancelled)
        );
    }

    #[test]
    fn test_finish_running() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        assert_eq!(
            registry.finish(a.task.id, TaskState::Failed),
            Some(TaskState::Failed)
        );
        assert_eq!(registry.finish(TaskId::new(42), TaskState::Failed), None);
    }

    #[test]
    fn test_snapshot_order() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        let b = admit(&mut registry, 2);
        let c = admit(&mut registry, 3);

        let snapshot = registry.snapshot();
        let ids: Vec<_> = snapshot.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.task.id, b.task.id, c.task.id]);
        assert_eq!(snapshot.items[0].position, 0);
        assert_eq!(snapshot.items[2].position, 2);
        assert_eq!(snapshot.running_count, 1);
        assert_eq!(snapshot.queued_count, 2);
        assert_eq!(snapshot.max_running, 1);
    }

    #[test]
    fn test_cancel_all() {
        let mut registry = TaskRegistry::new(1);
        let a = admit(&mut registry, 1);
        admit(&mut registry, 2);
        admit(&mut registry, 3);

        let evicted = registry.cancel_all();
        assert_eq!(evicted.len(), 2);
        assert!(a.lease.unwrap().cancel.is_cancelled());
        assert_eq!(registry.len(), 1);
        assert!(registry.release_slot(a.task.id).is_empty());
        assert!(registry.is_empty());
    }
}
