//! The durable task queue and its single driving loop.
//!
//! [`TaskStore`] owns the [`TaskQueueState`], persists it after every
//! mutation, and executes pending tasks one at a time through a
//! [`TaskExecutor`]. It is a single-writer structure: callers that share it
//! across threads wrap it in a mutex and hold the lock for as long as a batch
//! must stay intact.

use std::path::PathBuf;

use tracing::{debug, error, info, instrument, warn};

use crate::core::ids::IdSource;
use crate::core::types::{
    DrainSummary, InterruptedPolicy, QueueProgress, Task, TaskAction, TaskId, TaskOutcome,
    TaskQueueState, TaskStatus,
};
use crate::io::clock::now_millis;
use crate::io::executor::TaskExecutor;
use crate::io::notify::{Event, Notifier};
use crate::io::queue_file::{load_queue_state, write_queue_state};

pub struct TaskStore {
    state: TaskQueueState,
    path: Option<PathBuf>,
    ids: IdSource,
}

impl TaskStore {
    /// Load the queue at `path`, falling back to an empty, unapproved queue
    /// when the file is missing or unreadable.
    ///
    /// Records left `in_progress` by a previous process are handled by
    /// `policy` and the result is written back.
    pub fn open(path: impl Into<PathBuf>, policy: InterruptedPolicy) -> Self {
        let path = path.into();
        let state = if path.exists() {
            match load_queue_state(&path) {
                Ok(state) => state,
                Err(err) => {
                    warn!(path = %path.display(), error = %format!("{err:#}"), "task queue unreadable; starting empty");
                    TaskQueueState::default()
                }
            }
        } else {
            debug!(path = %path.display(), "no task queue on disk; starting empty");
            TaskQueueState::default()
        };
        let mut store = Self::with_state(state, Some(path));
        let recovered = store.state.recover_interrupted(policy);
        if !recovered.is_empty() {
            warn!(?policy, tasks = ?recovered, "found tasks interrupted mid-execution");
            if policy != InterruptedPolicy::Hold {
                store.persist();
            }
        }
        store
    }

    /// A store that never touches disk.
    pub fn ephemeral() -> Self {
        Self::with_state(TaskQueueState::default(), None)
    }

    fn with_state(state: TaskQueueState, path: Option<PathBuf>) -> Self {
        let ids = IdSource::resume_after(state.max_task_id().unwrap_or(0));
        Self { state, path, ids }
    }

    pub fn state(&self) -> &TaskQueueState {
        &self.state
    }

    /// Append one pending task to the current queue. Does not approve it.
    pub fn add_task(&mut self, action: TaskAction) -> TaskId {
        let id = self.ids.next_at(now_millis());
        debug!(task_id = id, kind = action.kind(), "adding task");
        self.state.tasks.push(Task::pending(id, action));
        self.persist();
        id
    }

    /// Replace the whole queue with `actions`, approved under `approval_token`.
    ///
    /// Anything still queued from an earlier batch, finished or not, is
    /// discarded.
    pub fn add_bulk_tasks(&mut self, actions: &[TaskAction], approval_token: &str) -> Vec<TaskId> {
        let discarded = self
            .state
            .tasks
            .iter()
            .filter(|task| !task.status.is_finished())
            .count();
        if discarded > 0 {
            warn!(
                discarded,
                "bulk submission replaces unfinished tasks from the previous batch"
            );
        }
        let now = now_millis();
        let tasks: Vec<Task> = actions
            .iter()
            .map(|action| Task::pending(self.ids.next_at(now), action.clone()))
            .collect();
        let ids = tasks.iter().map(|task| task.id).collect();
        info!(tasks = tasks.len(), "replacing task queue with approved batch");
        self.state = TaskQueueState::approved_batch(tasks, approval_token.to_string());
        self.persist();
        ids
    }

    /// Approve the current queue under `approval_token`.
    pub fn approve(&mut self, approval_token: &str) {
        info!(tasks = self.state.tasks.len(), "approving task queue");
        self.state.approve(approval_token.to_string());
        self.persist();
    }

    /// Execute the first pending task.
    ///
    /// Returns `None` without doing anything when the queue is unapproved or
    /// has nothing pending. A failing task is recorded as `error`; it never
    /// stops later tasks.
    #[instrument(skip_all)]
    pub fn execute_next_task<E: TaskExecutor + ?Sized>(
        &mut self,
        executor: &E,
        notifier: &Notifier,
    ) -> Option<TaskOutcome> {
        if !self.state.approved {
            debug!("task queue not approved; nothing executed");
            return None;
        }
        let index = self.state.next_pending_index()?;
        let task = self.state.start(index)?;
        let task_id = task.id;
        let action = task.action.clone();
        self.persist();

        debug!(task_id, %action, "executing task");
        notifier.emit(Event::TaskStarted {
            task_id,
            task_type: action.kind().to_string(),
        });
        let result = executor.execute(&action).map_err(|err| err.to_string());
        let outcome = self.state.finish(task_id, result)?;
        self.persist();

        match outcome.status {
            TaskStatus::Completed => {
                debug!(task_id, "task completed");
                notifier.emit(Event::TaskCompleted { task_id });
            }
            _ => {
                let message = outcome.error.clone().unwrap_or_default();
                error!(task_id, error = %message, "task failed");
                notifier.emit(Event::TaskFailed {
                    task_id,
                    error: message,
                });
            }
        }
        Some(outcome)
    }

    /// Run pending tasks in order until none remain.
    pub fn drain<E: TaskExecutor + ?Sized>(
        &mut self,
        executor: &E,
        notifier: &Notifier,
    ) -> DrainSummary {
        let mut summary = DrainSummary::default();
        while let Some(outcome) = self.execute_next_task(executor, notifier) {
            summary.record(&outcome);
        }
        debug!(
            executed = summary.executed,
            failed = summary.failed,
            "task queue drained"
        );
        summary
    }

    pub fn progress(&self) -> QueueProgress {
        self.state.progress()
    }

    /// Remove `completed` records. Returns how many were removed.
    pub fn clear_completed_tasks(&mut self) -> usize {
        let removed = self.state.clear_completed();
        debug!(removed, "cleared completed tasks");
        self.persist();
        removed
    }

    /// Best-effort write-through. Failures are logged; memory stays
    /// authoritative.
    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = write_queue_state(path, &self.state) {
            error!(path = %path.display(), error = %format!("{err:#}"), "failed to persist task queue");
        }
    }
}
