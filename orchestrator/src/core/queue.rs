//! Queue state transitions for task records.
//!
//! Every mutation of [`TaskQueueState`] goes through these methods; the store
//! layers persistence and execution on top.

use crate::core::types::{
    InterruptedPolicy, QueueProgress, Task, TaskId, TaskOutcome, TaskQueueState, TaskStatus,
};

/// Error recorded on tasks failed by [`InterruptedPolicy::Fail`].
pub const INTERRUPTED_ERROR: &str = "interrupted before completion";

impl TaskQueueState {
    /// A freshly approved queue holding exactly `tasks`.
    pub fn approved_batch(tasks: Vec<Task>, approval_token: String) -> Self {
        Self {
            tasks,
            current_task: None,
            last_execution_point: None,
            approved: true,
            approval_token: Some(approval_token),
        }
    }

    pub fn approve(&mut self, approval_token: String) {
        self.approved = true;
        self.approval_token = Some(approval_token);
    }

    /// Index of the first pending task in insertion order.
    pub fn next_pending_index(&self) -> Option<usize> {
        self.tasks
            .iter()
            .position(|task| task.status == TaskStatus::Pending)
    }

    /// Largest id present, used to keep new ids above loaded ones.
    pub fn max_task_id(&self) -> Option<TaskId> {
        self.tasks.iter().map(|task| task.id).max()
    }

    /// Move the task at `index` to `in_progress` and make it current.
    pub fn start(&mut self, index: usize) -> Option<&Task> {
        let task = self.tasks.get_mut(index)?;
        if task.status != TaskStatus::Pending {
            return None;
        }
        task.status = TaskStatus::InProgress;
        self.current_task = Some(task.id);
        Some(task)
    }

    /// Record the result of an `in_progress` task.
    ///
    /// Returns `None` when the task is gone or not in progress (e.g. the queue
    /// was replaced while it ran); finished records are never rewritten.
    pub fn finish(&mut self, task_id: TaskId, result: Result<(), String>) -> Option<TaskOutcome> {
        if self.current_task == Some(task_id) {
            self.current_task = None;
        }
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id && task.status == TaskStatus::InProgress)?;
        match result {
            Ok(()) => {
                task.status = TaskStatus::Completed;
                task.progress = 100;
                task.error = None;
            }
            Err(message) => {
                task.status = TaskStatus::Error;
                task.error = Some(message);
            }
        }
        self.last_execution_point = Some(task_id);
        Some(TaskOutcome {
            task_id,
            status: task.status,
            error: task.error.clone(),
        })
    }

    /// Drop all `completed` records. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.status != TaskStatus::Completed);
        before - self.tasks.len()
    }

    /// Apply `policy` to records left `in_progress`. Returns the affected ids.
    pub fn recover_interrupted(&mut self, policy: InterruptedPolicy) -> Vec<TaskId> {
        let mut affected = Vec::new();
        for task in &mut self.tasks {
            if task.status != TaskStatus::InProgress {
                continue;
            }
            match policy {
                InterruptedPolicy::Retry => task.status = TaskStatus::Pending,
                InterruptedPolicy::Fail => {
                    task.status = TaskStatus::Error;
                    task.error = Some(INTERRUPTED_ERROR.to_string());
                }
                InterruptedPolicy::Hold => {}
            }
            affected.push(task.id);
        }
        if policy != InterruptedPolicy::Hold {
            self.current_task = None;
        }
        affected
    }

    pub fn progress(&self) -> QueueProgress {
        let total = self.tasks.len();
        let completed = self.count(TaskStatus::Completed);
        let percentage = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        QueueProgress {
            total,
            completed,
            failed: self.count(TaskStatus::Error),
            percentage,
            current_task: self.current_task,
            tasks: self.tasks.clone(),
        }
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|task| task.status == status).count()
    }
}
