//! Plans: chunked task lists and their lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::chunking::chunk_tasks;
use crate::core::types::TaskAction;
use crate::error::PlanError;

/// Time-derived plan identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub u64);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlanId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(PlanId)
    }
}

/// Plan lifecycle: `planned → executing → {completed | cancelled}`.
///
/// A planned plan may also be cancelled directly. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planned,
    Executing,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }
}

/// Caller-supplied data travelling with a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanContext {
    /// Token stored with each chunk when it is submitted to the queue.
    pub approval_token: String,
    /// Opaque caller data; never interpreted.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PlanContext {
    pub fn new(approval_token: impl Into<String>) -> Self {
        Self {
            approval_token: approval_token.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// One orchestration run over a submitted task list.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub id: PlanId,
    pub chunks: Vec<Vec<TaskAction>>,
    pub context: PlanContext,
    /// Index of the next chunk to dispatch.
    pub current_chunk: usize,
    pub status: PlanStatus,
    /// Tasks that ended in `error` across dispatched chunks.
    pub failed_tasks: usize,
}

/// Plan-level progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProgress {
    pub plan_id: PlanId,
    pub status: PlanStatus,
    /// `completed_chunks / total_chunks * 100`.
    pub progress: f64,
    pub completed_chunks: usize,
    pub total_chunks: usize,
    pub failed_tasks: usize,
    pub active_agents: usize,
}

impl Plan {
    pub fn new(id: PlanId, tasks: &[TaskAction], chunk_size: usize, context: PlanContext) -> Self {
        Self {
            id,
            chunks: chunk_tasks(tasks, chunk_size),
            context,
            current_chunk: 0,
            status: PlanStatus::Planned,
            failed_tasks: 0,
        }
    }

    pub fn total_tasks(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Enter `executing`. Terminal plans are left as they are.
    pub fn begin(&mut self) -> Result<(), PlanError> {
        match self.status {
            PlanStatus::Planned => {
                self.status = PlanStatus::Executing;
                Ok(())
            }
            PlanStatus::Executing => Err(PlanError::AlreadyExecuting(self.id)),
            PlanStatus::Completed | PlanStatus::Cancelled => Ok(()),
        }
    }

    /// The chunk under the cursor, if any remain.
    pub fn next_chunk(&self) -> Option<&[TaskAction]> {
        self.chunks.get(self.current_chunk).map(Vec::as_slice)
    }

    /// Move the cursor past the chunk just dispatched.
    pub fn advance(&mut self) {
        if self.current_chunk < self.chunks.len() {
            self.current_chunk += 1;
        }
    }

    /// Mark `completed` once every chunk is consumed. Returns whether it did.
    pub fn complete_if_exhausted(&mut self) -> bool {
        if self.status == PlanStatus::Executing && self.current_chunk >= self.chunks.len() {
            self.status = PlanStatus::Completed;
            return true;
        }
        false
    }

    /// Cancel a planned or executing plan. Cancelling twice is a no-op.
    pub fn cancel(&mut self) -> Result<(), PlanError> {
        match self.status {
            PlanStatus::Completed => Err(PlanError::AlreadyTerminal(self.id, self.status)),
            PlanStatus::Cancelled => Ok(()),
            PlanStatus::Planned | PlanStatus::Executing => {
                self.status = PlanStatus::Cancelled;
                Ok(())
            }
        }
    }

    pub fn progress(&self, active_agents: usize) -> PlanProgress {
        let total_chunks = self.chunks.len();
        let completed_chunks = self.current_chunk;
        let progress = if total_chunks == 0 {
            if self.status == PlanStatus::Completed {
                100.0
            } else {
                0.0
            }
        } else {
            completed_chunks as f64 / total_chunks as f64 * 100.0
        };
        PlanProgress {
            plan_id: self.id,
            status: self.status,
            progress,
            completed_chunks,
            total_chunks,
            failed_tasks: self.failed_tasks,
            active_agents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creates(n: usize) -> Vec<TaskAction> {
        (0..n)
            .map(|i| TaskAction::FileCreate {
                file_path: format!("f{i}.txt").into(),
                content: String::new(),
            })
            .collect()
    }

    fn plan(n: usize, size: usize) -> Plan {
        Plan::new(PlanId(1), &creates(n), size, PlanContext::new("tok"))
    }

    #[test]
    fn new_plan_is_planned_with_cursor_at_zero() {
        let plan = plan(45, 20);
        assert_eq!(plan.status, PlanStatus::Planned);
        assert_eq!(plan.current_chunk, 0);
        assert_eq!(plan.chunks.len(), 3);
        assert_eq!(plan.total_tasks(), 45);
    }

    #[test]
    fn walks_every_chunk_then_completes() {
        let mut plan = plan(5, 2);
        plan.begin().expect("begin");
        let mut seen = Vec::new();
        let mut last_progress = 0.0;
        while let Some(chunk) = plan.next_chunk() {
            seen.push(chunk.len());
            plan.advance();
            let progress = plan.progress(0).progress;
            assert!(progress >= last_progress);
            assert!((0.0..=100.0).contains(&progress));
            last_progress = progress;
        }
        assert_eq!(seen, vec![2, 2, 1]);
        assert!(plan.complete_if_exhausted());
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.progress(0).progress, 100.0);
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut plan = plan(1, 1);
        plan.begin().expect("begin");
        assert!(matches!(plan.begin(), Err(PlanError::AlreadyExecuting(_))));
    }

    #[test]
    fn cancelled_plan_stays_cancelled() {
        let mut plan = plan(3, 1);
        plan.cancel().expect("cancel");
        plan.begin().expect("begin is a no-op");
        assert_eq!(plan.status, PlanStatus::Cancelled);
        plan.advance();
        plan.advance();
        plan.advance();
        assert!(!plan.complete_if_exhausted());
        assert_eq!(plan.status, PlanStatus::Cancelled);
    }

    #[test]
    fn completed_plan_cannot_be_cancelled() {
        let mut plan = plan(0, 20);
        plan.begin().expect("begin");
        assert!(plan.complete_if_exhausted());
        assert!(matches!(
            plan.cancel(),
            Err(PlanError::AlreadyTerminal(_, PlanStatus::Completed))
        ));
    }

    #[test]
    fn empty_plan_progress() {
        let mut plan = plan(0, 20);
        assert_eq!(plan.progress(0).progress, 0.0);
        plan.begin().expect("begin");
        plan.complete_if_exhausted();
        assert_eq!(plan.progress(0).progress, 100.0);
    }

    #[test]
    fn plan_id_parses_from_display() {
        let id = PlanId(1_700_000_000_123);
        assert_eq!(id.to_string().parse::<PlanId>().expect("parse"), id);
    }
}
