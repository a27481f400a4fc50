//! Test-only helpers: task builders, scripted executors, and a recording
//! notification sink.

use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use crate::core::types::TaskAction;
use crate::error::TaskError;
use crate::io::executor::TaskExecutor;
use crate::io::notify::{Event, NotificationSink, Notifier};
use crate::scheduler::{Orchestrator, SchedulerConfig};
use crate::store::TaskStore;

pub fn file_create(path: &str, content: &str) -> TaskAction {
    TaskAction::FileCreate {
        file_path: PathBuf::from(path),
        content: content.to_string(),
    }
}

pub fn file_delete(path: &str) -> TaskAction {
    TaskAction::FileDelete {
        file_path: PathBuf::from(path),
    }
}

pub fn command(cmd: &str) -> TaskAction {
    TaskAction::Command {
        command: cmd.to_string(),
    }
}

/// `count` deterministic `file_create` tasks named `file_<i>.txt`.
pub fn create_tasks(count: usize) -> Vec<TaskAction> {
    (0..count)
        .map(|i| file_create(&format!("file_{i}.txt"), &format!("content {i}")))
        .collect()
}

/// Temp directory plus a queue file path inside it.
pub fn temp_queue() -> (TempDir, PathBuf) {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join(".assistant").join("task_queue.json");
    (temp, path)
}

/// Scheduler config with a short agent wait so tests never stall.
pub fn fast_config(chunk_size: usize, max_agents: usize) -> SchedulerConfig {
    SchedulerConfig {
        chunk_size,
        max_agents,
        agent_wait: Duration::from_millis(10),
    }
}

/// Orchestrator over an in-memory queue with notifications disabled.
pub fn in_memory_orchestrator<E: TaskExecutor>(
    executor: E,
    chunk_size: usize,
    max_agents: usize,
) -> Orchestrator<E> {
    Orchestrator::new(
        fast_config(chunk_size, max_agents),
        TaskStore::ephemeral(),
        executor,
        Notifier::disabled(),
    )
}

/// Executor that records every action and fails those whose path contains
/// one of the configured fragments. Commands fail as unsupported.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    fail_on: Vec<String>,
    seen: Mutex<Vec<TaskAction>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(fragments: &[&str]) -> Self {
        Self {
            fail_on: fragments.iter().map(|f| f.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<TaskAction> {
        self.seen.lock().expect("lock").clone()
    }
}

impl TaskExecutor for ScriptedExecutor {
    fn execute(&self, action: &TaskAction) -> Result<(), TaskError> {
        self.seen.lock().expect("lock").push(action.clone());
        let path = match action {
            TaskAction::FileEdit { file_path, .. }
            | TaskAction::FileCreate { file_path, .. }
            | TaskAction::FileDelete { file_path } => file_path,
            TaskAction::Command { command } => {
                return Err(TaskError::Unsupported {
                    command: command.clone(),
                });
            }
            TaskAction::Unknown { kind, .. } => {
                return Err(TaskError::UnknownType(kind.clone()));
            }
        };
        let text = path.to_string_lossy();
        if self.fail_on.iter().any(|fragment| text.contains(fragment.as_str())) {
            return Err(TaskError::io(
                "write",
                path.clone(),
                std::io::Error::other("scripted failure"),
            ));
        }
        Ok(())
    }
}

/// Executor whose calls block until [`GatedExecutor::open`] is called, so a
/// test can hold a chunk in flight.
#[derive(Debug, Default)]
pub struct GatedExecutor {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    entered: usize,
}

impl GatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.state.lock().expect("lock").open = true;
        self.changed.notify_all();
    }

    /// Block until at least `count` calls have entered the executor.
    pub fn wait_entered(&self, count: usize) {
        let mut state = self.state.lock().expect("lock");
        while state.entered < count {
            state = self.changed.wait(state).expect("wait");
        }
    }
}

impl TaskExecutor for GatedExecutor {
    fn execute(&self, _action: &TaskAction) -> Result<(), TaskError> {
        let mut state = self.state.lock().expect("lock");
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            state = self.changed.wait(state).expect("wait");
        }
        Ok(())
    }
}

/// Sink that keeps every delivered event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("lock").clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(Event::kind).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, event: &Event) -> Result<()> {
        self.events.lock().expect("lock").push(event.clone());
        Ok(())
    }
}
