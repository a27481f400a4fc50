//! Shared deterministic types for the task queue.
//!
//! These types define the persisted queue format and the contracts between the
//! store, the executor, and the scheduler. They carry no I/O.

use std::fmt;
use std::path::PathBuf;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned to a task when it enters the queue.
pub type TaskId = u64;

/// Lifecycle status of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl TaskStatus {
    /// `Completed` and `Error` are final; nothing moves a task out of them.
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

/// How `file_edit` writes its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Append,
    Overwrite,
}

/// The effect a task applies, tagged by `type` in the queue file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    FileEdit {
        file_path: PathBuf,
        content: String,
        mode: WriteMode,
    },
    FileCreate {
        file_path: PathBuf,
        content: String,
    },
    FileDelete {
        file_path: PathBuf,
    },
    Command {
        command: String,
    },
    /// A `type` this build does not recognise, kept verbatim so rewriting the
    /// queue file does not lose it. Executing it always fails.
    Unknown {
        kind: String,
        fields: Map<String, Value>,
    },
}

const KNOWN_KINDS: [&str; 4] = ["file_edit", "file_create", "file_delete", "command"];

/// Wire shape of the recognised task types.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum KnownAction {
    FileEdit {
        file_path: PathBuf,
        content: String,
        #[serde(default)]
        mode: WriteMode,
    },
    FileCreate {
        file_path: PathBuf,
        content: String,
    },
    FileDelete {
        file_path: PathBuf,
    },
    Command {
        command: String,
    },
}

impl From<KnownAction> for TaskAction {
    fn from(action: KnownAction) -> Self {
        match action {
            KnownAction::FileEdit {
                file_path,
                content,
                mode,
            } => TaskAction::FileEdit {
                file_path,
                content,
                mode,
            },
            KnownAction::FileCreate { file_path, content } => {
                TaskAction::FileCreate { file_path, content }
            }
            KnownAction::FileDelete { file_path } => TaskAction::FileDelete { file_path },
            KnownAction::Command { command } => TaskAction::Command { command },
        }
    }
}

impl TaskAction {
    /// The serialized `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            TaskAction::FileEdit { .. } => "file_edit",
            TaskAction::FileCreate { .. } => "file_create",
            TaskAction::FileDelete { .. } => "file_delete",
            TaskAction::Command { .. } => "command",
            TaskAction::Unknown { kind, .. } => kind.as_str(),
        }
    }
}

impl Serialize for TaskAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind())?;
        match self {
            TaskAction::FileEdit {
                file_path,
                content,
                mode,
            } => {
                map.serialize_entry("filePath", file_path)?;
                map.serialize_entry("content", content)?;
                map.serialize_entry("mode", mode)?;
            }
            TaskAction::FileCreate { file_path, content } => {
                map.serialize_entry("filePath", file_path)?;
                map.serialize_entry("content", content)?;
            }
            TaskAction::FileDelete { file_path } => {
                map.serialize_entry("filePath", file_path)?;
            }
            TaskAction::Command { command } => {
                map.serialize_entry("command", command)?;
            }
            TaskAction::Unknown { fields, .. } => {
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TaskAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = match fields.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(de::Error::custom("task `type` must be a string")),
            None => return Err(de::Error::missing_field("type")),
        };
        if KNOWN_KINDS.contains(&kind.as_str()) {
            return serde_json::from_value::<KnownAction>(Value::Object(fields))
                .map(TaskAction::from)
                .map_err(de::Error::custom);
        }
        fields.remove("type");
        Ok(TaskAction::Unknown { kind, fields })
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskAction::FileEdit {
                file_path, mode, ..
            } => write!(f, "file_edit {} ({mode:?})", file_path.display()),
            TaskAction::FileCreate { file_path, .. } => {
                write!(f, "file_create {}", file_path.display())
            }
            TaskAction::FileDelete { file_path } => {
                write!(f, "file_delete {}", file_path.display())
            }
            TaskAction::Command { command } => write!(f, "command `{command}`"),
            TaskAction::Unknown { kind, .. } => write!(f, "unknown type `{kind}`"),
        }
    }
}

/// One queued unit of effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(flatten)]
    pub action: TaskAction,
    pub status: TaskStatus,
    /// 0 until the task completes, then 100.
    pub progress: u8,
    pub error: Option<String>,
}

impl Task {
    /// A fresh pending record.
    pub fn pending(id: TaskId, action: TaskAction) -> Self {
        Self {
            id,
            action,
            status: TaskStatus::Pending,
            progress: 0,
            error: None,
        }
    }
}

/// Persisted queue aggregate (`task_queue.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskQueueState {
    pub tasks: Vec<Task>,
    /// Task currently being executed, if any.
    pub current_task: Option<TaskId>,
    /// Last task that reached a final status. Informational.
    pub last_execution_point: Option<TaskId>,
    /// Nothing executes while this is false.
    pub approved: bool,
    pub approval_token: Option<String>,
}

/// What to do with records found `in_progress` when a queue is loaded.
///
/// Such a record means the process stopped mid-task; the effect may or may
/// not have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptedPolicy {
    /// Put the task back to `pending` so it runs again.
    Retry,
    /// Mark the task `error`.
    #[default]
    Fail,
    /// Leave it `in_progress`; the queue skips it until someone intervenes.
    Hold,
}

/// Queue-level progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// `completed / total * 100`, or 0 for an empty queue.
    pub percentage: f64,
    pub current_task: Option<TaskId>,
    pub tasks: Vec<Task>,
}

/// Result of executing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub error: Option<String>,
}

/// Totals from draining the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub executed: usize,
    pub failed: usize,
}

impl DrainSummary {
    pub fn record(&mut self, outcome: &TaskOutcome) {
        self.executed += 1;
        if outcome.status == TaskStatus::Error {
            self.failed += 1;
        }
    }
}
