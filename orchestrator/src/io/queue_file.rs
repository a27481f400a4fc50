//! Durable storage for the task queue (`task_queue.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::TaskQueueState;

/// Load queue state from disk.
pub fn load_queue_state(path: &Path) -> Result<TaskQueueState> {
    debug!(path = %path.display(), "loading task queue");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read task queue {}", path.display()))?;
    let state: TaskQueueState = serde_json::from_str(&contents)
        .with_context(|| format!("parse task queue {}", path.display()))?;
    debug!(
        tasks = state.tasks.len(),
        approved = state.approved,
        "task queue loaded"
    );
    Ok(state)
}

/// Atomically write queue state to disk (temp file + rename).
pub fn write_queue_state(path: &Path, state: &TaskQueueState) -> Result<()> {
    debug!(path = %path.display(), tasks = state.tasks.len(), "writing task queue");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("task queue path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp task queue {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace task queue {}", path.display()))?;
    Ok(())
}
