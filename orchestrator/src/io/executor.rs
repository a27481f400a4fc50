//! Executor abstraction for applying task effects.
//!
//! The [`TaskExecutor`] trait decouples the queue's driving loop from the
//! filesystem. Tests use scripted executors that return predetermined results
//! without touching disk.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::core::types::{TaskAction, WriteMode};
use crate::error::TaskError;

/// Abstraction over task effect backends.
pub trait TaskExecutor {
    /// Apply `action`. Any error is recorded on the task; the queue moves on.
    fn execute(&self, action: &TaskAction) -> Result<(), TaskError>;
}

impl<T: TaskExecutor + ?Sized> TaskExecutor for &T {
    fn execute(&self, action: &TaskAction) -> Result<(), TaskError> {
        (**self).execute(action)
    }
}

impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    fn execute(&self, action: &TaskAction) -> Result<(), TaskError> {
        (**self).execute(action)
    }
}

/// Executor that applies file operations on the local filesystem.
///
/// Relative paths resolve against `workdir` when one is set, otherwise against
/// the process working directory. Commands are never run.
#[derive(Debug, Clone, Default)]
pub struct FsExecutor {
    workdir: Option<PathBuf>,
}

impl FsExecutor {
    pub fn new(workdir: Option<PathBuf>) -> Self {
        Self { workdir }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workdir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl TaskExecutor for FsExecutor {
    #[instrument(skip_all, fields(kind = action.kind()))]
    fn execute(&self, action: &TaskAction) -> Result<(), TaskError> {
        match action {
            TaskAction::FileEdit {
                file_path,
                content,
                mode,
            } => edit_file(&self.resolve(file_path), content, *mode),
            TaskAction::FileCreate { file_path, content } => {
                create_file(&self.resolve(file_path), content)
            }
            TaskAction::FileDelete { file_path } => {
                let path = self.resolve(file_path);
                debug!(path = %path.display(), "deleting file");
                fs::remove_file(&path).map_err(|err| TaskError::io("delete", path, err))
            }
            TaskAction::Command { command } => {
                warn!(%command, "refusing to execute command task");
                Err(TaskError::Unsupported {
                    command: command.clone(),
                })
            }
            TaskAction::Unknown { kind, .. } => {
                warn!(kind, "refusing task of unknown type");
                Err(TaskError::UnknownType(kind.clone()))
            }
        }
    }
}

fn edit_file(path: &Path, content: &str, mode: WriteMode) -> Result<(), TaskError> {
    debug!(path = %path.display(), ?mode, bytes = content.len(), "editing file");
    match mode {
        WriteMode::Append => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| TaskError::io("edit", path, err))?;
            file.write_all(content.as_bytes())
                .map_err(|err| TaskError::io("edit", path, err))
        }
        WriteMode::Overwrite => {
            fs::write(path, content).map_err(|err| TaskError::io("edit", path, err))
        }
    }
}

fn create_file(path: &Path, content: &str) -> Result<(), TaskError> {
    debug!(path = %path.display(), bytes = content.len(), "creating file");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| TaskError::io("create", parent, err))?;
    }
    fs::write(path, content).map_err(|err| TaskError::io("create", path, err))
}
