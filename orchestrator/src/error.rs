//! Typed errors for the orchestration core.
//!
//! Plumbing (config files, the queue file, the CLI) reports through
//! `anyhow`; these enums cover the failures callers are expected to match on.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::plan::{PlanId, PlanStatus};

/// Failure applying a single task. Recorded verbatim in the task's `error`.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{operation} {} failed: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("command execution is unsupported: `{command}`")]
    Unsupported { command: String },

    #[error("unknown task type `{0}`")]
    UnknownType(String),
}

impl TaskError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Plan lookup and lifecycle errors, surfaced synchronously to the caller.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan {0} not found")]
    NotFound(PlanId),

    #[error("plan {0} is already executing")]
    AlreadyExecuting(PlanId),

    #[error("plan {0} is already {1:?}")]
    AlreadyTerminal(PlanId, PlanStatus),

    #[error("plan {0} is {1:?}; only completed or cancelled plans can be evicted")]
    NotTerminal(PlanId, PlanStatus),
}

/// Agent pool errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("agent pool is at capacity ({max} agents)")]
    AtCapacity { max: usize },

    #[error("agent {0} already exists")]
    Duplicate(String),

    #[error("agent {0} not found")]
    UnknownAgent(String),
}
