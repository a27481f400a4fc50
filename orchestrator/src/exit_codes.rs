//! Stable exit codes for orchestrator CLI commands.

/// Command succeeded and every executed task completed.
pub const OK: i32 = 0;
/// Invalid input, config, or queue file, or any other error.
pub const INVALID: i32 = 1;
/// The run finished but at least one task ended in `error`.
pub const TASK_ERRORS: i32 = 2;
