//! Stderr log for the orchestrator binary.
//!
//! Everything is emitted under the `orchestrator` target. What each level
//! carries:
//! - `error`: a task that failed, or a queue write that could not be
//!   persisted (in-memory state carries on).
//! - `warn`: refused `command` and unknown-type tasks, an unreadable queue
//!   file, tasks found interrupted at load, an unfinished batch discarded by
//!   a bulk submission, and chunks that finished with task errors.
//! - `info`: plan lifecycle (created, executing, completed, cancelled),
//!   queue approval and replacement, and every notification delivered by
//!   [`crate::io::notify::LogSink`].
//! - `debug`: individual queue steps, file effects, agent pickup and waits,
//!   and deferred purges.
//!
//! Only `warn` and above show by default, so notifications stay silent unless
//! asked for with `RUST_LOG=orchestrator=info`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directive used when `RUST_LOG` is unset or does not parse.
const DEFAULT_FILTER: &str = "warn";

/// Install the stderr subscriber, filtered by `RUST_LOG`.
///
/// # Example
/// ```bash
/// RUST_LOG=orchestrator=info orchestrator run tasks.json --approval-token t
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(filter_from(std::env::var("RUST_LOG").ok().as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_malformed_filter_falls_back_to_warn() {
        assert_eq!(filter_from(None).to_string(), DEFAULT_FILTER);
        assert_eq!(filter_from(Some("orchestrator=loud")).to_string(), DEFAULT_FILTER);
    }

    #[test]
    fn notification_filter_is_kept() {
        assert_eq!(
            filter_from(Some("orchestrator=info")).to_string(),
            "orchestrator=info"
        );
    }
}
