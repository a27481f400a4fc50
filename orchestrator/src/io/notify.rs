//! Fire-and-forget delivery of progress events.
//!
//! Events go onto a channel and a dedicated thread hands them to the sink, so
//! a slow or failing sink never stalls the queue or the scheduler. Delivery
//! errors are logged and dropped.

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::plan::PlanId;
use crate::core::types::TaskId;

/// Progress event published to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    TaskStarted {
        task_id: TaskId,
        task_type: String,
    },
    TaskCompleted {
        task_id: TaskId,
    },
    TaskFailed {
        task_id: TaskId,
        error: String,
    },
    PlanStarted {
        plan_id: PlanId,
        total_chunks: usize,
    },
    ChunkDispatched {
        plan_id: PlanId,
        chunk_index: usize,
        agent_id: String,
        tasks: usize,
    },
    PlanCompleted {
        plan_id: PlanId,
    },
    PlanCancelled {
        plan_id: PlanId,
    },
}

impl Event {
    /// Event kind as serialized in the `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TaskStarted { .. } => "task_started",
            Event::TaskCompleted { .. } => "task_completed",
            Event::TaskFailed { .. } => "task_failed",
            Event::PlanStarted { .. } => "plan_started",
            Event::ChunkDispatched { .. } => "chunk_dispatched",
            Event::PlanCompleted { .. } => "plan_completed",
            Event::PlanCancelled { .. } => "plan_cancelled",
        }
    }
}

/// External collaborator receiving progress events.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, event: &Event) -> Result<()>;
}

/// Sink that writes events to the tracing log.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event).context("serialize event")?;
        info!(kind = event.kind(), %payload, "notification");
        Ok(())
    }
}

/// Handle used by the store and scheduler to publish events.
pub struct Notifier {
    tx: Option<Sender<Event>>,
    worker: Option<JoinHandle<()>>,
}

impl Notifier {
    /// Start a delivery thread feeding `sink`.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Event>();
        let worker = thread::Builder::new()
            .name("notifications".to_string())
            .spawn(move || {
                for event in rx {
                    if let Err(err) = sink.deliver(&event) {
                        warn!(
                            kind = event.kind(),
                            error = %format!("{err:#}"),
                            "notification delivery failed"
                        );
                    }
                }
            })
            .context("spawn notification thread")?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// A notifier that drops every event.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            worker: None,
        }
    }

    /// Queue `event` for delivery. Never blocks.
    pub fn emit(&self, event: Event) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).is_err() {
            debug!("notification thread gone; event dropped");
        }
    }

    /// Stop accepting events and wait for queued ones to be delivered.
    /// Dropping the notifier does the same.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        self.tx.take();
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.join().is_err() {
            warn!("notification thread panicked");
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.finish();
    }
}
