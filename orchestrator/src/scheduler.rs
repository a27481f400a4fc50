//! Plan scheduling: chunk dispatch over the agent pool and the shared queue.
//!
//! [`Orchestrator`] owns the task store, the agent pool, and the plan
//! registry. Share it between threads with an `Arc`; every method takes
//! `&self`.
//!
//! Locking discipline:
//! - The pool mutex is never acquired while the plan registry is held.
//! - A chunk holds the store mutex from its bulk submission until the queue
//!   is drained, so concurrent plans run chunk after chunk instead of
//!   replacing each other's batches.
//! - Every store access goes through `with_store`, which applies a purge a
//!   cancel could not perform because the store was busy.
//! - Waiting for an agent parks on `agent_released`, which is signalled when
//!   an agent goes idle and when a plan is cancelled. `agent_wait` bounds each
//!   wait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::agent_pool::{Agent, AgentPool, DEFAULT_MAX_AGENTS};
use crate::core::chunking::DEFAULT_CHUNK_SIZE;
use crate::core::ids::IdSource;
use crate::core::plan::{Plan, PlanContext, PlanId, PlanProgress, PlanStatus};
use crate::core::types::{DrainSummary, QueueProgress, TaskAction, TaskId};
use crate::error::PlanError;
use crate::io::clock::now_millis;
use crate::io::config::OrchestratorConfig;
use crate::io::executor::{FsExecutor, TaskExecutor};
use crate::io::notify::{Event, LogSink, Notifier};
use crate::store::TaskStore;

/// Scheduling knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub chunk_size: usize,
    pub max_agents: usize,
    /// Upper bound on a single wait for an idle agent.
    pub agent_wait: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_agents: DEFAULT_MAX_AGENTS,
            agent_wait: Duration::from_secs(1),
        }
    }
}

impl From<&OrchestratorConfig> for SchedulerConfig {
    fn from(cfg: &OrchestratorConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size,
            max_agents: cfg.max_agents,
            agent_wait: Duration::from_millis(cfg.agent_wait_ms),
        }
    }
}

pub struct Orchestrator<E> {
    config: SchedulerConfig,
    executor: E,
    store: Mutex<TaskStore>,
    pool: Mutex<AgentPool>,
    agent_released: Condvar,
    plans: Mutex<HashMap<PlanId, Plan>>,
    plan_ids: Mutex<IdSource>,
    /// Purge of completed records requested by a cancel and not yet applied.
    /// Whoever next holds or releases the store applies it.
    purge_requested: AtomicBool,
    notifier: Notifier,
}

impl Orchestrator<FsExecutor> {
    /// Build an orchestrator from config: the queue file, a filesystem
    /// executor, and (if enabled) log-backed notifications.
    pub fn from_config(cfg: &OrchestratorConfig) -> Result<Self> {
        cfg.validate()?;
        let store = TaskStore::open(&cfg.queue_path, cfg.interrupted_policy);
        let executor = FsExecutor::new(cfg.executor.workdir.clone());
        let notifier = if cfg.notifications.enabled {
            Notifier::spawn(Arc::new(LogSink))?
        } else {
            Notifier::disabled()
        };
        Ok(Self::new(SchedulerConfig::from(cfg), store, executor, notifier))
    }
}

impl<E: TaskExecutor> Orchestrator<E> {
    pub fn new(config: SchedulerConfig, store: TaskStore, executor: E, notifier: Notifier) -> Self {
        let pool = AgentPool::new(config.max_agents);
        Self {
            config,
            executor,
            store: Mutex::new(store),
            pool: Mutex::new(pool),
            agent_released: Condvar::new(),
            plans: Mutex::new(HashMap::new()),
            plan_ids: Mutex::new(IdSource::new()),
            purge_requested: AtomicBool::new(false),
            notifier,
        }
    }

    /// Chunk `tasks` and register a plan in `planned` state.
    pub fn plan_tasks(&self, tasks: &[TaskAction], context: PlanContext) -> PlanId {
        let id = PlanId(lock(&self.plan_ids).next_at(now_millis()));
        let plan = Plan::new(id, tasks, self.config.chunk_size, context);
        info!(plan_id = %id, tasks = tasks.len(), chunks = plan.chunks.len(), "plan created");
        lock(&self.plans).insert(id, plan);
        id
    }

    /// Dispatch every chunk of a plan, blocking until it completes or is
    /// cancelled.
    ///
    /// Cancellation is checked before each chunk and while waiting for an
    /// agent; a chunk already running finishes. Returns the final status.
    #[instrument(skip(self), fields(plan_id = %id))]
    pub fn execute_plan(&self, id: PlanId) -> Result<PlanStatus, PlanError> {
        let total_chunks = {
            let mut plans = lock(&self.plans);
            let plan = plans.get_mut(&id).ok_or(PlanError::NotFound(id))?;
            plan.begin()?;
            if plan.status.is_terminal() {
                debug!(status = ?plan.status, "plan already finished");
                return Ok(plan.status);
            }
            plan.chunks.len()
        };
        info!(total_chunks, "executing plan");
        self.notifier.emit(Event::PlanStarted {
            plan_id: id,
            total_chunks,
        });

        loop {
            let Some((index, chunk, context)) = self.next_dispatch(id)? else {
                break;
            };
            let first_task = chunk.first().cloned();
            let Some(agent_id) = self.wait_for_agent(id, first_task)? else {
                break;
            };
            self.notifier.emit(Event::ChunkDispatched {
                plan_id: id,
                chunk_index: index,
                agent_id: agent_id.clone(),
                tasks: chunk.len(),
            });
            let summary = self.assign_tasks_to_agent(&agent_id, &chunk, &context);
            if let Some(plan) = lock(&self.plans).get_mut(&id) {
                plan.failed_tasks += summary.failed;
                plan.advance();
            }
        }

        let status = self.plan_status(id)?;
        match status {
            PlanStatus::Completed => {
                info!("plan completed");
                self.notifier.emit(Event::PlanCompleted { plan_id: id });
            }
            PlanStatus::Cancelled => info!("plan stopped after cancellation"),
            PlanStatus::Planned | PlanStatus::Executing => {}
        }
        Ok(status)
    }

    /// Snapshot of a plan's progress, or `None` for an unknown id.
    pub fn plan_progress(&self, id: PlanId) -> Option<PlanProgress> {
        let plan = lock(&self.plans).get(&id).cloned()?;
        let active_agents = lock(&self.pool).active_count();
        Some(plan.progress(active_agents))
    }

    /// Cancel a plan and purge completed records from the queue.
    ///
    /// Never waits for an in-flight chunk; if one holds the queue, the purge
    /// happens as soon as it finishes.
    pub fn cancel_plan(&self, id: PlanId) -> Result<(), PlanError> {
        {
            let mut plans = lock(&self.plans);
            let plan = plans.get_mut(&id).ok_or(PlanError::NotFound(id))?;
            plan.cancel()?;
        }
        info!(plan_id = %id, "plan cancelled");
        self.notifier.emit(Event::PlanCancelled { plan_id: id });
        self.wake_waiters();

        self.purge_requested.store(true, Ordering::SeqCst);
        self.apply_pending_purge();
        Ok(())
    }

    /// Drop a completed or cancelled plan from the registry.
    pub fn evict_plan(&self, id: PlanId) -> Result<Plan, PlanError> {
        let mut plans = lock(&self.plans);
        let status = plans.get(&id).ok_or(PlanError::NotFound(id))?.status;
        if !status.is_terminal() {
            return Err(PlanError::NotTerminal(id, status));
        }
        debug!(plan_id = %id, "evicting plan");
        plans.remove(&id).ok_or(PlanError::NotFound(id))
    }

    pub fn plan_ids(&self) -> Vec<PlanId> {
        let mut ids: Vec<PlanId> = lock(&self.plans).keys().copied().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every agent created so far.
    pub fn agents(&self) -> Vec<Agent> {
        lock(&self.pool).agents().to_vec()
    }

    /// Append a single task to the queue (not approved by this call).
    pub fn add_task(&self, action: TaskAction) -> TaskId {
        self.with_store(|store| store.add_task(action))
    }

    pub fn approve(&self, approval_token: &str) {
        self.with_store(|store| store.approve(approval_token));
    }

    /// Drain whatever is pending in the queue, e.g. after a restart.
    pub fn resume(&self) -> DrainSummary {
        self.with_store(|store| store.drain(&self.executor, &self.notifier))
    }

    pub fn queue_progress(&self) -> QueueProgress {
        self.with_store(|store| store.progress())
    }

    pub fn clear_completed(&self) -> usize {
        self.with_store(|store| store.clear_completed_tasks())
    }

    /// Flush pending notifications and stop the delivery thread.
    pub fn shutdown(self) {
        self.notifier.close();
    }

    /// Run one chunk on `agent_id`: submit it as the queue's batch, drain it,
    /// then return the agent to idle.
    ///
    /// The agent is credited with the full chunk even when tasks fail.
    fn assign_tasks_to_agent(
        &self,
        agent_id: &str,
        tasks: &[TaskAction],
        context: &PlanContext,
    ) -> DrainSummary {
        debug!(agent_id, tasks = tasks.len(), "agent picked up chunk");
        let summary = self.with_store(|store| {
            store.add_bulk_tasks(tasks, &context.approval_token);
            store.drain(&self.executor, &self.notifier)
        });
        if summary.failed > 0 {
            warn!(agent_id, failed = summary.failed, "chunk finished with task errors");
        }

        let mut pool = lock(&self.pool);
        if let Err(err) = pool.release(agent_id, tasks.len()) {
            warn!(agent_id, error = %err, "released agent missing from pool");
        }
        self.agent_released.notify_all();
        summary
    }

    /// Chunk under the plan's cursor, or `None` once the plan stops. Marks the
    /// plan completed when the cursor has reached the end.
    fn next_dispatch(
        &self,
        id: PlanId,
    ) -> Result<Option<(usize, Vec<TaskAction>, PlanContext)>, PlanError> {
        let mut plans = lock(&self.plans);
        let plan = plans.get_mut(&id).ok_or(PlanError::NotFound(id))?;
        if plan.status == PlanStatus::Cancelled {
            return Ok(None);
        }
        if plan.complete_if_exhausted() {
            return Ok(None);
        }
        Ok(plan
            .next_chunk()
            .map(|chunk| (plan.current_chunk, chunk.to_vec(), plan.context.clone())))
    }

    /// Claim an idle agent for the plan, waiting if every slot is busy.
    /// Returns `None` if the plan is cancelled first.
    fn wait_for_agent(
        &self,
        id: PlanId,
        first_task: Option<TaskAction>,
    ) -> Result<Option<String>, PlanError> {
        let mut pool = lock(&self.pool);
        loop {
            if self.plan_status(id)? == PlanStatus::Cancelled {
                return Ok(None);
            }
            if let Some(agent_id) = pool.claim(first_task.clone()) {
                return Ok(Some(agent_id));
            }
            debug!("no agent available; waiting");
            pool = self
                .agent_released
                .wait_timeout(pool, self.config.agent_wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Run `f` with the store locked.
    ///
    /// A purge requested by a cancel that found the store busy is applied
    /// before and after `f`, and once more after unlocking in case the request
    /// landed between the last check and the unlock.
    fn with_store<T>(&self, f: impl FnOnce(&mut TaskStore) -> T) -> T {
        let result = {
            let mut store = lock(&self.store);
            self.take_pending_purge(&mut store);
            let result = f(&mut *store);
            self.take_pending_purge(&mut store);
            result
        };
        self.apply_pending_purge();
        result
    }

    /// Purge now if the store is free. Otherwise leave the request for the
    /// current holder, which re-checks before and after it unlocks.
    fn apply_pending_purge(&self) {
        if !self.purge_requested.load(Ordering::SeqCst) {
            return;
        }
        let mut store = match self.store.try_lock() {
            Ok(store) => store,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("queue busy; purge left to the current holder");
                return;
            }
        };
        self.take_pending_purge(&mut store);
    }

    fn take_pending_purge(&self, store: &mut TaskStore) {
        if self.purge_requested.swap(false, Ordering::SeqCst) {
            let removed = store.clear_completed_tasks();
            debug!(removed, "purged completed tasks after cancellation");
        }
    }

    fn plan_status(&self, id: PlanId) -> Result<PlanStatus, PlanError> {
        lock(&self.plans)
            .get(&id)
            .map(|plan| plan.status)
            .ok_or(PlanError::NotFound(id))
    }

    fn wake_waiters(&self) {
        let _pool = lock(&self.pool);
        self.agent_released.notify_all();
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
