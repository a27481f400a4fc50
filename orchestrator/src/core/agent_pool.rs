//! Logical agent slots and their busy/idle bookkeeping.
//!
//! Agents do not execute anything themselves. They account for which chunk is
//! in flight and how many tasks each slot has handled; the actual work runs
//! through the single shared task store.

use serde::Serialize;

use crate::core::types::TaskAction;
use crate::error::PoolError;

/// Default upper bound on agent slots.
pub const DEFAULT_MAX_AGENTS: usize = 5;

/// The only agent type currently created.
pub const GENERAL_AGENT: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: AgentStatus,
    /// First task of the chunk being processed.
    pub current_task: Option<TaskAction>,
    /// Tasks handed to this agent so far, counted whether or not they succeeded.
    pub completed_tasks: usize,
}

/// Bounded, grow-only set of agents. Insertion order decides which idle agent
/// is handed out first.
#[derive(Debug, Clone)]
pub struct AgentPool {
    agents: Vec<Agent>,
    max_agents: usize,
}

impl Default for AgentPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGENTS)
    }
}

impl AgentPool {
    pub fn new(max_agents: usize) -> Self {
        Self {
            agents: Vec::new(),
            max_agents,
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.max_agents
    }

    /// Register a new idle agent.
    pub fn create_agent(&mut self, id: &str, kind: &str) -> Result<&Agent, PoolError> {
        if self.is_full() {
            return Err(PoolError::AtCapacity {
                max: self.max_agents,
            });
        }
        if self.get(id).is_some() {
            return Err(PoolError::Duplicate(id.to_string()));
        }
        self.agents.push(Agent {
            id: id.to_string(),
            kind: kind.to_string(),
            status: AgentStatus::Idle,
            current_task: None,
            completed_tasks: 0,
        });
        Ok(&self.agents[self.agents.len() - 1])
    }

    /// First idle agent, creating `agent_<n>` when none is idle and the pool
    /// has room. `None` means every slot is busy.
    pub fn available_agent(&mut self) -> Option<String> {
        if let Some(agent) = self
            .agents
            .iter()
            .find(|agent| agent.status == AgentStatus::Idle)
        {
            return Some(agent.id.clone());
        }
        let id = format!("agent_{}", self.agents.len() + 1);
        self.create_agent(&id, GENERAL_AGENT)
            .ok()
            .map(|agent| agent.id.clone())
    }

    /// Take the first available agent and mark it busy with a chunk starting
    /// at `first_task`.
    pub fn claim(&mut self, first_task: Option<TaskAction>) -> Option<String> {
        let id = self.available_agent()?;
        self.mark_busy(&id, first_task).ok()?;
        Some(id)
    }

    /// Mark an agent busy with a chunk whose first task is `first_task`.
    pub fn mark_busy(&mut self, id: &str, first_task: Option<TaskAction>) -> Result<(), PoolError> {
        let agent = self.get_mut(id)?;
        agent.status = AgentStatus::Busy;
        agent.current_task = first_task;
        Ok(())
    }

    /// Return an agent to idle, crediting it with `handled` tasks.
    pub fn release(&mut self, id: &str, handled: usize) -> Result<(), PoolError> {
        let agent = self.get_mut(id)?;
        agent.completed_tasks += handled;
        agent.status = AgentStatus::Idle;
        agent.current_task = None;
        Ok(())
    }

    /// Number of agents currently busy.
    pub fn active_count(&self) -> usize {
        self.agents
            .iter()
            .filter(|agent| agent.status == AgentStatus::Busy)
            .count()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Agent, PoolError> {
        self.agents
            .iter_mut()
            .find(|agent| agent.id == id)
            .ok_or_else(|| PoolError::UnknownAgent(id.to_string()))
    }
}
