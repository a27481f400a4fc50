//! Orchestrator configuration stored in `.assistant/orchestrator.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::agent_pool::DEFAULT_MAX_AGENTS;
use crate::core::chunking::DEFAULT_CHUNK_SIZE;
use crate::core::types::InterruptedPolicy;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".assistant/orchestrator.toml";

/// Orchestrator configuration (TOML).
///
/// Missing fields default to the values the scheduler was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Tasks per chunk handed to one agent.
    pub chunk_size: usize,

    /// Upper bound on logical agents.
    pub max_agents: usize,

    /// Longest the scheduler sleeps waiting for an agent before re-checking.
    pub agent_wait_ms: u64,

    /// Durable task queue location.
    pub queue_path: PathBuf,

    /// Handling of tasks left `in_progress` by a previous process.
    pub interrupted_policy: InterruptedPolicy,

    pub executor: ExecutorConfig,

    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Base directory for relative task paths.
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Publish progress events to the log sink.
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_agents: DEFAULT_MAX_AGENTS,
            agent_wait_ms: 1_000,
            queue_path: PathBuf::from(".assistant/task_queue.json"),
            interrupted_policy: InterruptedPolicy::default(),
            executor: ExecutorConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be > 0"));
        }
        if self.max_agents == 0 {
            return Err(anyhow!("max_agents must be > 0"));
        }
        if self.agent_wait_ms == 0 {
            return Err(anyhow!("agent_wait_ms must be > 0"));
        }
        if self.queue_path.as_os_str().is_empty() {
            return Err(anyhow!("queue_path must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OrchestratorConfig::default()`.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig> {
    if !path.exists() {
        let cfg = OrchestratorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: OrchestratorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &OrchestratorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
