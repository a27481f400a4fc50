//! Task orchestrator CLI.
//!
//! Submits task lists as chunked plans, and inspects or resumes the durable
//! queue at `queue_path` (default `.assistant/task_queue.json`).

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use jsonschema::Draft;
use serde::Serialize;
use serde_json::Value;

use orchestrator::core::plan::PlanContext;
use orchestrator::core::types::{TaskAction, TaskQueueState};
use orchestrator::exit_codes;
use orchestrator::io::config::{
    DEFAULT_CONFIG_PATH, OrchestratorConfig, load_config, write_config,
};
use orchestrator::io::queue_file::load_queue_state;
use orchestrator::logging;
use orchestrator::scheduler::Orchestrator;

const TASK_LIST_SCHEMA: &str = include_str!("../../schemas/task_list/v1.schema.json");

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version,
    about = "Chunked task orchestration over a durable, approval-gated queue"
)]
struct Cli {
    /// Config file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Plan and execute a JSON task list, printing the plan's final progress.
    Run {
        /// JSON array of tasks.
        tasks: PathBuf,
        /// Token recorded as the approval of every chunk.
        #[arg(long)]
        approval_token: String,
    },
    /// Append one task (a JSON object) to the queue without approving it.
    Add { task: PathBuf },
    /// Approve whatever is currently queued.
    Approve {
        #[arg(long)]
        token: String,
    },
    /// Execute pending tasks left in the queue.
    Resume,
    /// Print queue progress as JSON.
    Status,
    /// Remove completed tasks from the queue.
    Clear,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run {
            tasks,
            approval_token,
        } => cmd_run(&cli.config, &tasks, &approval_token),
        Command::Add { task } => cmd_add(&cli.config, &task),
        Command::Approve { token } => cmd_approve(&cli.config, &token),
        Command::Resume => cmd_resume(&cli.config),
        Command::Status => cmd_status(&cli.config),
        Command::Clear => cmd_clear(&cli.config),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        eprintln!("{} already exists", config_path.display());
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &OrchestratorConfig::default())?;
    println!("{}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(config_path: &Path, tasks_path: &Path, approval_token: &str) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let tasks = read_task_list(tasks_path)?;
    let orchestrator = Orchestrator::from_config(&cfg)?;

    let plan_id = orchestrator.plan_tasks(&tasks, PlanContext::new(approval_token));
    let outcome = orchestrator.execute_plan(plan_id);
    let progress = orchestrator.plan_progress(plan_id);
    orchestrator.shutdown();

    outcome?;
    let progress =
        progress.with_context(|| format!("plan {plan_id} missing after execution"))?;

    print_json(&progress)?;
    if progress.failed_tasks > 0 {
        return Ok(exit_codes::TASK_ERRORS);
    }
    Ok(exit_codes::OK)
}

fn cmd_add(config_path: &Path, task_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let raw = fs::read_to_string(task_path)
        .with_context(|| format!("read {}", task_path.display()))?;
    let value: Value = serde_json::from_str(&raw).context("parse task json")?;
    let mut tasks = parse_task_list(Value::Array(vec![value]))?;
    let Some(task) = tasks.pop() else {
        bail!("no task in {}", task_path.display());
    };

    let orchestrator = Orchestrator::from_config(&cfg)?;
    let task_id = orchestrator.add_task(task);
    orchestrator.shutdown();
    println!("{task_id}");
    Ok(exit_codes::OK)
}

fn cmd_approve(config_path: &Path, token: &str) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let orchestrator = Orchestrator::from_config(&cfg)?;
    orchestrator.approve(token);
    let progress = orchestrator.queue_progress();
    orchestrator.shutdown();
    print_json(&progress)?;
    Ok(exit_codes::OK)
}

fn cmd_resume(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let orchestrator = Orchestrator::from_config(&cfg)?;
    let summary = orchestrator.resume();
    let progress = orchestrator.queue_progress();
    orchestrator.shutdown();

    print_json(&progress)?;
    if summary.failed > 0 {
        return Ok(exit_codes::TASK_ERRORS);
    }
    Ok(exit_codes::OK)
}

/// Read-only: reports the queue file as it is, without interrupted-task
/// recovery.
fn cmd_status(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let state = if cfg.queue_path.exists() {
        load_queue_state(&cfg.queue_path)?
    } else {
        TaskQueueState::default()
    };
    print_json(&state.progress())?;
    Ok(exit_codes::OK)
}

fn cmd_clear(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let orchestrator = Orchestrator::from_config(&cfg)?;
    let removed = orchestrator.clear_completed();
    orchestrator.shutdown();
    println!("{removed}");
    Ok(exit_codes::OK)
}

fn read_task_list(path: &Path) -> Result<Vec<TaskAction>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw).context("parse task list json")?;
    parse_task_list(value)
}

/// Validate a task list against the v1 schema, then parse it.
fn parse_task_list(value: Value) -> Result<Vec<TaskAction>> {
    let schema: Value = serde_json::from_str(TASK_LIST_SCHEMA).context("parse task list schema")?;
    validate_schema(&value, &schema)?;
    serde_json::from_value(value).context("parse task list as v1 tasks")
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::core::types::WriteMode;
    use serde_json::json;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["orchestrator", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn parse_run_with_token_and_config() {
        let cli = Cli::parse_from([
            "orchestrator",
            "run",
            "tasks.json",
            "--approval-token",
            "tok",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Command::Run {
                tasks,
                approval_token,
            } => {
                assert_eq!(tasks, PathBuf::from("tasks.json"));
                assert_eq!(approval_token, "tok");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_requires_approval_token() {
        assert!(Cli::try_parse_from(["orchestrator", "run", "tasks.json"]).is_err());
    }

    #[test]
    fn task_list_parses_every_type() {
        let tasks = parse_task_list(json!([
            {"type": "file_edit", "filePath": "a.txt", "content": "x"},
            {"type": "file_edit", "filePath": "b.txt", "content": "y", "mode": "overwrite"},
            {"type": "file_create", "filePath": "c.txt", "content": ""},
            {"type": "file_delete", "filePath": "d.txt"},
            {"type": "command", "command": "ls"}
        ]))
        .expect("parse");

        assert_eq!(tasks.len(), 5);
        assert!(matches!(
            &tasks[0],
            TaskAction::FileEdit {
                mode: WriteMode::Append,
                ..
            }
        ));
        assert!(matches!(
            &tasks[1],
            TaskAction::FileEdit {
                mode: WriteMode::Overwrite,
                ..
            }
        ));
        assert_eq!(tasks[4].kind(), "command");
    }

    #[test]
    fn task_list_rejects_unknown_type_and_missing_fields() {
        let err = parse_task_list(json!([{"type": "shell", "command": "ls"}]))
            .expect_err("unknown type");
        assert!(err.to_string().contains("schema validation failed"));

        let err =
            parse_task_list(json!([{"type": "file_create", "filePath": "a"}])).expect_err("content");
        assert!(err.to_string().contains("schema validation failed"));

        let err = parse_task_list(json!({"type": "file_delete", "filePath": "a"}))
            .expect_err("not a list");
        assert!(err.to_string().contains("schema validation failed"));
    }
}
