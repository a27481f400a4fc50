//! CLI tests for `orchestrator run`, `status`, and `add`/`approve`/`resume`.
//!
//! Spawns the binary in a temp directory (default config, queue under
//! `.assistant/`) and checks exit codes and printed JSON.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{Value, json};

use orchestrator::exit_codes;

fn orchestrator_cmd(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_orchestrator"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn orchestrator")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).expect("serialize")).expect("write");
}

#[test]
fn run_applies_tasks_and_reports_plan_progress() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_json(
        &temp.path().join("tasks.json"),
        &json!([
            {"type": "file_create", "filePath": "out/a.txt", "content": "hello"},
            {"type": "file_edit", "filePath": "out/a.txt", "content": " world"}
        ]),
    );

    let output = orchestrator_cmd(
        temp.path(),
        &["run", "tasks.json", "--approval-token", "tok"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let progress = stdout_json(&output);
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["progress"], 100.0);
    assert_eq!(
        fs::read_to_string(temp.path().join("out/a.txt")).expect("read"),
        "hello world"
    );
    assert!(temp.path().join(".assistant/task_queue.json").exists());
}

#[test]
fn run_with_failing_task_exits_with_task_errors() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_json(
        &temp.path().join("tasks.json"),
        &json!([
            {"type": "command", "command": "echo hi"},
            {"type": "file_create", "filePath": "b.txt", "content": ""}
        ]),
    );

    let output = orchestrator_cmd(
        temp.path(),
        &["run", "tasks.json", "--approval-token", "tok"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::TASK_ERRORS));
    assert_eq!(stdout_json(&output)["failedTasks"], 1);
    assert!(temp.path().join("b.txt").exists());

    let status = orchestrator_cmd(temp.path(), &["status"]);
    assert_eq!(status.status.code(), Some(exit_codes::OK));
    let queue = stdout_json(&status);
    assert_eq!(queue["total"], 2);
    assert_eq!(queue["failed"], 1);
    assert_eq!(queue["tasks"][0]["status"], "error");
}

#[test]
fn invalid_task_list_is_rejected_before_anything_runs() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_json(
        &temp.path().join("tasks.json"),
        &json!([{"type": "file_create", "content": "no path"}]),
    );

    let output = orchestrator_cmd(
        temp.path(),
        &["run", "tasks.json", "--approval-token", "tok"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("schema validation failed"));
    assert!(!temp.path().join(".assistant/task_queue.json").exists());
}

#[test]
fn added_task_runs_only_after_approval() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_json(
        &temp.path().join("task.json"),
        &json!({"type": "file_create", "filePath": "late.txt", "content": "x"}),
    );

    let add = orchestrator_cmd(temp.path(), &["add", "task.json"]);
    assert_eq!(add.status.code(), Some(exit_codes::OK));

    let resume = orchestrator_cmd(temp.path(), &["resume"]);
    assert_eq!(resume.status.code(), Some(exit_codes::OK));
    assert!(!temp.path().join("late.txt").exists());

    let approve = orchestrator_cmd(temp.path(), &["approve", "--token", "manual"]);
    assert_eq!(approve.status.code(), Some(exit_codes::OK));
    let resume = orchestrator_cmd(temp.path(), &["resume"]);
    assert_eq!(resume.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("late.txt").exists());
    assert_eq!(stdout_json(&resume)["completed"], 1);

    let clear = orchestrator_cmd(temp.path(), &["clear"]);
    assert_eq!(String::from_utf8_lossy(&clear.stdout).trim(), "1");
}

#[test]
fn init_writes_default_config_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join(".assistant/orchestrator.toml");

    let output = orchestrator_cmd(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(&config).expect("read config");
    assert!(written.contains("chunk_size = 20"));

    fs::write(&config, "max_agents = 2\n").expect("edit config");
    orchestrator_cmd(temp.path(), &["init"]);
    assert_eq!(
        fs::read_to_string(&config).expect("read config"),
        "max_agents = 2\n"
    );
}
