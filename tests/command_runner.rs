// tests/command_runner.rs

mod common;
use crate::common::{init_tracing, TestResult};

use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use nodevisor::errors::NodevisorError;
use nodevisor::exec::process::process_is_alive;
use nodevisor::exec::{signal_process, CommandRunner, CommandSpec, CommandStaging};
use nodevisor::types::{ContainerId, Signal};

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").arg("-c").arg(script)
}

#[tokio::test]
async fn output_and_exit_code_are_captured() -> TestResult {
    init_tracing();
    let runner = CommandRunner::new();

    let out = runner.run(&sh("echo out; echo err >&2; exit 3")).await?;
    assert_eq!(out.exit_code, 3);
    assert_eq!(out.stdout, "out\n");
    assert_eq!(out.stderr, "err\n");
    assert!(!out.success());
    Ok(())
}

#[tokio::test]
async fn run_checked_turns_failure_into_an_error() {
    init_tracing();
    let runner = CommandRunner::new();

    match runner.run_checked(&sh("echo broken >&2; exit 7")).await {
        Err(NodevisorError::CommandFailed {
            exit_code, stderr, ..
        }) => {
            assert_eq!(exit_code, 7);
            assert_eq!(stderr, "broken");
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn signalled_processes_report_128_plus_signo() -> TestResult {
    init_tracing();
    let out = CommandRunner::new().run(&sh("kill -TERM $$")).await?;
    assert_eq!(out.exit_code, 143);
    Ok(())
}

#[tokio::test]
async fn timed_out_commands_are_killed() {
    init_tracing();
    let started = Instant::now();
    let result = CommandRunner::new()
        .run(&sh("sleep 30").timeout(Duration::from_millis(200)))
        .await;

    assert!(matches!(result, Err(NodevisorError::CommandTimedOut(_))));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn environment_and_working_directory_are_applied() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let mut env = std::collections::BTreeMap::new();
    env.insert("NODEVISOR_TEST_VAR".to_string(), "hello".to_string());

    let out = CommandRunner::new()
        .run(&sh("echo $NODEVISOR_TEST_VAR; pwd").envs(&env).current_dir(dir.path()))
        .await?;

    let lines: Vec<&str> = out.stdout.lines().collect();
    assert_eq!(lines[0], "hello");
    assert_eq!(
        std::fs::canonicalize(lines[1])?,
        std::fs::canonicalize(dir.path())?
    );
    Ok(())
}

#[test]
fn staged_command_files_are_unique_and_private() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let staging = CommandStaging::new(dir.path(), "nodevisor-cmd-", ".sh");
    let id = ContainerId::new("container_9");
    let create = CommandSpec::new("docker").args(["create", "--name", "container_9", "centos"]);

    let first = staging.stage(&id, &[&create])?;
    let second = staging.stage(&id, &[&create])?;

    assert_ne!(first, second);
    let name = first.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("nodevisor-cmd-container_9-"), "{name}");
    assert!(name.ends_with(".sh"));

    let contents = std::fs::read_to_string(&first)?;
    assert_eq!(contents, "#!/bin/sh\ndocker create --name container_9 centos\n");
    let mode = std::fs::metadata(&first)?.permissions().mode() & 0o777;
    assert_eq!(mode & 0o077, 0, "staged file is readable by others: {mode:o}");
    Ok(())
}

#[test]
fn staged_command_lines_split_back_into_argv() -> TestResult {
    let dir = TempDir::new()?;
    let staging = CommandStaging::new(dir.path(), "cmd-", ".sh");
    let id = ContainerId::new("container_10");
    let start = CommandSpec::new("docker")
        .args(["-H", "tcp://host:2375", "start", "-a"])
        .arg("it's a $name");

    let path = staging.stage(&id, &[&start])?;
    let contents = std::fs::read_to_string(&path)?;
    let line = contents.lines().nth(1).unwrap();

    assert_eq!(shell_words::split(line)?, start.argv());
    Ok(())
}

#[tokio::test]
async fn signalling_a_live_process() -> TestResult {
    init_tracing();
    let runner = CommandRunner::new();
    let mut child = tokio::process::Command::new("sleep")
        .arg("30")
        .kill_on_drop(true)
        .spawn()?;
    let pid = child.id().unwrap();
    let timeout = Duration::from_secs(5);

    assert!(process_is_alive(&runner, pid, timeout).await?);
    assert!(signal_process(&runner, "nobody", pid, Signal::Term, timeout).await?);

    let status = tokio::time::timeout(Duration::from_secs(5), child.wait()).await??;
    assert!(!status.success());
    Ok(())
}

#[tokio::test]
async fn signalling_a_dead_process_is_a_no_op() -> TestResult {
    init_tracing();
    let runner = CommandRunner::new();
    let mut child = tokio::process::Command::new("true").spawn()?;
    let pid = child.id().unwrap();
    child.wait().await?;

    let timeout = Duration::from_secs(5);
    assert!(!process_is_alive(&runner, pid, timeout).await?);
    assert!(!signal_process(&runner, "nobody", pid, Signal::Kill, timeout).await?);
    Ok(())
}
