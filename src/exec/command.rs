// src/exec/command.rs

//! Scoped wrapper around external processes.
//!
//! Every external call the node agent makes (runtime commands, kill probes,
//! launch wrappers) goes through [`CommandRunner`], which captures stdout and
//! stderr, maps the exit status to a plain code and kills the child if the
//! caller stops waiting for it.

use std::collections::BTreeMap;
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use crate::errors::{NodevisorError, Result};

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment entries layered over the agent's own environment.
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
    /// Kill the process if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env).kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Map an exit status to a shell-style code: signals become `128 + signo`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}

/// Runs external commands.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run to completion and capture output. A non-zero exit is **not** an
    /// error here; see [`run_checked`](Self::run_checked).
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec, "running external command");

        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            NodevisorError::Other(anyhow::anyhow!("spawning `{}`: {}", spec, e))
        })?;

        // Dropping the wait future drops the child, and kill_on_drop
        // terminates it.
        let output = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(res) => res?,
                Err(_) => {
                    warn!(command = %spec, timeout = ?limit, "command timed out; killed");
                    return Err(NodevisorError::CommandTimedOut(spec.to_string()));
                }
            },
            None => child.wait_with_output().await?,
        };

        let result = CommandOutput {
            exit_code: exit_code_of(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %spec, exit_code = result.exit_code, "external command finished");
        Ok(result)
    }

    /// Like [`run`](Self::run) but turns a non-zero exit into
    /// [`NodevisorError::CommandFailed`].
    pub async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec).await?;
        if !output.success() {
            return Err(NodevisorError::CommandFailed {
                command: spec.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Start a long-running command whose stdout is consumed line by line.
    ///
    /// stderr is drained in the background and logged at debug level.
    pub fn spawn_streaming(&self, spec: &CommandSpec) -> Result<StreamingCommand> {
        debug!(command = %spec, "starting streaming command");

        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            NodevisorError::Other(anyhow::anyhow!("spawning `{}`: {}", spec, e))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            NodevisorError::Other(anyhow::anyhow!("no stdout pipe for `{}`", spec))
        })?;

        if let Some(stderr) = child.stderr.take() {
            let label = spec.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(command = %label, "stderr: {}", line);
                }
            });
        }

        Ok(StreamingCommand {
            label: spec.to_string(),
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

/// A running command with a line reader over its stdout.
#[derive(Debug)]
pub struct StreamingCommand {
    label: String,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl StreamingCommand {
    /// Next stdout line; `Ok(None)` once the stream is closed.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }

    /// Force-terminate the process and reap it.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(command = %self.label, error = %e, "kill of streaming command failed");
        }
    }
}
