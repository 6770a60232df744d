// src/exec/process.rs

//! Host process probes shared by the backends.

use std::time::Duration;

use tracing::debug;

use crate::errors::Result;
use crate::exec::command::{CommandRunner, CommandSpec};
use crate::types::Signal;

/// `kill -<signo> <pid>` through the shell builtin, which exists even on
/// hosts without a standalone `kill` binary.
pub fn kill_command(signo: i32, pid: u32) -> CommandSpec {
    CommandSpec::new("sh")
        .arg("-c")
        .arg(format!("kill -{signo} \"$1\""))
        .arg("kill")
        .arg(pid.to_string())
}

/// `kill -0 <pid>`: a zero exit means the process exists.
pub async fn process_is_alive(runner: &CommandRunner, pid: u32, timeout: Duration) -> Result<bool> {
    let spec = kill_command(0, pid).timeout(timeout);
    let output = runner.run(&spec).await?;
    Ok(output.success())
}

/// `kill -<signo> <pid>`; a non-zero exit is an error.
pub async fn send_signal(
    runner: &CommandRunner,
    pid: u32,
    signal: Signal,
    timeout: Duration,
) -> Result<()> {
    let spec = kill_command(signal.number(), pid).timeout(timeout);
    runner.run_checked(&spec).await?;
    Ok(())
}

/// Race-tolerant signal delivery.
///
/// Returns `false` without signalling when the process is already gone, and
/// also when the kill fails because the process exited in the meantime.
pub async fn signal_process(
    runner: &CommandRunner,
    user: &str,
    pid: u32,
    signal: Signal,
    timeout: Duration,
) -> Result<bool> {
    debug!(user, pid, signal = signal.number(), "sending signal");

    if !process_is_alive(runner, pid, timeout).await? {
        return Ok(false);
    }

    if let Err(e) = send_signal(runner, pid, signal, timeout).await {
        if !process_is_alive(runner, pid, timeout).await? {
            debug!(pid, error = %e, "process exited while being signalled");
            return Ok(false);
        }
        return Err(e);
    }
    Ok(true)
}
