// src/container/pid.rs

//! Pid files: one per container, holding the host process id.
//!
//! Writers go through a uniquely named temp file in the same directory that is
//! renamed over the final path, so a reader sees either no file or the whole
//! value.

use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Duration;

use tempfile::Builder;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::errors::{NodevisorError, Result};

const PID_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Atomically publish `pid` at `path`.
pub fn write_pid_file_atomic(path: &Path, pid: u32) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = Builder::new()
        .prefix(".pid")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    writeln!(tmp, "{pid}")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| NodevisorError::IoError(e.error))?;

    debug!(pid, pid_file = ?path, "wrote pid file");
    Ok(())
}

/// Read a pid file. `Ok(None)` when it does not exist yet.
pub fn read_pid_file(path: &Path) -> Result<Option<u32>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<u32>().map(Some).map_err(|e| {
        NodevisorError::Other(anyhow::anyhow!(
            "pid file {:?} holds '{}': {}",
            path,
            trimmed,
            e
        ))
    })
}

/// Poll until the pid file appears or `timeout` elapses.
pub async fn wait_for_pid_file(path: &Path, timeout: Duration) -> Result<Option<u32>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(pid) = read_pid_file(path)? {
            return Ok(Some(pid));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        sleep(PID_POLL_INTERVAL).await;
    }
}
