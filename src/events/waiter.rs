// src/events/waiter.rs

//! Per-container pid resolution.
//!
//! A waiter subscribes to the bus when it is armed, i.e. before the runtime's
//! `start` command is issued, so the matching `Started` event cannot slip by.
//! Once it sees that event it asks the runtime for the container's host pid
//! and publishes it through the atomic pid-file writer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::container::{write_pid_file_atomic, ContainerTracker};
use crate::errors::{NodevisorError, Result};
use crate::events::{RuntimeEventBus, RuntimeEventKind, Subscription};
use crate::exec::{CommandRunner, CommandSpec};
use crate::types::ContainerId;

/// Shortest event id accepted as an abbreviation of the watched id.
pub const MIN_SHORT_ID_LEN: usize = 12;

/// Watches the bus for one runtime id.
#[derive(Debug, Clone)]
pub struct ContainerStartWaiter {
    pub container_id: ContainerId,
    pub runtime_id: String,
    pub pid_file: PathBuf,
    /// Runtime query printing the host pid of `runtime_id`.
    pub inspect: CommandSpec,
    pub timeout: Duration,
}

impl ContainerStartWaiter {
    /// Whether an event for `event_id` concerns the watched `runtime_id`.
    pub fn matches(watched: &str, event_id: &str) -> bool {
        if watched.is_empty() || event_id.is_empty() {
            return false;
        }
        watched == event_id
            || (event_id.len() >= MIN_SHORT_ID_LEN && watched.starts_with(event_id))
    }

    /// Subscribe now and resolve the pid in the background.
    ///
    /// Errors are recorded in the tracker's diagnostics for the container
    /// and also returned through the handle.
    pub fn arm(
        self,
        bus: &RuntimeEventBus,
        runner: CommandRunner,
        tracker: Arc<ContainerTracker>,
    ) -> WaiterHandle {
        let subscription = bus.subscribe();
        debug!(
            container = %self.container_id,
            runtime_id = %self.runtime_id,
            "armed start waiter"
        );

        let container_id = self.container_id.clone();
        let join = tokio::spawn(async move {
            let result = self.run(subscription, &runner).await;
            if let Err(e) = &result {
                error!(container = %container_id, error = %e, "pid resolution failed");
                tracker.append_diagnostics(&container_id, e.to_string());
            }
            result
        });

        WaiterHandle { join }
    }

    async fn run(self, mut subscription: Subscription, runner: &CommandRunner) -> Result<u32> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let event = match tokio::time::timeout_at(deadline, subscription.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    return Err(self.failure("event bus closed before the container started"));
                }
                Err(_) => {
                    return Err(self.failure(format!(
                        "no start event within {:?}",
                        self.timeout
                    )));
                }
            };

            if event.kind == RuntimeEventKind::Started
                && Self::matches(&self.runtime_id, &event.runtime_id)
            {
                break;
            }
        }
        subscription.unsubscribe();

        let output = runner.run(&self.inspect).await?;
        if !output.success() {
            return Err(self.failure(format!(
                "`{}` exited with code {}: {}",
                self.inspect,
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let raw = output.stdout.trim();
        let pid: u32 = raw
            .parse()
            .map_err(|e| self.failure(format!("runtime reported pid '{raw}': {e}")))?;
        if pid == 0 {
            return Err(self.failure("runtime reported pid 0; container is not running"));
        }

        write_pid_file_atomic(&self.pid_file, pid)?;
        info!(container = %self.container_id, pid, pid_file = ?self.pid_file, "resolved container pid");
        Ok(pid)
    }

    fn failure(&self, reason: impl Into<String>) -> NodevisorError {
        NodevisorError::PidResolution {
            container: self.container_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Join handle of an armed waiter.
#[derive(Debug)]
pub struct WaiterHandle {
    join: JoinHandle<Result<u32>>,
}

impl WaiterHandle {
    /// Wait for the resolved pid.
    pub async fn wait(self) -> Result<u32> {
        self.join
            .await
            .map_err(|e| NodevisorError::Other(anyhow::anyhow!("start waiter task failed: {e}")))?
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Drop the subscription without waiting for the event.
    pub fn abort(&self) {
        self.join.abort();
    }
}
