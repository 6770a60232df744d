// src/events/ingestor.rs

//! Tails the runtime's global event feed and publishes parsed events.
//!
//! Two tasks cooperate:
//!
//! - a reader that owns the `events` subprocess and pushes raw lines into a
//!   bounded queue, and
//! - a publisher that parses each line and hands typed events to the bus.
//!
//! The reader stops on a oneshot shutdown signal (killing the subprocess);
//! the publisher stops when the queue closes behind it.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{NodevisorError, Result};
use crate::events::{RuntimeEvent, RuntimeEventBus, RuntimeEventKind};
use crate::exec::{CommandRunner, CommandSpec};

/// Lines buffered between the reader and the publisher.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

const ID_TOKEN: usize = 1;
const VERB_TOKEN: usize = 4;

/// Parse one event-feed line.
///
/// Lines look like `<time> <runtime-id>: (from <image>) <verb>`. Returns
/// `Ok(None)` for well-formed lines whose verb is not tracked.
pub fn parse_event_line(line: &str) -> Result<Option<RuntimeEvent>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() <= VERB_TOKEN {
        return Err(NodevisorError::EventParse(line.to_string()));
    }

    let id = tokens[ID_TOKEN].trim_end_matches(':');
    if id.is_empty() {
        return Err(NodevisorError::EventParse(line.to_string()));
    }

    Ok(RuntimeEventKind::from_verb(tokens[VERB_TOKEN]).map(|kind| RuntimeEvent::new(kind, id)))
}

/// Configured, not yet running, ingestor.
#[derive(Debug, Clone)]
pub struct RuntimeEventIngestor {
    bus: RuntimeEventBus,
    runner: CommandRunner,
    command: CommandSpec,
    queue_capacity: usize,
}

impl RuntimeEventIngestor {
    /// `command` is the runtime's event-stream invocation, e.g.
    /// `docker -H <url> events`.
    pub fn new(bus: RuntimeEventBus, runner: CommandRunner, command: CommandSpec) -> Self {
        Self {
            bus,
            runner,
            command,
            queue_capacity: EVENT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Spawn the event-stream subprocess and the two background tasks.
    ///
    /// Fails only if the subprocess cannot be started.
    pub fn start(self) -> Result<IngestorHandle> {
        let mut stream = self.runner.spawn_streaming(&self.command)?;
        info!(command = %self.command, "runtime event ingestor started");

        let (line_tx, mut line_rx) = mpsc::channel::<String>(self.queue_capacity);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = &mut shutdown_rx => {
                        debug!("event reader received shutdown");
                        stream.kill().await;
                        break;
                    }

                    line = stream.next_line() => match line {
                        Ok(Some(line)) => {
                            if line_tx.send(line).await.is_err() {
                                warn!("event publisher gone; stopping reader");
                                stream.kill().await;
                                break;
                            }
                        }
                        Ok(None) => {
                            warn!("runtime event stream closed");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "reading runtime event stream failed");
                            stream.kill().await;
                            break;
                        }
                    }
                }
            }
        });

        let bus = self.bus;
        let publisher = tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                match parse_event_line(&line) {
                    Ok(Some(event)) => {
                        debug!(%event, "runtime event");
                        bus.publish(event);
                    }
                    Ok(None) => debug!(line = %line, "unknown runtime event; dropped"),
                    Err(e) => warn!(error = %e, "skipping runtime event line"),
                }
            }
            debug!("event publisher finished");
        });

        Ok(IngestorHandle {
            shutdown: Some(shutdown_tx),
            reader,
            publisher,
        })
    }
}

/// Handle to a running ingestor.
#[derive(Debug)]
pub struct IngestorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    reader: JoinHandle<()>,
    publisher: JoinHandle<()>,
}

impl IngestorHandle {
    /// Whether both tasks have finished (for example because the stream
    /// closed on its own).
    pub fn is_finished(&self) -> bool {
        self.reader.is_finished() && self.publisher.is_finished()
    }

    /// Kill the subprocess and wait for both tasks, at most `timeout`.
    /// Tasks still running after that are aborted.
    pub async fn stop(mut self, timeout: Duration) {
        if let Some(tx) = self.shutdown.take() {
            // The reader may already be gone; nothing to signal then.
            let _ = tx.send(());
        }

        let joined = tokio::time::timeout(timeout, async {
            let _ = (&mut self.reader).await;
            let _ = (&mut self.publisher).await;
        })
        .await;

        if joined.is_err() {
            warn!(timeout = ?timeout, "event ingestor did not stop in time; aborting");
            self.reader.abort();
            self.publisher.abort();
        } else {
            info!("runtime event ingestor stopped");
        }
    }
}
