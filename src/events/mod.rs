// src/events/mod.rs

//! Runtime lifecycle events.
//!
//! The runtime's global event feed is tailed by a single
//! [`ingestor::RuntimeEventIngestor`], parsed into [`RuntimeEvent`]s and
//! published on the [`bus::RuntimeEventBus`]. Per-container
//! [`waiter::ContainerStartWaiter`]s subscribe to the bus to learn when their
//! container actually started, then resolve its host pid.

use std::fmt;

pub mod bus;
pub mod ingestor;
pub mod waiter;

pub use bus::{RuntimeEventBus, Subscription};
pub use ingestor::{parse_event_line, IngestorHandle, RuntimeEventIngestor};
pub use waiter::{ContainerStartWaiter, WaiterHandle};

/// Lifecycle transitions reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeEventKind {
    Created,
    Started,
    Died,
}

impl RuntimeEventKind {
    /// Map the runtime's verb to a kind; `None` for verbs we do not track.
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "create" => Some(RuntimeEventKind::Created),
            "start" => Some(RuntimeEventKind::Started),
            "die" => Some(RuntimeEventKind::Died),
            _ => None,
        }
    }
}

/// One parsed line of the runtime event feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub kind: RuntimeEventKind,
    /// Id assigned by the runtime (not the scheduler's container id).
    pub runtime_id: String,
}

impl RuntimeEvent {
    pub fn new(kind: RuntimeEventKind, runtime_id: impl Into<String>) -> Self {
        Self {
            kind,
            runtime_id: runtime_id.into(),
        }
    }
}

impl fmt::Display for RuntimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.runtime_id)
    }
}
