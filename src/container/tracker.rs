// src/container/tracker.rs

use std::path::PathBuf;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::types::ContainerId;

#[derive(Debug, Clone)]
struct TrackedContainer {
    pid_file: PathBuf,
    active: bool,
    diagnostics: Vec<String>,
}

/// Node-wide view of accepted containers.
///
/// A container is activated when the node accepts it and deactivated when it
/// is cancelled or finished; backends consult [`is_active`](Self::is_active)
/// right before issuing an external launch. Diagnostics appended here are the
/// container's user-visible failure record.
///
/// Entries are sharded per container id, so unrelated containers never
/// contend on a single lock.
#[derive(Debug, Default)]
pub struct ContainerTracker {
    containers: DashMap<ContainerId, TrackedContainer>,
}

impl ContainerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, id: &ContainerId, pid_file: PathBuf) {
        debug!(container = %id, pid_file = ?pid_file, "activating container");
        self.containers
            .entry(id.clone())
            .and_modify(|c| {
                c.pid_file = pid_file.clone();
                c.active = true;
            })
            .or_insert(TrackedContainer {
                pid_file,
                active: true,
                diagnostics: Vec::new(),
            });
    }

    /// Mark the container inactive. A launch that has not reached the
    /// runtime yet will short-circuit with a terminated exit code.
    pub fn deactivate(&self, id: &ContainerId) {
        match self.containers.get_mut(id) {
            Some(mut c) => c.active = false,
            None => warn!(container = %id, "deactivating unknown container"),
        }
    }

    pub fn is_active(&self, id: &ContainerId) -> bool {
        self.containers.get(id).is_some_and(|c| c.active)
    }

    pub fn pid_file(&self, id: &ContainerId) -> Option<PathBuf> {
        self.containers.get(id).map(|c| c.pid_file.clone())
    }

    pub fn append_diagnostics(&self, id: &ContainerId, text: impl Into<String>) {
        let text = text.into();
        match self.containers.get_mut(id) {
            Some(mut c) => c.diagnostics.push(text),
            None => warn!(container = %id, diagnostics = %text, "diagnostics for unknown container"),
        }
    }

    pub fn diagnostics(&self, id: &ContainerId) -> Vec<String> {
        self.containers
            .get(id)
            .map(|c| c.diagnostics.clone())
            .unwrap_or_default()
    }

    /// Forget the container entirely.
    pub fn remove(&self, id: &ContainerId) {
        self.containers.remove(id);
    }
}
