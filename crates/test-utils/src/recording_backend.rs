use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nodevisor::backend::{BackendFuture, ContainerBackend};
use nodevisor::container::ContainerLaunchSpec;
use nodevisor::errors::NodevisorError;
use nodevisor::types::{ContainerId, Signal};

/// One call observed by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Launch(ContainerId),
    Signal { pid: u32, signal: Signal },
    IsAlive { pid: u32 },
    Delete { subdir: PathBuf },
}

/// A fake backend that:
/// - records every call routed to it
/// - answers launches with a fixed exit code
/// - reports only explicitly registered pids as alive.
pub struct RecordingBackend {
    name: String,
    calls: Arc<Mutex<Vec<BackendCall>>>,
    launch_exit: i32,
    alive: Mutex<HashSet<u32>>,
    fail_delete: bool,
}

impl RecordingBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            launch_exit: 0,
            alive: Mutex::new(HashSet::new()),
            fail_delete: false,
        }
    }

    pub fn with_launch_exit(mut self, code: i32) -> Self {
        self.launch_exit = code;
        self
    }

    pub fn with_alive_pid(self, pid: u32) -> Self {
        self.alive.lock().unwrap().insert(pid);
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Shared handle to the call log, usable after the backend is moved
    /// into a registry.
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<BackendCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ContainerBackend for RecordingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch<'a>(&'a self, spec: &'a ContainerLaunchSpec) -> BackendFuture<'a, i32> {
        self.record(BackendCall::Launch(spec.container_id.clone()));
        let code = self.launch_exit;
        Box::pin(async move { Ok::<_, NodevisorError>(code) })
    }

    fn signal<'a>(&'a self, _user: &'a str, pid: u32, signal: Signal) -> BackendFuture<'a, bool> {
        self.record(BackendCall::Signal { pid, signal });
        let alive = self.alive.lock().unwrap().contains(&pid);
        Box::pin(async move { Ok::<_, NodevisorError>(alive) })
    }

    fn is_alive<'a>(&'a self, _user: &'a str, pid: u32) -> BackendFuture<'a, bool> {
        self.record(BackendCall::IsAlive { pid });
        let alive = self.alive.lock().unwrap().contains(&pid);
        Box::pin(async move { Ok::<_, NodevisorError>(alive) })
    }

    fn delete_resources<'a>(
        &'a self,
        _user: &'a str,
        subdir: &'a Path,
        _base_dirs: &'a [PathBuf],
    ) -> BackendFuture<'a, ()> {
        self.record(BackendCall::Delete {
            subdir: subdir.to_path_buf(),
        });
        let fail = self.fail_delete;
        let name = self.name.clone();
        Box::pin(async move {
            if fail {
                Err(NodevisorError::CleanupFailed(format!("{name}: injected failure")))
            } else {
                Ok(())
            }
        })
    }
}
