// src/backend/router.rs

//! Backend registry and per-container routing.
//!
//! The route for a container is recorded at launch and is the only thing
//! consulted afterwards: a later change of the launch environment never
//! re-routes a container. Routes live in memory only. After a node-agent
//! restart, `signal` can fall back to probing every backend for the pid.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::backend::{ContainerBackend, ContainerRuntimeBackend, NativeProcessBackend};
use crate::config::{ConfigFile, NATIVE_BACKEND, RUNTIME_BACKEND};
use crate::container::{ContainerLaunchSpec, ContainerTracker};
use crate::errors::{NodevisorError, Result};
use crate::events::RuntimeEventBus;
use crate::fs::FileSystem;
use crate::types::{ContainerId, Signal};

/// Named backends, in configured order.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn ContainerBackend>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend`, replacing any backend with the same name.
    pub fn register(&mut self, backend: Arc<dyn ContainerBackend>) {
        match self.backends.iter().position(|b| b.name() == backend.name()) {
            Some(idx) => self.backends[idx] = backend,
            None => self.backends.push(backend),
        }
    }

    /// Instantiate every backend listed in `[router].backends`.
    pub fn from_config(
        cfg: &ConfigFile,
        bus: RuntimeEventBus,
        tracker: Arc<ContainerTracker>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for name in &cfg.router.backends {
            let backend: Arc<dyn ContainerBackend> = match name.as_str() {
                NATIVE_BACKEND => Arc::new(NativeProcessBackend::new(
                    cfg,
                    Arc::clone(&tracker),
                    Arc::clone(&fs),
                )),
                RUNTIME_BACKEND => Arc::new(ContainerRuntimeBackend::new(
                    cfg,
                    bus.clone(),
                    Arc::clone(&tracker),
                    Arc::clone(&fs),
                )?),
                other => return Err(NodevisorError::UnknownBackend(other.to_string())),
            };
            debug!(backend = %name, "registered backend");
            registry.register(backend);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ContainerBackend>> {
        self.backends.iter().find(|b| b.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ContainerBackend>> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Dispatches container operations to the backend chosen at launch.
#[derive(Debug)]
pub struct BackendRouter {
    registry: BackendRegistry,
    routes: DashMap<ContainerId, String>,
    default_backend: Option<String>,
    override_env: String,
    probe_unknown: bool,
}

impl BackendRouter {
    pub fn new(
        registry: BackendRegistry,
        default_backend: Option<String>,
        override_env: impl Into<String>,
        probe_unknown: bool,
    ) -> Self {
        Self {
            registry,
            routes: DashMap::new(),
            default_backend,
            override_env: override_env.into(),
            probe_unknown,
        }
    }

    pub fn from_config(cfg: &ConfigFile, registry: BackendRegistry) -> Self {
        Self::new(
            registry,
            cfg.router.default_backend.clone(),
            cfg.router.override_env.clone(),
            cfg.router.probe_unknown_containers,
        )
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Backend recorded for `container_id`, if any.
    pub fn route_of(&self, container_id: &ContainerId) -> Option<String> {
        self.routes.get(container_id).map(|r| r.value().clone())
    }

    /// Pick the backend for a launch: the override variable in the launch
    /// environment wins over the configured default.
    pub fn resolve_backend(&self, spec: &ContainerLaunchSpec) -> Result<Arc<dyn ContainerBackend>> {
        let requested = spec
            .environment
            .get(&self.override_env)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .or(self.default_backend.as_deref());

        let Some(name) = requested else {
            return Err(NodevisorError::UnknownBackend(format!(
                "no backend requested via {} and no default configured",
                self.override_env
            )));
        };

        self.registry
            .get(name)
            .ok_or_else(|| NodevisorError::UnknownBackend(name.to_string()))
    }

    /// Resolve, record the route, then delegate.
    ///
    /// The route stays recorded even if the launch fails, so cleanup can
    /// still be routed.
    pub async fn launch(&self, spec: &ContainerLaunchSpec) -> Result<i32> {
        let backend = self.resolve_backend(spec)?;
        self.routes
            .insert(spec.container_id.clone(), backend.name().to_string());
        info!(container = %spec.container_id, backend = %backend.name(), "routing container launch");

        backend.launch(spec).await
    }

    /// Signal the container's process through its recorded backend.
    ///
    /// Without a route this fails with `UnknownContainer`, unless probing is
    /// enabled: then the first backend that reports `pid` alive delivers the
    /// signal.
    pub async fn signal(
        &self,
        container_id: &ContainerId,
        user: &str,
        pid: u32,
        signal: Signal,
    ) -> Result<bool> {
        if let Some(name) = self.route_of(container_id) {
            let backend = self
                .registry
                .get(&name)
                .ok_or_else(|| NodevisorError::UnknownBackend(name.clone()))?;
            debug!(container = %container_id, backend = %name, pid, "routed signal");
            return backend.signal(user, pid, signal).await;
        }

        if !self.probe_unknown {
            return Err(NodevisorError::UnknownContainer(container_id.to_string()));
        }

        warn!(container = %container_id, pid, "no route recorded; probing all backends");
        for backend in self.registry.iter() {
            match backend.is_alive(user, pid).await {
                Ok(true) => {
                    info!(container = %container_id, backend = %backend.name(), pid, "probe matched");
                    return backend.signal(user, pid, signal).await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(backend = %backend.name(), pid, error = %e, "liveness probe failed");
                }
            }
        }
        Ok(false)
    }

    /// `true` as soon as any backend confirms `pid` is alive.
    pub async fn is_alive(&self, user: &str, pid: u32) -> Result<bool> {
        for backend in self.registry.iter() {
            match backend.is_alive(user, pid).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    warn!(backend = %backend.name(), pid, error = %e, "liveness probe failed");
                }
            }
        }
        Ok(false)
    }

    /// Delete on every backend, the container's routed backend first.
    ///
    /// Individual failures are logged. Fails only if every backend failed.
    /// The container's route is dropped afterwards.
    pub async fn delete_resources(
        &self,
        container_id: Option<&ContainerId>,
        user: &str,
        subdir: &Path,
        base_dirs: &[PathBuf],
    ) -> Result<()> {
        let routed = container_id.and_then(|id| self.route_of(id));

        let mut ordered: Vec<&Arc<dyn ContainerBackend>> = self.registry.iter().collect();
        if let Some(name) = routed.as_deref() {
            ordered.sort_by_key(|b| b.name() != name);
        }

        let mut failures = Vec::new();
        for backend in &ordered {
            if let Err(e) = backend.delete_resources(user, subdir, base_dirs).await {
                warn!(backend = %backend.name(), user, subdir = ?subdir, error = %e, "delete failed");
                failures.push(format!("{}: {e}", backend.name()));
            }
        }

        if let Some(id) = container_id {
            self.routes.remove(id);
        }

        if !ordered.is_empty() && failures.len() == ordered.len() {
            return Err(NodevisorError::CleanupFailed(failures.join("; ")));
        }
        Ok(())
    }
}
