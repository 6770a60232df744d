// src/backend/runtime.rs

//! Backend driving an external containerization runtime (`docker`-style CLI).
//!
//! Launch sequence:
//!
//! 1. resolve and validate the image,
//! 2. write `launch_container.sh` with host-specific variables stripped,
//! 3. stage the `create` / `start` command lines,
//! 4. bail out with `Terminated` if the container was deactivated,
//! 5. `create`, then arm a [`ContainerStartWaiter`] for the returned id,
//! 6. `start -a` and classify its exit code.
//!
//! The pid file is written by the waiter, not by `launch`.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::image::sanitize_image_name;
use crate::backend::{record_launch_exit, BackendFuture, ContainerBackend};
use crate::config::{ConfigFile, RuntimeSection, RUNTIME_BACKEND};
use crate::container::{ContainerLaunchSpec, ContainerTracker, CONTAINER_SCRIPT};
use crate::dirs::delete_as_user;
use crate::errors::{NodevisorError, Result};
use crate::events::{ContainerStartWaiter, RuntimeEventBus};
use crate::exec::{
    process_is_alive, signal_process, write_launch_script, CommandRunner, CommandSpec,
    CommandStaging,
};
use crate::fs::FileSystem;
use crate::types::{ExitCode, Signal};

/// Builds invocations of the runtime CLI against one endpoint.
#[derive(Debug, Clone)]
pub struct RuntimeCommands {
    binary: String,
    url: String,
}

impl RuntimeCommands {
    pub fn new(binary: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            url: url.into(),
        }
    }

    pub fn from_config(runtime: &RuntimeSection) -> Self {
        Self::new(runtime.binary.clone(), runtime.url.clone())
    }

    fn base(&self) -> CommandSpec {
        CommandSpec::new(&self.binary).arg("-H").arg(&self.url)
    }

    /// `create` for `spec`, running `bash <work_dir>/launch_container.sh`
    /// inside `image`.
    pub fn create(
        &self,
        runtime: &RuntimeSection,
        spec: &ContainerLaunchSpec,
        image: &str,
    ) -> CommandSpec {
        let identity = runtime.identity_file.to_string_lossy();
        let work_dir = spec.work_dir.to_string_lossy();

        let mut cmd = self
            .base()
            .arg("create")
            .args(["--net", runtime.network.as_str()])
            .args(["--name", spec.container_id.as_str()])
            .args(["--user", spec.user.as_str()])
            .args(["--workdir", &*work_dir])
            .arg("-v")
            .arg(format!("{identity}:{identity}:ro"));

        for dir in mount_dirs(spec) {
            let dir = dir.to_string_lossy();
            cmd = cmd.arg("-v").arg(format!("{dir}:{dir}"));
        }

        cmd.arg(image)
            .arg("bash")
            .arg(spec.work_dir.join(CONTAINER_SCRIPT).to_string_lossy())
    }

    /// `start -a <id>`: attach and block until the container exits.
    pub fn start(&self, id: &str) -> CommandSpec {
        self.base().arg("start").arg("-a").arg(id)
    }

    pub fn inspect_pid(&self, id: &str) -> CommandSpec {
        self.base()
            .arg("inspect")
            .arg("--format")
            .arg("{{.State.Pid}}")
            .arg(id)
    }

    pub fn events(&self) -> CommandSpec {
        self.base().arg("events")
    }
}

/// Every local and log directory, bind-mounted at the same path.
fn mount_dirs(spec: &ContainerLaunchSpec) -> impl Iterator<Item = &PathBuf> {
    spec.local_dirs.iter().chain(spec.log_dirs.iter())
}

/// The containerized runtime backend.
#[derive(Debug)]
pub struct ContainerRuntimeBackend {
    runtime: RuntimeSection,
    override_env: String,
    probe_timeout: Duration,
    commands: RuntimeCommands,
    runner: CommandRunner,
    staging: CommandStaging,
    bus: RuntimeEventBus,
    tracker: Arc<ContainerTracker>,
    fs: Arc<dyn FileSystem>,
}

impl ContainerRuntimeBackend {
    /// Fails when the node runs a security mode other than `simple` or no
    /// runtime URL is configured.
    pub fn new(
        cfg: &ConfigFile,
        bus: RuntimeEventBus,
        tracker: Arc<ContainerTracker>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        if cfg.node.security_mode != "simple" {
            return Err(NodevisorError::ConfigError(format!(
                "the runtime backend only works with simple security mode (got '{}')",
                cfg.node.security_mode
            )));
        }
        if cfg.runtime.url.trim().is_empty() {
            return Err(NodevisorError::ConfigError(
                "[runtime].url is not configured".to_string(),
            ));
        }

        Ok(Self {
            runtime: cfg.runtime.clone(),
            override_env: cfg.router.override_env.clone(),
            probe_timeout: cfg.node.probe_timeout,
            commands: RuntimeCommands::from_config(&cfg.runtime),
            runner: CommandRunner::new(),
            staging: CommandStaging::new(
                cfg.node.staging_dir.clone(),
                cfg.runtime.command_file_prefix.clone(),
                cfg.runtime.command_file_suffix.clone(),
            ),
            bus,
            tracker,
            fs,
        })
    }

    pub fn commands(&self) -> &RuntimeCommands {
        &self.commands
    }

    /// Image from the launch environment, falling back to the configured
    /// default when the variable is unset or blank, validated.
    pub fn resolve_image(&self, spec: &ContainerLaunchSpec) -> Result<String> {
        let raw = spec
            .environment
            .get(&self.runtime.image_env)
            .filter(|s| !s.trim().is_empty())
            .or(self.runtime.image.as_ref())
            .ok_or_else(|| NodevisorError::InvalidImage {
                image: String::new(),
                reason: format!(
                    "no image in the launch environment ({}) and no [runtime].image configured",
                    self.runtime.image_env
                ),
            })?;
        sanitize_image_name(raw)
    }

    /// Variables never forwarded into the container.
    fn excluded_env(&self) -> HashSet<&str> {
        self.runtime
            .host_env_exclusions
            .iter()
            .map(String::as_str)
            .chain([self.runtime.image_env.as_str(), self.override_env.as_str()])
            .collect()
    }

    fn write_script(&self, spec: &ContainerLaunchSpec) -> Result<PathBuf> {
        let path = spec.launch_script_path();
        let mut out = BufWriter::new(File::create(&path)?);
        self.write_launch_env(&mut out, &spec.environment, &spec.resources, &spec.command)?;
        out.flush()?;
        Ok(path)
    }

    async fn launch_inner(&self, spec: &ContainerLaunchSpec) -> Result<i32> {
        let id = &spec.container_id;

        let image = self.resolve_image(spec)?;
        let script = self.write_script(spec)?;
        debug!(container = %id, script = ?script, image = %image, "wrote launch script");

        let create = self.commands.create(&self.runtime, spec, &image);
        let start = self.commands.start(id.as_str());
        let staged = self.staging.stage(id, &[&create, &start])?;
        debug!(container = %id, command_file = ?staged, "staged runtime commands");

        if !self.tracker.is_active(id) {
            info!(container = %id, "container no longer active; not launching");
            return Ok(ExitCode::Terminated.code());
        }

        let created = self.runner.run(&create).await?;
        if !created.success() {
            let code = record_launch_exit(
                &self.tracker,
                id,
                created.exit_code,
                &format!("`{}` failed", create.program),
                Some(&created),
            );
            return Ok(code);
        }

        let runtime_id = created.stdout.trim().to_string();
        if runtime_id.is_empty() {
            return Err(NodevisorError::CommandFailed {
                command: create.to_string(),
                exit_code: created.exit_code,
                stderr: "runtime printed no container id".to_string(),
            });
        }
        info!(container = %id, runtime_id = %runtime_id, "runtime container created");

        let pid_file = self
            .tracker
            .pid_file(id)
            .unwrap_or_else(|| spec.pid_file_path());
        let waiter = ContainerStartWaiter {
            container_id: id.clone(),
            runtime_id: runtime_id.clone(),
            pid_file,
            inspect: self
                .commands
                .inspect_pid(&runtime_id)
                .timeout(self.probe_timeout),
            timeout: self.runtime.pid_wait_timeout,
        };
        // Resolves in the background; the pid file is its only output.
        let waiter = waiter.arm(&self.bus, self.runner.clone(), Arc::clone(&self.tracker));

        let started = match self.runner.run(&start).await {
            Ok(output) => output,
            Err(e) => {
                waiter.abort();
                return Err(e);
            }
        };
        if !started.success() && !waiter.is_finished() {
            debug!(container = %id, "start failed; dropping start waiter");
            waiter.abort();
        }
        Ok(record_launch_exit(
            &self.tracker,
            id,
            started.exit_code,
            &format!("`{}` exited with code {}", start, started.exit_code),
            Some(&started),
        ))
    }
}

impl ContainerBackend for ContainerRuntimeBackend {
    fn name(&self) -> &str {
        RUNTIME_BACKEND
    }

    fn launch<'a>(&'a self, spec: &'a ContainerLaunchSpec) -> BackendFuture<'a, i32> {
        Box::pin(async move {
            match self.launch_inner(spec).await {
                Ok(code) => Ok(code),
                Err(e) => {
                    warn!(container = %spec.container_id, error = %e, "runtime launch failed");
                    self.tracker.append_diagnostics(&spec.container_id, e.to_string());
                    Err(e)
                }
            }
        })
    }

    fn signal<'a>(&'a self, user: &'a str, pid: u32, signal: Signal) -> BackendFuture<'a, bool> {
        Box::pin(signal_process(&self.runner, user, pid, signal, self.probe_timeout))
    }

    fn is_alive<'a>(&'a self, _user: &'a str, pid: u32) -> BackendFuture<'a, bool> {
        Box::pin(process_is_alive(&self.runner, pid, self.probe_timeout))
    }

    fn delete_resources<'a>(
        &'a self,
        user: &'a str,
        subdir: &'a Path,
        base_dirs: &'a [PathBuf],
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move { delete_as_user(self.fs.as_ref(), user, subdir, base_dirs) })
    }

    fn write_launch_env(
        &self,
        out: &mut dyn Write,
        environment: &BTreeMap<String, String>,
        resources: &BTreeMap<PathBuf, Vec<String>>,
        command: &[String],
    ) -> Result<()> {
        write_launch_script(out, environment, resources, command, &self.excluded_env())?;
        Ok(())
    }
}
