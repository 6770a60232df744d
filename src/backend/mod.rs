// src/backend/mod.rs

//! Pluggable container backends.
//!
//! A backend realizes launch / signal / liveness / cleanup for containers on
//! this host. Backends are registered by name in a [`BackendRegistry`] built
//! from the configuration; the [`BackendRouter`] picks one per container and
//! remembers the choice for the container's lifetime.
//!
//! - [`runtime`]: drives an external containerization runtime.
//! - [`native`]: runs the launch script directly as a host process.
//! - [`image`]: runtime image name validation.
//! - [`router`]: registry and routing.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::{info, warn};

use crate::container::{ContainerLaunchSpec, ContainerTracker};
use crate::errors::Result;
use crate::exec::{write_launch_script, CommandOutput};
use crate::types::{classify_exit, ContainerId, ExitClass, Signal};

pub mod image;
pub mod native;
pub mod router;
pub mod runtime;

pub use image::sanitize_image_name;
pub use native::NativeProcessBackend;
pub use router::{BackendRegistry, BackendRouter};
pub use runtime::ContainerRuntimeBackend;

/// Boxed future returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Capability interface every backend implements.
///
/// Production code uses [`ContainerRuntimeBackend`] and
/// [`NativeProcessBackend`]; tests register recording fakes.
pub trait ContainerBackend: Send + Sync {
    /// Registry key, e.g. `"native"` or `"runtime"`.
    fn name(&self) -> &str;

    /// Launch the container and block until it exits. Returns its exit code.
    fn launch<'a>(&'a self, spec: &'a ContainerLaunchSpec) -> BackendFuture<'a, i32>;

    /// Deliver `signal` to `pid`. `Ok(false)` when the process was already
    /// gone.
    fn signal<'a>(&'a self, user: &'a str, pid: u32, signal: Signal) -> BackendFuture<'a, bool>;

    fn is_alive<'a>(&'a self, user: &'a str, pid: u32) -> BackendFuture<'a, bool>;

    /// Delete `subdir` under each of `base_dirs`, or `subdir` itself when no
    /// base directories are given.
    fn delete_resources<'a>(
        &'a self,
        user: &'a str,
        subdir: &'a Path,
        base_dirs: &'a [PathBuf],
    ) -> BackendFuture<'a, ()>;

    /// Write the launch script for this backend. The default passes every
    /// environment entry through.
    fn write_launch_env(
        &self,
        out: &mut dyn Write,
        environment: &BTreeMap<String, String>,
        resources: &BTreeMap<PathBuf, Vec<String>>,
        command: &[String],
    ) -> Result<()> {
        write_launch_script(out, environment, resources, command, &HashSet::new())?;
        Ok(())
    }
}

/// Diagnostics header for an unexpected launch failure.
pub const LAUNCH_FAILURE_HEADER: &str = "Exception from container-launch.";

/// Classify a finished launch and append the matching diagnostics.
///
/// Returns `code` unchanged: killed-on-request codes are terminal statuses,
/// not errors, and the caller decides what a failure means.
pub(crate) fn record_launch_exit(
    tracker: &ContainerTracker,
    container_id: &ContainerId,
    code: i32,
    message: &str,
    output: Option<&CommandOutput>,
) -> i32 {
    match classify_exit(code) {
        ExitClass::Success => {
            info!(container = %container_id, "container exited successfully");
        }
        ExitClass::KilledOnRequest => {
            info!(container = %container_id, exit_code = code, "container killed on request");
            tracker.append_diagnostics(
                container_id,
                format!("Container killed on request. Exit code is {code}"),
            );
        }
        ExitClass::Failed => {
            warn!(container = %container_id, exit_code = code, "container launch failed");
            let mut bundle = format!(
                "{LAUNCH_FAILURE_HEADER}\nContainer id: {container_id}\nExit code: {code}\nException message: {message}\n"
            );
            if let Some(output) = output {
                if !output.stdout.trim().is_empty() {
                    bundle.push_str(&format!("Shell output: {}\n", output.stdout.trim()));
                }
                if !output.stderr.trim().is_empty() {
                    bundle.push_str(&format!("Shell error output: {}\n", output.stderr.trim()));
                }
            }
            tracker.append_diagnostics(container_id, bundle);
        }
    }
    code
}
