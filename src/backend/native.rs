// src/backend/native.rs

//! Backend that runs the launch script directly as a host process.
//!
//! Three scripts end up in the work directory:
//!
//! - `launch_container.sh`: environment, symlinks, the command itself;
//! - a session script that publishes `$$` to the pid file (tmp + `mv`) and
//!   then `exec`s the launch script, in a new session when `setsid` exists;
//! - a wrapper that runs the session script and records its exit code next
//!   to the pid file, again via tmp + `mv`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use shell_words::quote;
use tracing::{debug, info};

use crate::backend::{record_launch_exit, BackendFuture, ContainerBackend};
use crate::config::{ConfigFile, NATIVE_BACKEND};
use crate::container::{ContainerLaunchSpec, ContainerTracker};
use crate::dirs::delete_as_user;
use crate::errors::Result;
use crate::exec::{process_is_alive, signal_process, CommandRunner, CommandSpec};
use crate::fs::FileSystem;
use crate::types::{ExitCode, Signal};

pub const SESSION_SCRIPT: &str = "default_container_executor_session.sh";
pub const WRAPPER_SCRIPT: &str = "default_container_executor.sh";

const SETSID_PATHS: &[&str] = &["/usr/bin/setsid", "/bin/setsid"];

/// Exit-code file written by the wrapper script.
pub fn exit_code_file(pid_file: &Path) -> PathBuf {
    let mut name = pid_file.as_os_str().to_owned();
    name.push(".exitcode");
    PathBuf::from(name)
}

fn setsid_available() -> bool {
    SETSID_PATHS.iter().any(|p| Path::new(p).exists())
}

#[derive(Debug)]
pub struct NativeProcessBackend {
    probe_timeout: Duration,
    runner: CommandRunner,
    tracker: Arc<ContainerTracker>,
    fs: Arc<dyn FileSystem>,
}

impl NativeProcessBackend {
    pub fn new(cfg: &ConfigFile, tracker: Arc<ContainerTracker>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            probe_timeout: cfg.node.probe_timeout,
            runner: CommandRunner::new(),
            tracker,
            fs,
        }
    }

    fn write_file(path: &Path, contents: &str) -> Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn session_script(pid_file: &Path, launch_script: &Path) -> String {
        let pid = quote(&pid_file.to_string_lossy()).into_owned();
        let pid_tmp = quote(&format!("{}.tmp", pid_file.to_string_lossy())).into_owned();
        let launch = quote(&launch_script.to_string_lossy()).into_owned();
        let exec = if setsid_available() {
            format!("exec setsid /bin/bash {launch}")
        } else {
            format!("exec /bin/bash {launch}")
        };
        format!("#!/bin/bash\n\necho $$ > {pid_tmp}\n/bin/mv -f {pid_tmp} {pid}\n{exec}\n")
    }

    fn wrapper_script(pid_file: &Path, session_script: &Path) -> String {
        let exit_file = exit_code_file(pid_file);
        let exit = quote(&exit_file.to_string_lossy()).into_owned();
        let exit_tmp = quote(&format!("{}.tmp", exit_file.to_string_lossy())).into_owned();
        let session = quote(&session_script.to_string_lossy()).into_owned();
        format!(
            "#!/bin/bash\n\n/bin/bash {session}\nrc=$?\necho $rc > {exit_tmp}\n/bin/mv -f {exit_tmp} {exit}\nexit $rc\n"
        )
    }

    async fn launch_inner(&self, spec: &ContainerLaunchSpec) -> Result<i32> {
        let id = &spec.container_id;
        let pid_file = self
            .tracker
            .pid_file(id)
            .unwrap_or_else(|| spec.pid_file_path());

        let launch_script = spec.launch_script_path();
        let mut buf = Vec::new();
        self.write_launch_env(&mut buf, &spec.environment, &spec.resources, &spec.command)?;
        fs::write(&launch_script, &buf)?;

        let session = spec.work_dir.join(SESSION_SCRIPT);
        Self::write_file(&session, &Self::session_script(&pid_file, &launch_script))?;
        let wrapper = spec.work_dir.join(WRAPPER_SCRIPT);
        Self::write_file(&wrapper, &Self::wrapper_script(&pid_file, &session))?;
        debug!(container = %id, wrapper = ?wrapper, "wrote native launch scripts");

        if !self.tracker.is_active(id) {
            info!(container = %id, "container no longer active; not launching");
            return Ok(ExitCode::Terminated.code());
        }

        let command = CommandSpec::new("/bin/bash")
            .arg(wrapper.to_string_lossy())
            .current_dir(&spec.work_dir);
        let output = self.runner.run(&command).await?;

        Ok(record_launch_exit(
            &self.tracker,
            id,
            output.exit_code,
            &format!("launch script exited with code {}", output.exit_code),
            Some(&output),
        ))
    }
}

impl ContainerBackend for NativeProcessBackend {
    fn name(&self) -> &str {
        NATIVE_BACKEND
    }

    fn launch<'a>(&'a self, spec: &'a ContainerLaunchSpec) -> BackendFuture<'a, i32> {
        Box::pin(async move {
            let result = self.launch_inner(spec).await;
            if let Err(e) = &result {
                self.tracker.append_diagnostics(&spec.container_id, e.to_string());
            }
            result
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
}
