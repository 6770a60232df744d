use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::ConfigFile;
use crate::dirs::DirectoryLifecycleManager;
use crate::errors::Result;
use crate::types::ContainerId;

/// File name of the launch script written into every work directory.
pub const CONTAINER_SCRIPT: &str = "launch_container.sh";

/// Everything a backend needs to launch one container.
///
/// Owned by the caller; backends only read it.
#[derive(Debug, Clone)]
pub struct ContainerLaunchSpec {
    pub user: String,
    pub app_id: String,
    pub container_id: ContainerId,
    pub work_dir: PathBuf,
    /// Local directory candidates, in configured order.
    pub local_dirs: Vec<PathBuf>,
    /// Log directory candidates, in configured order.
    pub log_dirs: Vec<PathBuf>,
    pub command: Vec<String>,
    /// May carry the backend override and the runtime image name.
    pub environment: BTreeMap<String, String>,
    /// Localized resources: target path -> link names inside the work dir.
    pub resources: BTreeMap<PathBuf, Vec<String>>,
    /// Credentials handle passed through to the launch.
    pub tokens_path: Option<PathBuf>,
}

impl ContainerLaunchSpec {
    pub fn launch_script_path(&self) -> PathBuf {
        self.work_dir.join(CONTAINER_SCRIPT)
    }

    /// Default pid file location for this container.
    pub fn pid_file_path(&self) -> PathBuf {
        pid_file_in(&self.work_dir, &self.container_id)
    }
}

pub fn pid_file_in(work_dir: &Path, container_id: &ContainerId) -> PathBuf {
    work_dir.join(format!("{}.pid", container_id))
}

/// On-disk launch request accepted by `nodevisor launch --spec`.
///
/// ```toml
/// user = "alice"
/// app_id = "application_1700000000000_0001"
/// container_id = "container_1700000000000_0001_01_000001"
/// command = ["touch", "/tmp/f"]
///
/// [environment]
/// NODEVISOR_BACKEND = "runtime"
/// NODEVISOR_RUNTIME_IMAGE = "centos"
/// ```
///
/// Directory lists default to the node configuration; a missing `work_dir`
/// is placed by free space.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchRequest {
    pub user: String,
    pub app_id: String,
    pub container_id: ContainerId,
    pub command: Vec<String>,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub local_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub log_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: BTreeMap<PathBuf, Vec<String>>,
    #[serde(default)]
    pub tokens_path: Option<PathBuf>,
}

impl LaunchRequest {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Resolve defaults against the node config and build the launch spec.
    pub fn into_spec(
        self,
        cfg: &ConfigFile,
        dirs: &DirectoryLifecycleManager,
    ) -> Result<ContainerLaunchSpec> {
        let local_dirs = self.local_dirs.unwrap_or_else(|| cfg.node.local_dirs.clone());
        let log_dirs = self.log_dirs.unwrap_or_else(|| cfg.node.log_dirs.clone());

        let work_dir = match self.work_dir {
            Some(dir) => dir,
            None => dirs
                .select_working_dir(&local_dirs, &self.user, &self.app_id)?
                .join(self.container_id.as_str()),
        };

        Ok(ContainerLaunchSpec {
            user: self.user,
            app_id: self.app_id,
            container_id: self.container_id,
            work_dir,
            local_dirs,
            log_dirs,
            command: self.command,
            environment: self.environment,
            resources: self.resources,
            tokens_path: self.tokens_path,
        })
    }
}
