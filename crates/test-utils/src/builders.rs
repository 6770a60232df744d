#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nodevisor::config::{
    ConfigFile, NodeSection, RawConfigFile, RouterSection, RuntimeSection, NATIVE_BACKEND,
    RUNTIME_BACKEND,
};
use nodevisor::container::ContainerLaunchSpec;
use nodevisor::types::ContainerId;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    /// Native backend only, rooted at `local_dir` / `log_dir`.
    pub fn new(local_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: RawConfigFile {
                node: NodeSection {
                    local_dirs: vec![local_dir.into()],
                    log_dirs: vec![log_dir.into()],
                    staging_dir: std::env::temp_dir(),
                    security_mode: "simple".to_string(),
                    probe_timeout: Duration::from_secs(5),
                },
                router: RouterSection::default(),
                runtime: RuntimeSection::default(),
            },
        }
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.node.local_dirs.push(dir.into());
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.node.staging_dir = dir.into();
        self
    }

    pub fn with_backends(mut self, backends: &[&str]) -> Self {
        self.config.router.backends = backends.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_default_backend(mut self, name: &str) -> Self {
        self.config.router.default_backend = Some(name.to_string());
        self
    }

    pub fn with_probe_unknown(mut self, probe: bool) -> Self {
        self.config.router.probe_unknown_containers = probe;
        self
    }

    /// Enable the runtime backend next to the native one, pointing at
    /// `binary`.
    pub fn with_runtime(mut self, binary: impl AsRef<Path>, url: &str) -> Self {
        self.config.router.backends = vec![NATIVE_BACKEND.to_string(), RUNTIME_BACKEND.to_string()];
        self.config.runtime.binary = binary.as_ref().to_string_lossy().into_owned();
        self.config.runtime.url = url.to_string();
        self
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.config.runtime.image = Some(image.to_string());
        self
    }

    pub fn with_pid_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.runtime.pid_wait_timeout = timeout;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `ContainerLaunchSpec`.
pub struct LaunchSpecBuilder {
    spec: ContainerLaunchSpec,
}

impl LaunchSpecBuilder {
    pub fn new(container_id: &str, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            spec: ContainerLaunchSpec {
                user: "nobody".to_string(),
                app_id: "application_1700000000000_0001".to_string(),
                container_id: ContainerId::new(container_id),
                work_dir: work_dir.into(),
                local_dirs: Vec::new(),
                log_dirs: Vec::new(),
                command: vec!["true".to_string()],
                environment: BTreeMap::new(),
                resources: BTreeMap::new(),
                tokens_path: None,
            },
        }
    }

    pub fn user(mut self, user: &str) -> Self {
        self.spec.user = user.to_string();
        self
    }

    pub fn app_id(mut self, app_id: &str) -> Self {
        self.spec.app_id = app_id.to_string();
        self
    }

    pub fn command(mut self, argv: &[&str]) -> Self {
        self.spec.command = argv.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.spec.environment.insert(key.to_string(), value.to_string());
        self
    }

    pub fn resource(mut self, target: impl Into<PathBuf>, link: &str) -> Self {
        self.spec
            .resources
            .entry(target.into())
            .or_default()
            .push(link.to_string());
        self
    }

    pub fn local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.local_dirs.push(dir.into());
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.log_dirs.push(dir.into());
        self
    }

    pub fn build(self) -> ContainerLaunchSpec {
        self.spec
    }
}
