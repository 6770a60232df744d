use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::deserialize_duration;

/// Name under which the native process backend is registered.
pub const NATIVE_BACKEND: &str = "native";
/// Name under which the containerized runtime backend is registered.
pub const RUNTIME_BACKEND: &str = "runtime";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [node]
/// local_dirs = ["/data1/nodevisor", "/data2/nodevisor"]
/// log_dirs = ["/var/log/nodevisor"]
///
/// [router]
/// backends = ["native", "runtime"]
/// default_backend = "native"
///
/// [runtime]
/// url = "unix:///var/run/docker.sock"
/// image = "centos"
/// ```
///
/// This is the unvalidated form; use [`ConfigFile`] (via `TryFrom`) in the
/// rest of the crate.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub node: NodeSection,

    #[serde(default)]
    pub router: RouterSection,

    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so holders of a
/// `ConfigFile` can rely on the invariants checked in `validate.rs`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub node: NodeSection,
    pub router: RouterSection,
    pub runtime: RuntimeSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        node: NodeSection,
        router: RouterSection,
        runtime: RuntimeSection,
    ) -> Self {
        Self {
            node,
            router,
            runtime,
        }
    }

    /// Whether the containerized runtime backend is part of the registry.
    pub fn runtime_enabled(&self) -> bool {
        self.router.backends.iter().any(|b| b == RUNTIME_BACKEND)
    }
}

/// `[node]` section: host layout shared by every backend.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// Local directory roots (one per disk, usually).
    pub local_dirs: Vec<PathBuf>,

    /// Log directory roots.
    pub log_dirs: Vec<PathBuf>,

    /// Where per-container command files are staged.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Cluster security mode. The containerized backend requires `"simple"`.
    #[serde(default = "default_security_mode")]
    pub security_mode: String,

    /// Upper bound for liveness / signal probe commands.
    #[serde(
        default = "default_probe_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub probe_timeout: Duration,
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_security_mode() -> String {
    "simple".to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

/// `[router]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    /// Backends to register, by name.
    #[serde(default = "default_backends")]
    pub backends: Vec<String>,

    /// Backend used when the launch environment carries no override.
    /// Defaults to the first entry of `backends`.
    pub default_backend: Option<String>,

    /// Launch-environment key whose value names the backend to use.
    #[serde(default = "default_override_env")]
    pub override_env: String,

    /// Probe every backend when a container has no recorded route
    /// (e.g. after a node-agent restart).
    #[serde(default = "default_true")]
    pub probe_unknown_containers: bool,
}

fn default_backends() -> Vec<String> {
    vec![NATIVE_BACKEND.to_string()]
}

fn default_override_env() -> String {
    "NODEVISOR_BACKEND".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            default_backend: None,
            override_env: default_override_env(),
            probe_unknown_containers: true,
        }
    }
}

/// `[runtime]` section: the external containerization tool.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// Runtime executable.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Runtime endpoint, passed as `-H <url>`.
    #[serde(default)]
    pub url: String,

    /// Image used when the launch environment does not name one.
    #[serde(default)]
    pub image: Option<String>,

    /// Launch-environment key carrying a per-container image name.
    #[serde(default = "default_image_env")]
    pub image_env: String,

    /// Value of `--net`.
    #[serde(default = "default_network")]
    pub network: String,

    /// Host identity file bind-mounted read-only into every container.
    #[serde(default = "default_identity_file")]
    pub identity_file: PathBuf,

    /// Host-specific variables never forwarded into the container.
    #[serde(default = "default_host_env_exclusions")]
    pub host_env_exclusions: Vec<String>,

    /// How long a start waiter stays subscribed before giving up.
    #[serde(
        default = "default_pid_wait_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub pid_wait_timeout: Duration,

    /// Bound on tearing down the event ingestor.
    #[serde(
        default = "default_events_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub events_shutdown_timeout: Duration,

    #[serde(default = "default_command_file_prefix")]
    pub command_file_prefix: String,

    #[serde(default = "default_command_file_suffix")]
    pub command_file_suffix: String,
}

fn default_binary() -> String {
    "docker".to_string()
}

fn default_image_env() -> String {
    "NODEVISOR_RUNTIME_IMAGE".to_string()
}

fn default_network() -> String {
    "host".to_string()
}

fn default_identity_file() -> PathBuf {
    PathBuf::from("/etc/passwd")
}

fn default_host_env_exclusions() -> Vec<String> {
    [
        "JAVA_HOME",
        "HADOOP_COMMON_HOME",
        "HADOOP_HDFS_HOME",
        "HADOOP_YARN_HOME",
        "HADOOP_CONF_DIR",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_pid_wait_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_events_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_command_file_prefix() -> String {
    "nodevisor-cmd-".to_string()
}

fn default_command_file_suffix() -> String {
    ".sh".to_string()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            url: String::new(),
            image: None,
            image_env: default_image_env(),
            network: default_network(),
            identity_file: default_identity_file(),
            host_env_exclusions: default_host_env_exclusions(),
            pid_wait_timeout: default_pid_wait_timeout(),
            events_shutdown_timeout: default_events_shutdown_timeout(),
            command_file_prefix: default_command_file_prefix(),
            command_file_suffix: default_command_file_suffix(),
        }
    }
}
