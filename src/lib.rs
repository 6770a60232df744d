// src/lib.rs

pub mod backend;
pub mod cli;
pub mod config;
pub mod container;
pub mod dirs;
pub mod errors;
pub mod events;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::backend::runtime::RuntimeCommands;
use crate::backend::{BackendRegistry, BackendRouter};
use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, ConfigFile, RUNTIME_BACKEND};
use crate::container::{wait_for_pid_file, ContainerTracker, LaunchRequest};
use crate::dirs::DirectoryLifecycleManager;
use crate::events::{IngestorHandle, RuntimeEventBus, RuntimeEventIngestor};
use crate::exec::CommandRunner;
use crate::fs::{FileSystem, RealFileSystem};

/// Everything a node agent shares between containers.
#[derive(Debug)]
pub struct Node {
    pub config: ConfigFile,
    pub bus: RuntimeEventBus,
    pub tracker: Arc<ContainerTracker>,
    pub dirs: DirectoryLifecycleManager,
    pub router: BackendRouter,
}

impl Node {
    pub fn from_config(config: ConfigFile) -> errors::Result<Self> {
        Self::with_filesystem(config, Arc::new(RealFileSystem))
    }

    pub fn with_filesystem(config: ConfigFile, fs: Arc<dyn FileSystem>) -> errors::Result<Self> {
        let bus = RuntimeEventBus::new();
        let tracker = Arc::new(ContainerTracker::new());
        let registry =
            BackendRegistry::from_config(&config, bus.clone(), Arc::clone(&tracker), Arc::clone(&fs))?;
        let router = BackendRouter::from_config(&config, registry);

        Ok(Self {
            dirs: DirectoryLifecycleManager::new(fs),
            config,
            bus,
            tracker,
            router,
        })
    }

    /// Start tailing runtime events, if the runtime backend is enabled.
    pub fn start_ingestor(&self) -> errors::Result<Option<IngestorHandle>> {
        if !self.config.runtime_enabled() {
            return Ok(None);
        }
        let command = RuntimeCommands::from_config(&self.config.runtime).events();
        let ingestor = RuntimeEventIngestor::new(self.bus.clone(), CommandRunner::new(), command);
        ingestor.start().map(Some)
    }

    pub async fn stop_ingestor(&self, handle: Option<IngestorHandle>) {
        if let Some(handle) = handle {
            handle.stop(self.config.runtime.events_shutdown_timeout).await;
        }
    }
}

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let Some(command) = args.command else {
        bail!("no subcommand given (see --help)");
    };

    let node = Node::from_config(cfg)?;

    match command {
        Command::Launch { spec } => launch(&node, spec).await,
        Command::Signal {
            container,
            user,
            pid,
            signal,
        } => {
            let delivered = node.router.signal(&container, &user, pid, signal).await?;
            println!("{delivered}");
            Ok(0)
        }
        Command::Alive { user, pid } => {
            let alive = node.router.is_alive(&user, pid).await?;
            println!("{alive}");
            Ok(if alive { 0 } else { 1 })
        }
        Command::Delete {
            user,
            container,
            base_dirs,
            subdir,
        } => {
            node.router
                .delete_resources(container.as_ref(), &user, &subdir, &base_dirs)
                .await?;
            Ok(0)
        }
        Command::Events => tail_events(&node).await,
    }
}

async fn launch(node: &Node, spec_path: PathBuf) -> Result<i32> {
    let request = LaunchRequest::from_path(&spec_path)?;
    let spec = request.into_spec(&node.config, &node.dirs)?;
    let id = spec.container_id.clone();

    node.dirs.prepare_container(&spec)?;
    let pid_file = spec.pid_file_path();
    node.tracker.activate(&id, pid_file.clone());

    let ingestor = node.start_ingestor()?;
    let outcome = node.router.launch(&spec).await;

    if outcome.is_ok() && node.router.route_of(&id).as_deref() == Some(RUNTIME_BACKEND) {
        // The start event may still be in flight when `start -a` returns.
        match wait_for_pid_file(&pid_file, node.config.node.probe_timeout).await {
            Ok(Some(pid)) => info!(container = %id, pid, "container pid recorded"),
            Ok(None) => warn!(container = %id, pid_file = ?pid_file, "no pid file written"),
            Err(e) => warn!(container = %id, error = %e, "reading pid file failed"),
        }
    }

    node.stop_ingestor(ingestor).await;
    node.tracker.deactivate(&id);

    for line in node.tracker.diagnostics(&id) {
        eprintln!("{line}");
    }

    let code = outcome?;
    println!("{code}");
    Ok(code)
}

async fn tail_events(node: &Node) -> Result<i32> {
    let mut subscription = node.bus.subscribe();
    let Some(ingestor) = node.start_ingestor()? else {
        bail!("the runtime backend is not enabled in [router].backends");
    };

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                break;
            }
            event = subscription.recv() => match event {
                Some(event) => println!("{:?} {}", event.kind, event.runtime_id),
                None => break,
            },
        }
        if ingestor.is_finished() {
            break;
        }
    }

    node.stop_ingestor(Some(ingestor)).await;
    Ok(0)
}

/// Print the resolved backend table.
fn print_dry_run(cfg: &ConfigFile) {
    println!("nodevisor dry-run");
    println!("  node.local_dirs = {:?}", cfg.node.local_dirs);
    println!("  node.log_dirs = {:?}", cfg.node.log_dirs);
    println!("  node.staging_dir = {:?}", cfg.node.staging_dir);
    println!();

    println!("backends ({}):", cfg.router.backends.len());
    for name in &cfg.router.backends {
        let marker = if cfg.router.default_backend.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("  - {name}{marker}");
        if name == RUNTIME_BACKEND {
            let commands = RuntimeCommands::from_config(&cfg.runtime);
            println!("      events: {}", commands.events());
            println!("      image: {:?}", cfg.runtime.image);
            println!("      network: {}", cfg.runtime.network);
        }
    }
    println!("  override env: {}", cfg.router.override_env);

    debug!("dry-run complete (no execution)");
}
