// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::{ContainerId, Signal};

/// Command-line arguments for `nodevisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "nodevisor",
    version,
    about = "Launch, signal and clean up containers on this node.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Nodevisor.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Nodevisor.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `NODEVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the config, print the backend table, do nothing else.
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Prepare directories and launch one container, blocking until it exits.
    Launch {
        /// Launch request (TOML).
        #[arg(long, value_name = "PATH")]
        spec: PathBuf,
    },

    /// Deliver a signal to a container process.
    Signal {
        #[arg(long, value_name = "ID")]
        container: ContainerId,
        #[arg(long)]
        user: String,
        #[arg(long)]
        pid: u32,
        /// TERM, KILL, QUIT or NULL (numbers accepted).
        #[arg(long, default_value = "TERM")]
        signal: Signal,
    },

    /// Exit 0 if any backend reports the process alive, 1 otherwise.
    Alive {
        #[arg(long)]
        user: String,
        #[arg(long)]
        pid: u32,
    },

    /// Delete a subdirectory under each base directory (or an absolute path).
    Delete {
        #[arg(long)]
        user: String,
        /// Container whose route should be tried first and then forgotten.
        #[arg(long, value_name = "ID")]
        container: Option<ContainerId>,
        /// Base directory; repeatable.
        #[arg(long = "base", value_name = "DIR")]
        base_dirs: Vec<PathBuf>,
        subdir: PathBuf,
    },

    /// Print parsed runtime events until Ctrl-C.
    Events,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
