// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`]: the `CommandRunner` every external call goes through.
//! - [`staging`]: exclusive per-container command files.
//! - [`launch_script`]: the launch script written into a work directory.
//! - [`process`]: liveness and signal probes against host pids.

pub mod command;
pub mod launch_script;
pub mod process;
pub mod staging;

pub use command::{CommandOutput, CommandRunner, CommandSpec, StreamingCommand};
pub use launch_script::{write_launch_script, LaunchScript};
pub use process::{process_is_alive, signal_process};
pub use staging::CommandStaging;
