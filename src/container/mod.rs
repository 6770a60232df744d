// src/container/mod.rs

//! Container-level data shared by every backend.
//!
//! - [`spec`]: the read-only launch request handed to a backend.
//! - [`tracker`]: which containers are still active, where their pid files
//!   live, and their diagnostics.
//! - [`pid`]: atomic pid-file write and the matching readers.

pub mod pid;
pub mod spec;
pub mod tracker;

pub use pid::{read_pid_file, wait_for_pid_file, write_pid_file_atomic};
pub use spec::{ContainerLaunchSpec, LaunchRequest, CONTAINER_SCRIPT};
pub use tracker::ContainerTracker;
