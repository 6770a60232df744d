// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodevisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Unknown container: {0}")]
    UnknownContainer(String),

    #[error("Invalid runtime image '{image}': {reason}")]
    InvalidImage { image: String, reason: String },

    #[error("No usable directory: {0}")]
    NoUsableDirectory(String),

    #[error("Directory initialisation failed: {0}")]
    DirectoryInit(String),

    #[error("Command `{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Command `{0}` timed out and was killed")]
    CommandTimedOut(String),

    #[error("Pid resolution failed for container {container}: {reason}")]
    PidResolution { container: String, reason: String },

    #[error("Unparsable runtime event line: {0}")]
    EventParse(String),

    #[error("Cleanup failed on every backend: {0}")]
    CleanupFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, NodevisorError>;
