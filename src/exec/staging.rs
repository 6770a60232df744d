// src/exec/staging.rs

//! Command-file staging.
//!
//! Before a runtime command is executed, its full command line is written to
//! a dedicated file in the staging directory so the exact invocation can be
//! inspected after the fact. Each file is created exclusively (fresh unique
//! name, owner-only permissions) and is never reused. Removing old files is
//! left to the node's general temp-file housekeeping.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::debug;

use crate::errors::{NodevisorError, Result};
use crate::exec::command::CommandSpec;
use crate::types::ContainerId;

/// Naming for staged command files: `<prefix><container id>-<random><suffix>`.
#[derive(Debug, Clone)]
pub struct CommandStaging {
    pub dir: PathBuf,
    pub prefix: String,
    pub suffix: String,
}

impl CommandStaging {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Write `commands` (one shell line each) to a new file and keep it.
    pub fn stage(&self, container_id: &ContainerId, commands: &[&CommandSpec]) -> Result<PathBuf> {
        let mut file = Builder::new()
            .prefix(&format!("{}{}-", self.prefix, container_id))
            .suffix(&self.suffix)
            .tempfile_in(&self.dir)?;

        writeln!(file, "#!/bin/sh")?;
        for spec in commands {
            writeln!(file, "{}", render_command(spec))?;
        }
        file.flush()?;

        let (_file, path) = file
            .keep()
            .map_err(|e| NodevisorError::IoError(e.error))?;

        debug!(container = %container_id, path = ?path, "staged command file");
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Render a command as a single shell-safe line.
pub fn render_command(spec: &CommandSpec) -> String {
    shell_words::join(spec.argv())
}
