// src/fs/mod.rs

//! Host filesystem operations used by the directory lifecycle code.
//!
//! The real implementation talks to the local disk; [`mock::MockFileSystem`]
//! lets tests pin free space per root and inject creation failures.

use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Free space (bytes) available to unprivileged users on the filesystem
    /// holding `path`. `path` itself does not need to exist yet.
    fn available_space(&self, path: &Path) -> Result<u64>;

    /// Create `path` and any missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Set the permission bits of `path` (e.g. `0o750`).
    fn set_mode(&self, path: &Path, mode: u32) -> Result<()>;

    /// Permission bits of `path`, masked to `0o7777`.
    fn mode(&self, path: &Path) -> Result<u32>;

    /// Recursively delete `path`. Returns `false` if it did not exist.
    fn remove_all(&self, path: &Path) -> Result<bool>;

    fn exists(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs` and `fs2`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn available_space(&self, path: &Path) -> Result<u64> {
        // Directories are usually probed before they are created; measure the
        // closest existing ancestor, which lives on the same filesystem.
        let probe = path
            .ancestors()
            .find(|p| p.exists())
            .with_context(|| format!("no existing ancestor for {:?}", path))?;
        fs2::available_space(probe).with_context(|| format!("querying free space of {:?}", probe))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("setting mode {:o} on {:?}", mode, path))
    }

    fn mode(&self, path: &Path) -> Result<u32> {
        let meta = fs::metadata(path).with_context(|| format!("stat {:?}", path))?;
        Ok(meta.permissions().mode() & 0o7777)
    }

    fn remove_all(&self, path: &Path) -> Result<bool> {
        let result = match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("deleting {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
