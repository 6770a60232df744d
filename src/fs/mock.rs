// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Mode a freshly created mock directory gets, as if under a `022` umask.
pub const MOCK_DEFAULT_DIR_MODE: u32 = 0o755;

#[derive(Debug, Clone, Default)]
struct MockState {
    dirs: HashMap<PathBuf, u32>,
    free_space: HashMap<PathBuf, u64>,
    failing_roots: HashSet<PathBuf>,
}

/// In-memory filesystem for directory lifecycle tests.
///
/// Free space is configured per root; any path under a root reports that
/// root's value. Roots marked as failing reject directory creation.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked mid-update;
        // the maps are still usable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_free_space(&self, root: impl AsRef<Path>, bytes: u64) {
        self.lock()
            .free_space
            .insert(root.as_ref().to_path_buf(), bytes);
    }

    pub fn fail_creation_under(&self, root: impl AsRef<Path>) {
        self.lock()
            .failing_roots
            .insert(root.as_ref().to_path_buf());
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.lock()
            .dirs
            .insert(path.as_ref().to_path_buf(), MOCK_DEFAULT_DIR_MODE);
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.lock().dirs.keys().cloned().collect();
        dirs.sort();
        dirs
    }
}

impl FileSystem for MockFileSystem {
    fn available_space(&self, path: &Path) -> Result<u64> {
        let state = self.lock();
        state
            .free_space
            .iter()
            .filter(|(root, _)| path.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, bytes)| *bytes)
            .ok_or_else(|| anyhow!("no filesystem mounted for {:?}", path))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.failing_roots.iter().any(|root| path.starts_with(root)) {
            return Err(anyhow!("permission denied creating {:?}", path));
        }
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state
                .dirs
                .entry(ancestor.to_path_buf())
                .or_insert(MOCK_DEFAULT_DIR_MODE);
        }
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        let mut state = self.lock();
        match state.dirs.get_mut(path) {
            Some(m) => {
                *m = mode & 0o7777;
                Ok(())
            }
            None => Err(anyhow!("No such directory: {:?}", path)),
        }
    }

    fn mode(&self, path: &Path) -> Result<u32> {
        self.lock()
            .dirs
            .get(path)
            .copied()
            .ok_or_else(|| anyhow!("No such directory: {:?}", path))
    }

    fn remove_all(&self, path: &Path) -> Result<bool> {
        let mut state = self.lock();
        let before = state.dirs.len();
        state.dirs.retain(|p, _| !p.starts_with(path));
        Ok(state.dirs.len() != before)
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().dirs.contains_key(path)
    }
}
