// src/dirs/lifecycle.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::container::ContainerLaunchSpec;
use crate::dirs::layout::{
    app_log_dir, appcache_dir, application_dir, container_log_dir, filecache_dir,
    user_cache_dir,
};
use crate::dirs::placement::{pick_weighted, total_available};
use crate::dirs::{APPCACHE_PERM, APPDIR_PERM, FILECACHE_PERM, LOGDIR_PERM, USER_PERM};
use crate::errors::{NodevisorError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::ContainerId;

/// Creates and places the per-user / per-application directory tree.
///
/// Every level is attempted on each configured root independently. A root
/// that fails is logged and skipped; a level only fails when no root at all
/// could host it.
#[derive(Debug, Clone)]
pub struct DirectoryLifecycleManager {
    fs: Arc<dyn FileSystem>,
}

impl Default for DirectoryLifecycleManager {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl DirectoryLifecycleManager {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Choose `<local>/usercache/<user>/appcache/<app>` on one of
    /// `local_dirs`, with probability proportional to each root's free space.
    pub fn select_working_dir(
        &self,
        local_dirs: &[PathBuf],
        user: &str,
        app_id: &str,
    ) -> Result<PathBuf> {
        let candidates: Vec<PathBuf> = local_dirs
            .iter()
            .map(|d| application_dir(d, user, app_id))
            .collect();

        let available: Vec<u64> = candidates
            .iter()
            .map(|dir| match self.fs.available_space(dir) {
                Ok(space) => space,
                Err(e) => {
                    warn!(dir = ?dir, error = %e, "unable to get free space; treating as full");
                    0
                }
            })
            .collect();

        let total = total_available(&available);
        if total == 0 {
            return Err(NodevisorError::NoUsableDirectory(format!(
                "not able to find a working directory for {user}"
            )));
        }

        let draw = rand::rng().random_range(0..total);
        let idx = pick_weighted(&available, draw).ok_or_else(|| {
            NodevisorError::NoUsableDirectory(format!(
                "not able to find a working directory for {user}"
            ))
        })?;

        debug!(user, app_id, ?available, chosen = idx, "selected working directory root");
        Ok(candidates[idx].clone())
    }

    /// Create `path` (and parents), then force its mode to `mode`.
    ///
    /// The explicit chmod overrides whatever the process umask produced.
    pub fn create_dir(&self, path: &Path, mode: u32) -> Result<()> {
        self.fs.create_dir_all(path)?;
        self.fs.set_mode(path, mode)?;
        Ok(())
    }

    /// `<local>/usercache/<user>` on every root.
    pub fn create_user_local_dirs(&self, local_dirs: &[PathBuf], user: &str) -> Result<()> {
        let created = self.create_on_roots(local_dirs, USER_PERM, "user", |root| {
            user_cache_dir(root, user)
        });
        if created == 0 {
            return Err(NodevisorError::DirectoryInit(format!(
                "not able to initialize user directories in any of the configured local directories for user {user}"
            )));
        }
        Ok(())
    }

    /// `appcache` and `filecache` under every user directory.
    pub fn create_user_cache_dirs(&self, local_dirs: &[PathBuf], user: &str) -> Result<()> {
        info!(user, "initializing user cache directories");

        let appcache = self.create_on_roots(local_dirs, APPCACHE_PERM, "app cache", |root| {
            appcache_dir(root, user)
        });
        let filecache = self.create_on_roots(local_dirs, FILECACHE_PERM, "file cache", |root| {
            filecache_dir(root, user)
        });

        if appcache == 0 {
            return Err(NodevisorError::DirectoryInit(format!(
                "not able to initialize app-cache directories in any of the configured local directories for user {user}"
            )));
        }
        if filecache == 0 {
            return Err(NodevisorError::DirectoryInit(format!(
                "not able to initialize file-cache directories in any of the configured local directories for user {user}"
            )));
        }
        Ok(())
    }

    /// `<local>/usercache/<user>/appcache/<app>` on every root.
    pub fn create_app_dirs(&self, local_dirs: &[PathBuf], user: &str, app_id: &str) -> Result<()> {
        let created = self.create_on_roots(local_dirs, APPDIR_PERM, "app", |root| {
            application_dir(root, user, app_id)
        });
        if created == 0 {
            return Err(NodevisorError::DirectoryInit(format!(
                "not able to initialize app directories in any of the configured local directories for app {app_id}"
            )));
        }
        Ok(())
    }

    /// `<log>/<app>` on every log root.
    pub fn create_app_log_dirs(&self, log_dirs: &[PathBuf], app_id: &str) -> Result<()> {
        let created = self.create_on_roots(log_dirs, LOGDIR_PERM, "app-log", |root| {
            app_log_dir(root, app_id)
        });
        if created == 0 {
            return Err(NodevisorError::DirectoryInit(format!(
                "not able to initialize app-log directories in any of the configured log directories for app {app_id}"
            )));
        }
        Ok(())
    }

    /// `<log>/<app>/<container>` on every log root.
    pub fn create_container_log_dirs(
        &self,
        log_dirs: &[PathBuf],
        app_id: &str,
        container_id: &ContainerId,
    ) -> Result<()> {
        let created = self.create_on_roots(log_dirs, LOGDIR_PERM, "container-log", |root| {
            container_log_dir(root, app_id, container_id)
        });
        if created == 0 {
            return Err(NodevisorError::DirectoryInit(format!(
                "not able to initialize container-log directories in any of the configured log directories for container {container_id}"
            )));
        }
        Ok(())
    }

    /// Create every level a container launch needs, plus its work directory.
    pub fn prepare_container(&self, spec: &ContainerLaunchSpec) -> Result<()> {
        self.create_user_local_dirs(&spec.local_dirs, &spec.user)?;
        self.create_user_cache_dirs(&spec.local_dirs, &spec.user)?;
        self.create_app_dirs(&spec.local_dirs, &spec.user, &spec.app_id)?;
        self.create_app_log_dirs(&spec.log_dirs, &spec.app_id)?;
        self.create_container_log_dirs(&spec.log_dirs, &spec.app_id, &spec.container_id)?;
        self.create_dir(&spec.work_dir, APPDIR_PERM)?;
        Ok(())
    }

    fn create_on_roots<F>(&self, roots: &[PathBuf], mode: u32, level: &str, path_for: F) -> usize
    where
        F: Fn(&Path) -> PathBuf,
    {
        let mut created = 0;
        for root in roots {
            let dir = path_for(root);
            match self.create_dir(&dir, mode) {
                Ok(()) => {
                    debug!(dir = ?dir, mode = %format!("{:o}", mode), level, "created directory");
                    created += 1;
                }
                Err(e) => {
                    warn!(dir = ?dir, level, error = %e, "unable to create directory; skipping root");
                }
            }
        }
        created
    }
}
