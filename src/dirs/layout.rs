use std::path::{Path, PathBuf};

use crate::types::ContainerId;

pub const USERCACHE: &str = "usercache";
pub const APPCACHE: &str = "appcache";
pub const FILECACHE: &str = "filecache";

pub fn user_cache_dir(base: &Path, user: &str) -> PathBuf {
    base.join(USERCACHE).join(user)
}

pub fn appcache_dir(base: &Path, user: &str) -> PathBuf {
    user_cache_dir(base, user).join(APPCACHE)
}

pub fn filecache_dir(base: &Path, user: &str) -> PathBuf {
    user_cache_dir(base, user).join(FILECACHE)
}

pub fn application_dir(base: &Path, user: &str, app_id: &str) -> PathBuf {
    appcache_dir(base, user).join(app_id)
}

pub fn app_log_dir(log_root: &Path, app_id: &str) -> PathBuf {
    log_root.join(app_id)
}

pub fn container_log_dir(log_root: &Path, app_id: &str, container_id: &ContainerId) -> PathBuf {
    app_log_dir(log_root, app_id).join(container_id.as_str())
}
