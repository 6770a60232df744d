use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::{NodevisorError, Result};
use crate::fs::FileSystem;

/// Delete `subdir` on behalf of `user`.
///
/// - No `base_dirs`: `subdir` is an absolute path and is removed outright.
/// - Otherwise `subdir` is removed under each base directory.
///
/// Paths that are already gone are logged and skipped. The call only fails
/// when every attempted deletion hit a real error.
pub fn delete_as_user(
    fs: &dyn FileSystem,
    user: &str,
    subdir: &Path,
    base_dirs: &[PathBuf],
) -> Result<()> {
    let targets: Vec<PathBuf> = if base_dirs.is_empty() {
        vec![subdir.to_path_buf()]
    } else {
        base_dirs
            .iter()
            .map(|base| {
                if subdir.as_os_str().is_empty() {
                    base.clone()
                } else {
                    base.join(subdir)
                }
            })
            .collect()
    };

    let mut failures = Vec::new();
    for target in &targets {
        info!(user, path = ?target, "deleting path");
        match fs.remove_all(target) {
            Ok(true) => {}
            Ok(false) => warn!(user, path = ?target, "delete found nothing at path"),
            Err(e) => {
                warn!(user, path = ?target, error = %e, "delete failed");
                failures.push(format!("{}: {e}", target.display()));
            }
        }
    }

    if !targets.is_empty() && failures.len() == targets.len() {
        return Err(NodevisorError::CleanupFailed(failures.join("; ")));
    }
    Ok(())
}
