// tests/cleanup.rs

mod common;
use crate::common::{init_tracing, TestResult};

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use nodevisor::backend::{BackendRegistry, BackendRouter, ContainerBackend, NativeProcessBackend};
use nodevisor::container::ContainerTracker;
use nodevisor::dirs::delete_as_user;
use nodevisor::errors::NodevisorError;
use nodevisor::fs::mock::MockFileSystem;
use nodevisor::fs::{FileSystem, RealFileSystem};
use nodevisor_test_utils::builders::ConfigFileBuilder;

#[test]
fn subdir_is_removed_under_every_base() -> TestResult {
    init_tracing();
    let a = TempDir::new()?;
    let b = TempDir::new()?;
    std::fs::create_dir_all(a.path().join("app_1/c1"))?;
    std::fs::create_dir_all(b.path().join("app_1"))?;
    std::fs::write(a.path().join("app_1/c1/stdout"), "log")?;

    delete_as_user(
        &RealFileSystem,
        "alice",
        Path::new("app_1"),
        &[a.path().to_path_buf(), b.path().to_path_buf()],
    )?;

    assert!(!a.path().join("app_1").exists());
    assert!(!b.path().join("app_1").exists());
    assert!(a.path().exists());
    Ok(())
}

#[test]
fn absolute_subdir_without_bases_is_removed_outright() -> TestResult {
    init_tracing();
    let root = TempDir::new()?;
    let target = root.path().join("work");
    std::fs::create_dir_all(target.join("nested"))?;

    delete_as_user(&RealFileSystem, "alice", &target, &[])?;
    assert!(!target.exists());
    Ok(())
}

#[test]
fn missing_paths_are_not_fatal() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    delete_as_user(&fs, "alice", Path::new("/never/created"), &[])?;
    Ok(())
}

#[tokio::test]
async fn deleting_twice_through_the_router_succeeds_both_times() -> TestResult {
    init_tracing();
    let local = TempDir::new()?;
    let logs = TempDir::new()?;
    let app_dir = local.path().join("usercache/alice/appcache/app_1");
    std::fs::create_dir_all(&app_dir)?;

    let cfg = ConfigFileBuilder::new(local.path(), logs.path()).build();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let tracker = Arc::new(ContainerTracker::new());
    let native: Arc<dyn ContainerBackend> =
        Arc::new(NativeProcessBackend::new(&cfg, tracker, fs));
    let mut registry = BackendRegistry::new();
    registry.register(native);
    let router = BackendRouter::from_config(&cfg, registry);

    for _ in 0..2 {
        router
            .delete_resources(None, "alice", &app_dir, &[])
            .await?;
    }
    assert!(!app_dir.exists());
    Ok(())
}

#[test]
fn real_errors_on_every_target_fail_the_cleanup() -> TestResult {
    use std::os::unix::fs::PermissionsExt;

    init_tracing();
    // Root ignores permission bits, so the failure cannot be provoked.
    if is_root() {
        return Ok(());
    }

    let base = TempDir::new()?;
    let locked = base.path().join("locked");
    std::fs::create_dir_all(locked.join("victim/inner"))?;
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o500))?;

    let result = delete_as_user(&RealFileSystem, "alice", Path::new("victim"), &[locked.clone()]);
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o700))?;

    assert!(matches!(result, Err(NodevisorError::CleanupFailed(_))));
    Ok(())
}

fn is_root() -> bool {
    std::fs::metadata("/proc/self")
        .map(|m| {
            use std::os::unix::fs::MetadataExt;
            m.uid() == 0
        })
        .unwrap_or(false)
}
