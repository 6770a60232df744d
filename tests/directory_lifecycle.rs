// tests/directory_lifecycle.rs

mod common;
use crate::common::{init_tracing, TestResult};

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use nodevisor::dirs::layout::{app_log_dir, container_log_dir};
use nodevisor::dirs::{
    appcache_dir, application_dir, filecache_dir, user_cache_dir, DirectoryLifecycleManager,
    APPCACHE_PERM, APPDIR_PERM, FILECACHE_PERM, LOGDIR_PERM, USER_PERM,
};
use nodevisor::errors::NodevisorError;
use nodevisor::fs::mock::{MockFileSystem, MOCK_DEFAULT_DIR_MODE};
use nodevisor::fs::{FileSystem, RealFileSystem};
use nodevisor::types::ContainerId;
use nodevisor_test_utils::builders::LaunchSpecBuilder;

#[test]
fn every_level_gets_its_fixed_mode_on_disk() -> TestResult {
    init_tracing();
    let local = TempDir::new()?;
    let logs = TempDir::new()?;
    let fs = RealFileSystem;
    let manager = DirectoryLifecycleManager::new(Arc::new(RealFileSystem));

    let id = ContainerId::new("container_1");
    let work_dir = application_dir(local.path(), "alice", "app_1").join(id.as_str());
    let spec = LaunchSpecBuilder::new(id.as_str(), &work_dir)
        .user("alice")
        .app_id("app_1")
        .local_dir(local.path())
        .log_dir(logs.path())
        .build();

    manager.prepare_container(&spec)?;

    let expectations = [
        (user_cache_dir(local.path(), "alice"), USER_PERM),
        (appcache_dir(local.path(), "alice"), APPCACHE_PERM),
        (filecache_dir(local.path(), "alice"), FILECACHE_PERM),
        (application_dir(local.path(), "alice", "app_1"), APPDIR_PERM),
        (app_log_dir(logs.path(), "app_1"), LOGDIR_PERM),
        (container_log_dir(logs.path(), "app_1", &id), LOGDIR_PERM),
        (work_dir.clone(), APPDIR_PERM),
    ];
    for (dir, mode) in expectations {
        assert_eq!(fs.mode(&dir)?, mode, "{dir:?}");
    }
    Ok(())
}

#[test]
fn modes_are_reapplied_over_existing_directories() -> TestResult {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    let root = PathBuf::from("/data0");
    let user_dir = user_cache_dir(&root, "alice");
    fs.add_dir(&user_dir);
    assert_eq!(fs.mode(&user_dir)?, MOCK_DEFAULT_DIR_MODE);

    let manager = DirectoryLifecycleManager::new(fs.clone());
    manager.create_user_local_dirs(&[root], "alice")?;

    assert_eq!(fs.mode(&user_dir)?, USER_PERM);
    Ok(())
}

#[test]
fn one_failing_root_is_skipped() -> TestResult {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    fs.fail_creation_under("/bad");
    let roots = vec![PathBuf::from("/bad"), PathBuf::from("/good")];

    let manager = DirectoryLifecycleManager::new(fs.clone());
    manager.create_user_local_dirs(&roots, "alice")?;
    manager.create_user_cache_dirs(&roots, "alice")?;
    manager.create_app_dirs(&roots, "alice", "app_1")?;

    assert!(fs.exists(&application_dir(&roots[1], "alice", "app_1")));
    assert!(!fs.exists(&user_cache_dir(&roots[0], "alice")));
    Ok(())
}

#[test]
fn every_root_failing_is_fatal_for_the_level() {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    fs.fail_creation_under("/bad0");
    fs.fail_creation_under("/bad1");
    let roots = vec![PathBuf::from("/bad0"), PathBuf::from("/bad1")];
    let manager = DirectoryLifecycleManager::new(fs);

    assert!(matches!(
        manager.create_user_local_dirs(&roots, "alice"),
        Err(NodevisorError::DirectoryInit(_))
    ));
    assert!(matches!(
        manager.create_app_log_dirs(&roots, "app_1"),
        Err(NodevisorError::DirectoryInit(_))
    ));
    assert!(matches!(
        manager.create_container_log_dirs(&roots, "app_1", &ContainerId::new("c")),
        Err(NodevisorError::DirectoryInit(_))
    ));
}
