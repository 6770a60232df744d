// src/dirs/mod.rs

//! Node-local directory lifecycle.
//!
//! Layout per local root:
//!
//! ```text
//! <local>/usercache/<user>/                 0750
//! <local>/usercache/<user>/appcache/        0710
//! <local>/usercache/<user>/appcache/<app>/  0710
//! <local>/usercache/<user>/filecache/       0710
//! <log>/<app>/                              0710
//! <log>/<app>/<container>/                  0710
//! ```
//!
//! - [`layout`] builds those paths.
//! - [`placement`] picks a root weighted by free space.
//! - [`lifecycle`] creates each level on every root with fixed permissions.
//! - [`cleanup`] deletes a subdirectory under a set of base directories.

pub mod cleanup;
pub mod layout;
pub mod lifecycle;
pub mod placement;

pub use cleanup::delete_as_user;
pub use layout::{
    application_dir, appcache_dir, container_log_dir, filecache_dir, user_cache_dir, APPCACHE,
    FILECACHE, USERCACHE,
};
pub use lifecycle::DirectoryLifecycleManager;
pub use placement::pick_weighted;

/// `<local>/usercache/<user>`
pub const USER_PERM: u32 = 0o750;
/// `<local>/usercache/<user>/appcache`
pub const APPCACHE_PERM: u32 = 0o710;
/// `<local>/usercache/<user>/filecache`
pub const FILECACHE_PERM: u32 = 0o710;
/// `<local>/usercache/<user>/appcache/<app>`
pub const APPDIR_PERM: u32 = 0o710;
/// `<log>/<app>` and `<log>/<app>/<container>`
pub const LOGDIR_PERM: u32 = 0o710;
