// src/config/validate.rs

use std::collections::HashSet;

use crate::backend::image::sanitize_image_name;
use crate::config::model::{ConfigFile, RawConfigFile, NATIVE_BACKEND, RUNTIME_BACKEND};
use crate::errors::{NodevisorError, Result};

const KNOWN_BACKENDS: &[&str] = &[NATIVE_BACKEND, RUNTIME_BACKEND];

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::NodevisorError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        if raw.router.default_backend.is_none() {
            raw.router.default_backend = raw.router.backends.first().cloned();
        }
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.node, raw.router, raw.runtime))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_node(cfg)?;
    validate_router(cfg)?;
    if cfg.router.backends.iter().any(|b| b == RUNTIME_BACKEND) {
        validate_runtime(cfg)?;
    }
    Ok(())
}

fn validate_node(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.local_dirs.is_empty() {
        return Err(NodevisorError::ConfigError(
            "[node].local_dirs must list at least one directory".to_string(),
        ));
    }
    if cfg.node.log_dirs.is_empty() {
        return Err(NodevisorError::ConfigError(
            "[node].log_dirs must list at least one directory".to_string(),
        ));
    }
    Ok(())
}

fn validate_router(cfg: &RawConfigFile) -> Result<()> {
    let router = &cfg.router;

    if router.backends.is_empty() {
        return Err(NodevisorError::ConfigError(
            "[router].backends must name at least one backend".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for name in router.backends.iter() {
        if !KNOWN_BACKENDS.contains(&name.as_str()) {
            return Err(NodevisorError::ConfigError(format!(
                "[router].backends contains unknown backend '{}' (expected one of {:?})",
                name, KNOWN_BACKENDS
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(NodevisorError::ConfigError(format!(
                "[router].backends lists '{}' more than once",
                name
            )));
        }
    }

    if let Some(default) = router.default_backend.as_deref() {
        if !router.backends.iter().any(|b| b == default) {
            return Err(NodevisorError::ConfigError(format!(
                "[router].default_backend '{}' is not listed in [router].backends",
                default
            )));
        }
    }

    if router.override_env.trim().is_empty() {
        return Err(NodevisorError::ConfigError(
            "[router].override_env must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_runtime(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.security_mode != "simple" {
        return Err(NodevisorError::ConfigError(format!(
            "the runtime backend only works with simple security mode (got '{}')",
            cfg.node.security_mode
        )));
    }

    let runtime = &cfg.runtime;
    if runtime.url.trim().is_empty() {
        return Err(NodevisorError::ConfigError(
            "[runtime].url must be configured when the runtime backend is enabled".to_string(),
        ));
    }
    if runtime.binary.trim().is_empty() {
        return Err(NodevisorError::ConfigError(
            "[runtime].binary must not be empty".to_string(),
        ));
    }

    if let Some(image) = runtime.image.as_deref() {
        sanitize_image_name(image).map_err(|e| {
            NodevisorError::ConfigError(format!("[runtime].image is not usable: {e}"))
        })?;
    }

    Ok(())
}
