// src/backend/image.rs

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{NodevisorError, Result};

/// Optional `registry[:port]/` prefix followed by a name with optional tag.
/// ASCII only.
const IMAGE_PATTERN: &str = r"^(([A-Za-z0-9_.-]+)(:[0-9]+)*/)?[A-Za-z0-9_.:-]+$";

fn image_regex() -> Result<&'static Regex> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IMAGE_PATTERN))
        .as_ref()
        .map_err(|e| NodevisorError::Other(anyhow::anyhow!("image pattern: {e}")))
}

/// Strip quote characters from `raw` and validate it as a runtime image name.
///
/// Returns the cleaned name, or [`NodevisorError::InvalidImage`] when the
/// result is empty or not a plain `[registry[:port]/]name[:tag]` reference.
pub fn sanitize_image_name(raw: &str) -> Result<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '\'' && *c != '"').collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(NodevisorError::InvalidImage {
            image: raw.to_string(),
            reason: "image name is empty".to_string(),
        });
    }

    if !image_regex()?.is_match(cleaned) {
        return Err(NodevisorError::InvalidImage {
            image: raw.to_string(),
            reason: format!("does not match {IMAGE_PATTERN}"),
        });
    }

    Ok(cleaned.to_string())
}
