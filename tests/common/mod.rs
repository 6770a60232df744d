#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub use nodevisor_test_utils::builders;
pub use nodevisor_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Write `contents` to a fresh temporary `.toml` file.
pub fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}
