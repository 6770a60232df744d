// src/exec/launch_script.rs

//! Launch script writer.
//!
//! The script exported to a container's work dir sets the launch environment,
//! links localized resources into place and finally `exec`s the command.
//!
//! Every value is single-quoted, so environment values are literal: a `$VAR`
//! inside a value is exported as the text `$VAR`, not expanded by bash.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use shell_words::quote;

/// Incrementally built bash launch script.
#[derive(Debug, Clone)]
pub struct LaunchScript {
    lines: Vec<String>,
}

impl Default for LaunchScript {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchScript {
    pub fn new() -> Self {
        Self {
            lines: vec!["#!/bin/bash".to_string(), String::new()],
        }
    }

    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines.push(format!("export {}={}", key, quote(value)));
        self
    }

    pub fn symlink(&mut self, target: &Path, link: &str) -> &mut Self {
        let target = target.to_string_lossy();
        self.lines.push(format!(
            "ln -sf {} {}",
            quote(&target),
            quote(link)
        ));
        self
    }

    pub fn command(&mut self, command: &[String]) -> &mut Self {
        let joined = command.join(" ");
        self.lines
            .push(format!("exec /bin/bash -c {}", quote(&joined)));
        self
    }

    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in &self.lines {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }

    pub fn render(&self) -> String {
        let mut s = self.lines.join("\n");
        s.push('\n');
        s
    }
}

/// Build and write a launch script, leaving out every key in `excluded`.
///
/// Everything else from `environment` and every symlink request in
/// `resources` is passed through verbatim.
pub fn write_launch_script(
    out: &mut dyn Write,
    environment: &BTreeMap<String, String>,
    resources: &BTreeMap<PathBuf, Vec<String>>,
    command: &[String],
    excluded: &HashSet<&str>,
) -> io::Result<()> {
    let mut script = LaunchScript::new();

    for (key, value) in environment {
        if !excluded.contains(key.as_str()) {
            script.env(key, value);
        }
    }
    for (target, links) in resources {
        for link in links {
            script.symlink(target, link);
        }
    }
    script.command(command);

    tracing::debug!(script = %script.render(), "writing launch script");
    script.write(out)
}
