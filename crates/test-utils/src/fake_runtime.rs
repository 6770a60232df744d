use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Id the fake runtime prints from `create`.
pub const FAKE_RUNTIME_ID: &str = "fakeruntimeid0123456789abcdef";
/// Pid the fake runtime reports from `inspect`.
pub const FAKE_PID: u32 = 4242;

/// A shell script standing in for the container runtime CLI.
///
/// - `create ... bash <script>` records `<script>` and prints
///   [`FAKE_RUNTIME_ID`].
/// - `start -a <id>` appends a start event to the event log, then runs the
///   recorded launch script on the host and exits with its status.
/// - `inspect` prints [`FAKE_PID`] (or fails, see [`FakeRuntime::failing_inspect`]).
/// - `events` follows the event log.
///
/// Every invocation (minus `-H <url>`) is appended to `invocations.log`.
pub struct FakeRuntime {
    dir: TempDir,
    binary: PathBuf,
}

impl FakeRuntime {
    pub fn new() -> std::io::Result<Self> {
        Self::build(false)
    }

    /// Like [`new`](Self::new), but `inspect` exits non-zero.
    pub fn failing_inspect() -> std::io::Result<Self> {
        Self::build(true)
    }

    fn build(fail_inspect: bool) -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        let binary = dir.path().join("fake-runtime");

        let inspect = if fail_inspect {
            "echo \"Error: no such object\" >&2; exit 1".to_string()
        } else {
            format!("echo {FAKE_PID}")
        };

        let script = format!(
            r#"#!/bin/sh
DIR='{dir}'
if [ "$1" = "-H" ]; then shift 2; fi
echo "$*" >> "$DIR/invocations.log"
case "$1" in
  create)
    for last; do :; done
    echo "$last" > "$DIR/launch-script"
    echo {id}
    ;;
  start)
    echo "2024-01-01T00:00:00.000000000Z {id}: (from fake-image) start" >> "$DIR/events.log"
    /bin/bash "$(cat "$DIR/launch-script")"
    exit $?
    ;;
  inspect)
    {inspect}
    ;;
  events)
    touch "$DIR/events.log"
    exec tail -n +1 -f "$DIR/events.log"
    ;;
  *)
    echo "unknown command: $1" >&2
    exit 2
    ;;
esac
"#,
            dir = dir.path().display(),
            id = FAKE_RUNTIME_ID,
            inspect = inspect,
        );

        fs::write(&binary, script)?;
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))?;
        fs::write(dir.path().join("events.log"), "")?;

        Ok(Self { dir, binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn url(&self) -> &str {
        "unix:///fake/runtime.sock"
    }

    /// Append a raw line to the event feed.
    pub fn emit_event_line(&self, line: &str) -> std::io::Result<()> {
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.dir.path().join("events.log"))?;
        writeln!(file, "{line}")
    }

    /// Recorded invocations, one per line.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("invocations.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
