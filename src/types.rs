use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Stable identifier of a scheduled container.
///
/// This is the correlation key shared by backend routing, the event bus
/// subscribers and the pid files. It never changes once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Signals the node agent may deliver to a container process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Signal 0: existence probe only.
    Null,
    Quit,
    Kill,
    Term,
}

impl Signal {
    pub fn number(self) -> i32 {
        match self {
            Signal::Null => 0,
            Signal::Quit => 3,
            Signal::Kill => 9,
            Signal::Term => 15,
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().trim_start_matches("SIG") {
            "NULL" | "0" => Ok(Signal::Null),
            "QUIT" | "3" => Ok(Signal::Quit),
            "KILL" | "9" => Ok(Signal::Kill),
            "TERM" | "15" => Ok(Signal::Term),
            other => Err(format!(
                "invalid signal: {other} (expected NULL, QUIT, KILL or TERM)"
            )),
        }
    }
}

/// Exit codes with a lifecycle meaning for the node agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    /// SIGKILL delivered to the container (128 + 9).
    ForceKilled,
    /// SIGTERM delivered to the container (128 + 15).
    Terminated,
    /// The container process could not be found any more.
    Lost,
}

impl ExitCode {
    pub const fn code(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::ForceKilled => 137,
            ExitCode::Terminated => 143,
            ExitCode::Lost => 154,
        }
    }
}

/// How a non-zero (or zero) exit status should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    /// Killed or terminated on request; a terminal status, not a failure.
    KilledOnRequest,
    Failed,
}

/// Classify a raw exit code from an external launch command.
pub fn classify_exit(code: i32) -> ExitClass {
    if code == ExitCode::Success.code() {
        ExitClass::Success
    } else if code == ExitCode::ForceKilled.code() || code == ExitCode::Terminated.code() {
        ExitClass::KilledOnRequest
    } else {
        ExitClass::Failed
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

/// Serde adapter for duration strings in the config file.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
