//! Wire messages shared by the HTTP and RPC front-ends.

use crate::error::{CollarError, Result};
use crate::protocol::CollarCommand;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandType {
    Beep,
    Nick,
    Shock,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandType::Beep => "BEEP",
            CommandType::Nick => "NICK",
            CommandType::Shock => "SHOCK",
        })
    }
}

/// `{"type": "BEEP" | "NICK" | "SHOCK", "intensity": <int>, "duration_ms": <int>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollarRequest {
    #[serde(rename = "type")]
    pub kind: CommandType,
    /// Level 1..8; out of range values are clamped.
    #[serde(default)]
    pub intensity: i32,
    /// Ignored for NICK. Negative durations count as zero.
    #[serde(default, alias = "durationMs")]
    pub duration_ms: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollarResponse {}

impl CollarRequest {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| CollarError::RequestDecode(e.to_string()))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms.max(0) as u64)
    }

    pub fn command(&self) -> CollarCommand {
        let level = i64::from(self.intensity);
        match self.kind {
            CommandType::Beep => CollarCommand::beep(self.duration()),
            CommandType::Nick => CollarCommand::nick(level),
            CommandType::Shock => CollarCommand::shock(level, self.duration()),
        }
    }
}

impl fmt::Display for CollarRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type:{} intensity:{} duration_ms:{}",
            self.kind, self.intensity, self.duration_ms
        )
    }
}
