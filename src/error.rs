use crate::protocol::CollarCommand;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollarError {
    #[error("Invalid nibble {0:?} in hex string")]
    InvalidNibble(char),

    #[error("Invalid symbol {0:?} in bit string")]
    InvalidSymbol(char),

    #[error("Invalid remote id {0:?}: expected remote1, remote2 or four hex digits")]
    InvalidRemoteId(String),

    #[error("Cannot launch transmitter {}: {source}", path.display())]
    TransmitterLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transmitter exited with {}: {output}", status.map_or("signal".to_string(), |c| format!("status {c}")))]
    TransmitterExit { status: Option<i32>, output: String },

    #[error("Command cancelled")]
    Cancelled,

    #[error("Request decode error: {0}")]
    RequestDecode(String),

    #[error("Command too long: {0} does not fit in a WAV file")]
    TooLong(CollarCommand),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollarError {
    /// Encoding errors mean the frame tables are corrupt. Nothing built from
    /// them may reach the radio.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CollarError::InvalidNibble(_) | CollarError::InvalidSymbol(_)
        )
    }
}

impl CollarError {
    /// Errors caused by what the caller asked for rather than by the
    /// remote itself.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, CollarError::RequestDecode(_) | CollarError::TooLong(_))
    }
}

pub type Result<T> = std::result::Result<T, CollarError>;
