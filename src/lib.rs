pub mod protocol;
pub mod modulation;
pub mod audio;
pub mod error;
pub mod codec;
pub mod transmitter;
pub mod remote;
pub mod request;
pub mod http;
pub mod rpc;
pub mod shell;

pub use protocol::*;
pub use modulation::*;
pub use audio::*;
pub use error::*;
pub use codec::*;
pub use transmitter::*;
pub use remote::*;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const SAMPLE_RATE: u32 = 44000;
pub const CARRIER_KHZ: u32 = 27255;
pub const SYMBOL_DURATION_MS: u32 = 4;
pub const TONE_FREQUENCY: f64 = 5000.0;
pub const TRAILING_SILENCE_MS: u32 = 100;
pub const WAV_FILE_NAME: &str = "result.wav";

/// 16-bit identity of a hand-held remote, as four lowercase hex nibbles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn remote1() -> Self {
        RemoteId(REMOTE1.to_string())
    }

    pub fn remote2() -> Self {
        RemoteId(REMOTE2.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RemoteId {
    fn default() -> Self {
        Self::remote1()
    }
}

impl FromStr for RemoteId {
    type Err = CollarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "remote1" => Ok(Self::remote1()),
            "remote2" => Ok(Self::remote2()),
            hex if hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                Ok(RemoteId(hex.to_string()))
            }
            _ => Err(CollarError::InvalidRemoteId(s.to_string())),
        }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub remote_id: RemoteId,
    pub sample_rate: u32,
    pub carrier_khz: u32,
    pub rpitx_path: PathBuf,
    pub wav_output_dir: PathBuf,
}

impl Config {
    /// Scratch file handed to the transmitter; overwritten by every command.
    pub fn wav_path(&self) -> PathBuf {
        self.wav_output_dir.join(WAV_FILE_NAME)
    }
}

pub fn default_rpitx_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join("src/rpitx/rpitx")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_id: RemoteId::default(),
            sample_rate: SAMPLE_RATE,
            carrier_khz: CARRIER_KHZ,
            rpitx_path: default_rpitx_path(),
            wav_output_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_id_parsing() {
        assert_eq!("remote1".parse::<RemoteId>().unwrap().as_str(), "6695");
        assert_eq!("REMOTE2".parse::<RemoteId>().unwrap().as_str(), "999a");
        assert_eq!("ABCD".parse::<RemoteId>().unwrap().as_str(), "abcd");
        assert!("12345".parse::<RemoteId>().is_err());
        assert!("12g4".parse::<RemoteId>().is_err());
        assert!("".parse::<RemoteId>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote_id, RemoteId::remote1());
        assert_eq!(config.sample_rate, 44000);
        assert_eq!(config.carrier_khz, 27255);
        assert!(config.rpitx_path.ends_with("src/rpitx/rpitx"));
        assert_eq!(config.wav_path(), PathBuf::from("./result.wav"));
    }
}
