//! Hands synthesized WAV files to the external rpitx transmitter.

use crate::error::{CollarError, Result};
use crate::Config;
use log::{debug, info, warn};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

/// Caller side of a [`Cancellation`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Cancellation signal passed into every command.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Something that can put a WAV file on the air.
pub trait Transmitter: Send + Sync + 'static {
    fn transmit(
        &self,
        wav_path: &Path,
        cancel: &Cancellation,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The rpitx command line transmitter.
///
/// Runs `rpitx -m IQ -i <wav> -f <carrier kHz> -s <rate> -c 1`.
#[derive(Debug, Clone)]
pub struct Rpitx {
    path: PathBuf,
    carrier_khz: u32,
    sample_rate: u32,
}

impl Rpitx {
    pub fn new(path: PathBuf, carrier_khz: u32, sample_rate: u32) -> Self {
        Self {
            path,
            carrier_khz,
            sample_rate,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rpitx_path.clone(),
            config.carrier_khz,
            config.sample_rate,
        )
    }

    pub fn args(&self, wav_path: &Path) -> Vec<OsString> {
        vec![
            "-m".into(),
            "IQ".into(),
            "-i".into(),
            wav_path.into(),
            "-f".into(),
            self.carrier_khz.to_string().into(),
            "-s".into(),
            self.sample_rate.to_string().into(),
            "-c".into(),
            "1".into(),
        ]
    }

    async fn run(&self, wav_path: &Path, cancel: &Cancellation) -> Result<()> {
        let mut child = Command::new(&self.path)
            .args(self.args(wav_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CollarError::TransmitterLaunch {
                path: self.path.clone(),
                source,
            })?;

        debug!("spawned transmitter PID {:?}", child.id());

        let stdout = tokio::spawn(forward_lines(child.stdout.take(), Stream::Stdout));
        let stderr = tokio::spawn(forward_lines(child.stderr.take(), Stream::Stderr));

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                warn!("command cancelled, stopping transmitter");
                child.kill().await?;
                return Err(CollarError::Cancelled);
            }
        };

        let mut output = stdout.await.unwrap_or_default();
        output.push_str(&stderr.await.unwrap_or_default());

        if status.success() {
            info!("transmitter exited successfully");
            Ok(())
        } else {
            warn!("transmitter exited abnormally with {}", status);
            Err(CollarError::TransmitterExit {
                status: status.code(),
                output,
            })
        }
    }
}

impl Transmitter for Rpitx {
    fn transmit(
        &self,
        wav_path: &Path,
        cancel: &Cancellation,
    ) -> impl Future<Output = Result<()>> + Send {
        self.run(wav_path, cancel)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

// Logs each line as it arrives and returns everything that was read.
async fn forward_lines<R>(reader: Option<R>, stream: Stream) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };

    let mut captured = String::new();
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                match stream {
                    Stream::Stdout => info!("rpitx: {}", line),
                    Stream::Stderr => warn!("rpitx: {}", line),
                }
                captured.push_str(&line);
                captured.push('\n');
            }
            Ok(None) => break,
            Err(err) => {
                debug!("stopped reading transmitter {:?}: {}", stream, err);
                break;
            }
        }
    }
    captured
}
