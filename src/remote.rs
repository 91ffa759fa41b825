//! The command API shared by every front-end.
//!
//! Each command walks a small state machine while it holds the radio:
//!
//! ```txt
//!   +--------+  lock   +--------------+  wav written  +--------------+
//!   |  Idle  | ======> | Synthesizing | ============> | Transmitting |
//!   +--------+         +--------------+               +--------------+
//!       /\                   ||                              ||
//!       ||=== error, cancel =||                              ||
//!       ||=========== transmitter exit, cancel ==============||
//! ```
//!
//! Only one command holds the radio at a time; later callers wait on the
//! lock in arrival order.

use crate::audio::{write_wav_file, WavSpec};
use crate::error::{CollarError, Result};
use crate::modulation::SymbolModulator;
use crate::protocol::{CollarCommand, Frame};
use crate::transmitter::{Cancellation, Rpitx, Transmitter};
use crate::Config;
use log::{debug, error, info, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Idle,
    Synthesizing,
    Transmitting,
}

pub struct Remote<T = Rpitx> {
    config: Arc<Config>,
    modulator: SymbolModulator,
    transmitter: T,
    radio: Mutex<()>,
    state: watch::Sender<RemoteState>,
}

impl Remote<Rpitx> {
    pub fn new(config: Arc<Config>) -> Self {
        let rpitx = Rpitx::from_config(&config);
        Self::with_transmitter(config, rpitx)
    }
}

impl<T: Transmitter> Remote<T> {
    pub fn with_transmitter(config: Arc<Config>, transmitter: T) -> Self {
        let modulator = SymbolModulator::new(config.sample_rate);
        let (state, _) = watch::channel(RemoteState::Idle);
        Self {
            config,
            modulator,
            transmitter,
            radio: Mutex::new(()),
            state,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    pub fn state(&self) -> RemoteState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoteState> {
        self.state.subscribe()
    }

    /// Sends a beep for `duration`.
    pub async fn beep(&self, duration: Duration, cancel: &Cancellation) -> Result<()> {
        self.send(CollarCommand::beep(duration), cancel).await
    }

    /// Sends a momentary stimulation. `level` is clamped to 1..=8.
    pub async fn nick(&self, level: i64, cancel: &Cancellation) -> Result<()> {
        self.send(CollarCommand::nick(level), cancel).await
    }

    /// Sends a continuous stimulation of `level` (clamped to 1..=8) for
    /// `duration`.
    pub async fn shock(&self, level: i64, duration: Duration, cancel: &Cancellation) -> Result<()> {
        self.send(CollarCommand::shock(level, duration), cancel).await
    }

    pub async fn send(&self, command: CollarCommand, cancel: &Cancellation) -> Result<()> {
        info!("command: {}", command);
        self.sample_count(&command)?;

        let _radio = tokio::select! {
            radio = self.radio.lock() => radio,
            _ = cancel.cancelled() => return Err(CollarError::Cancelled),
        };
        if cancel.is_cancelled() {
            return Err(CollarError::Cancelled);
        }

        let _busy = StateGuard::enter(&self.state, RemoteState::Synthesizing);

        let samples = self.modulator.modulate(&self.frame(&command));
        debug!(
            "synthesized {} samples ({:?})",
            samples.len(),
            self.modulator.duration(samples.len())
        );

        // staged so a cancelled write never replaces the previous file
        let wav_path = self.config.wav_path();
        let staging = wav_path.with_extension("wav.part");
        let spec = WavSpec::stereo(self.config.sample_rate);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CollarError::Cancelled),
            written = write_wav_file(&staging, &spec, &samples) => written?,
        }
        if cancel.is_cancelled() {
            return Err(CollarError::Cancelled);
        }
        tokio::fs::rename(&staging, &wav_path).await?;
        debug!("wrote {}", wav_path.display());

        self.state.send_replace(RemoteState::Transmitting);
        self.transmitter.transmit(&wav_path, cancel).await
    }

    /// Samples `command` synthesizes to, trailing silence included.
    ///
    /// Commands whose WAV file would overflow its 32-bit size fields are
    /// refused with [`CollarError::TooLong`] before anything is allocated.
    pub fn sample_count(&self, command: &CollarCommand) -> Result<u64> {
        let layout = encoded(command, command.layout(&self.config.remote_id));
        let samples = self.modulator.sample_count(&layout);
        if samples > WavSpec::stereo(self.config.sample_rate).max_frames() {
            return Err(CollarError::TooLong(*command));
        }
        Ok(samples)
    }

    /// Build the frame for `command` with this remote's identity.
    pub fn frame(&self, command: &CollarCommand) -> Frame {
        let frame = encoded(command, command.frame(&self.config.remote_id));
        trace!("symbols: {}", frame);
        frame
    }

    /// Synthesize `command` without touching the radio.
    pub fn render(&self, command: &CollarCommand) -> Vec<i16> {
        self.modulator.modulate(&self.frame(command))
    }
}

// Refuse to put a corrupt frame on the air.
fn encoded<T>(command: &CollarCommand, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!("cannot encode {}: {}", command, err);
            std::process::abort();
        }
    }
}

// Returns the remote to Idle however the command ends.
struct StateGuard<'a> {
    state: &'a watch::Sender<RemoteState>,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a watch::Sender<RemoteState>, next: RemoteState) -> Self {
        state.send_replace(next);
        Self { state }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(RemoteState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transmitter::cancellation;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransmitter {
        calls: AtomicUsize,
    }

    impl Transmitter for CountingTransmitter {
        async fn transmit(&self, wav_path: &Path, _cancel: &Cancellation) -> Result<()> {
            assert!(wav_path.ends_with("result.wav"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn remote(dir: &Path) -> Remote<CountingTransmitter> {
        let config = Config {
            wav_output_dir: dir.to_path_buf(),
            ..Config::default()
        };
        Remote::with_transmitter(Arc::new(config), CountingTransmitter::default())
    }

    #[tokio::test]
    async fn test_commands_reach_transmitter() {
        let dir = tempfile::tempdir().unwrap();
        let remote = remote(dir.path());
        let never = Cancellation::never();

        remote.nick(3, &never).await.unwrap();
        remote.beep(Duration::from_secs(1), &never).await.unwrap();
        remote.shock(8, Duration::from_millis(10), &never).await.unwrap();

        assert_eq!(remote.transmitter().calls.load(Ordering::SeqCst), 3);
        assert_eq!(remote.state(), RemoteState::Idle);
        assert!(dir.path().join("result.wav").exists());
    }

    #[tokio::test]
    async fn test_cancel_before_start_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let remote = remote(dir.path());
        let (handle, cancel) = cancellation();
        handle.cancel();

        let err = remote.nick(1, &cancel).await.unwrap_err();
        assert!(matches!(err, CollarError::Cancelled));
        assert_eq!(remote.transmitter().calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("result.wav").exists());
        assert_eq!(remote.state(), RemoteState::Idle);
    }

    #[tokio::test]
    async fn test_io_error_returns_to_idle() {
        let remote = remote(Path::new("/nonexistent/sd400/output"));
        let err = remote.nick(1, &Cancellation::never()).await.unwrap_err();
        assert!(matches!(err, CollarError::Io(_)));
        assert_eq!(remote.state(), RemoteState::Idle);
        assert_eq!(remote.transmitter().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_too_long_is_refused_before_the_radio() {
        let dir = tempfile::tempdir().unwrap();
        let remote = remote(dir.path());
        let never = Cancellation::never();

        // the longest beep that still fits is a little under 6.8 hours
        assert!(remote
            .sample_count(&CollarCommand::beep(Duration::from_secs(6 * 3600)))
            .is_ok());
        let err = remote
            .beep(Duration::from_millis(i32::MAX as u64), &never)
            .await
            .unwrap_err();
        assert!(matches!(err, CollarError::TooLong(_)));
        let err = remote
            .shock(8, Duration::from_secs(7 * 3600), &never)
            .await
            .unwrap_err();
        assert!(matches!(err, CollarError::TooLong(_)));

        assert_eq!(remote.transmitter().calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("result.wav").exists());
        assert_eq!(remote.state(), RemoteState::Idle);

        remote.nick(1, &never).await.unwrap();
        assert_eq!(remote.transmitter().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_synthesizing_keeps_previous_wav() {
        let dir = tempfile::tempdir().unwrap();
        let remote = remote(dir.path());
        let wav = dir.path().join("result.wav");
        std::fs::write(&wav, b"previous").unwrap();

        let (handle, cancel) = cancellation();
        let mut state = remote.subscribe();
        let watcher = tokio::spawn(async move {
            state
                .wait_for(|s| *s == RemoteState::Synthesizing)
                .await
                .unwrap();
            handle.cancel();
        });

        let err = remote
            .beep(Duration::from_secs(1), &cancel)
            .await
            .unwrap_err();
        watcher.await.unwrap();

        assert!(matches!(err, CollarError::Cancelled));
        assert_eq!(std::fs::read(&wav).unwrap(), b"previous");
        assert_eq!(remote.transmitter().calls.load(Ordering::SeqCst), 0);
        assert_eq!(remote.state(), RemoteState::Idle);
    }

    #[test]
    fn test_render_matches_frame() {
        let dir = tempfile::tempdir().unwrap();
        let remote = remote(dir.path());
        let samples = remote.render(&CollarCommand::nick(0));
        assert_eq!(samples.len(), 43 * 176 + 4400);
        assert_eq!(samples, remote.render(&CollarCommand::nick(1)));
    }
}
