#![allow(dead_code)]

use sd400_core::{Cancellation, Config, Remote, Result, Transmitter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A WAV file as seen by the transmitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedWav {
    pub spec: hound::WavSpec,
    pub frames: u32,
    pub left: Vec<i16>,
    pub right: Vec<i16>,
}

pub fn read_wav(path: &Path) -> ObservedWav {
    let mut reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    let frames = reader.duration();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    ObservedWav {
        spec,
        frames,
        left: samples.iter().step_by(2).copied().collect(),
        right: samples.iter().skip(1).step_by(2).copied().collect(),
    }
}

/// Records every WAV it is handed and notices overlapping transmissions.
#[derive(Default)]
pub struct RecordingTransmitter {
    pub airtime: Duration,
    active: AtomicBool,
    overlapped: AtomicBool,
    observed: Mutex<Vec<ObservedWav>>,
}

impl RecordingTransmitter {
    pub fn with_airtime(airtime: Duration) -> Self {
        Self {
            airtime,
            ..Self::default()
        }
    }

    pub fn observed(&self) -> Vec<ObservedWav> {
        self.observed.lock().unwrap().clone()
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

impl Transmitter for RecordingTransmitter {
    async fn transmit(&self, wav_path: &Path, _cancel: &Cancellation) -> Result<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let wav = read_wav(wav_path);
        tokio::time::sleep(self.airtime).await;

        // the file must not change while we are on the air
        let after = read_wav(wav_path);
        if after != wav {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        self.active.store(false, Ordering::SeqCst);
        self.observed.lock().unwrap().push(wav);
        Ok(())
    }
}

pub fn recording_remote(dir: &Path, airtime: Duration) -> Arc<Remote<RecordingTransmitter>> {
    let config = Config {
        wav_output_dir: dir.to_path_buf(),
        ..Config::default()
    };
    Arc::new(Remote::with_transmitter(
        Arc::new(config),
        RecordingTransmitter::with_airtime(airtime),
    ))
}
