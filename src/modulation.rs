use crate::codec::{parse_symbols, Symbol};
use crate::error::Result;
use crate::protocol::{Frame, FrameLayout};
use crate::{SYMBOL_DURATION_MS, TONE_FREQUENCY, TRAILING_SILENCE_MS};
use std::f64::consts::PI;
use std::time::Duration;

pub const FULL_SCALE: i16 = i16::MAX;

/// Samples in one full-length symbol, `floor(0.004 * sample_rate)`.
pub fn samples_per_symbol(sample_rate: u32) -> usize {
    (sample_rate as u64 * SYMBOL_DURATION_MS as u64 / 1000) as usize
}

/// One precomputed PCM buffer per symbol.
///
/// `0` holds the carrier unmodulated at full scale, `1` is a full-scale
/// 5 kHz cosine and `2` is an owned copy of the first half of `1`.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    sample_rate: u32,
    buffers: [Vec<i16>; 3],
}

impl SymbolTable {
    pub fn new(sample_rate: u32) -> Self {
        let n = samples_per_symbol(sample_rate);

        let zero = vec![FULL_SCALE; n];
        let one: Vec<i16> = (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (FULL_SCALE as f64 * (2.0 * PI * TONE_FREQUENCY * t).cos()).round() as i16
            })
            .collect();
        let two = one[..n / 2].to_vec();

        Self {
            sample_rate,
            buffers: [zero, one, two],
        }
    }

    pub fn get(&self, symbol: Symbol) -> &[i16] {
        &self.buffers[symbol.index()]
    }
}

/// Turns frames into a mono PCM buffer ready for the WAV writer.
#[derive(Debug, Clone)]
pub struct SymbolModulator {
    table: SymbolTable,
}

impl SymbolModulator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            table: SymbolTable::new(sample_rate),
        }
    }

    pub fn silence_samples(&self) -> usize {
        (self.table.sample_rate as u64 * TRAILING_SILENCE_MS as u64 / 1000) as usize
    }

    pub fn modulate(&self, frame: &Frame) -> Vec<i16> {
        self.modulate_symbols(frame.symbols())
    }

    /// Modulate a textual `0`/`1`/`2` string.
    pub fn modulate_str(&self, bits: &str) -> Result<Vec<i16>> {
        Ok(self.modulate_symbols(&parse_symbols(bits)?))
    }

    /// Samples `layout` modulates to, trailing silence included, without
    /// building the frame. Saturates at `u64::MAX`.
    pub fn sample_count(&self, layout: &FrameLayout) -> u64 {
        let count = |symbols: &[Symbol]| -> u64 {
            symbols.iter().map(|&s| self.table.get(s).len() as u64).sum()
        };
        count(layout.body.symbols())
            .saturating_mul(layout.repeats as u64)
            .saturating_add(count(layout.head))
            .saturating_add(count(layout.tail))
            .saturating_add(self.silence_samples() as u64)
    }

    pub fn modulate_symbols(&self, symbols: &[Symbol]) -> Vec<i16> {
        let len: usize = symbols.iter().map(|&s| self.table.get(s).len()).sum();
        let mut samples = Vec::with_capacity(len + self.silence_samples());

        for &symbol in symbols {
            samples.extend_from_slice(self.table.get(symbol));
        }

        // trailing silence lets rpitx flush the last real symbol
        samples.resize(samples.len() + self.silence_samples(), 0);

        samples
    }

    pub fn duration(&self, samples: usize) -> Duration {
        let nanos = samples as u128 * 1_000_000_000 / self.table.sample_rate.max(1) as u128;
        Duration::from_nanos(nanos as u64)
    }
}
