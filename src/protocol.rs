//! SD-400 command framing.
//!
//! Momentary command:
//!
//! ```txt
//! [CMD_START] [PREAMBLE] [REMOTE ID] [CMD TYPE] [CMD ARG] [MOMENTARY_CMD_END]
//! ```
//!
//! Continuous command:
//!
//! ```txt
//! [CMD_START]
//!   repeated N >= 2 times:
//!   [PREAMBLE] [REMOTE ID] [CMD TYPE] [CMD ARG] [CONTINUOUS_CMD_BREAK]
//! [CONTINUOUS_CMD_END]
//! ```
//!
//! Markers are given as symbols, everything else as hex nibbles.

use crate::codec::{pack_into, parse_symbols, symbols_to_string, Symbol};
use crate::error::{CollarError, Result};
use crate::RemoteId;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::Symbol::{One, Two, Zero};

pub const CMD_START: &[Symbol] = &[One, One, One, One, One];
pub const PREAMBLE: &[Symbol] = &[Zero, Zero, Zero, One];
pub const MOMENTARY_CMD_END: &[Symbol] = &[One, Zero];
pub const CONTINUOUS_CMD_BREAK: &[Symbol] = &[One, Zero, Two];
pub const CONTINUOUS_CMD_END: &[Symbol] = &[One; 10];

pub const REMOTE1: &str = "6695";
pub const REMOTE2: &str = "999a";

pub const CMD_NICK: &str = "6a";
pub const CMD_CONTINUOUS: &str = "66";
pub const CMD_BEEP: &str = "59";
pub const BEEP_ARG: &str = "a9";

/// Command arguments for intensity levels 1 through 8.
pub const LEVEL_ARGS: [&str; 8] = ["a9", "a6", "a5", "9a", "99", "95", "6a", "55"];

/// Symbol period used to size continuous frames. The short `2` symbol is
/// deliberately counted at this length too.
pub const NOMINAL_SYMBOL_TIME: Duration = Duration::from_millis(4);

/// The collar ignores continuous frames with fewer repeats.
pub const MIN_CONTINUOUS_REPEATS: usize = 2;

/// A complete on-air command as a sequence of symbols.
///
/// Frames are self-contained; [`Frame::append`] joins them back to back
/// into a compound transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    symbols: Vec<Symbol>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn push_symbols(&mut self, symbols: &[Symbol]) {
        self.symbols.extend_from_slice(symbols);
    }

    pub fn push_hex(&mut self, hex: &str) -> Result<()> {
        pack_into(hex, &mut self.symbols)
    }

    pub fn append(&mut self, other: &Frame) {
        self.symbols.extend_from_slice(&other.symbols);
    }

    fn repeat(&mut self, group: &Frame, times: usize) {
        for _ in 0..times {
            self.append(group);
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&symbols_to_string(&self.symbols))
    }
}

impl FromStr for Frame {
    type Err = CollarError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self {
            symbols: parse_symbols(s)?,
        })
    }
}

// [PREAMBLE] [REMOTE ID] [CMD TYPE] [CMD ARG]
fn payload(frame: &mut Frame, remote_id: &str, cmd_type: &str, cmd_arg: &str) -> Result<()> {
    frame.push_symbols(PREAMBLE);
    frame.push_hex(remote_id)?;
    frame.push_hex(cmd_type)?;
    frame.push_hex(cmd_arg)
}

/// A frame before its repeats are expanded: `head`, then `repeats`
/// copies of `body`, then `tail`.
///
/// Continuous frames grow with their duration, so callers size them from
/// the layout before calling [`FrameLayout::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub head: &'static [Symbol],
    pub body: Frame,
    pub repeats: usize,
    pub tail: &'static [Symbol],
}

impl FrameLayout {
    /// Total length in symbols, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.body
            .len()
            .saturating_mul(self.repeats)
            .saturating_add(self.head.len() + self.tail.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn build(&self) -> Frame {
        let mut frame = Frame::new();
        frame.symbols.reserve(self.len());
        frame.push_symbols(self.head);
        frame.repeat(&self.body, self.repeats);
        frame.push_symbols(self.tail);
        frame
    }
}

pub fn momentary_layout(remote_id: &str, cmd_type: &str, cmd_arg: &str) -> Result<FrameLayout> {
    let mut body = Frame::new();
    payload(&mut body, remote_id, cmd_type, cmd_arg)?;
    Ok(FrameLayout {
        head: CMD_START,
        body,
        repeats: 1,
        tail: MOMENTARY_CMD_END,
    })
}

pub fn continuous_layout(
    remote_id: &str,
    cmd_type: &str,
    cmd_arg: &str,
    duration: Duration,
) -> Result<FrameLayout> {
    let mut body = Frame::new();
    payload(&mut body, remote_id, cmd_type, cmd_arg)?;
    body.push_symbols(CONTINUOUS_CMD_BREAK);

    let repeats = continuous_repeats(body.len(), duration);
    Ok(FrameLayout {
        head: CMD_START,
        body,
        repeats,
        tail: CONTINUOUS_CMD_END,
    })
}

pub fn momentary(remote_id: &str, cmd_type: &str, cmd_arg: &str) -> Result<Frame> {
    Ok(momentary_layout(remote_id, cmd_type, cmd_arg)?.build())
}

pub fn continuous(
    remote_id: &str,
    cmd_type: &str,
    cmd_arg: &str,
    duration: Duration,
) -> Result<Frame> {
    Ok(continuous_layout(remote_id, cmd_type, cmd_arg, duration)?.build())
}

/// Number of payload groups of `group_len` symbols that fit in `duration`,
/// rounded down and never below [`MIN_CONTINUOUS_REPEATS`].
pub fn continuous_repeats(group_len: usize, duration: Duration) -> usize {
    let group_time = NOMINAL_SYMBOL_TIME.as_nanos() * group_len as u128;
    if group_time == 0 {
        return MIN_CONTINUOUS_REPEATS;
    }
    let repeats = usize::try_from(duration.as_nanos() / group_time).unwrap_or(usize::MAX);
    repeats.max(MIN_CONTINUOUS_REPEATS)
}

/// Stimulation intensity, always within 1..=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = LEVEL_ARGS.len() as u8;

    /// Out-of-range levels saturate at the nearest bound.
    pub fn clamped(level: i64) -> Self {
        Level(level.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn arg(self) -> &'static str {
        LEVEL_ARGS[(self.0 - Self::MIN) as usize]
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-level collar command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollarCommand {
    Beep { duration: Duration },
    Nick { level: Level },
    Shock { level: Level, duration: Duration },
}

impl CollarCommand {
    pub fn beep(duration: Duration) -> Self {
        CollarCommand::Beep { duration }
    }

    pub fn nick(level: i64) -> Self {
        CollarCommand::Nick {
            level: Level::clamped(level),
        }
    }

    pub fn shock(level: i64, duration: Duration) -> Self {
        CollarCommand::Shock {
            level: Level::clamped(level),
            duration,
        }
    }

    pub fn cmd_type(&self) -> &'static str {
        match self {
            CollarCommand::Beep { .. } => CMD_BEEP,
            CollarCommand::Nick { .. } => CMD_NICK,
            CollarCommand::Shock { .. } => CMD_CONTINUOUS,
        }
    }

    pub fn cmd_arg(&self) -> &'static str {
        match self {
            CollarCommand::Beep { .. } => BEEP_ARG,
            CollarCommand::Nick { level } | CollarCommand::Shock { level, .. } => level.arg(),
        }
    }

    pub fn layout(&self, remote_id: &RemoteId) -> Result<FrameLayout> {
        let remote_id = remote_id.as_str();
        match *self {
            CollarCommand::Nick { .. } => {
                momentary_layout(remote_id, self.cmd_type(), self.cmd_arg())
            }
            CollarCommand::Beep { duration } | CollarCommand::Shock { duration, .. } => {
                continuous_layout(remote_id, self.cmd_type(), self.cmd_arg(), duration)
            }
        }
    }

    pub fn frame(&self, remote_id: &RemoteId) -> Result<Frame> {
        Ok(self.layout(remote_id)?.build())
    }
}

impl fmt::Display for CollarCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollarCommand::Beep { duration } => write!(f, "beep {:?}", duration),
            CollarCommand::Nick { level } => write!(f, "nick {}", level),
            CollarCommand::Shock { level, duration } => {
                write!(f, "shock {} {:?}", level, duration)
            }
        }
    }
}
