//! Interactive shell.
//!
//! ```txt
//! beep <duration>          e.g. beep 1s
//! nick <level>             e.g. nick 3
//! shock <level> <duration> e.g. shock 3 5s
//! ```

use crate::error::CollarError;
use crate::protocol::CollarCommand;
use crate::remote::Remote;
use crate::transmitter::{Cancellation, Transmitter};
use rustyline::error::ReadlineError;
use rustyline::{
    hint::{Hint, Hinter},
    history::MemHistory,
    Completer, Config, Editor, Helper, Highlighter, Validator,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;

pub const BANNER: &str = "SD400 remote. Type \"help\" to get a list of commands.";
pub const PROMPT: &str = ">>> ";

const COMMANDS: [&str; 5] = ["beep", "nick", "shock", "help", "exit"];

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("unknown command {0:?}, try \"help\"")]
    InvalidCommand(String),

    #[error("expected {0} argument{}", plural(.0))]
    ArgumentCount(usize),

    #[error("invalid level {0:?}")]
    InvalidLevel(String),

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    #[error(transparent)]
    Collar(#[from] CollarError),

    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Exit,
    Collar(CollarCommand),
}

/// Parse one shell line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, ShellError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match command {
        "help" => ShellCommand::Help,
        "exit" => ShellCommand::Exit,
        "beep" => {
            let [duration] = expect_args::<1>(&args)?;
            ShellCommand::Collar(CollarCommand::beep(parse_duration(duration)?))
        }
        "nick" => {
            let [level] = expect_args::<1>(&args)?;
            ShellCommand::Collar(CollarCommand::nick(parse_level(level)?))
        }
        "shock" => {
            let [level, duration] = expect_args::<2>(&args)?;
            ShellCommand::Collar(CollarCommand::shock(
                parse_level(level)?,
                parse_duration(duration)?,
            ))
        }
        _ => return Err(ShellError::InvalidCommand(command.into())),
    };
    Ok(Some(command))
}

fn expect_args<'a, const N: usize>(args: &[&'a str]) -> Result<[&'a str; N], ShellError> {
    <[&str; N]>::try_from(args).map_err(|_| ShellError::ArgumentCount(N))
}

pub fn parse_level(s: &str) -> Result<i64, ShellError> {
    s.parse().map_err(|_| ShellError::InvalidLevel(s.into()))
}

/// Parse a duration such as `300ms`, `1.5s` or `1m30s`.
///
/// Units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`; a bare `0` is
/// also accepted.
pub fn parse_duration(s: &str) -> Result<Duration, ShellError> {
    let invalid = || ShellError::InvalidDuration(s.into());
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut nanos = 0f64;
    if rest.is_empty() {
        return Err(invalid());
    }
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(split);
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };

        nanos += value * scale;
        rest = tail;
    }

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn help() {
    println!(
        r#"
beep <duration> - send a beep, e.g. beep 1s
nick <level> - send a momentary stimulation (level 1-8), e.g. nick 3
shock <level> <duration> - send a continuous stimulation, e.g. shock 3 5s
help - print this help message
exit - leave the shell
    "#
    );
}

pub struct Shell<T> {
    remote: Arc<Remote<T>>,
    runtime: Handle,
    cancel: Cancellation,
    editor: Editor<ShellHelper, MemHistory>,
}

impl<T: Transmitter> Shell<T> {
    /// The shell blocks on the terminal, so it must not run on a runtime
    /// worker thread; commands are driven through `runtime`.
    pub fn try_new(
        remote: Arc<Remote<T>>,
        runtime: Handle,
        cancel: Cancellation,
    ) -> Result<Self, ShellError> {
        let config = Config::builder().auto_add_history(true).build();
        let history = MemHistory::with_config(config);
        let mut editor = Editor::with_history(config, history)?;
        editor.set_helper(Some(ShellHelper {
            hints: COMMANDS.iter().map(|c| ShellHint(c.to_string())).collect(),
        }));

        Ok(Self {
            remote,
            runtime,
            cancel,
            editor,
        })
    }

    /// Read and run commands until `exit` or end of input.
    pub fn run(&mut self) -> Result<(), ShellError> {
        println!("{}", BANNER);
        loop {
            let line = match self.editor.readline(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(()),
                Err(err) => return Err(err.into()),
            };

            match parse_line(&line) {
                Ok(None) => {}
                Ok(Some(ShellCommand::Help)) => help(),
                Ok(Some(ShellCommand::Exit)) => return Ok(()),
                Ok(Some(ShellCommand::Collar(command))) => {
                    let result = self.runtime.block_on(self.remote.send(command, &self.cancel));
                    if let Err(err) = result {
                        println!("{}", err);
                        if matches!(err, CollarError::Cancelled) {
                            return Ok(());
                        }
                    }
                }
                Err(err) => println!("{}", err),
            }
        }
    }
}

#[derive(Completer, Helper, Validator, Highlighter)]
struct ShellHelper {
    hints: Vec<ShellHint>,
}

#[derive(Debug)]
struct ShellHint(String);

impl Hint for ShellHint {
    fn display(&self) -> &str {
        &self.0
    }

    fn completion(&self) -> Option<&str> {
        Some(&self.0)
    }
}

impl Hinter for ShellHelper {
    type Hint = ShellHint;

    fn hint(&self, line: &str, pos: usize, _: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        self.hints
            .iter()
            .find(|hint| hint.0.starts_with(line) && hint.0.len() > line.len())
            .map(|hint| ShellHint(hint.0[pos..].to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2.5s").unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_duration("100us").unwrap(), Duration::from_micros(100));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);

        for bad in ["", "1", "s", "1x", "1.s5", "-1s", "..5s"] {
            assert!(parse_duration(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("help").unwrap(), Some(ShellCommand::Help));
        assert_eq!(
            parse_line("beep 1s").unwrap(),
            Some(ShellCommand::Collar(CollarCommand::beep(Duration::from_secs(1))))
        );
        assert_eq!(
            parse_line("nick 12").unwrap(),
            Some(ShellCommand::Collar(CollarCommand::nick(8)))
        );
        assert_eq!(
            parse_line("shock 0 5s").unwrap(),
            Some(ShellCommand::Collar(CollarCommand::shock(
                1,
                Duration::from_secs(5)
            )))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_line("nick").unwrap_err().to_string(),
            "expected 1 argument"
        );
        assert_eq!(
            parse_line("shock 3").unwrap_err().to_string(),
            "expected 2 arguments"
        );
        assert!(matches!(
            parse_line("zap 3"),
            Err(ShellError::InvalidCommand(_))
        ));
        assert!(matches!(
            parse_line("nick three"),
            Err(ShellError::InvalidLevel(_))
        ));
        assert!(matches!(
            parse_line("beep soon"),
            Err(ShellError::InvalidDuration(_))
        ));
    }
}
