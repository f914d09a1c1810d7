//! Interactive transport commands read from stdin
use crate::error::{CliError, Result};

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Toggle,
    Next,
    Previous,
    Stop,
    /// Seek to whole seconds
    Seek(u64),
    Volume(u8),
    Shuffle,
    Repeat,
    /// Add a media id or path to the end of the queue
    Add(String),
    Remove(usize),
    MoveUp(usize),
    MoveDown(usize),
    Clear,
    Queue,
    Status,
    /// Load a preset and enable the equalizer
    Preset(String),
    /// Equalizer off
    EqOff,
    /// Set one band, in dB
    Band(usize, f32),
    Visualizer(bool),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  p | space        play/pause
  n / b            next / previous
  s                stop
  seek <secs>      jump to position
  vol <0-100>      volume
  shuffle, repeat  toggle modes
  add <id|path>    append to queue
  rm <i>, up <i>, down <i>, clear
  queue, status
  eq <preset>, eq off, band <i> <dB>
  viz on|off
  q                quit";

impl Command {
    /// Parse one input line, `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match word.to_ascii_lowercase().as_str() {
            "p" | "play" | "pause" => Self::Toggle,
            "n" | "next" => Self::Next,
            "b" | "prev" | "previous" => Self::Previous,
            "s" | "stop" => Self::Stop,
            "seek" => Self::Seek(number(rest, "seek")?),
            "vol" | "volume" => {
                let level: u8 = number(rest, "vol")?;
                if level > 100 {
                    return Err(CliError::Command("volume is 0-100".to_string()));
                }
                Self::Volume(level)
            }
            "shuffle" => Self::Shuffle,
            "repeat" => Self::Repeat,
            "add" if !rest.is_empty() => Self::Add(rest.to_string()),
            "rm" | "remove" => Self::Remove(number(rest, "rm")?),
            "up" => Self::MoveUp(number(rest, "up")?),
            "down" => Self::MoveDown(number(rest, "down")?),
            "clear" => Self::Clear,
            "queue" | "ls" => Self::Queue,
            "status" => Self::Status,
            "eq" if rest.eq_ignore_ascii_case("off") => Self::EqOff,
            "eq" if !rest.is_empty() => Self::Preset(rest.to_string()),
            "band" => {
                let (index, gain) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| CliError::Command("usage: band <index> <dB>".to_string()))?;
                Self::Band(number(index, "band")?, number(gain.trim(), "band")?)
            }
            "viz" => match rest {
                "on" => Self::Visualizer(true),
                "off" => Self::Visualizer(false),
                _ => return Err(CliError::Command("usage: viz on|off".to_string())),
            },
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            _ => return Err(CliError::Command(format!("unknown command '{line}'"))),
        };
        Ok(Some(command))
    }
}

fn number<T: std::str::FromStr>(text: &str, command: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| CliError::Command(format!("{command}: expected a number, got '{text}'")))
}
