/// Stdin command parsing
use thiserror::Error;

/// A transport command typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    List,
    Play(usize),
    Toggle,
    Pause,
    Stop,
    Next,
    Previous,
    Seek(f64),
    /// Volume in percent, 0-100
    Volume(u8),
    Mute,
    DoubleTime,
    Shuffle,
    Repeat,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid argument for '{0}': {1}")]
    InvalidArgument(&'static str, String),
}

pub const HELP: &str = "\
commands:
  list          show the library
  play N        play track N
  toggle        play/pause
  pause         pause or resume
  stop          stop playback
  next, prev    skip forward/back
  seek MS       jump to MS milliseconds
  vol 0-100     set volume
  mute          toggle mute
  dt            toggle double-time
  shuffle       toggle shuffle
  repeat        toggle repeat-one
  status        show transport state
  quit";

impl std::str::FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(ParseError::Empty);
        };
        let name = name.to_ascii_lowercase();
        let arg = words.next();

        let command = match name.as_str() {
            "list" | "ls" => Self::List,
            "play" | "p" => Self::Play(parse_arg("play", arg)?),
            "toggle" | "t" => Self::Toggle,
            "pause" => Self::Pause,
            "stop" | "s" => Self::Stop,
            "next" | "n" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "seek" => {
                let ms: f64 = parse_arg("seek", arg)?;
                if !ms.is_finite() || ms < 0.0 {
                    return Err(ParseError::InvalidArgument("seek", ms.to_string()));
                }
                Self::Seek(ms)
            }
            "vol" | "volume" => {
                let percent: u8 = parse_arg("vol", arg)?;
                if percent > 100 {
                    return Err(ParseError::InvalidArgument("vol", percent.to_string()));
                }
                Self::Volume(percent)
            }
            "mute" => Self::Mute,
            "dt" => Self::DoubleTime,
            "shuffle" => Self::Shuffle,
            "repeat" => Self::Repeat,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return Err(ParseError::Unknown(name)),
        };
        Ok(command)
    }
}

fn parse_arg<T: std::str::FromStr>(
    cmd: &'static str,
    arg: Option<&str>,
) -> Result<T, ParseError> {
    let arg = arg.ok_or(ParseError::MissingArgument(cmd))?;
    arg.parse().map_err(|_| ParseError::InvalidArgument(cmd, arg.to_string()))
}
