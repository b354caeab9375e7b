use std::{error::Error, fmt};

use super::command::CommandName;

/// Why a line of debugger input was rejected.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    /// First word does not name a command.
    Unknown(String),
    /// `break` with no subcommand, or one that does not exist.
    BreakSubcommand(Option<String>),
    /// Command is known but its arguments are not.
    Argument(CommandName, ArgumentError),
}

/// Problem with the arguments of a known command.
#[derive(Debug, PartialEq)]
pub enum ArgumentError {
    /// `get` was given nothing to show.
    MissingLocation,
    /// Command takes at most `allowed` arguments.
    Extra { allowed: usize, given: usize },
    CountNotInteger(String),
    /// Zero or negative step count.
    CountNotPositive(i64),
    /// Step count does not fit in a `u32`.
    CountTooLarge(i64),
    /// Starts like a number but does not parse as one.
    MalformedAddress(String),
    /// Neither a register, an address nor a name.
    MalformedLocation(String),
}

impl Error for CommandError {}
impl Error for ArgumentError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(name) => write!(f, "Unknown command `{}`", name),
            Self::BreakSubcommand(None) => {
                write!(f, "`break` needs a subcommand, try `break list`")
            }
            Self::BreakSubcommand(Some(name)) => {
                write!(f, "Unknown subcommand `break {}`, try `break list`", name)
            }
            Self::Argument(command, error) => write!(f, "`{}`: {}", command, error),
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLocation => write!(
                f,
                "expected a register, memory address, label or section to show"
            ),
            Self::Extra { allowed: 0, .. } => write!(f, "takes no arguments"),
            Self::Extra { allowed, given } => write!(
                f,
                "takes at most {} argument{}, found {}",
                allowed,
                if *allowed == 1 { "" } else { "s" },
                given
            ),
            Self::CountNotInteger(text) => {
                write!(f, "step count `{}` is not an integer", text)
            }
            Self::CountNotPositive(count) => {
                write!(f, "step count must be at least 1, found {}", count)
            }
            Self::CountTooLarge(count) => write!(
                f,
                "step count {} is too large, at most {} steps are taken at once",
                count,
                u32::MAX
            ),
            Self::MalformedAddress(text) => {
                write!(f, "memory address `{}` is not a decimal or `0b` integer", text)
            }
            Self::MalformedLocation(text) => write!(
                f,
                "`{}` is not a register (GR0..GR7, PC, SP), address, label or section",
                text
            ),
        }
    }
}
