use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use super::error::{ArgumentError, CommandError};
use crate::symbol::Register;
use crate::value::parse_value;

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Step { count: u32 },
    Continue,
    Reset,
    Registers,
    Flags,
    Get { location: Location },
    /// Show memory around `location`, or around `PC` if omitted.
    Source { location: Option<Location> },
    Labels,
    Sections,
    BreakList,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Help,
    Step,
    Continue,
    Reset,
    Registers,
    Flags,
    Get,
    Source,
    Labels,
    Sections,
    BreakList,
    Quit,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => write!(f, "help"),
            Self::Step => write!(f, "step"),
            Self::Continue => write!(f, "continue"),
            Self::Reset => write!(f, "reset"),
            Self::Registers => write!(f, "registers"),
            Self::Flags => write!(f, "flags"),
            Self::Get => write!(f, "get"),
            Self::Source => write!(f, "source"),
            Self::Labels => write!(f, "labels"),
            Self::Sections => write!(f, "sections"),
            Self::BreakList => write!(f, "break list"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

/// Register, memory address, or a label or section name.
#[derive(Clone, Debug, PartialEq)]
pub enum Location {
    Register(Register),
    Address(i64),
    /// Resolved against labels first, then sections.
    Name(String),
}

#[rustfmt::skip]
const COMMANDS: CommandNameList = &[
    (CommandName::Help,      &["help", "--help", "h", "-h"]),
    (CommandName::Step,      &["step", "s"]),
    (CommandName::Continue,  &["continue", "cont", "c"]),
    (CommandName::Reset,     &["reset"]),
    (CommandName::Registers, &["registers", "reg", "r"]),
    (CommandName::Flags,     &["flags", "f"]),
    (CommandName::Get,       &["get", "g"]),
    (CommandName::Source,    &["source", "src", "l"]),
    (CommandName::Labels,    &["labels"]),
    (CommandName::Sections,  &["sections"]),
    (CommandName::BreakList, &["breaklist", "bl"]),
    (CommandName::Quit,      &["quit", "q", "exit"]),
    // "break" is treated specially
];
const BREAK_COMMAND: CandidateList = &["break", "b"];
#[rustfmt::skip]
const BREAK_SUBCOMMANDS: CommandNameList = &[
    (CommandName::BreakList, &["list", "l"]),
];

/// A [`CommandName`] with a list of name candidates.
type CommandNameList<'a> = &'a [(CommandName, CandidateList<'a>)];
/// List of single-word aliases for a command or subcommand.
type CandidateList<'a> = &'a [&'a str];

lazy_static! {
    static ref NAME: Regex = Regex::new(r"^[A-Za-z_]\w*$").unwrap();
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let mut args = line.split_whitespace();
        let command_name = command_name(&mut args)?;
        let args: Vec<&str> = args.collect();
        Command::parse_arguments(command_name, &args)
            .map_err(|error| CommandError::Argument(command_name, error))
    }
}

impl Command {
    fn parse_arguments(name: CommandName, args: &[&str]) -> Result<Self, ArgumentError> {
        let mut expected_args = 0;

        let command = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Continue => Self::Continue,
            CommandName::Reset => Self::Reset,
            CommandName::Registers => Self::Registers,
            CommandName::Flags => Self::Flags,
            CommandName::Labels => Self::Labels,
            CommandName::Sections => Self::Sections,
            CommandName::BreakList => Self::BreakList,
            CommandName::Quit => Self::Quit,

            CommandName::Step => {
                expected_args = 1;
                let count = match args.first() {
                    Some(arg) => parse_count(arg)?,
                    None => 1,
                };
                Self::Step { count }
            }
            CommandName::Get => {
                expected_args = 1;
                let arg = args.first().ok_or(ArgumentError::MissingLocation)?;
                Self::Get {
                    location: parse_location(arg)?,
                }
            }
            CommandName::Source => {
                expected_args = 1;
                let location = args
                    .first()
                    .map(|arg| parse_location(arg))
                    .transpose()?;
                Self::Source { location }
            }
        };

        if args.len() > expected_args {
            return Err(ArgumentError::Extra {
                allowed: expected_args,
                given: args.len(),
            });
        }

        Ok(command)
    }
}

/// Parse the command name, including the subcommand of `break`.
fn command_name<'a>(args: &mut impl Iterator<Item = &'a str>) -> Result<CommandName, CommandError> {
    let command_name = args.next().unwrap_or("");

    if let Some(command) = find_name_match(command_name, COMMANDS) {
        return Ok(command);
    }

    if name_matches(command_name, BREAK_COMMAND) {
        let subcommand_name = args.next();
        return subcommand_name
            .and_then(|name| find_name_match(name, BREAK_SUBCOMMANDS))
            .ok_or_else(|| CommandError::BreakSubcommand(subcommand_name.map(str::to_string)));
    }

    Err(CommandError::Unknown(command_name.to_string()))
}

fn find_name_match(name: &str, commands: CommandNameList) -> Option<CommandName> {
    commands
        .iter()
        .find(|(_, candidates)| name_matches(name, candidates))
        .map(|(command, _)| *command)
}

/// Case insensitive.
fn name_matches(name: &str, candidates: CandidateList) -> bool {
    candidates
        .iter()
        .any(|candidate| name.eq_ignore_ascii_case(candidate))
}

fn parse_count(arg: &str) -> Result<u32, ArgumentError> {
    let count =
        parse_value(arg).map_err(|_| ArgumentError::CountNotInteger(arg.to_string()))?;
    match u32::try_from(count) {
        Ok(0) => Err(ArgumentError::CountNotPositive(0)),
        Ok(count) => Ok(count),
        Err(_) if count < 0 => Err(ArgumentError::CountNotPositive(count)),
        Err(_) => Err(ArgumentError::CountTooLarge(count)),
    }
}

/// Registers are tried first, so a label cannot shadow `PC` or `GR0`.
fn parse_location(arg: &str) -> Result<Location, ArgumentError> {
    if let Ok(register) = arg.to_ascii_uppercase().parse::<Register>() {
        return Ok(Location::Register(register));
    }
    if arg.starts_with(|ch: char| ch.is_ascii_digit() || ch == '-' || ch == '+') {
        return parse_value(arg)
            .map(Location::Address)
            .map_err(|_| ArgumentError::MalformedAddress(arg.to_string()));
    }
    if NAME.is_match(arg) {
        return Ok(Location::Name(arg.to_string()));
    }
    Err(ArgumentError::MalformedLocation(arg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names() {
        assert_eq!(Command::try_from("help"), Ok(Command::Help));
        assert_eq!(Command::try_from("HELP me"), Ok(Command::Help));
        assert_eq!(Command::try_from("c"), Ok(Command::Continue));
        assert_eq!(Command::try_from("  reg  "), Ok(Command::Registers));
        assert_eq!(Command::try_from("break list"), Ok(Command::BreakList));
        assert_eq!(Command::try_from("b l"), Ok(Command::BreakList));
        assert_eq!(Command::try_from("exit"), Ok(Command::Quit));
        assert_eq!(
            Command::try_from("jump 3"),
            Err(CommandError::Unknown("jump".into()))
        );
        assert_eq!(
            Command::try_from("break"),
            Err(CommandError::BreakSubcommand(None))
        );
        assert_eq!(
            Command::try_from("break add"),
            Err(CommandError::BreakSubcommand(Some("add".into())))
        );
        assert_eq!(
            Command::try_from("flags now"),
            Err(CommandError::Argument(
                CommandName::Flags,
                ArgumentError::Extra {
                    allowed: 0,
                    given: 1
                }
            ))
        );
    }

    #[test]
    fn step_count() {
        assert_eq!(Command::try_from("step"), Ok(Command::Step { count: 1 }));
        assert_eq!(Command::try_from("s 12"), Ok(Command::Step { count: 12 }));
        assert_eq!(
            Command::try_from("step 0b11"),
            Ok(Command::Step { count: 3 })
        );
        let step_error = |error| Err(CommandError::Argument(CommandName::Step, error));
        assert_eq!(
            Command::try_from("step 0"),
            step_error(ArgumentError::CountNotPositive(0))
        );
        assert_eq!(
            Command::try_from("step -2"),
            step_error(ArgumentError::CountNotPositive(-2))
        );
        assert_eq!(
            Command::try_from("step x"),
            step_error(ArgumentError::CountNotInteger("x".into()))
        );
        assert_eq!(
            Command::try_from("step 99999999999"),
            step_error(ArgumentError::CountTooLarge(99_999_999_999))
        );
        assert_eq!(
            Command::try_from("step 1 2"),
            step_error(ArgumentError::Extra {
                allowed: 1,
                given: 2
            })
        );
    }

    #[test]
    fn locations() {
        let get = |location| Ok(Command::Get { location });
        assert_eq!(
            Command::try_from("get gr3"),
            get(Location::Register(Register::Gr3))
        );
        assert_eq!(
            Command::try_from("get PC"),
            get(Location::Register(Register::Pc))
        );
        assert_eq!(Command::try_from("get 12"), get(Location::Address(12)));
        assert_eq!(Command::try_from("get 0b100"), get(Location::Address(4)));
        assert_eq!(
            Command::try_from("get loop"),
            get(Location::Name("loop".into()))
        );
        let get_error = |error| Err(CommandError::Argument(CommandName::Get, error));
        assert_eq!(
            Command::try_from("get"),
            get_error(ArgumentError::MissingLocation)
        );
        assert_eq!(
            Command::try_from("get 12x"),
            get_error(ArgumentError::MalformedAddress("12x".into()))
        );
        assert_eq!(
            Command::try_from("get $a"),
            get_error(ArgumentError::MalformedLocation("$a".into()))
        );

        assert_eq!(
            Command::try_from("source"),
            Ok(Command::Source { location: None })
        );
        assert_eq!(
            Command::try_from("source 7"),
            Ok(Command::Source {
                location: Some(Location::Address(7))
            })
        );
    }
}
