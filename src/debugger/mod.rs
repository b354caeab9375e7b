mod command;
mod error;
mod source;

use self::command::{Command, Location};
use self::source::{CommandSource, SourceRead};
use crate::error::{Error, Result};
use crate::memory::{Cell, Memory};
use crate::output::{Condition, Output};
use crate::runtime::{Machine, Stop};
use crate::{dprint, dprintln};

/// ANSI color code of the command prompt.
pub const DEBUGGER_COLOR: u8 = 34;

/// Leave this as a struct, in case more options are added in the future. Plus it is more explicit.
#[derive(Debug, Default)]
pub struct DebuggerOptions {
    /// Commands to run instead of reading stdin, separated by `;` or newlines.
    pub command: Option<String>,
    /// Give up `continue` after this many instructions.
    pub step_limit: Option<u64>,
}

pub struct Debugger {
    /// Kept to rebuild the machine on `reset`.
    src: String,
    machine: Machine,

    command_source: CommandSource,
    step_limit: Option<u64>,

    /// Amount of instructions executed since last command.
    instruction_count: u64,
    /// Whether PC should be displayed on next command prompt.
    should_echo_pc: bool,
}

/// Whether the debugger loop should keep reading commands.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    Proceed,
    Quit,
}

impl Debugger {
    /// Fails if `src` cannot be preprocessed.
    pub fn new(opts: DebuggerOptions, src: String) -> Result<Self> {
        let machine = Machine::new(&src)?;
        Ok(Self {
            src,
            machine,
            command_source: CommandSource::from(opts.command),
            step_limit: opts.step_limit,
            instruction_count: 0,
            should_echo_pc: true,
        })
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Read and execute commands until `quit` or EOF.
    pub fn run(&mut self) {
        loop {
            Output::Debugger(Condition::Always).start_new_line();
            if self.should_echo_pc {
                dprintln!(Sometimes, "Program counter at: {}.", self.machine.pc());
                self.should_echo_pc = false;
            }
            if self.instruction_count > 0 {
                dprintln!(
                    Always,
                    "Executed {} instruction{}.",
                    self.instruction_count,
                    if self.instruction_count == 1 { "" } else { "s" },
                );
                self.instruction_count = 0;
            }

            // Convert EOF to `quit` command
            let command = self.next_command().unwrap_or(Command::Quit);
            if self.execute(command) == Action::Quit {
                break;
            }
        }
    }

    fn execute(&mut self, command: Command) -> Action {
        match command {
            Command::Quit => return Action::Quit,

            Command::Help => {
                dprintln!(Always, "\n{}", include_str!("./help.txt"));
            }

            Command::Step { count } => {
                self.should_echo_pc = true;
                self.step(count);
            }
            Command::Continue => {
                self.should_echo_pc = true;
                dprintln!(Always, "Continuing...");
                self.continue_to_breakpoint();
            }

            Command::Reset => match Machine::new(&self.src) {
                Ok(machine) => {
                    self.machine = machine;
                    self.should_echo_pc = true;
                    dprintln!(Always, "Reset program to initial state.");
                }
                Err(error) => dprintln!(Always, "Error: {}", error),
            },

            Command::Registers => {
                dprintln!(Sometimes, "Registers:");
                Output::Debugger(Condition::Always).print_registers(&self.machine);
            }
            Command::Flags => {
                dprintln!(Sometimes, "Flags:");
                Output::Debugger(Condition::Always).print_flags(&self.machine);
            }

            Command::Get { location } => self.get(location),

            Command::Source { location } => {
                let center = match location {
                    None => Some(self.machine.pc()),
                    Some(location) => self.resolve_address(&location),
                };
                if let Some(center) = center {
                    Output::Debugger(Condition::Always).print_nearest_lines(&self.machine, center);
                }
            }

            Command::Labels => {
                let labels = self.machine.labels();
                if labels.is_empty() {
                    dprintln!(Always, "No labels exist.");
                }
                for (name, address) in labels.iter() {
                    dprintln!(Always, "{:>4}  {}", address, name);
                }
            }
            Command::Sections => {
                for section in self.machine.sections().iter() {
                    dprintln!(
                        Always,
                        "{:<12} {:>4}..{:<4} ({} lines used of {})",
                        section.name,
                        section.start,
                        section.end(),
                        section.lines.len(),
                        section.length,
                    );
                }
            }

            Command::BreakList => self.break_list(),
        }

        Action::Proceed
    }

    /// Returns `None` on EOF.
    fn next_command(&mut self) -> Option<Command> {
        // Loop until valid command or EOF
        loop {
            let line = self.command_source.read()?.trim();
            // Necessary, since `Command::try_from` assumes non-empty line
            if line.is_empty() {
                continue;
            }

            match Command::try_from(line) {
                Ok(command) => return Some(command),
                Err(error) => {
                    dprintln!(Always, "{}", error);
                    dprintln!(Always, "Type `help` for a list of commands.");
                }
            }
        }
    }

    fn step(&mut self, count: u32) {
        for i in 0..count {
            if let Err(error) = self.machine.step() {
                dprintln!(Always, "Error: {}", error);
                return;
            }
            self.instruction_count += 1;
            if self.machine.at_breakpoint() && i + 1 < count {
                dprintln!(Always, "Reached breakpoint. Pausing execution.");
                return;
            }
        }
    }

    fn continue_to_breakpoint(&mut self) {
        let result = match self.step_limit {
            Some(limit) => self.machine.continue_for(limit),
            None => self.machine.continue_to_breakpoint().map(Stop::Breakpoint),
        };
        match result {
            Ok(Stop::Breakpoint(address)) => {
                dprintln!(
                    Always,
                    "Reached breakpoint at {}. Pausing execution.",
                    address
                );
            }
            Ok(Stop::StepLimit) => {
                dprintln!(
                    Always,
                    "No breakpoint reached within {} instructions. Pausing execution.",
                    self.step_limit.unwrap_or_default()
                );
            }
            Err(error) => dprintln!(Always, "Error: {}", error),
        }
    }

    fn get(&self, location: Location) {
        match location {
            Location::Register(register) => {
                dprintln!(Sometimes, "Register {}:", register);
                let value = self.machine.register(register);
                Output::Debugger(Condition::Always).print_integer(value);
                dprintln!(Always);
            }
            Location::Address(address) => self.print_memory(address),
            Location::Name(name) => {
                if let Some(address) = self.machine.labels().get(&name) {
                    dprintln!(Sometimes, "Label `{}` is at address {}.", name, address);
                    self.print_memory(address as i64);
                    return;
                }
                match self.machine.sections().resolve(&name) {
                    Ok(section) => {
                        dprintln!(
                            Sometimes,
                            "Section `{}` spans addresses {}..{}:",
                            name,
                            section.start,
                            section.end()
                        );
                        for address in section.start..section.end() {
                            dprint!(Always, "{:>4}: ", address);
                            print_cell(&self.machine.memory()[address]);
                        }
                    }
                    Err(error) => print_unknown_name(&error),
                }
            }
        }
    }

    fn print_memory(&self, address: i64) {
        let index = match Memory::address(address) {
            Ok(index) => index,
            Err(error) => {
                dprintln!(Always, "Error: {}", error);
                return;
            }
        };
        match self.machine.sections().containing(index) {
            Some(section) => dprintln!(
                Sometimes,
                "Memory at address {} (section `{}`, offset {}):",
                address,
                section.name,
                index - section.start
            ),
            None => dprintln!(Sometimes, "Memory at address {}, outside any section:", address),
        }
        print_cell(&self.machine.memory()[index]);
    }

    /// Address of a memory location. A register holds the address.
    fn resolve_address(&self, location: &Location) -> Option<i64> {
        match location {
            Location::Address(address) => Some(*address),
            Location::Register(register) => Some(self.machine.register(*register)),
            Location::Name(name) => {
                if let Some(address) = self.machine.labels().get(name) {
                    return Some(address as i64);
                }
                match self.machine.sections().resolve(name) {
                    Ok(section) => Some(section.start as i64),
                    Err(error) => {
                        print_unknown_name(&error);
                        None
                    }
                }
            }
        }
    }

    fn break_list(&self) {
        let breakpoints = self.machine.breakpoints();
        if breakpoints.is_empty() {
            dprintln!(Always, "No breakpoints exist.");
            return;
        }
        dprintln!(Sometimes, "Breakpoints:");
        for (i, address) in breakpoints.iter().enumerate() {
            if Output::is_minimal() {
                dprintln!(Always, "{}", address);
                continue;
            }
            dprint!(
                Always,
                "{} {:>4}  ──  ",
                if i + 1 == breakpoints.len() {
                    "╰─"
                } else {
                    "├─"
                },
                address
            );
            print_cell(&self.machine.memory()[address]);
        }
    }
}

/// Names are looked up as labels before sections, so a failed section lookup means neither exists.
fn print_unknown_name(error: &Error) {
    dprintln!(Always, "Error: {}, and no label has that name", error);
}

fn print_cell(cell: &Cell) {
    match cell {
        Cell::Empty => dprintln!(Always, "(empty)"),
        cell => dprintln!(Always, "{}", cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Flag, Register};

    const LOOP: &str = "\
%CODE 10
LD GR0, 0I
loop:
ADD GR0, DATA
SUB GR0, 1I ;b
BRA loop
%DATA 1
5
";

    fn debugger(command: &str, step_limit: Option<u64>) -> Debugger {
        let opts = DebuggerOptions {
            command: Some(command.to_string()),
            step_limit,
        };
        Debugger::new(opts, LOOP.to_string()).unwrap()
    }

    #[test]
    fn rejects_bad_source() {
        let opts = DebuggerOptions::default();
        assert!(Debugger::new(opts, "%CODE 1\n_X".to_string()).is_err());
    }

    #[test]
    fn steps_and_continues() {
        let mut debugger = debugger("step 2; continue; registers", None);
        debugger.run();
        let machine = debugger.machine();
        // Second pass of the loop stops before `SUB` again
        assert_eq!(machine.pc(), 2);
        assert_eq!(machine.register(Register::Gr0), 9);
        assert!(machine.at_breakpoint());
    }

    #[test]
    fn step_stops_at_breakpoint() {
        let mut debugger = debugger("step 10", None);
        debugger.run();
        assert_eq!(debugger.machine().pc(), 2);
        assert_eq!(debugger.machine().register(Register::Gr0), 5);
    }

    #[test]
    fn continue_passes_current_breakpoint() {
        let mut debugger = debugger("continue;continue", None);
        debugger.run();
        let machine = debugger.machine();
        assert_eq!(machine.pc(), 2);
        assert_eq!(machine.register(Register::Gr0), 9);
        assert_eq!(machine.flag(Flag::Z), 0);
    }

    #[test]
    fn reset_rebuilds_machine() {
        let mut debugger = debugger("continue\nreset", None);
        debugger.run();
        let machine = debugger.machine();
        assert_eq!(machine.pc(), 0);
        assert_eq!(machine.register(Register::Gr0), 0);
    }

    #[test]
    fn errors_keep_machine_state() {
        let mut debugger = debugger("nonsense; get; step 0; get nowhere; source nowhere", None);
        debugger.run();
        assert_eq!(debugger.machine().pc(), 0);
    }

    #[test]
    fn quit_stops_reading() {
        let mut debugger = debugger("quit; step", None);
        debugger.run();
        assert_eq!(debugger.machine().pc(), 0);
    }

    #[test]
    fn continue_respects_step_limit() {
        let src = "%CODE 1\nspin:\nBRA spin";
        let opts = DebuggerOptions {
            command: Some("continue".to_string()),
            step_limit: Some(50),
        };
        let mut debugger = Debugger::new(opts, src.to_string()).unwrap();
        debugger.run();
        assert_eq!(debugger.machine().pc(), 0);
    }
}
