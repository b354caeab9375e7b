use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, NamedSource, Report, Result};

use masm::output::Output;
use masm::{Debugger, DebuggerOptions, Machine, Stop};

/// masm is an assembler preprocessor, interpreter and debugger for a small 24-bit register machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a source file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a source file until the first breakpoint, then show registers and flags
    Run {
        /// Source file to run
        name: PathBuf,
        /// Stop after this many instructions if no breakpoint is reached [default: `MASM_STEP_LIMIT`]
        #[arg(long)]
        max_steps: Option<u64>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Run a source file with the debugger
    Debug {
        /// Source file to debug
        name: PathBuf,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Check a source file without running it
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Show the sections, labels, breakpoints and memory image of a source file
    Dump {
        /// File to dump
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    masm::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(masm::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                max_steps,
                minimal,
            } => run(&name, max_steps.or_else(masm::env::step_limit), minimal),
            Command::Debug {
                name,
                command,
                minimal,
            } => {
                let name = masm::env::resolve_source(name);
                file_message(Green, "Assembling", &name);
                let src = read_source(&name)?;
                let opts = DebuggerOptions {
                    command,
                    step_limit: masm::env::step_limit(),
                };
                let mut debugger =
                    Debugger::new(opts, src.clone()).map_err(|e| with_source(e, &name, src))?;

                Output::set_minimal(minimal);
                message(Green, "Debugging", "press CTRL+C or type `quit` to exit");
                debugger.run();

                file_message(Green, "Completed", &name);
                Ok(())
            }
            Command::Check { name } => {
                let name = masm::env::resolve_source(name);
                file_message(Green, "Checking", &name);
                assemble(&name)?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Dump { name } => {
                let name = masm::env::resolve_source(name);
                file_message(Green, "Dumping", &name);
                let machine = assemble(&name)?;
                dump(&machine);
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&path, masm::env::step_limit(), false)
    } else {
        println!("\n~ masm v{VERSION} ~");
        println!("{}", LOGO.truecolor(255, 183, 197).bold());
        println!("{SHORT_INFO}");
        std::process::exit(0);
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, max_steps: Option<u64>, minimal: bool) -> Result<()> {
    let name = masm::env::resolve_source(name.to_path_buf());
    file_message(MsgColor::Green, "Assembling", &name);
    let mut machine = assemble(&name)?;

    Output::set_minimal(minimal);
    message(MsgColor::Green, "Running", "until first breakpoint");
    let stop = match max_steps {
        Some(limit) => machine.continue_for(limit)?,
        None => Stop::Breakpoint(machine.continue_to_breakpoint()?),
    };
    match stop {
        Stop::Breakpoint(address) => {
            message(MsgColor::Cyan, "Breakpoint", &format!("reached at {}", address));
        }
        Stop::StepLimit => {
            let limit = max_steps.unwrap_or_default();
            message(
                MsgColor::Red,
                "Stopped",
                &format!("no breakpoint within {} instructions", limit),
            );
        }
    }

    Output::Normal.print_registers(&machine);
    Output::Normal.print_flags(&machine);

    file_message(MsgColor::Green, "Completed", &name);
    Ok(())
}

/// Preprocess a source file into a fresh machine, with the source attached to any diagnostic.
fn assemble(name: &Path) -> Result<Machine> {
    let src = read_source(name)?;
    Machine::new(&src).map_err(|e| with_source(e, name, src))
}

fn read_source(name: &Path) -> Result<String> {
    fs::read_to_string(name).into_diagnostic()
}

fn with_source(error: masm::Error, name: &Path, src: String) -> Report {
    Report::from(error).with_source_code(NamedSource::new(name.display().to_string(), src))
}

fn dump(machine: &Machine) {
    println!("{}", "Sections".bold());
    for section in machine.sections().iter() {
        println!(
            "  {:<12} {:>4}..{:<4} ({} of {} lines)",
            section.name,
            section.start,
            section.end(),
            section.lines.len(),
            section.length
        );
    }

    println!("{}", "Labels".bold());
    for (name, address) in machine.labels().iter() {
        println!("  {:<12} {:>4}", name, address);
    }

    println!("{}", "Breakpoints".bold());
    for address in machine.breakpoints().iter() {
        println!("  {:>4}", address);
    }

    println!("{}", "Memory".bold());
    for (address, cell) in machine.memory().iter().enumerate() {
        if !cell.is_empty() {
            println!("  {:>4}: {}", address, cell);
        }
    }
}

const LOGO: &str = r#"
  _ __ ___   __ _ ___ _ __ ___
 | '_ ` _ \ / _` / __| '_ ` _ \
 | | | | | | (_| \__ \ | | | | |
 |_| |_| |_|\__,_|___/_| |_| |_|"#;

const SHORT_INFO: &str = r"
Welcome to masm, a preprocessor, interpreter and debugger for a small
24-bit register machine with sections, macros and breakpoints.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
