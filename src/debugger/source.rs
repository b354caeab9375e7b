use std::io::{self, BufRead, IsTerminal, Write};

use console::Key;

use super::DEBUGGER_COLOR;
use crate::dprintln;

/// Where debugger commands are read from.
#[allow(private_interfaces)]
#[derive(Debug)]
pub enum CommandSource {
    Argument(Argument),
    Stdin(Stdin),
    Terminal(Terminal),
}

/// Command-line argument
#[derive(Debug)]
struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

/// Stdin which is not attached to a terminal, i.e. piped.
#[derive(Debug)]
struct Stdin {
    stdin: io::Stdin,
    /// Current line, possibly holding several commands
    buffer: String,
    /// Byte index
    cursor: usize,
}

/// Interactive unbuffered terminal
#[derive(Debug)]
struct Terminal {
    term: console::Term,

    buffer: String,
    /// Byte index of next command in `buffer`, or 0 if a new line must be read
    cursor: usize,

    history: Vec<String>,
    /// Focused item in history, or new entry if index==length
    history_index: usize,
    /// Visible line cursor in terminal
    visible_cursor: usize,
}

pub trait SourceRead {
    /// `None` indicates EOF.
    ///
    /// Returned string slice MAY include leading or trailing whitespace.
    fn read(&mut self) -> Option<&str>;
}

impl CommandSource {
    pub fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return CommandSource::Argument(Argument::from(argument));
        }
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return CommandSource::Terminal(Terminal::new());
        }
        CommandSource::Stdin(Stdin::from(stdin))
    }
}

impl SourceRead for CommandSource {
    fn read(&mut self) -> Option<&str> {
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
            Self::Terminal(terminal) => return terminal.read(),
        };
        // Echo prompt and command for non-terminal source
        if let Some(command) = command.filter(|command| !command.trim().is_empty()) {
            dprintln!(Sometimes, "\x1b[1mCommand: \x1b[0m{}", command.trim());
        }
        command
    }
}

/// Take the next command from `buffer`, up to a newline or `;`.
fn split_command<'a>(buffer: &'a str, cursor: &mut usize) -> &'a str {
    let rest = &buffer[*cursor..];
    let end = rest.find(|ch: char| ch == '\n' || ch == ';').unwrap_or(rest.len());
    // Skip delimiter
    *cursor += end + 1;
    &rest[..end]
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl SourceRead for Argument {
    fn read(&mut self) -> Option<&str> {
        if self.cursor >= self.buffer.len() {
            return None;
        }
        Some(split_command(&self.buffer, &mut self.cursor))
    }
}

impl Stdin {
    pub fn from(stdin: io::Stdin) -> Self {
        Self {
            stdin,
            buffer: String::new(),
            cursor: 0,
        }
    }
}

impl SourceRead for Stdin {
    fn read(&mut self) -> Option<&str> {
        if self.cursor >= self.buffer.len() {
            self.buffer.clear();
            self.cursor = 0;
            // Read errors are treated as EOF
            if self.stdin.lock().read_line(&mut self.buffer).ok()? == 0 {
                return None;
            }
        }
        Some(split_command(&self.buffer, &mut self.cursor))
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: console::Term::stdout(),
            buffer: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_index: 0,
            visible_cursor: 0,
        }
    }

    fn is_next(&self) -> bool {
        debug_assert!(
            self.history_index <= self.history.len(),
            "index went past history"
        );
        self.history_index >= self.history.len()
    }

    /// Run before modifying `buffer`.
    /// If focused on a historic item, clone it to `buffer` and update index.
    fn update_next(&mut self) {
        if let Some(previous) = self.history.get(self.history_index) {
            self.buffer = previous.clone();
            self.history_index = self.history.len();
        }
    }

    /// Get next or historic command, from index
    fn get_current(&self) -> &str {
        self.history
            .get(self.history_index)
            .unwrap_or(&self.buffer)
    }

    fn print_prompt(&mut self) -> io::Result<()> {
        self.term.clear_line()?;

        write!(self.term, "\x1b[1;{}m", DEBUGGER_COLOR)?;
        write!(self.term, "Command: ")?;
        write!(self.term, "\x1b[0m")?;

        let current = self.get_current().to_string();
        write!(self.term, "{}", current)?;
        self.term
            .move_cursor_left(current.len().saturating_sub(self.visible_cursor))?;

        self.term.flush()
    }

    /// Return of `true` indicates to break loop
    fn read_key(&mut self) -> io::Result<bool> {
        let key = self.term.read_key()?;
        match key {
            Key::Enter | Key::Char('\n') => {
                if self.is_next() && self.buffer.trim().is_empty() {
                    self.buffer.clear();
                    self.visible_cursor = 0;
                    println!();
                } else {
                    self.update_next();
                    return Ok(true);
                }
            }

            Key::Char(ch) => match ch {
                // Ignore ASCII control characters
                '\x00'..='\x1f' | '\x7f' => (),
                // Cursor is a byte index, so input is kept to ASCII
                _ if ch.is_ascii() => {
                    self.update_next();
                    self.buffer.insert(self.visible_cursor, ch);
                    self.visible_cursor += 1;
                }
                _ => (),
            },

            Key::Backspace => {
                self.update_next();
                if self.visible_cursor > 0 && self.visible_cursor <= self.buffer.len() {
                    self.buffer.remove(self.visible_cursor - 1);
                    self.visible_cursor -= 1;
                }
            }
            Key::Del => {
                self.update_next();
                if self.visible_cursor < self.buffer.len() {
                    self.buffer.remove(self.visible_cursor);
                }
            }

            // Left/right in current input
            Key::ArrowLeft => {
                self.visible_cursor = self.visible_cursor.saturating_sub(1);
            }
            Key::ArrowRight => {
                if self.visible_cursor < self.get_current().len() {
                    self.visible_cursor += 1;
                }
            }

            // Back/forth through history
            Key::ArrowUp => {
                if self.history_index > 0 {
                    self.history_index -= 1;
                    self.visible_cursor = self.get_current().len();
                }
            }
            Key::ArrowDown => {
                if self.history_index < self.history.len() {
                    self.history_index += 1;
                    self.visible_cursor = self.get_current().len();
                }
            }

            _ => (),
        }
        Ok(false)
    }

    /// Read entire (multi-command) line from terminal
    fn read_line(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.visible_cursor = 0;

        loop {
            self.print_prompt()?;
            if self.read_key()? {
                break;
            }
        }
        println!();

        // Push to history if different to last command
        if self.history.last() != Some(&self.buffer) {
            self.history.push(self.buffer.clone());
        }
        self.history_index = self.history.len();
        Ok(())
    }
}

impl SourceRead for Terminal {
    fn read(&mut self) -> Option<&str> {
        // Reached end of line buffer: read new line
        if self.cursor >= self.buffer.len() {
            self.cursor = 0;
            // Terminal errors end the session, the same as EOF
            self.read_line().ok()?;
        }
        Some(split_command(&self.buffer, &mut self.cursor))
    }
}
