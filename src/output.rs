use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::runtime::Machine;

/// Amount of lines shown on each side of the focused line by [`Output::print_nearest_lines`].
pub const NEAREST_LINES: i64 = 4;

#[macro_export]
macro_rules! dprint {
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($cond).print_str(&s);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        $crate::output::Output::Debugger($cond).print_str("\n");
    }};
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond).print_str(&s);
    }};
}

#[derive(Clone, Copy, Debug)]
pub enum Output {
    Normal,
    Debugger(Condition),
}

/// Whether debugger output survives `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Sometimes,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    /// Private. Use [`Output::start_new_line`].
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        let last = Decolored::new(string).last();
        if let Some(ch) = last {
            Output::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                print!("{}", string);
                Self::set_line_start_from_str(string);
            }

            Self::Debugger(condition) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", ColoredString::from(string).blue());
                    Self::set_line_start_from_str(string);
                }
                // Always remove color if `--minimal`
                (true, Condition::Always) => {
                    eprint_colorless(string);
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    pub fn print_registers(&self, machine: &Machine) {
        if Self::is_minimal() {
            for (register, value) in machine.registers() {
                self.print_str(&format!("{} {}\n", register, value));
            }
            return;
        }

        self.print_str("\x1b[2m┌────────────────────────────────────────┐\x1b[0m\n");
        self.print_str(
            "\x1b[2m│       \x1b[3m24-bit word                  int\x1b[0m\x1b[2m │\x1b[0m\n",
        );
        for (register, value) in machine.registers() {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1m{:<3}\x1b[0m  ", register));
            self.print_integer(value);
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m└────────────────────────────────────────┘\x1b[0m\n");
    }

    pub fn print_flags(&self, machine: &Machine) {
        let line = machine
            .flags()
            .map(|(flag, value)| format!("{}:{}", flag, value))
            .collect::<Vec<_>>()
            .join(" ");
        self.print_str(&line);
        self.print_str("\n");
    }

    pub fn print_integer(&self, value: i64) {
        if Self::is_minimal() {
            self.print_str(&format!("{}", value));
            return;
        }
        self.print_str(&format!("0b{:024b}  ", value & 0xFF_FFFF));
        self.print_str(&format!("{:>8}", value));
    }

    /// Memory around `center`, with a `->` marker on it and breakpoints highlighted.
    pub fn print_nearest_lines(&self, machine: &Machine, center: i64) {
        for (address, cell) in machine.nearest_lines(center, NEAREST_LINES) {
            let Some(cell) = cell else {
                // Keep the focused line in the middle, even at the edges of memory
                if !Self::is_minimal() {
                    self.print_str("\n");
                }
                continue;
            };

            // Address is known to be in memory from here on
            let index = address as usize;
            let marker = if address == center { "->" } else { "  " };
            let label = machine
                .labels()
                .name_of(index)
                .map(|name| format!("  ({}:)", name))
                .unwrap_or_default();
            let line = format!("{} {:>4}: {}{}", marker, address, cell, label);

            if Self::is_minimal() || !machine.breakpoints().contains(index) {
                self.print_str(&line);
            } else {
                self.print_str(&format!("{}", line.as_str().truecolor(165, 42, 42)));
            }
            self.print_str("\n");
        }
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    for ch in Decolored::new(string) {
        eprint!("{}", ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
    }
}
