use std::fmt;

use crate::error::{Error, Result};

/// Width of a stored word, in bits.
pub const WORD_BITS: u32 = 24;
const WORD_MASK: i64 = (1 << WORD_BITS) - 1;

/// Parse the content of a memory cell or an operand.
///
/// `0b`-prefixed text is an unsigned binary literal, anything else must be a decimal integer.
pub fn parse_value(text: &str) -> Result<i64> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::parse("expected a value, found nothing"));
    }

    let parsed = match text
        .strip_prefix("0b")
        .or_else(|| text.strip_prefix("0B"))
    {
        // `from_str_radix` accepts a sign, a binary literal must not have one
        Some(digits) if digits.starts_with(['+', '-']) => None,
        Some(digits) => i64::from_str_radix(digits, 2).ok(),
        None => text.parse::<i64>().ok(),
    };
    parsed.ok_or_else(|| Error::parse(format!("malformed value `{}`", text)))
}

/// Integer content of a data cell.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Word(pub i64);

impl Word {
    /// Encode a register value the way `ST` writes it: the low 24 bits, two's complement.
    pub fn store(value: i64) -> Self {
        Word(value & WORD_MASK)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if (0..=WORD_MASK).contains(&self.0) {
            write!(f, "0b{:024b}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
