use std::fmt;

use crate::error::{Error, Result};
use crate::source::strip_comment;
use crate::value::{parse_value, Word};

/// Amount of cells in memory.
pub const MEMORY_HEIGHT: usize = 4096;

/// Content of a single memory cell.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub enum Cell {
    /// Never written.
    #[default]
    Empty,
    /// Raw instruction line, inline comment included.
    Instruction(String),
    /// Value from a literal line or written by `ST`.
    ///
    /// `text` is what gets displayed: the literal line with its comment, or the `0b` form of a stored word.
    Data { word: Word, text: String },
}

impl Cell {
    /// Classify a trimmed line from the memory image.
    pub fn from_line(line: &str) -> Self {
        if line.is_empty() {
            return Cell::Empty;
        }
        match parse_value(strip_comment(line)) {
            Ok(value) => Cell::Data {
                word: Word(value),
                text: line.to_string(),
            },
            Err(_) => Cell::Instruction(line.to_string()),
        }
    }

    /// Cell written by `ST`.
    pub fn stored(word: Word) -> Self {
        Cell::Data {
            word,
            text: word.to_string(),
        }
    }

    /// Integer value of the cell, as read by `LD` and the ALU.
    pub fn value(&self) -> Result<i64> {
        match self {
            Cell::Data { word, .. } => Ok(word.value()),
            Cell::Empty => Err(Error::parse("read from uninitialized memory")),
            Cell::Instruction(text) => {
                Err(Error::parse(format!("expected a value, found `{}`", text)))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Instruction(text) | Cell::Data { text, .. } => write!(f, "{}", text),
        }
    }
}

/// Fixed-size memory. Every index in `[0, MEMORY_HEIGHT)` is valid.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Memory {
    cells: Box<[Cell]>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: vec![Cell::Empty; MEMORY_HEIGHT].into_boxed_slice(),
        }
    }

    /// Check that `address` can index memory.
    pub fn address(address: i64) -> Result<usize> {
        usize::try_from(address)
            .ok()
            .filter(|address| *address < MEMORY_HEIGHT)
            .ok_or(Error::Bounds { address })
    }

    pub fn get(&self, address: usize) -> Result<&Cell> {
        self.cells.get(address).ok_or(Error::Bounds {
            address: address as i64,
        })
    }

    pub fn set(&mut self, address: usize, cell: Cell) -> Result<()> {
        let slot = self.cells.get_mut(address).ok_or(Error::Bounds {
            address: address as i64,
        })?;
        *slot = cell;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for Memory {
    type Output = Cell;

    fn index(&self, address: usize) -> &Cell {
        &self.cells[address]
    }
}

impl std::ops::IndexMut<usize> for Memory {
    fn index_mut(&mut self, address: usize) -> &mut Cell {
        &mut self.cells[address]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_lines() {
        assert_eq!(Cell::from_line(""), Cell::Empty);
        assert_eq!(Cell::from_line("0b101").value(), Ok(5));
        assert_eq!(Cell::from_line("12 ;b").value(), Ok(12));
        assert_eq!(
            Cell::from_line("LD GR0, 5I"),
            Cell::Instruction("LD GR0, 5I".to_string())
        );
    }

    #[test]
    fn data_keeps_source_text() {
        let cell = Cell::from_line("12 ;b start value");
        assert_eq!(cell.to_string(), "12 ;b start value");
        assert_eq!(Cell::from_line("0b11").to_string(), "0b11");
        assert_eq!(
            Cell::stored(Word(3)).to_string(),
            "0b000000000000000000000011"
        );
    }

    #[test]
    fn reading_values() {
        assert_eq!(Cell::stored(Word(9)).value(), Ok(9));
        assert!(matches!(Cell::Empty.value(), Err(Error::Parse { .. })));
        assert!(Cell::Instruction("BRA 0".to_string()).value().is_err());
    }

    #[test]
    fn bounds() {
        assert_eq!(Memory::address(0), Ok(0));
        assert_eq!(Memory::address(4095), Ok(4095));
        assert_eq!(Memory::address(4096), Err(Error::Bounds { address: 4096 }));
        assert_eq!(Memory::address(-1), Err(Error::Bounds { address: -1 }));

        let mut memory = Memory::new();
        assert_eq!(memory.len(), MEMORY_HEIGHT);
        assert!(memory.set(MEMORY_HEIGHT, Cell::Empty).is_err());
        memory.set(7, Cell::stored(Word(1))).unwrap();
        assert_eq!(memory[7], Cell::stored(Word(1)));
        assert!(memory.get(7).is_ok_and(|cell| !cell.is_empty()));
    }
}
