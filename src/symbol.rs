use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::error::{Error, LookupKind, Result};

/// Insertion-ordered map, so sections and labels list in declaration order.
pub type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Represents the machine registers, in display order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    Gr0 = 0,
    Gr1,
    Gr2,
    Gr3,
    Gr4,
    Gr5,
    Gr6,
    Gr7,
    /// Program counter.
    Pc,
    /// Stack pointer. Nothing uses it yet.
    Sp,
}

impl Register {
    pub const COUNT: usize = 10;
    pub const ALL: [Register; Register::COUNT] = [
        Register::Gr0,
        Register::Gr1,
        Register::Gr2,
        Register::Gr3,
        Register::Gr4,
        Register::Gr5,
        Register::Gr6,
        Register::Gr7,
        Register::Pc,
        Register::Sp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Register::Gr0 => "GR0",
            Register::Gr1 => "GR1",
            Register::Gr2 => "GR2",
            Register::Gr3 => "GR3",
            Register::Gr4 => "GR4",
            Register::Gr5 => "GR5",
            Register::Gr6 => "GR6",
            Register::Gr7 => "GR7",
            Register::Pc => "PC",
            Register::Sp => "SP",
        }
    }
}

impl FromStr for Register {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Register::ALL
            .into_iter()
            .find(|register| register.name() == s)
            .ok_or_else(|| Error::parse(format!("unknown register `{}`", s)))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// ALU flags, in display order. Only `Z` is ever computed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Flag {
    /// Result was zero
    Z = 0,
    /// Negative
    N,
    /// Carry
    C,
    /// Overflow
    V,
}

impl Flag {
    pub const COUNT: usize = 4;
    pub const ALL: [Flag; Flag::COUNT] = [Flag::Z, Flag::N, Flag::C, Flag::V];

    pub fn name(self) -> &'static str {
        match self {
            Flag::Z => "Z",
            Flag::N => "N",
            Flag::C => "C",
            Flag::V => "V",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Named, contiguous range of memory `[start, start + length)`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Section {
    pub name: String,
    pub start: usize,
    pub length: usize,
    /// Expanded lines, filled during preprocessing.
    pub lines: Vec<String>,
}

impl Section {
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Address the next appended line will occupy.
    pub fn cursor(&self) -> usize {
        self.start + self.lines.len()
    }

    pub fn contains(&self, address: usize) -> bool {
        (self.start..self.end()).contains(&address)
    }
}

/// Section name -> section, in declaration order.
#[derive(Clone, Default, Debug)]
pub struct Sections(FxMap<String, Section>);

impl Sections {
    /// End of the last declared section, where the next one starts.
    pub fn end(&self) -> usize {
        self.0.last().map_or(0, |(_, section)| section.end())
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.0.get_mut(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&Section> {
        self.get(name)
            .ok_or_else(|| Error::lookup(LookupKind::Section, name))
    }

    /// Returns `false` if a section with the same name already exists.
    pub fn insert(&mut self, section: Section) -> bool {
        if self.0.contains_key(&section.name) {
            return false;
        }
        self.0.insert(section.name.clone(), section);
        true
    }

    /// Section whose range holds `address`.
    pub fn containing(&self, address: usize) -> Option<&Section> {
        self.iter().find(|section| section.contains(address))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.0.values()
    }
}

/// Label name -> absolute address, in declaration order.
#[derive(Clone, Default, Debug)]
pub struct Labels(FxMap<String, usize>);

impl Labels {
    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    /// Returns `false` if the label was already declared.
    pub fn insert(&mut self, name: &str, address: usize) -> bool {
        if self.0.contains_key(name) {
            return false;
        }
        self.0.insert(name.to_string(), address);
        true
    }

    /// First label pointing at `address`, for display.
    pub fn name_of(&self, address: usize) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, label_address)| **label_address == address)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(name, address)| (name.as_str(), *address))
    }
}
