use std::borrow::Cow;

use fxhash::FxBuildHasher;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::{Error, LookupKind, Result};
use crate::memory::MEMORY_HEIGHT;
use crate::source::{clean_lines, strip_comment, SourceLine, COMMENT_MARKER};
use crate::symbol::{FxMap, Labels, Section, Sections};

/// Starts a section declaration: `%NAME start,length` or `%NAME length`.
pub const SECTION_SIGIL: char = '%';
/// Starts a macro name, both in definitions (`_NAME = value`) and references.
pub const MACRO_SIGIL: char = '_';

lazy_static! {
    static ref SECTION_DECL: Regex =
        Regex::new(r"^%(\w+)\s+(\d+)\s*(?:,\s*(\d+))?$").unwrap();
    static ref MACRO_DEF: Regex = Regex::new(r"^(_\w+)\s*=\s*(.+)$").unwrap();
    static ref MACRO_REF: Regex = Regex::new(r"\b_\w+").unwrap();
    static ref IDENT: Regex = Regex::new(r"\b[A-Za-z_]\w*").unwrap();
    static ref LABEL: Regex = Regex::new(r"^[A-Za-z_]\w*$").unwrap();
}

/// Flat memory image produced from source text.
#[derive(Debug)]
pub struct Image {
    /// One trimmed line per memory cell; empty where nothing was placed.
    pub lines: Vec<String>,
    pub sections: Sections,
    pub labels: Labels,
}

/// Expand macros and sections of `src` into a memory image.
pub fn preprocess(src: &str) -> Result<Image> {
    let lines = clean_lines(src);
    let sections = declare_sections(&lines)?;
    let mut preprocessor = Preprocessor {
        sections,
        labels: Labels::default(),
        macros: FxMap::with_hasher(FxBuildHasher::default()),
        current: None,
    };
    for line in &lines {
        preprocessor.line(line)?;
    }
    preprocessor.into_image()
}

/// First pass: lay out every section, in declaration order.
fn declare_sections(lines: &[SourceLine]) -> Result<Sections> {
    let mut sections = Sections::default();
    for line in lines.iter().filter(|line| is_section_decl(line.text)) {
        let (name, length) = parse_section_decl(line.text).map_err(|e| e.with_span(line.span))?;
        let start = sections.end();
        let end = start + length;
        if end > MEMORY_HEIGHT {
            return Err(Error::Bounds {
                address: end as i64 - 1,
            });
        }
        let section = Section {
            name: name.to_string(),
            start,
            length,
            lines: Vec::new(),
        };
        if !sections.insert(section) {
            return Err(Error::parse_at(
                format!("section `{}` declared twice", name),
                line.span,
            ));
        }
    }
    Ok(sections)
}

fn is_section_decl(text: &str) -> bool {
    text.starts_with(SECTION_SIGIL)
}

/// Name and length of a section declaration.
///
/// A declared start is only informative: sections are always packed in declaration order.
fn parse_section_decl(text: &str) -> Result<(&str, usize)> {
    let text = strip_comment(text);
    let captures = SECTION_DECL.captures(text).ok_or_else(|| {
        Error::parse(format!(
            "malformed section declaration `{}`, expected `%NAME start,length`",
            text
        ))
    })?;
    // Regex guarantees groups 1 and 2 are present
    let name = captures.get(1).map_or("", |m| m.as_str());
    let first = captures.get(2).map_or("", |m| m.as_str());
    let length = match captures.get(3) {
        Some(length) => {
            parse_count(first)?;
            parse_count(length.as_str())?
        }
        None => parse_count(first)?,
    };
    Ok((name, length))
}

fn parse_count(digits: &str) -> Result<usize> {
    digits
        .parse()
        .map_err(|_| Error::parse(format!("section size `{}` is too large", digits)))
}

struct Preprocessor {
    sections: Sections,
    labels: Labels,
    /// Macro name -> replacement text.
    macros: FxMap<String, String>,
    /// Name of the section lines are appended to.
    current: Option<String>,
}

impl Preprocessor {
    /// Second pass over a single cleaned line.
    fn line(&mut self, line: &SourceLine) -> Result<()> {
        let text = line.text;
        if text.starts_with(MACRO_SIGIL) {
            return self.define_macro(text).map_err(|e| e.with_span(line.span));
        }
        if is_section_decl(text) {
            let (name, _) = parse_section_decl(text)?;
            self.current = Some(name.to_string());
            return Ok(());
        }

        if let Some(label) = strip_comment(text).strip_suffix(':') {
            return self
                .declare_label(label.trim())
                .map_err(|e| e.with_span(line.span));
        }

        // Only code is expanded, the comment keeps any breakpoint marker
        let (code, comment) = text.split_at(text.find(COMMENT_MARKER).unwrap_or(text.len()));
        let macros_expanded = self
            .expand_macros(code)
            .map_err(|e| e.with_span(line.span))?;
        let expanded = self.expand_sections(&macros_expanded).into_owned() + comment;
        self.current_section()
            .map_err(|e| e.with_span(line.span))?
            .lines
            .push(expanded);
        Ok(())
    }

    fn define_macro(&mut self, text: &str) -> Result<()> {
        let text = strip_comment(text);
        let captures = MACRO_DEF.captures(text).ok_or_else(|| {
            Error::parse(format!(
                "malformed macro definition `{}`, expected `_NAME = value`",
                text
            ))
        })?;
        let name = captures.get(1).map_or("", |m| m.as_str());
        let value = captures.get(2).map_or("", |m| m.as_str()).trim();
        self.macros.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn declare_label(&mut self, name: &str) -> Result<()> {
        if !LABEL.is_match(name) {
            return Err(Error::parse(format!("malformed label `{}`", name)));
        }
        let address = self.current_section()?.cursor();
        if !self.labels.insert(name, address) {
            return Err(Error::parse(format!("label `{}` declared twice", name)));
        }
        Ok(())
    }

    fn current_section(&mut self) -> Result<&mut Section> {
        let Some(name) = &self.current else {
            return Err(Error::parse("line appears before any section declaration"));
        };
        self.sections
            .get_mut(name)
            .ok_or_else(|| Error::lookup(LookupKind::Section, name.as_str()))
    }

    /// Replace macro references with their values, in one pass.
    ///
    /// A value is inserted as-is, so macro names inside it are not expanded again.
    fn expand_macros<'a>(&self, text: &'a str) -> Result<Cow<'a, str>> {
        let mut missing = None;
        let expanded = MACRO_REF.replace_all(text, |captures: &Captures| {
            let name = &captures[0];
            match self.macros.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    name.to_string()
                }
            }
        });
        match missing {
            Some(name) => Err(Error::lookup(LookupKind::Macro, name)),
            None => Ok(expanded),
        }
    }

    /// Replace section names with their start address.
    fn expand_sections<'a>(&self, text: &'a str) -> Cow<'a, str> {
        IDENT.replace_all(text, |captures: &Captures| {
            let name = &captures[0];
            match self.sections.get(name) {
                Some(section) => section.start.to_string(),
                None => name.to_string(),
            }
        })
    }

    /// Final pass: place every section's lines in memory.
    fn into_image(self) -> Result<Image> {
        let mut lines = vec![String::new(); MEMORY_HEIGHT];
        for section in self.sections.iter() {
            if section.lines.len() > section.length {
                return Err(Error::parse(format!(
                    "section `{}` holds {} lines but is {} long",
                    section.name,
                    section.lines.len(),
                    section.length
                )));
            }
            for (i, line) in section.lines.iter().enumerate() {
                lines[section.start + i] = line.trim().to_string();
            }
        }
        Ok(Image {
            lines,
            sections: self.sections,
            labels: self.labels,
        })
    }
}
