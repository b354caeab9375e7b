use lazy_static::lazy_static;
use regex::Regex;

use crate::span::Span;

/// Starts a comment, which runs until the end of the line.
pub const COMMENT_MARKER: char = ';';
/// Marks the line as a breakpoint when found anywhere in it.
pub const BREAKPOINT_MARKER: &str = ";b";

lazy_static! {
    /// Blank lines and lines holding nothing but a comment.
    static ref EMPTY_OR_COMMENT: Regex = Regex::new(r"^\s*(;.*)?$").unwrap();
}

/// A source line which survived cleaning, trimmed of surrounding whitespace.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SourceLine<'a> {
    pub text: &'a str,
    pub span: Span,
}

/// Split source into lines, dropping blank and comment-only lines.
pub fn clean_lines(src: &str) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut offs = 0;
    for raw in src.split('\n') {
        let line_offs = offs;
        offs += raw.len() + 1;

        if EMPTY_OR_COMMENT.is_match(raw) {
            continue;
        }
        let leading = raw.len() - raw.trim_start().len();
        let text = raw.trim();
        lines.push(SourceLine {
            text,
            span: Span::new(line_offs + leading, text.len()),
        });
    }
    lines
}

/// Text before the first comment marker, without trailing whitespace.
pub fn strip_comment(text: &str) -> &str {
    match text.find(COMMENT_MARKER) {
        Some(index) => text[..index].trim_end(),
        None => text,
    }
}

pub fn has_breakpoint(text: &str) -> bool {
    text.contains(BREAKPOINT_MARKER)
}
