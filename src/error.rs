use std::{error, fmt};

use miette::{Diagnostic, LabeledSpan};

use crate::span::Span;

pub type Result<T> = std::result::Result<T, Error>;

/// Any failure while preprocessing or executing a program.
///
/// None of these are recoverable: preprocessing errors abort construction of the machine, and
/// execution errors abort the current step without changing machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed declaration, literal or instruction.
    Parse {
        message: String,
        span: Option<Span>,
    },
    /// Reference to a label, section, macro or destination that does not exist.
    Lookup {
        kind: LookupKind,
        name: String,
        span: Option<Span>,
    },
    /// Unknown mnemonic, unknown address mode or an instruction without semantics.
    UnsupportedInstruction { message: String },
    /// Address outside of `[0, MEMORY_HEIGHT)`.
    Bounds { address: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupKind {
    Macro,
    Section,
    Destination,
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            span: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, span: Span) -> Self {
        Error::Parse {
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn lookup(kind: LookupKind, name: impl Into<String>) -> Self {
        Error::Lookup {
            kind,
            name: name.into(),
            span: None,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedInstruction {
            message: message.into(),
        }
    }

    /// Attach a source location, if the error does not already carry one.
    pub fn with_span(mut self, new_span: Span) -> Self {
        match &mut self {
            Error::Parse { span, .. } | Error::Lookup { span, .. } => {
                span.get_or_insert(new_span);
            }
            Error::UnsupportedInstruction { .. } | Error::Bounds { .. } => (),
        }
        self
    }

    fn span(&self) -> Option<Span> {
        match self {
            Error::Parse { span, .. } | Error::Lookup { span, .. } => *span,
            Error::UnsupportedInstruction { .. } | Error::Bounds { .. } => None,
        }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse { message, .. } => write!(f, "Parse error: {}", message),
            Error::Lookup { kind, name, .. } => write!(f, "Unknown {} `{}`", kind, name),
            Error::UnsupportedInstruction { message } => {
                write!(f, "Unsupported instruction: {}", message)
            }
            Error::Bounds { address } => {
                write!(f, "Address {} is outside of memory", address)
            }
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::Macro => write!(f, "macro"),
            LookupKind::Section => write!(f, "section"),
            LookupKind::Destination => write!(f, "destination"),
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            Error::Parse { .. } => "parse::syntax",
            Error::Lookup { kind, .. } => match kind {
                LookupKind::Macro => "lookup::macro",
                LookupKind::Section => "lookup::section",
                LookupKind::Destination => "lookup::destination",
            },
            Error::UnsupportedInstruction { .. } => "exec::unsupported",
            Error::Bounds { .. } => "exec::bounds",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self {
            Error::Parse { .. } => "check the declaration syntax in the documentation",
            Error::Lookup { kind, .. } => match kind {
                LookupKind::Macro => "macros must be defined with `_NAME = value` before use",
                LookupKind::Section => "declare the section with `%NAME start,length` first",
                LookupKind::Destination => "branch to a decimal address or a declared label",
            },
            Error::UnsupportedInstruction { .. } => {
                "supported: BRA BNE BEQ LD ST ADD SUB AND OR MUL, address mode `I`"
            }
            Error::Bounds { .. } => "memory addresses range from 0 to 4095",
        };
        Some(Box::new(help))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span()?;
        let label = match self {
            Error::Lookup { .. } => "unresolved reference",
            _ => "in this line",
        };
        Some(Box::new(std::iter::once(LabeledSpan::at(span, label))))
    }
}
