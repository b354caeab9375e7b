pub mod output;

// Parsing
mod breakpoint;
pub mod decode;
mod preprocess;
mod source;
mod span;
pub use span::Span;
pub mod symbol;
pub mod value;
pub use preprocess::{preprocess, Image};

// Running
pub mod memory;
mod runtime;
pub use runtime::{Machine, Stop};
mod debugger;
pub use debugger::{Debugger, DebuggerOptions};

mod error;
pub use error::{Error, LookupKind, Result};

pub mod env;

pub use breakpoint::Breakpoints;
pub use symbol::{Flag, Labels, Register, Section, Sections};

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
