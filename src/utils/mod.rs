//! Utility module

mod diagnostics;
mod error;
mod span;

pub use diagnostics::{Diagnostic, Diagnostics, ErrorMode};
pub use error::{Error, ErrorCategory, Result};
pub use span::{LineIndex, Span};
