//! Error propagation modes shared by the semantic passes

use log::debug;
use serde::Serialize;

use crate::utils::{Error, ErrorCategory, LineIndex, Result};

/// How a pass reacts to a semantic error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// The first error aborts the pass
    #[default]
    Throw,
    /// Errors accumulate and the pass keeps going
    Collect,
}

/// Error sink used by every semantic pass
#[derive(Debug, Default)]
pub struct Diagnostics {
    mode: ErrorMode,
    errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new(mode: ErrorMode) -> Self {
        Self {
            mode,
            errors: Vec::new(),
        }
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Record an error. In throw mode the error comes straight back as `Err`.
    pub fn report(&mut self, error: Error) -> Result<()> {
        match self.mode {
            ErrorMode::Throw => Err(error),
            ErrorMode::Collect => {
                debug!("collected error: {}", error);
                self.errors.push(error);
                Ok(())
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

/// A rendered diagnostic, suitable for printing or JSON output
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub category: ErrorCategory,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Diagnostic {
    pub fn from_error(error: &Error, lines: &LineIndex) -> Self {
        let position = error.span().map(|span| lines.line_col(span.start));
        Self {
            category: error.category(),
            message: error.to_string(),
            line: position.map(|(line, _)| line),
            column: position.map(|(_, column)| column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Span;

    fn sample() -> Error {
        Error::UnresolvedValue {
            name: "x".to_string(),
            span: Span::new(3, 4, 0),
        }
    }

    #[test]
    fn test_throw_mode_returns_error() {
        let mut diagnostics = Diagnostics::new(ErrorMode::Throw);
        assert!(diagnostics.report(sample()).is_err());
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_collect_mode_accumulates() {
        let mut diagnostics = Diagnostics::new(ErrorMode::Collect);
        assert!(diagnostics.report(sample()).is_ok());
        assert!(diagnostics.report(sample()).is_ok());
        assert_eq!(diagnostics.errors().len(), 2);
    }

    #[test]
    fn test_diagnostic_position() {
        let lines = LineIndex::new("fn\nabc x");
        let diagnostic = Diagnostic::from_error(&sample(), &lines);
        assert_eq!(diagnostic.line, Some(2));
        assert_eq!(diagnostic.column, Some(1));
        assert_eq!(diagnostic.category, ErrorCategory::NameResolution);
    }
}
