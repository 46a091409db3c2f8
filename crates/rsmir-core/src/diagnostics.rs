use std::fmt::{Display, Formatter};

use crate::error::Error;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl Display for DiagnosticLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticLevel::Info => write!(f, "info"),
            DiagnosticLevel::Warning => write!(f, "warning"),
            DiagnosticLevel::Error => write!(f, "error"),
        }
    }
}

/// A message about one item, collected when the builder runs in tolerant
/// mode instead of aborting the whole program.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub span: Option<Span>,
    pub suggestions: Vec<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            span: None,
            suggestions: Vec::new(),
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Error-level diagnostic for a build error inside item `item`.
    pub fn from_error(item: &str, error: &Error) -> Self {
        let mut diagnostic =
            Diagnostic::error(format!("failed to build MIR for `{}`: {}", item, error))
                .with_code(error.code());
        if let Some(span) = error.span() {
            diagnostic = diagnostic.with_span(span);
        }
        if matches!(error, Error::Unsupported { .. }) {
            diagnostic = diagnostic.with_suggestion("desugar the construct before MIR building");
        }
        diagnostic
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.level, self.message)?;

        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }

        if let Some(span) = &self.span {
            write!(f, " at {}", span)?;
        }

        if !self.suggestions.is_empty() {
            let hints = self.suggestions.join("; ");
            write!(f, " (hints: {})", hints)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unsupported_errors_become_coded_diagnostics() {
        let error = Error::unsupported("`while` loop", Span::new(1, 4, 9));
        let diagnostic = Diagnostic::from_error("main", &error);
        assert_eq!(diagnostic.code.as_deref(), Some("unsupported"));
        assert_eq!(diagnostic.span, Some(Span::new(1, 4, 9)));
        assert_eq!(
            diagnostic.to_string(),
            "error: failed to build MIR for `main`: unsupported construct: `while` loop \
             [unsupported] at Span(1:4-9) (hints: desugar the construct before MIR building)"
        );
    }
}
