//! Template parse errors.

use crate::lexer::Span;

/// A malformed directive or reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    /// The error message.
    pub message: String,
    /// The location of the error.
    pub span: Span,
}

impl TemplateError {
    /// Creates a new template error.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl core::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} at position {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for TemplateError {}
