//! Lexical errors raised by the cursor.

/// An expected token was missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorError {
    /// Names of the matchers that were attempted.
    pub expected: String,
    /// Byte offset where matching failed.
    pub pos: usize,
    /// A short excerpt of the text found instead.
    pub found: String,
}

impl CursorError {
    const EXCERPT: usize = 24;

    /// Creates a new error; `rest` is truncated to a short excerpt.
    #[must_use]
    pub fn new(expected: impl Into<String>, pos: usize, rest: &str) -> Self {
        Self {
            expected: expected.into(),
            pos,
            found: rest.chars().take(Self::EXCERPT).collect(),
        }
    }
}

impl core::fmt::Display for CursorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.found.is_empty() {
            write!(f, "expected {} at {}, found end of input", self.expected, self.pos)
        } else {
            write!(
                f,
                "expected {} at {}, found {:?}",
                self.expected, self.pos, self.found
            )
        }
    }
}

impl std::error::Error for CursorError {}
