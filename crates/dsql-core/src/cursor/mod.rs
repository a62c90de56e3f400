//! Position-tracking scanner over raw template text.
//!
//! A [`Cursor`] tries a caller-supplied list of [`TokenDef`]s in priority order
//! and advances past the first one that matches. Callers define their own
//! token code type, so the same cursor drives hint extraction, the template
//! parser, the parameter iterator and the type inferencer.

mod error;
mod matcher;

pub use error::CursorError;
pub use matcher::{Matcher, is_ident_part, is_ident_start, match_block, match_selector};

use crate::lexer::Span;

/// A named matcher paired with the code reported when it matches.
#[derive(Debug, Clone, Copy)]
pub struct TokenDef<C> {
    /// Code returned for a successful match.
    pub code: C,
    /// Human readable name used in error messages.
    pub name: &'static str,
    /// The matcher.
    pub matcher: Matcher,
}

impl<C> TokenDef<C> {
    /// Creates a token definition.
    #[must_use]
    pub const fn new(code: C, name: &'static str, matcher: Matcher) -> Self {
        Self {
            code,
            name,
            matcher,
        }
    }
}

/// A successful match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<C> {
    /// Code of the definition that matched.
    pub code: C,
    /// Matched byte range.
    pub span: Span,
}

impl<C> Match<C> {
    /// Returns the matched text.
    #[must_use]
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        self.span.text(input)
    }
}

/// Result of a single match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matched<C> {
    /// A definition matched and the cursor advanced past it.
    Token(Match<C>),
    /// No definition matched at the given offset; the cursor did not move.
    Invalid(usize),
    /// The cursor is at the end of its range.
    Eof,
}

/// A scanning position over a bounded range of the input.
///
/// The cursor never moves backwards on its own; callers that look ahead save
/// [`Cursor::pos`] and restore it with [`Cursor::set_pos`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor over the whole input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            end: input.len(),
        }
    }

    /// Creates a cursor limited to `span`, keeping absolute offsets.
    #[must_use]
    pub fn bounded(input: &'a str, span: Span) -> Self {
        let end = span.end.min(input.len());
        Self {
            input,
            pos: span.start.min(end),
            end,
        }
    }

    /// Returns the full input.
    #[must_use]
    pub const fn input(&self) -> &'a str {
        self.input
    }

    /// Returns the current byte offset.
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to `pos`, clamped to its range.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }

    /// Returns true once the cursor reached the end of its range.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.end
    }

    /// Returns the unscanned remainder of the range.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..self.end]
    }

    /// Returns the byte at the current position.
    #[must_use]
    pub fn peek_byte(&self) -> Option<u8> {
        if self.is_eof() {
            None
        } else {
            Some(self.input.as_bytes()[self.pos])
        }
    }

    /// Tries each definition in order and advances past the first match.
    pub fn next<C: Copy>(&mut self, defs: &[TokenDef<C>]) -> Matched<C> {
        if self.is_eof() {
            return Matched::Eof;
        }
        let scope = &self.input[..self.end];
        for def in defs {
            let n = def.matcher.matches(scope, self.pos);
            if n > 0 {
                let span = Span::new(self.pos, self.pos + n);
                self.pos += n;
                return Matched::Token(Match {
                    code: def.code,
                    span,
                });
            }
        }
        Matched::Invalid(self.pos)
    }

    /// Like [`Cursor::next`] but turns "nothing matched" into an error naming
    /// every definition that was attempted.
    ///
    /// # Errors
    ///
    /// Returns a [`CursorError`] at EOF or when no definition matches.
    pub fn expect<C: Copy>(&mut self, defs: &[TokenDef<C>]) -> Result<Match<C>, CursorError> {
        match self.next(defs) {
            Matched::Token(m) => Ok(m),
            Matched::Invalid(pos) => Err(self.error(defs, pos)),
            Matched::Eof => Err(self.error(defs, self.pos)),
        }
    }

    fn error<C>(&self, defs: &[TokenDef<C>], pos: usize) -> CursorError {
        CursorError::new(
            defs.iter().map(|d| d.name).collect::<Vec<_>>().join(" or "),
            pos,
            self.rest(),
        )
    }

    /// Advances past any whitespace.
    pub fn skip_whitespace(&mut self) {
        self.pos += Matcher::Whitespace.matches(&self.input[..self.end], self.pos);
    }
}
