//! SQL lexer.
//!
//! A hand-written lexer for the SQL side of a template. Template selectors are
//! kept as opaque [`TokenKind::Selector`] tokens so already-sanitized SQL can be
//! tokenized without expanding the template.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Keyword, Token, TokenKind};
pub use tokenizer::Lexer;
