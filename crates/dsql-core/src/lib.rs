//! # dsql-core
//!
//! Text layer of the DSQL template compiler.
//!
//! This crate provides:
//! - A composable, position-tracking [`cursor::Cursor`] over raw template text
//! - A parser and walker for the template language (`$selectors`, `#if`,
//!   `#foreach`, `#set`)
//! - Offset-preserving text utilities for directives and replacements
//! - A hand-written SQL lexer and a tolerant recursive descent parser with
//!   Pratt expression parsing, used to read the FROM/JOIN shape of a template
//!
//! ## Parsing a template
//!
//! ```rust
//! use dsql_core::template::{Node, parse_template};
//!
//! let template = parse_template("SELECT * FROM t #if($Has.Id) WHERE ID = $Id #end").unwrap();
//! assert!(matches!(template.nodes[1], Node::If { .. }));
//! ```
//!
//! ## Parsing sanitized SQL
//!
//! Selectors survive as opaque tokens, so SQL that still contains template
//! calls parses:
//!
//! ```rust
//! use dsql_core::{Parser, Statement};
//!
//! let stmt = Parser::new("SELECT * FROM t WHERE ID = $criteria.AppendBinding($Unsafe.Id)")
//!     .parse_statement()
//!     .unwrap();
//! assert!(matches!(stmt, Statement::Select(_)));
//! ```

pub mod ast;
pub mod cursor;
pub mod lexer;
pub mod parser;
pub mod template;
pub mod text;

pub use ast::{Expr, Statement};
pub use cursor::{Cursor, CursorError, Match, Matched, Matcher, TokenDef};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use text::{Replacement, apply_replacements, blank_spans};
