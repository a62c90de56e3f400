//! The template language layered over SQL.
//!
//! Templates mix SQL text with `$` references and `#set`, `#if`/`#elseif`/
//! `#else`, `#foreach` and `#end` directives. [`parse_template`] builds a
//! [`Template`] tree and [`walk`] visits every selector in source order.

mod ast;
mod blocks;
mod error;
mod parser;
mod walk;

pub use ast::{BinaryOp, Branch, Expr, Literal, Node, Selector, Template, UnaryOp};
pub use blocks::{CondBlock, cond_blocks, extract_cond_block, remove_cond_blocks, strip_directives};
pub use error::TemplateError;
pub use parser::{TemplateParser, parse_template};
pub use walk::{Position, Site, Visitor, walk, walk_expr};
