//! Type inference from token adjacency.
//!
//! Parameters take the type of the nearest column or literal they are
//! compared with or assigned to: in `STATUS = $Status` the parameter is typed
//! by column `STATUS`, in `$Limit > 0` by an integer literal. `IN` propagates
//! the left operand into the following parenthesised list, and
//! `INSERT INTO t (a, b) VALUES ($A, $B)` pairs columns and values by
//! position. The first type found for a parameter wins.

use std::collections::HashMap;
use std::mem;

use dsql_core::Span;
use dsql_core::cursor::{Cursor, Matched, Matcher, TokenDef, match_block};
use tracing::trace;

use crate::config::CompilerConfig;
use crate::param::SelectorParts;
use crate::typer::{LiteralType, Typer};

/// Result of type inference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inference {
    /// Inferred typer per holder name.
    pub typers: HashMap<String, Typer>,
    /// Holders seen without any inferred type, in source order.
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok {
    Space,
    Comment,
    Directive,
    Selector,
    Quoted,
    Number,
    Word,
    Paren,
    Other,
}

const PAREN: Matcher = Matcher::Block {
    open: b'(',
    close: b')',
};

const TOKENS: &[TokenDef<Tok>] = &[
    TokenDef::new(Tok::Space, "whitespace", Matcher::Whitespace),
    TokenDef::new(Tok::Comment, "comment", Matcher::Comment),
    TokenDef::new(Tok::Directive, "directive", Matcher::Directive),
    TokenDef::new(Tok::Selector, "selector", Matcher::Selector),
    TokenDef::new(Tok::Quoted, "string", Matcher::Quoted),
    TokenDef::new(Tok::Number, "number", Matcher::Number),
    TokenDef::new(Tok::Word, "identifier", Matcher::Identifier),
    TokenDef::new(Tok::Paren, "(...)", PAREN),
    TokenDef::new(Tok::Other, "character", Matcher::Any),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Quoted,
    Block,
    Comma,
    Other,
}

const PARTS: &[TokenDef<Part>] = &[
    TokenDef::new(Part::Quoted, "string", Matcher::Quoted),
    TokenDef::new(Part::Block, "(...)", PAREN),
    TokenDef::new(Part::Comma, "comma", Matcher::Char(b',')),
    TokenDef::new(Part::Other, "character", Matcher::Any),
];

/// Infers parameter types in `text`.
#[must_use]
pub fn infer_types(text: &str, config: &CompilerConfig) -> Inference {
    let mut inferencer = Inferencer {
        text,
        config,
        typers: HashMap::new(),
        seen: Vec::new(),
        pending: Vec::new(),
        last: None,
        in_typer: None,
    };
    inferencer.scan(Span::new(0, text.len()));
    let unresolved = inferencer
        .seen
        .iter()
        .filter(|name| !inferencer.typers.contains_key(*name))
        .cloned()
        .collect();
    Inference {
        typers: inferencer.typers,
        unresolved,
    }
}

/// Splits `span` on top-level commas, trimming each part.
#[must_use]
pub fn split_top_level(text: &str, span: Span) -> Vec<Span> {
    let mut cursor = Cursor::bounded(text, span);
    let mut parts = Vec::new();
    let mut start = span.start;
    while let Matched::Token(m) = cursor.next(PARTS) {
        if m.code == Part::Comma {
            parts.push(trim(text, Span::new(start, m.span.start)));
            start = m.span.end;
        }
    }
    let last = trim(text, Span::new(start, span.end));
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

fn trim(text: &str, span: Span) -> Span {
    let slice = span.text(text);
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead == slice.len() {
        return Span::new(span.start, span.start);
    }
    Span::new(span.start + lead, span.end - trail)
}

struct Inferencer<'a> {
    text: &'a str,
    config: &'a CompilerConfig,
    typers: HashMap<String, Typer>,
    seen: Vec<String>,
    /// Untyped parameters since the last type-bearing token.
    pending: Vec<String>,
    /// Type of the latest column or literal operand.
    last: Option<Typer>,
    /// Set by `IN`: the type applied after the next parenthesised block.
    in_typer: Option<Option<Typer>>,
}

impl Inferencer<'_> {
    fn scan(&mut self, span: Span) {
        let text = self.text;
        let mut cursor = Cursor::bounded(text, span);
        while let Matched::Token(m) = cursor.next(TOKENS) {
            let token = m.text(text);
            match m.code {
                Tok::Space | Tok::Comment => {}
                Tok::Directive => {
                    let after = m.span.end + Matcher::Whitespace.matches(text, m.span.end);
                    let n = match_block(text, after, b'(', b')');
                    if n > 0 && after + n <= span.end {
                        cursor.set_pos(after + n);
                        self.scoped(Span::new(after + 1, after + n - 1));
                    }
                    self.reset();
                }
                Tok::Selector => self.selector(token),
                Tok::Quoted => self.produce(Typer::Literal(LiteralType::String)),
                Tok::Number => self.produce(Typer::Literal(LiteralType::of_number(token))),
                Tok::Word => self.word(token, m.span, &mut cursor),
                Tok::Paren => self.block(Span::new(m.span.start + 1, m.span.end - 1)),
                Tok::Other => {
                    if token == "," || token == ";" {
                        self.reset();
                    }
                }
            }
        }
    }

    /// Scans directive arguments without leaking state in or out.
    fn scoped(&mut self, span: Span) {
        let pending = mem::take(&mut self.pending);
        let last = self.last.take();
        let in_typer = self.in_typer.take();
        self.scan(span);
        self.pending = pending;
        self.last = last;
        self.in_typer = in_typer;
    }

    fn block(&mut self, inner: Span) {
        let in_typer = self.in_typer.take();
        self.scan(inner);
        if let Some(typer) = in_typer {
            if let Some(typer) = typer {
                self.produce(typer);
            }
            self.reset();
        }
    }

    fn selector(&mut self, token: &str) {
        let parts = SelectorParts::parse(token, self.config);
        if self.config.is_builtin(&parts.head)
            || self.config.is_standalone_function(&parts.head)
            || parts.prefix.as_deref() == Some(self.config.metadata_namespace.as_str())
            || !parts.is_simple()
        {
            return;
        }
        let holder = parts.holder;
        if !self.seen.contains(&holder) {
            self.seen.push(holder.clone());
        }
        if self.typers.contains_key(&holder) {
            return;
        }
        match &self.last {
            Some(typer) => {
                trace!(parameter = %holder, %typer, "typed by preceding operand");
                self.typers.insert(holder, typer.clone());
            }
            None => {
                if !self.pending.contains(&holder) {
                    self.pending.push(holder);
                }
            }
        }
    }

    fn word(&mut self, word: &str, span: Span, cursor: &mut Cursor<'_>) {
        if word.eq_ignore_ascii_case("true") || word.eq_ignore_ascii_case("false") {
            self.produce(Typer::Literal(LiteralType::Bool));
        } else if word.eq_ignore_ascii_case("IN") {
            let operand = if self.pending.is_empty() {
                self.last.take()
            } else {
                None
            };
            self.in_typer = Some(operand);
        } else if word.eq_ignore_ascii_case("INSERT") {
            if let Some(end) = self.insert(span.end) {
                cursor.set_pos(end);
            }
            self.reset();
        } else if word.eq_ignore_ascii_case("SELECT") {
            // `$Id IN (SELECT ORDER_ID ...)` types the pending operand
            self.last = None;
        } else if self.config.is_sql_keyword(word) || self.config.is_reset_keyword(word) {
            self.reset();
        } else if self.is_call(span.end) {
            self.last = None;
        } else {
            self.produce(Typer::column(word));
        }
    }

    fn is_call(&self, end: usize) -> bool {
        let after = end + Matcher::Whitespace.matches(self.text, end);
        self.text.as_bytes().get(after) == Some(&b'(')
    }

    /// Pairs `INSERT INTO t (cols) VALUES (values)` by position and returns
    /// the offset after the values, or `None` when the shape does not match.
    fn insert(&mut self, from: usize) -> Option<usize> {
        let text = self.text;
        let mut shape = Cursor::bounded(text, Span::new(from, text.len()));
        let mut step = |matcher: Matcher| {
            shape.skip_whitespace();
            let def = [TokenDef::new((), "", matcher)];
            match shape.next(&def) {
                Matched::Token(m) => Some(m.span),
                _ => None,
            }
        };
        step(Matcher::Fragment("INTO"))?;
        step(Matcher::Identifier)?;
        let columns = step(PAREN)?;
        step(Matcher::Fragment("VALUES"))?;
        let values = step(PAREN)?;
        let end = values.end;

        let columns = split_top_level(text, Span::new(columns.start + 1, columns.end - 1));
        let values = split_top_level(text, Span::new(values.start + 1, values.end - 1));
        for (column, value) in columns.iter().zip(&values) {
            let raw = value.text(text);
            if Matcher::Selector.matches(raw, 0) == raw.len() {
                let parts = SelectorParts::parse(raw, self.config);
                if parts.is_simple() && !self.config.is_builtin(&parts.head) {
                    if !self.seen.contains(&parts.holder) {
                        self.seen.push(parts.holder.clone());
                    }
                    self.typers
                        .entry(parts.holder)
                        .or_insert_with(|| Typer::column(column.text(text)));
                    continue;
                }
            }
            self.reset();
            self.scan(*value);
        }
        Some(end)
    }

    fn produce(&mut self, typer: Typer) {
        for name in self.pending.drain(..) {
            trace!(parameter = %name, %typer, "typed by following operand");
            self.typers.entry(name).or_insert_with(|| typer.clone());
        }
        self.last = Some(typer);
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.last = None;
    }
}
