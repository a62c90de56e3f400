//! Predicate criteria and write statement analysis.

use std::sync::LazyLock;

use dsql_core::ast::{Expr, InsertSource, Statement};
use dsql_core::cursor::{Cursor, Matched, Matcher, TokenDef};
use dsql_core::lexer::{Keyword, TokenKind};
use dsql_core::template::{cond_blocks, remove_cond_blocks, strip_directives};
use dsql_core::{Lexer, Parser, Span, blank_spans};
use regex::Regex;
use tracing::{trace, warn};

use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::param::SelectorParts;
use crate::typer::Typer;
use crate::view::ViewMeta;

static WRITE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:insert\s+into|update|delete\s+from)\s+([A-Za-z_][A-Za-z0-9_.]*)")
        .expect("Invalid regex")
});

/// One comparison of a predicate, as SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    /// Left operand.
    pub left: String,
    /// Operator.
    pub op: String,
    /// Right operand.
    pub right: String,
}

impl Criterion {
    fn new(left: impl ToString, op: impl Into<String>, right: impl ToString) -> Self {
        Self {
            left: left.to_string(),
            op: op.into(),
            right: right.to_string(),
        }
    }
}

/// Collects the comparisons of a predicate tree.
#[must_use]
pub fn criteria(expr: &Expr) -> Vec<Criterion> {
    let mut out = Vec::new();
    collect(expr, &mut out);
    out
}

fn collect(expr: &Expr, out: &mut Vec<Criterion>) {
    match expr.unparen() {
        Expr::Binary { left, op, right } if op.is_logical() => {
            collect(left, out);
            collect(right, out);
        }
        Expr::Binary { left, op, right } if op.is_comparison() => {
            out.push(Criterion::new(left, op.as_str(), right));
        }
        Expr::Unary { operand, .. } => collect(operand, out),
        Expr::In {
            expr,
            list,
            negated,
        } => {
            let list = list.iter().map(ToString::to_string).collect::<Vec<_>>();
            let op = if *negated { "NOT IN" } else { "IN" };
            out.push(Criterion::new(expr, op, list.join(", ")));
        }
        _ => {}
    }
}

/// Returns the leading keyword of every statement in `sql`.
#[must_use]
pub fn statement_keywords(sql: &str) -> Vec<Keyword> {
    let text = strip_directives(sql);
    let mut lexer = Lexer::new(&text);
    let mut keywords = Vec::new();
    let mut boundary = true;
    loop {
        let token = lexer.next_token();
        match token.kind {
            TokenKind::Eof => return keywords,
            TokenKind::Semicolon => boundary = true,
            TokenKind::LeftParen | TokenKind::Selector(_) if boundary => {}
            TokenKind::Keyword(keyword) if boundary => {
                if matches!(
                    keyword,
                    Keyword::Select
                        | Keyword::Insert
                        | Keyword::Update
                        | Keyword::Delete
                        | Keyword::Call
                ) {
                    keywords.push(keyword);
                }
                boundary = false;
            }
            _ => boundary = false,
        }
    }
}

/// Returns true when `sql` contains INSERT, UPDATE, DELETE or CALL
/// statements.
#[must_use]
pub fn is_write(sql: &str) -> bool {
    statement_keywords(sql)
        .iter()
        .any(|k| !matches!(k, Keyword::Select))
}

/// Returns the tables written by INSERT, UPDATE and DELETE, in order of
/// first appearance. Comments and quoted literals are ignored.
#[must_use]
pub fn write_tables(sql: &str) -> Vec<String> {
    let code = blank_spans(sql, &opaque_spans(sql));
    let mut tables: Vec<String> = Vec::new();
    for caps in WRITE_TARGET.captures_iter(&code) {
        let table = &caps[1];
        if !tables.iter().any(|t| t.eq_ignore_ascii_case(table)) {
            tables.push(table.to_string());
        }
    }
    tables
}

/// Collects the SET, VALUES and WHERE comparisons of a write template.
///
/// Statements are parsed with every `#if` block removed; each block body is
/// then parsed as a standalone predicate. Fragments that do not parse are
/// skipped with a warning.
#[must_use]
pub fn write_criteria(sql: &str) -> Vec<Criterion> {
    let text = strip_directives(&remove_cond_blocks(sql));
    let mut out = Vec::new();
    match Parser::new(&text).parse_statements() {
        Ok(statements) => {
            for statement in &statements {
                statement_criteria(statement, &mut out);
            }
        }
        Err(error) => warn!(%error, "write statement is opaque"),
    }
    for block in cond_blocks(sql) {
        let body = strip_directives(block.body_text(sql));
        match Parser::new(&body).parse_predicate() {
            Ok(predicate) => collect(&predicate, &mut out),
            Err(error) => trace!(%error, body = %body.trim(), "conditional body is not a predicate"),
        }
    }
    out
}

fn statement_criteria(statement: &Statement, out: &mut Vec<Criterion>) {
    let predicate = match statement {
        Statement::Update(update) => {
            for assignment in &update.assignments {
                out.push(Criterion::new(&assignment.column, "=", &assignment.value));
            }
            update.where_clause.as_ref()
        }
        Statement::Delete(delete) => delete.where_clause.as_ref(),
        Statement::Insert(insert) => {
            if let InsertSource::Values(rows) = &insert.values {
                for row in rows {
                    for (column, value) in insert.columns.iter().zip(row) {
                        out.push(Criterion::new(column, "=", value));
                    }
                }
            }
            None
        }
        Statement::Select(select) => select.where_clause.as_ref(),
    };
    if let Some(predicate) = predicate {
        collect(predicate, out);
    }
}

fn is_column(text: &str) -> bool {
    !text.is_empty()
        && Matcher::Identifier.matches(text, 0) == text.len()
        && !text.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Quoted,
    Selector,
    Other,
}

const SCAN: &[TokenDef<Scan>] = &[
    TokenDef::new(Scan::Quoted, "quoted", Matcher::Quoted),
    TokenDef::new(Scan::Selector, "selector", Matcher::Selector),
    TokenDef::new(Scan::Other, "character", Matcher::Any),
];

/// Returns the parameter holders referenced in `text`, builtins excluded.
fn referenced_holders(text: &str, config: &CompilerConfig) -> Vec<String> {
    let mut cursor = Cursor::new(text);
    let mut holders = Vec::new();
    while let Matched::Token(m) = cursor.next(SCAN) {
        if m.code != Scan::Selector {
            continue;
        }
        let parts = SelectorParts::parse(m.text(text), config);
        if !config.is_builtin(&parts.head) && parts.is_simple() {
            holders.push(parts.holder);
        }
    }
    holders
}

/// Attaches a column typer to every untyped parameter compared with a column.
pub fn bind_typers(view: &mut ViewMeta, criteria: &[Criterion], config: &CompilerConfig) {
    for criterion in criteria {
        let (column, operand) = if is_column(&criterion.left) {
            (&criterion.left, &criterion.right)
        } else if is_column(&criterion.right) {
            (&criterion.right, &criterion.left)
        } else {
            continue;
        };
        for holder in referenced_holders(operand, config) {
            if let Some(parameter) = view.parameter_mut(&holder) {
                if parameter.typer.is_none() {
                    trace!(parameter = %holder, column = %column, "typed by criterion");
                    parameter.typer = Some(Typer::column(column));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Comment,
    Quoted,
    Semicolon,
    Space,
    Other,
}

const PARTS: &[TokenDef<Part>] = &[
    TokenDef::new(Part::Comment, "comment", Matcher::Comment),
    TokenDef::new(Part::Quoted, "quoted", Matcher::Quoted),
    TokenDef::new(Part::Semicolon, ";", Matcher::Char(b';')),
    TokenDef::new(Part::Space, "whitespace", Matcher::Whitespace),
    TokenDef::new(Part::Other, "character", Matcher::Any),
];

/// Returns the comments and quoted literals of `sql`.
fn opaque_spans(sql: &str) -> Vec<Span> {
    let mut cursor = Cursor::new(sql);
    let mut spans = Vec::new();
    while let Matched::Token(m) = cursor.next(PARTS) {
        if matches!(m.code, Part::Comment | Part::Quoted) {
            spans.push(m.span);
        }
    }
    spans
}

/// Counts the `;`-separated statements of `sql`.
fn count_statements(sql: &str) -> usize {
    let mut cursor = Cursor::new(sql);
    let mut count = 0;
    let mut open = false;
    while let Matched::Token(m) = cursor.next(PARTS) {
        match m.code {
            Part::Semicolon => open = false,
            Part::Comment | Part::Space => {}
            Part::Quoted | Part::Other => {
                if !open {
                    count += 1;
                    open = true;
                }
            }
        }
    }
    count
}

/// Fails when the SQL governing a write parameter holds several statements.
///
/// # Errors
///
/// Returns [`CompileError::Multiplicity`] with the statement count.
pub fn check_multiplicity(parameter: &str, sql: &str) -> Result<()> {
    let count = count_statements(sql);
    if count > 1 {
        return Err(CompileError::Multiplicity {
            parameter: parameter.to_string(),
            count,
        });
    }
    Ok(())
}
