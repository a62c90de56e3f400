//! Template parser.
//!
//! Splits a template into SQL text, comments, `$` references and the
//! `#set`/`#if`/`#foreach` directives. Directive expressions are parsed with
//! binding powers in the same manner as the SQL expression parser.

use super::ast::{BinaryOp, Branch, Expr, Literal, Node, Selector, Template, UnaryOp};
use super::error::TemplateError;
use crate::cursor::{Cursor, Matched, Matcher, TokenDef, is_ident_start, match_block};
use crate::lexer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Comment,
    Directive,
    Reference,
    Plain,
    Other,
}

const SEGMENTS: &[TokenDef<Segment>] = &[
    TokenDef::new(Segment::Comment, "comment", Matcher::Comment),
    TokenDef::new(Segment::Directive, "directive", Matcher::Directive),
    TokenDef::new(Segment::Reference, "selector", Matcher::Selector),
    TokenDef::new(Segment::Plain, "text", Matcher::Until(b"$#/")),
    TokenDef::new(Segment::Other, "character", Matcher::Any),
];

const OPERATORS: &[TokenDef<BinaryOp>] = &[
    TokenDef::new(BinaryOp::Eq, "==", Matcher::Fragment("==")),
    TokenDef::new(BinaryOp::NotEq, "!=", Matcher::Fragment("!=")),
    TokenDef::new(BinaryOp::LtEq, "<=", Matcher::Fragment("<=")),
    TokenDef::new(BinaryOp::GtEq, ">=", Matcher::Fragment(">=")),
    TokenDef::new(BinaryOp::And, "&&", Matcher::Fragment("&&")),
    TokenDef::new(BinaryOp::Or, "||", Matcher::Fragment("||")),
    TokenDef::new(BinaryOp::Lt, "<", Matcher::Char(b'<')),
    TokenDef::new(BinaryOp::Gt, ">", Matcher::Char(b'>')),
    TokenDef::new(BinaryOp::Add, "+", Matcher::Char(b'+')),
    TokenDef::new(BinaryOp::Sub, "-", Matcher::Char(b'-')),
    TokenDef::new(BinaryOp::Mul, "*", Matcher::Char(b'*')),
    TokenDef::new(BinaryOp::Div, "/", Matcher::Char(b'/')),
    TokenDef::new(BinaryOp::Mod, "%", Matcher::Char(b'%')),
    TokenDef::new(BinaryOp::And, "and", Matcher::Fragment("and")),
    TokenDef::new(BinaryOp::Or, "or", Matcher::Fragment("or")),
    TokenDef::new(BinaryOp::Eq, "eq", Matcher::Fragment("eq")),
    TokenDef::new(BinaryOp::NotEq, "ne", Matcher::Fragment("ne")),
    TokenDef::new(BinaryOp::LtEq, "le", Matcher::Fragment("le")),
    TokenDef::new(BinaryOp::GtEq, "ge", Matcher::Fragment("ge")),
    TokenDef::new(BinaryOp::Lt, "lt", Matcher::Fragment("lt")),
    TokenDef::new(BinaryOp::Gt, "gt", Matcher::Fragment("gt")),
];

/// Binding power of prefix operators.
const PREFIX_BP: u8 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    End,
    Else,
    ElseIf,
}

/// Parses a whole template.
///
/// # Errors
///
/// Returns a [`TemplateError`] for unbalanced or malformed directives.
pub fn parse_template(input: &str) -> Result<Template, TemplateError> {
    TemplateParser::new(input).parse()
}

/// Recursive descent parser over template text.
pub struct TemplateParser<'a> {
    cursor: Cursor<'a>,
}

impl<'a> TemplateParser<'a> {
    /// Creates a parser for `input`.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            cursor: Cursor::new(input),
        }
    }

    /// Parses the template.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] for unbalanced or malformed directives.
    pub fn parse(mut self) -> Result<Template, TemplateError> {
        let (nodes, terminator) = self.parse_nodes()?;
        if let Some((terminator, span)) = terminator {
            let directive = match terminator {
                Terminator::End => "#end",
                Terminator::Else => "#else",
                Terminator::ElseIf => "#elseif",
            };
            return Err(TemplateError::new(
                format!("{directive} without matching opening directive"),
                span,
            ));
        }
        Ok(Template { nodes })
    }

    fn input(&self) -> &'a str {
        self.cursor.input()
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        let pos = self.cursor.pos();
        let end = self.input()[pos..]
            .chars()
            .next()
            .map_or(pos, |c| pos + c.len_utf8());
        TemplateError::new(message, Span::new(pos, end))
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input().as_bytes().get(self.cursor.pos() + offset).copied()
    }

    fn advance(&mut self, n: usize) {
        self.cursor.set_pos(self.cursor.pos() + n);
    }

    fn expect_byte(&mut self, b: u8, what: &str) -> Result<(), TemplateError> {
        self.cursor.skip_whitespace();
        if self.cursor.peek_byte() == Some(b) {
            self.advance(1);
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn parse_nodes(&mut self) -> Result<(Vec<Node>, Option<(Terminator, Span)>), TemplateError> {
        let mut nodes = Vec::new();
        loop {
            let m = match self.cursor.next(SEGMENTS) {
                Matched::Token(m) => m,
                Matched::Eof => return Ok((nodes, None)),
                Matched::Invalid(_) => return Err(self.error("unexpected input")),
            };
            match m.code {
                Segment::Comment => nodes.push(Node::Comment(m.span)),
                Segment::Plain | Segment::Other => push_text(&mut nodes, m.span),
                Segment::Reference => {
                    self.cursor.set_pos(m.span.start);
                    let (expr, span) = self.parse_reference()?;
                    nodes.push(Node::Reference { expr, span });
                }
                Segment::Directive => {
                    let name = m.text(self.input())[1..].to_ascii_lowercase();
                    match name.as_str() {
                        "set" => nodes.push(self.parse_set(m.span.start)?),
                        "if" => nodes.push(self.parse_if(m.span.start)?),
                        "foreach" => nodes.push(self.parse_foreach(m.span.start)?),
                        "end" => return Ok((nodes, Some((Terminator::End, m.span)))),
                        "else" => return Ok((nodes, Some((Terminator::Else, m.span)))),
                        "elseif" => return Ok((nodes, Some((Terminator::ElseIf, m.span)))),
                        _ => push_text(&mut nodes, m.span),
                    }
                }
            }
        }
    }

    fn parse_set(&mut self, start: usize) -> Result<Node, TemplateError> {
        self.expect_byte(b'(', "( after #set")?;
        let target = self.parse_expr(0)?;
        self.expect_byte(b'=', "= in #set")?;
        let value = self.parse_expr(0)?;
        self.expect_byte(b')', ") closing #set")?;
        Ok(Node::Set {
            target,
            value,
            span: Span::new(start, self.cursor.pos()),
        })
    }

    fn parse_condition(&mut self, directive: &str) -> Result<Expr, TemplateError> {
        self.expect_byte(b'(', &format!("( after {directive}"))?;
        let condition = self.parse_expr(0)?;
        self.expect_byte(b')', &format!(") closing {directive}"))?;
        Ok(condition)
    }

    fn parse_if(&mut self, start: usize) -> Result<Node, TemplateError> {
        let mut branches = Vec::new();
        let mut condition = self.parse_condition("#if")?;
        loop {
            let (body, terminator) = self.parse_nodes()?;
            branches.push(Branch { condition, body });
            match terminator {
                Some((Terminator::ElseIf, _)) => condition = self.parse_condition("#elseif")?,
                Some((Terminator::Else, _)) => {
                    let (otherwise, terminator) = self.parse_nodes()?;
                    return match terminator {
                        Some((Terminator::End, end)) => Ok(Node::If {
                            branches,
                            otherwise: Some(otherwise),
                            span: Span::new(start, end.end),
                        }),
                        Some((_, span)) => Err(TemplateError::new(
                            "unexpected branch after #else",
                            span,
                        )),
                        None => Err(TemplateError::new(
                            "unterminated #if",
                            Span::new(start, start + 3),
                        )),
                    };
                }
                Some((Terminator::End, end)) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                        span: Span::new(start, end.end),
                    });
                }
                None => {
                    return Err(TemplateError::new(
                        "unterminated #if",
                        Span::new(start, start + 3),
                    ));
                }
            }
        }
    }

    fn parse_foreach(&mut self, start: usize) -> Result<Node, TemplateError> {
        self.expect_byte(b'(', "( after #foreach")?;
        self.cursor.skip_whitespace();
        if self.cursor.peek_byte() != Some(b'$') {
            return Err(self.error("expected loop variable"));
        }
        let (item, _) = self.parse_reference()?;
        self.cursor.skip_whitespace();
        let n = Matcher::Fragment("in").matches(self.input(), self.cursor.pos());
        if n == 0 {
            return Err(self.error("expected `in` in #foreach"));
        }
        self.advance(n);
        let set = self.parse_expr(0)?;
        self.expect_byte(b')', ") closing #foreach")?;
        let (body, terminator) = self.parse_nodes()?;
        match terminator {
            Some((Terminator::End, end)) => Ok(Node::ForEach {
                item,
                set,
                body,
                span: Span::new(start, end.end),
            }),
            Some((_, span)) => Err(TemplateError::new("branch directive inside #foreach", span)),
            None => Err(TemplateError::new(
                "unterminated #foreach",
                Span::new(start, start + 8),
            )),
        }
    }

    /// Parses `$name`, `$!name` or `${...}` with its member, index and call
    /// suffixes. The cursor must be on the `$`.
    fn parse_reference(&mut self) -> Result<(Expr, Span), TemplateError> {
        let start = self.cursor.pos();
        self.advance(1);
        let quiet = self.cursor.peek_byte() == Some(b'!');
        if quiet {
            self.advance(1);
        }
        let braced = self.cursor.peek_byte() == Some(b'{');
        if braced {
            self.advance(1);
        }
        let name = self.parse_ident()?;
        let mut expr = Expr::Selector(Selector {
            name,
            span: Span::new(start, self.cursor.pos()),
            braced,
            quiet,
        });
        expr = self.parse_postfix(expr)?;
        if braced {
            self.expect_byte(b'}', "} closing reference")?;
        }
        Ok((expr, Span::new(start, self.cursor.pos())))
    }

    fn parse_ident(&mut self) -> Result<String, TemplateError> {
        if !self.cursor.peek_byte().is_some_and(is_ident_start) {
            return Err(self.error("expected identifier"));
        }
        let pos = self.cursor.pos();
        let n = Matcher::Word.matches(self.input(), pos);
        self.advance(n);
        Ok(self.input()[pos..pos + n].to_string())
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, TemplateError> {
        loop {
            let pos = self.cursor.pos();
            match self.cursor.peek_byte() {
                Some(b'.') if self.peek_at(1).is_some_and(is_ident_start) => {
                    self.advance(1);
                    let name = self.parse_ident()?;
                    expr = Expr::Member {
                        base: Box::new(expr),
                        name,
                    };
                }
                Some(b'[') if match_block(self.input(), pos, b'[', b']') > 0 => {
                    self.advance(1);
                    let index = self.parse_expr(0)?;
                    self.expect_byte(b']', "] closing index")?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(b'(') if match_block(self.input(), pos, b'(', b')') > 0 => {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, TemplateError> {
        self.advance(1);
        let mut args = Vec::new();
        self.cursor.skip_whitespace();
        if self.cursor.peek_byte() == Some(b')') {
            self.advance(1);
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(0)?);
            self.cursor.skip_whitespace();
            match self.cursor.peek_byte() {
                Some(b',') => self.advance(1),
                Some(b')') => {
                    self.advance(1);
                    return Ok(args);
                }
                _ => return Err(self.error("expected , or ) in argument list")),
            }
        }
    }

    /// Parses a directive expression using binding powers.
    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, TemplateError> {
        let mut left = self.parse_prefix()?;
        loop {
            let save = self.cursor.pos();
            self.cursor.skip_whitespace();
            let op = match self.cursor.next(OPERATORS) {
                Matched::Token(m) => m.code,
                _ => {
                    self.cursor.set_pos(save);
                    break;
                }
            };
            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                self.cursor.set_pos(save);
                break;
            }
            let right = self.parse_expr(r_bp)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, TemplateError> {
        self.cursor.skip_whitespace();
        let pos = self.cursor.pos();
        match self.cursor.peek_byte() {
            None => Err(self.error("unexpected end of input in expression")),
            Some(b'$') => Ok(self.parse_reference()?.0),
            Some(b'(') => {
                self.advance(1);
                let inner = self.parse_expr(0)?;
                self.expect_byte(b')', ")")?;
                Ok(inner)
            }
            Some(b'[') => self.parse_list(),
            Some(b'!') if self.peek_at(1) != Some(b'=') => {
                self.advance(1);
                self.unary(UnaryOp::Not)
            }
            Some(b'-') => {
                self.advance(1);
                self.unary(UnaryOp::Neg)
            }
            Some(b'\'' | b'"') => {
                let n = Matcher::Quoted.matches(self.input(), pos);
                if n == 0 {
                    return Err(self.error("unterminated string literal"));
                }
                self.advance(n);
                Ok(Expr::Literal(Literal::String(unquote(
                    &self.input()[pos..pos + n],
                ))))
            }
            Some(b) if b.is_ascii_digit() => {
                let n = Matcher::Number.matches(self.input(), pos);
                if n == 0 {
                    return Err(self.error("invalid number"));
                }
                self.advance(n);
                let text = &self.input()[pos..pos + n];
                if let Ok(i) = text.parse::<i64>() {
                    Ok(Expr::Literal(Literal::Integer(i)))
                } else {
                    text.parse::<f64>()
                        .map(|f| Expr::Literal(Literal::Float(f)))
                        .map_err(|e| TemplateError::new(format!("invalid number: {e}"), Span::new(pos, pos + n)))
                }
            }
            Some(b) if is_ident_start(b) => {
                let word = self.parse_ident()?;
                match word.to_ascii_lowercase().as_str() {
                    "true" => Ok(Expr::Literal(Literal::Bool(true))),
                    "false" => Ok(Expr::Literal(Literal::Bool(false))),
                    "null" => Ok(Expr::Literal(Literal::Null)),
                    "not" => self.unary(UnaryOp::Not),
                    _ => Err(TemplateError::new(
                        format!("unexpected word `{word}` in expression"),
                        Span::new(pos, self.cursor.pos()),
                    )),
                }
            }
            Some(_) => Err(self.error("unexpected character in expression")),
        }
    }

    fn unary(&mut self, op: UnaryOp) -> Result<Expr, TemplateError> {
        let operand = self.parse_expr(PREFIX_BP)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_list(&mut self) -> Result<Expr, TemplateError> {
        self.advance(1);
        let mut items = Vec::new();
        self.cursor.skip_whitespace();
        if self.cursor.peek_byte() == Some(b']') {
            self.advance(1);
            return Ok(Expr::List(items));
        }
        loop {
            items.push(self.parse_expr(0)?);
            self.cursor.skip_whitespace();
            match self.cursor.peek_byte() {
                Some(b',') => self.advance(1),
                Some(b']') => {
                    self.advance(1);
                    return Ok(Expr::List(items));
                }
                _ => return Err(self.error("expected , or ] in list")),
            }
        }
    }
}

fn push_text(nodes: &mut Vec<Node>, span: Span) {
    if let Some(Node::Text(last)) = nodes.last_mut() {
        if last.end == span.start {
            last.end = span.end;
            return;
        }
    }
    nodes.push(Node::Text(span));
}

fn unquote(literal: &str) -> String {
    let quote = &literal[..1];
    let inner = &literal[1..literal.len() - 1];
    inner
        .replace(&format!("{quote}{quote}"), quote)
        .replace(&format!("\\{quote}"), quote)
}
