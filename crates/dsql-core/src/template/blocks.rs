//! Text-level helpers for `#if ... #end` blocks and directive tokens.
//!
//! These work on raw text without building a template tree, so they also
//! accept fragments that would not parse as a whole template.

use crate::cursor::{Cursor, Matched, Matcher, TokenDef, match_block};
use crate::lexer::Span;
use crate::text::blank_spans;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Comment,
    Quoted,
    Directive,
    Other,
}

const SCAN: &[TokenDef<Scan>] = &[
    TokenDef::new(Scan::Comment, "comment", Matcher::Comment),
    TokenDef::new(Scan::Quoted, "string", Matcher::Quoted),
    TokenDef::new(Scan::Directive, "directive", Matcher::Directive),
    TokenDef::new(Scan::Other, "text", Matcher::Any),
];

/// A directive token found in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Directive<'a> {
    name: &'a str,
    /// The keyword plus its parenthesised argument, if any.
    span: Span,
    /// The parenthesised argument without the parentheses.
    args: Option<Span>,
}

fn directives(text: &str) -> Vec<Directive<'_>> {
    let mut cursor = Cursor::new(text);
    let mut found = Vec::new();
    while let Matched::Token(m) = cursor.next(SCAN) {
        if m.code != Scan::Directive {
            continue;
        }
        let name = &m.text(text)[1..];
        let takes_args = ["if", "elseif", "set", "foreach"]
            .iter()
            .any(|d| name.eq_ignore_ascii_case(d));
        let closes = ["end", "else"].iter().any(|d| name.eq_ignore_ascii_case(d));
        if takes_args {
            let mut after = m.span.end;
            after += Matcher::Whitespace.matches(text, after);
            let n = match_block(text, after, b'(', b')');
            if n == 0 {
                continue;
            }
            cursor.set_pos(after + n);
            found.push(Directive {
                name,
                span: Span::new(m.span.start, after + n),
                args: Some(Span::new(after + 1, after + n - 1)),
            });
        } else if closes {
            found.push(Directive {
                name,
                span: m.span,
                args: None,
            });
        }
    }
    found
}

fn is(directive: &Directive<'_>, name: &str) -> bool {
    directive.name.eq_ignore_ascii_case(name)
}

fn opens_block(directive: &Directive<'_>) -> bool {
    is(directive, "if") || is(directive, "foreach")
}

/// A top-level `#if(...) ... #end` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondBlock {
    /// Range from `#if` through `#end`.
    pub span: Span,
    /// The condition inside `#if(...)`.
    pub condition: Span,
    /// Everything between the condition and the matching `#end`.
    pub body: Span,
}

impl CondBlock {
    /// Returns the condition text.
    #[must_use]
    pub fn condition_text<'a>(&self, text: &'a str) -> &'a str {
        self.condition.text(text)
    }

    /// Returns the body text.
    #[must_use]
    pub fn body_text<'a>(&self, text: &'a str) -> &'a str {
        self.body.text(text)
    }
}

/// Returns every top-level `#if ... #end` block in `text`.
#[must_use]
pub fn cond_blocks(text: &str) -> Vec<CondBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<Directive<'_>> = None;
    let mut depth = 0usize;
    for directive in directives(text) {
        if opens_block(&directive) {
            if depth == 0 && is(&directive, "if") {
                open = Some(directive);
            }
            depth += 1;
        } else if is(&directive, "end") && depth > 0 {
            depth -= 1;
            if depth == 0 {
                if let Some(start) = open.take() {
                    let condition = start.args.unwrap_or_default();
                    blocks.push(CondBlock {
                        span: Span::new(start.span.start, directive.span.end),
                        condition,
                        body: Span::new(start.span.end, directive.span.start),
                    });
                }
            }
        }
    }
    blocks
}

/// Returns the first top-level `#if ... #end` block in `text`.
#[must_use]
pub fn extract_cond_block(text: &str) -> Option<CondBlock> {
    cond_blocks(text).into_iter().next()
}

/// Removes every top-level `#if ... #end` block, keeping the surrounding text.
#[must_use]
pub fn remove_cond_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for block in cond_blocks(text) {
        out.push_str(&text[copied..block.span.start]);
        copied = block.span.end;
    }
    out.push_str(&text[copied..]);
    out
}

/// Blanks every directive token (`#if(...)`, `#elseif(...)`, `#else`, `#end`,
/// `#set(...)`, `#foreach(...)`) with spaces. Bodies are kept, and byte
/// offsets of the remaining SQL are unchanged.
#[must_use]
pub fn strip_directives(text: &str) -> String {
    let spans: Vec<Span> = directives(text).iter().map(|d| d.span).collect();
    blank_spans(text, &spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQL: &str = "SELECT * FROM t WHERE 1=1 #if($Has.Id) AND ID = $Id #end ORDER BY 1";

    #[test]
    fn test_extract_cond_block() {
        let block = extract_cond_block(SQL).unwrap();
        assert_eq!(block.condition_text(SQL), "$Has.Id");
        assert_eq!(block.body_text(SQL), " AND ID = $Id ");
        assert_eq!(block.span.text(SQL), "#if($Has.Id) AND ID = $Id #end");
    }

    #[test]
    fn test_nested_blocks_are_one_block() {
        let sql = "#if($a) #foreach($x in $y) $x #end #if($b) B #end #end tail";
        let blocks = cond_blocks(sql);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].span.end, sql.len() - 5);
    }

    #[test]
    fn test_remove_cond_blocks() {
        assert_eq!(
            remove_cond_blocks(SQL),
            "SELECT * FROM t WHERE 1=1  ORDER BY 1"
        );
        assert_eq!(remove_cond_blocks("no blocks"), "no blocks");
    }

    #[test]
    fn test_strip_directives_keeps_offsets() {
        let stripped = strip_directives(SQL);
        assert_eq!(stripped.len(), SQL.len());
        assert!(!stripped.contains('#'));
        assert_eq!(stripped.find("AND ID = $Id"), SQL.find("AND ID = $Id"));
    }

    #[test]
    fn test_directives_in_comments_and_strings_are_ignored() {
        let sql = "SELECT '#if(x)' /* #end */ FROM t";
        assert!(cond_blocks(sql).is_empty());
        assert_eq!(strip_directives(sql), sql);
    }
}
