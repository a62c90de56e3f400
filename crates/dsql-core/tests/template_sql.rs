//! Tests that combine the template layer with the SQL parser: directives are
//! walked or stripped, and the remaining SQL still parses.

mod common;
use common::*;

use dsql_core::cursor::{Cursor, Matched, Matcher, TokenDef};
use dsql_core::template::{
    Node, Position, Selector, Site, Visitor, cond_blocks, remove_cond_blocks, strip_directives, walk,
};
use dsql_core::{Replacement, Span, apply_replacements};

const TEMPLATE: &str = "SELECT o.* FROM ORDERS o WHERE 1 = 1\n\
    #if($Has.Status) AND o.STATUS = $Status #end\n\
    #foreach($id in $Ids) AND o.ID <> $id #end";

#[derive(Default)]
struct Names(Vec<(String, Position, bool)>);

impl Visitor for Names {
    fn selector(&mut self, selector: &Selector, _path: &[&str], site: Site) {
        self.0
            .push((selector.name.clone(), site.position, site.conditional));
    }
}

#[test]
fn walk_reports_every_selector_in_order() {
    let template = template(TEMPLATE);
    let mut names = Names::default();
    walk(&template.nodes, &mut names);
    assert_eq!(
        names.0,
        vec![
            ("Has".to_string(), Position::Condition, false),
            ("Status".to_string(), Position::Text, true),
            ("id".to_string(), Position::LoopItem, false),
            ("Ids".to_string(), Position::LoopSet, false),
            ("id".to_string(), Position::Text, false),
        ]
    );
}

#[test]
fn top_level_nodes() {
    let template = template(TEMPLATE);
    assert!(matches!(template.nodes[0], Node::Text(_)));
    assert!(template.nodes.iter().any(|n| matches!(n, Node::If { .. })));
    assert!(template.nodes.iter().any(|n| matches!(n, Node::ForEach { .. })));
}

#[test]
fn stripped_template_parses() {
    let s = parse_stripped(TEMPLATE);
    assert!(matches!(&s.from, Some(dsql_core::ast::TableRef::Table { name, .. }) if name == "ORDERS"));
    let predicate = s.where_clause.unwrap().to_string();
    assert!(predicate.starts_with("1 = 1 AND o.STATUS = $Status"));
}

#[test]
fn stripping_keeps_offsets() {
    let stripped = strip_directives(TEMPLATE);
    assert_eq!(stripped.len(), TEMPLATE.len());
    assert_eq!(stripped.find("$Status"), TEMPLATE.find("$Status"));
}

#[test]
fn removing_conditional_blocks() {
    let blocks = cond_blocks(TEMPLATE);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].condition_text(TEMPLATE), "$Has.Status");
    let without = remove_cond_blocks(TEMPLATE);
    assert!(!without.contains("STATUS"));
    assert!(without.contains("#foreach"));
}

#[test]
fn replacements_shift_later_offsets() {
    let text = "A = $a AND B = $b";
    let out = apply_replacements(
        text,
        vec![
            Replacement::new(Span::new(15, 17), "$Unsafe.b"),
            Replacement::new(Span::new(4, 6), "$criteria.AppendBinding($Unsafe.a)"),
        ],
    );
    assert_eq!(out, "A = $criteria.AppendBinding($Unsafe.a) AND B = $Unsafe.b");
}

#[test]
fn cursor_scans_selectors_and_blocks() {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tok {
        Space,
        Selector,
        Block,
        Word,
    }
    const DEFS: &[TokenDef<Tok>] = &[
        TokenDef::new(Tok::Space, "whitespace", Matcher::Whitespace),
        TokenDef::new(Tok::Selector, "selector", Matcher::Selector),
        TokenDef::new(Tok::Block, "block", Matcher::Block { open: b'(', close: b')' }),
        TokenDef::new(Tok::Word, "word", Matcher::Word),
    ];
    let text = "IN ($Unsafe.Ids) ${Name}";
    let mut cursor = Cursor::new(text);
    let mut seen = Vec::new();
    while let Matched::Token(m) = cursor.next(DEFS) {
        if m.code != Tok::Space {
            seen.push((m.code, m.text(text)));
        }
    }
    assert!(cursor.is_eof());
    assert_eq!(
        seen,
        vec![
            (Tok::Word, "IN"),
            (Tok::Block, "($Unsafe.Ids)"),
            (Tok::Selector, "${Name}"),
        ]
    );
}
