//! Depth-first traversal of a template.

use super::ast::{Expr, Node, Selector};

/// Syntactic position of a selector within the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// A reference in SQL text.
    Text,
    /// The left side of `#set`.
    SetTarget,
    /// The right side of `#set`.
    SetValue,
    /// An `#if` or `#elseif` condition.
    Condition,
    /// The loop variable of `#foreach`.
    LoopItem,
    /// The collection of `#foreach`.
    LoopSet,
}

/// Where a visited selector appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    /// Syntactic position.
    pub position: Position,
    /// The selector is an argument of a call.
    pub call_arg: bool,
    /// The selector sits inside an `#if` body.
    pub conditional: bool,
}

impl Site {
    const fn new(position: Position, conditional: bool) -> Self {
        Self {
            position,
            call_arg: false,
            conditional,
        }
    }
}

/// Callbacks invoked while walking a template.
pub trait Visitor {
    /// Called before a node's children are visited.
    fn enter(&mut self, _node: &Node) {}

    /// Called after a node's children are visited.
    fn leave(&mut self, _node: &Node) {}

    /// Called for every root selector, with the member names following it.
    fn selector(&mut self, selector: &Selector, path: &[&str], site: Site);
}

/// Walks `nodes` in source order.
pub fn walk<V: Visitor + ?Sized>(nodes: &[Node], visitor: &mut V) {
    walk_nodes(nodes, visitor, false);
}

fn walk_nodes<V: Visitor + ?Sized>(nodes: &[Node], visitor: &mut V, conditional: bool) {
    for node in nodes {
        visitor.enter(node);
        match node {
            Node::Text(_) | Node::Comment(_) => {}
            Node::Reference { expr, .. } => {
                walk_expr(expr, visitor, Site::new(Position::Text, conditional));
            }
            Node::Set { target, value, .. } => {
                walk_expr(target, visitor, Site::new(Position::SetTarget, conditional));
                walk_expr(value, visitor, Site::new(Position::SetValue, conditional));
            }
            Node::If {
                branches,
                otherwise,
                ..
            } => {
                for branch in branches {
                    walk_expr(
                        &branch.condition,
                        visitor,
                        Site::new(Position::Condition, conditional),
                    );
                    walk_nodes(&branch.body, visitor, true);
                }
                if let Some(otherwise) = otherwise {
                    walk_nodes(otherwise, visitor, true);
                }
            }
            Node::ForEach {
                item, set, body, ..
            } => {
                walk_expr(item, visitor, Site::new(Position::LoopItem, conditional));
                walk_expr(set, visitor, Site::new(Position::LoopSet, conditional));
                walk_nodes(body, visitor, conditional);
            }
        }
        visitor.leave(node);
    }
}

/// Walks an expression.
///
/// Member and index chains report only their root selector. Call arguments
/// along the chain are visited afterwards with `call_arg` set, except inside
/// a braced reference where the whole chain is one selector.
pub fn walk_expr<V: Visitor + ?Sized>(expr: &Expr, visitor: &mut V, site: Site) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Selector(selector) => visitor.selector(selector, &[], site),
        Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
            walk_chain(expr, visitor, site);
        }
        Expr::Unary { operand, .. } => walk_expr(operand, visitor, site),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, visitor, site);
            walk_expr(right, visitor, site);
        }
        Expr::List(items) => {
            for item in items {
                walk_expr(item, visitor, site);
            }
        }
    }
}

fn walk_chain<V: Visitor + ?Sized>(expr: &Expr, visitor: &mut V, site: Site) {
    let mut calls = Vec::new();
    let mut node = expr;
    loop {
        match node {
            Expr::Member { base, .. } | Expr::Index { base, .. } => node = base,
            Expr::Call { callee, args } => {
                calls.push(args);
                node = callee;
            }
            _ => break,
        }
    }
    let braced = match node {
        Expr::Selector(selector) => {
            visitor.selector(selector, &expr.path(), site);
            selector.braced
        }
        other => {
            walk_expr(other, visitor, site);
            false
        }
    };
    if braced {
        return;
    }
    let arg_site = Site {
        call_arg: true,
        ..site
    };
    for args in calls.into_iter().rev() {
        for arg in args {
            walk_expr(arg, visitor, arg_site);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse_template;

    #[derive(Default)]
    struct Collect(Vec<(String, Vec<String>, Site)>);

    impl Visitor for Collect {
        fn selector(&mut self, selector: &Selector, path: &[&str], site: Site) {
            self.0.push((
                selector.name.clone(),
                path.iter().map(ToString::to_string).collect(),
                site,
            ));
        }
    }

    fn collect(input: &str) -> Vec<(String, Vec<String>, Site)> {
        let template = parse_template(input).unwrap();
        let mut visitor = Collect::default();
        walk(&template.nodes, &mut visitor);
        visitor.0
    }

    #[test]
    fn test_sites() {
        let seen = collect(
            "#set($x = $Unsafe.A) #if($Has.B) B = $criteria.AppendBinding($Unsafe.B) #end \
             #foreach($r in $Unsafe.List) $r.ID #end",
        );
        let positions: Vec<_> = seen
            .iter()
            .map(|(name, _, site)| (name.as_str(), site.position, site.call_arg, site.conditional))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("x", Position::SetTarget, false, false),
                ("Unsafe", Position::SetValue, false, false),
                ("Has", Position::Condition, false, false),
                ("criteria", Position::Text, false, true),
                ("Unsafe", Position::Text, true, true),
                ("r", Position::LoopItem, false, false),
                ("Unsafe", Position::LoopSet, false, false),
                ("r", Position::Text, false, false),
            ]
        );
        assert_eq!(seen[1].1, vec!["A".to_string()]);
        assert_eq!(seen[3].1, vec!["AppendBinding".to_string()]);
    }

    #[test]
    fn test_index_and_braced_chains_report_root_only() {
        let seen = collect("$a[$b].c ${d.e($f)}");
        let names: Vec<_> = seen.iter().map(|(name, _, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "d"]);
    }
}
