//! Lexical contexts of selector occurrences.

use std::collections::HashSet;

use dsql_core::template::{Position, Selector, Site, Template, Visitor, walk};

use crate::config::CompilerConfig;

/// Lexical context a selector appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextKind {
    /// Not seen by the template walk.
    #[default]
    Unspecified,
    /// Either side of `#set`.
    Set,
    /// An `#if` or `#elseif` condition.
    If,
    /// Item or collection of `#foreach`.
    ForEach,
    /// Plain SQL position.
    Append,
    /// A call argument.
    Func,
}

impl ContextKind {
    /// Returns true for contexts that feed template logic rather than SQL.
    #[must_use]
    pub const fn is_directive(self) -> bool {
        matches!(self, Self::Set | Self::If | Self::ForEach | Self::Func)
    }
}

/// Context of one selector occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamContext {
    /// Holder name.
    pub name: String,
    /// Lexical context.
    pub kind: ContextKind,
    /// Byte offset of the selector's `$`.
    pub offset: usize,
    /// The selector sits inside an `#if` body.
    pub conditional: bool,
}

/// Contexts of every selector, ordered by offset, plus the declared locals.
#[derive(Debug, Clone, Default)]
pub struct Contexts {
    items: Vec<ParamContext>,
    locals: HashSet<String>,
}

impl Contexts {
    /// Walks `template` and tags every selector.
    #[must_use]
    pub fn build(template: &Template, config: &CompilerConfig) -> Self {
        let mut builder = Builder {
            config,
            contexts: Self::default(),
        };
        walk(&template.nodes, &mut builder);
        let mut contexts = builder.contexts;
        contexts.items.sort_by_key(|c| c.offset);
        contexts
    }

    /// Returns the contexts in source order.
    #[must_use]
    pub fn items(&self) -> &[ParamContext] {
        &self.items
    }

    /// Returns true when `name` is a loop variable or `#set` target.
    #[must_use]
    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains(name)
    }

    /// Returns every declared local.
    #[must_use]
    pub const fn locals(&self) -> &HashSet<String> {
        &self.locals
    }
}

struct Builder<'c> {
    config: &'c CompilerConfig,
    contexts: Contexts,
}

impl Visitor for Builder<'_> {
    fn selector(&mut self, selector: &Selector, path: &[&str], site: Site) {
        let namespaced = self.config.is_namespace(&selector.name) && !path.is_empty();
        let name = if namespaced {
            path[0].to_string()
        } else {
            selector.name.clone()
        };

        let kind = if site.call_arg {
            ContextKind::Func
        } else {
            match site.position {
                Position::Text => ContextKind::Append,
                Position::SetTarget | Position::SetValue => ContextKind::Set,
                Position::Condition => ContextKind::If,
                Position::LoopItem | Position::LoopSet => ContextKind::ForEach,
            }
        };

        let declares = matches!(site.position, Position::SetTarget | Position::LoopItem);
        if declares && !site.call_arg && !namespaced {
            self.contexts.locals.insert(name.clone());
        }

        self.contexts.items.push(ParamContext {
            name,
            kind,
            offset: selector.span.start,
            conditional: site.conditional,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsql_core::template::parse_template;

    fn build(input: &str) -> Contexts {
        let template = parse_template(input).unwrap();
        Contexts::build(&template, &CompilerConfig::default())
    }

    fn kinds(contexts: &Contexts) -> Vec<(&str, ContextKind)> {
        contexts
            .items()
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect()
    }

    #[test]
    fn test_context_kinds() {
        let contexts = build(
            "#set($limit = $Unsafe.Limit) \
             SELECT * FROM t WHERE ID = $Id \
             #if($Has.Name) AND NAME = $criteria.AppendBinding($Unsafe.Name) #end \
             #foreach($r in $Unsafe.Rows) $r.ID #end LIMIT $limit",
        );
        assert_eq!(
            kinds(&contexts),
            vec![
                ("limit", ContextKind::Set),
                ("Limit", ContextKind::Set),
                ("Id", ContextKind::Append),
                ("Name", ContextKind::If),
                ("criteria", ContextKind::Append),
                ("Name", ContextKind::Func),
                ("r", ContextKind::ForEach),
                ("Rows", ContextKind::ForEach),
                ("r", ContextKind::Append),
                ("limit", ContextKind::Append),
            ]
        );
        assert!(contexts.is_local("limit"));
        assert!(contexts.is_local("r"));
        assert!(!contexts.is_local("Limit"));
        assert!(!contexts.is_local("Id"));
    }

    #[test]
    fn test_conditional_flag() {
        let contexts = build("A = $A #if($Has.B) AND B = $B #end");
        let flags: Vec<_> = contexts
            .items()
            .iter()
            .map(|c| (c.name.as_str(), c.conditional))
            .collect();
        assert_eq!(flags, vec![("A", false), ("B", false), ("B", true)]);
    }

    #[test]
    fn test_comments_are_not_walked() {
        let contexts = build("SELECT /* $Hidden */ $Shown");
        assert_eq!(kinds(&contexts), vec![("Shown", ContextKind::Append)]);
    }
}
