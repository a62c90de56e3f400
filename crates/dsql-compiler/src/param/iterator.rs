//! Pull-based iterator over parameter occurrences.

use std::collections::HashMap;

use dsql_core::cursor::{Cursor, Matched, Matcher, TokenDef, match_block};
use dsql_core::template::{Node, parse_template};
use tracing::trace;

use super::meta::{ParamMeta, SelectorParts};
use crate::config::CompilerConfig;
use crate::context::{ContextKind, Contexts};
use crate::error::Result;
use crate::hint::{ParameterHint, extract_parameter_hints, remove_parameter_hints};
use crate::infer::{Inference, infer_types};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Comment,
    Directive,
    Selector,
    Word,
    Other,
}

const SCAN: &[TokenDef<Scan>] = &[
    TokenDef::new(Scan::Comment, "comment", Matcher::Comment),
    TokenDef::new(Scan::Directive, "directive", Matcher::Directive),
    TokenDef::new(Scan::Selector, "selector", Matcher::Selector),
    TokenDef::new(Scan::Word, "word", Matcher::Word),
    TokenDef::new(Scan::Other, "character", Matcher::Any),
];

/// Iterates over the non-builtin selectors of a template in source order.
///
/// Construction strips parameter hints first, then walks the template for
/// contexts and infers types, all over the same hint-free text, so offsets
/// line up between the passes. [`ParamIterator::has`] stages the next
/// occurrence and [`Iterator::next`] hands it out.
#[derive(Debug)]
pub struct ParamIterator<'c> {
    config: &'c CompilerConfig,
    text: String,
    pos: usize,
    hints: Vec<ParameterHint>,
    contexts: Contexts,
    inference: Inference,
    templated: bool,
    next_context: usize,
    /// End of the current directive's argument list.
    directive_end: usize,
    counter: usize,
    occurrences: HashMap<String, usize>,
    last_keyword: Option<String>,
    staged: Option<ParamMeta>,
}

impl<'c> ParamIterator<'c> {
    /// Prepares iteration over `sql`.
    ///
    /// # Errors
    ///
    /// Returns a template error when the directives do not parse.
    pub fn new(sql: &str, config: &'c CompilerConfig) -> Result<Self> {
        let hints = extract_parameter_hints(sql, config);
        let text = remove_parameter_hints(sql, &hints);
        let template = parse_template(&text)?;
        let contexts = Contexts::build(&template, config);
        let templated = template
            .nodes
            .iter()
            .any(|node| matches!(node, Node::Set { .. } | Node::If { .. } | Node::ForEach { .. }));
        let inference = infer_types(&text, config);
        trace!(
            hints = hints.len(),
            contexts = contexts.items().len(),
            templated,
            "parameter iterator ready"
        );
        Ok(Self {
            config,
            text,
            pos: 0,
            hints,
            contexts,
            inference,
            templated,
            next_context: 0,
            directive_end: 0,
            counter: 0,
            occurrences: HashMap::new(),
            last_keyword: None,
            staged: None,
        })
    }

    /// Advances to the next parameter occurrence.
    ///
    /// Returns false once the text is exhausted. Calling it again before
    /// taking the staged occurrence does not advance.
    pub fn has(&mut self) -> bool {
        let Self {
            config,
            text,
            pos,
            contexts,
            inference,
            next_context,
            directive_end,
            counter,
            occurrences,
            last_keyword,
            staged,
            ..
        } = self;
        if staged.is_some() {
            return true;
        }
        let mut cursor = Cursor::new(text);
        cursor.set_pos(*pos);
        while let Matched::Token(m) = cursor.next(SCAN) {
            match m.code {
                Scan::Comment | Scan::Other => {}
                Scan::Directive => {
                    let after = m.span.end + Matcher::Whitespace.matches(text, m.span.end);
                    *directive_end = after + match_block(text, after, b'(', b')');
                }
                Scan::Word => {
                    let word = m.text(text);
                    if m.span.start >= *directive_end && config.is_reset_keyword(word) {
                        *last_keyword = Some(word.to_ascii_uppercase());
                    }
                }
                Scan::Selector => {
                    *counter += 1;
                    let items = contexts.items();
                    while items
                        .get(*next_context)
                        .is_some_and(|c| c.offset < m.span.start)
                    {
                        *next_context += 1;
                    }
                    let context = items
                        .get(*next_context)
                        .filter(|c| c.offset == m.span.start);
                    if context.is_some() {
                        *next_context += 1;
                    }

                    let raw = m.text(text);
                    let parts = SelectorParts::parse(raw, config);
                    if config.is_builtin(&parts.head) {
                        continue;
                    }
                    let seen = occurrences.entry(parts.holder.clone()).or_insert(0);
                    let occurrence = *seen;
                    *seen += 1;
                    let meta_type = if parts.is_simple() {
                        inference.typers.get(&parts.holder).cloned()
                    } else {
                        None
                    };
                    *staged = Some(ParamMeta {
                        span: m.span,
                        text: raw.to_string(),
                        is_variable: contexts.is_local(&parts.holder),
                        parts,
                        context: context.map_or(ContextKind::Unspecified, |c| c.kind),
                        conditional: context.is_some_and(|c| c.conditional),
                        occurrence,
                        meta_type,
                        last_keyword: last_keyword.clone(),
                    });
                    *pos = cursor.pos();
                    return true;
                }
            }
        }
        *pos = text.len();
        false
    }

    /// Returns the hint-free text the iterator scans.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the parameter hints removed from the input.
    #[must_use]
    pub fn hints(&self) -> &[ParameterHint] {
        &self.hints
    }

    /// Returns the selector contexts.
    #[must_use]
    pub const fn contexts(&self) -> &Contexts {
        &self.contexts
    }

    /// Returns the inferred types.
    #[must_use]
    pub const fn inference(&self) -> &Inference {
        &self.inference
    }

    /// Returns true when the template uses `#set`, `#if` or `#foreach`.
    #[must_use]
    pub const fn is_templated(&self) -> bool {
        self.templated
    }

    /// Returns how many selectors were matched so far, builtins included.
    #[must_use]
    pub const fn selectors_seen(&self) -> usize {
        self.counter
    }

    /// Returns the compiler configuration.
    #[must_use]
    pub const fn config(&self) -> &'c CompilerConfig {
        self.config
    }
}

impl Iterator for ParamIterator<'_> {
    type Item = ParamMeta;

    fn next(&mut self) -> Option<ParamMeta> {
        if self.has() {
            self.staged.take()
        } else {
            None
        }
    }
}
