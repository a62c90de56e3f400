//! Rewrites raw selectors into safe references.

use std::collections::HashMap;

use dsql_core::text::{Replacement, apply_replacements};
use tracing::trace;

use crate::config::CompilerConfig;
use crate::context::ContextKind;
use crate::error::Result;
use crate::param::{ParamIterator, ParamMeta};

/// Applies the selector rewrite rules.
///
/// For each occurrence, in order of precedence:
///
/// 1. standalone functions stay as they are;
/// 2. compile-time constants move into the constants namespace;
/// 3. locals used by template logic lose the params namespace, if any;
/// 4. locals read as SQL values lose the params namespace or get bound;
/// 5. external parameters get namespaced, and bound when they reach SQL.
///
/// The first `#set` or `#foreach` occurrence of a local declares it and is
/// never touched.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer<'a> {
    config: &'a CompilerConfig,
    constants: &'a HashMap<String, serde_json::Value>,
}

impl<'a> Sanitizer<'a> {
    /// Creates a sanitizer.
    #[must_use]
    pub const fn new(
        config: &'a CompilerConfig,
        constants: &'a HashMap<String, serde_json::Value>,
    ) -> Self {
        Self { config, constants }
    }

    /// Returns the rewritten selector, or `None` when it stays unchanged.
    #[must_use]
    pub fn replacement(&self, meta: &ParamMeta) -> Option<String> {
        let config = self.config;
        let parts = &meta.parts;
        let prefix = meta.prefix();
        let in_params = prefix == Some(config.params_namespace.as_str());

        if meta.is_variable
            && meta.occurrence == 0
            && matches!(meta.context, ContextKind::Set | ContextKind::ForEach)
        {
            return None;
        }
        if config.is_standalone_function(&parts.head) {
            return None;
        }
        if self.constants.contains_key(meta.holder()) {
            if prefix == Some(config.constants_namespace.as_str()) {
                return None;
            }
            return Some(parts.render(&config.constant_ref(&parts.path())));
        }
        if meta.is_variable {
            if in_params {
                return Some(parts.render(&parts.path()));
            }
            if meta.context.is_directive() {
                return None;
            }
            // metadata and predicate namespaces stay on the reference
            let reference = match prefix {
                Some(namespace) => format!("{namespace}.{}", parts.path()),
                None => parts.path(),
            };
            return Some(parts.render(&config.binding_call(&reference)));
        }
        if prefix.is_some() {
            return None;
        }
        let reference = config.param_ref(&parts.path());
        if meta.context.is_directive() {
            Some(parts.render(&reference))
        } else {
            Some(parts.render(&config.binding_call(&reference)))
        }
    }

    /// Rewrites `text` at the spans of `metas`.
    ///
    /// `text` must be the text the metas were scanned from.
    #[must_use]
    pub fn rewrite(&self, text: &str, metas: &[ParamMeta]) -> String {
        let replacements = metas
            .iter()
            .filter_map(|meta| {
                let replacement = self.replacement(meta)?;
                trace!(from = %meta.text, to = %replacement, "rewrite selector");
                Some(Replacement::new(meta.span, replacement))
            })
            .collect();
        apply_replacements(text, replacements)
    }

    /// Strips parameter hints from `sql` and rewrites every selector.
    ///
    /// # Errors
    ///
    /// Returns a template error when the directives do not parse.
    pub fn sanitize(&self, sql: &str) -> Result<String> {
        let mut iter = ParamIterator::new(sql, self.config)?;
        let metas: Vec<ParamMeta> = iter.by_ref().collect();
        Ok(self.rewrite(iter.text(), &metas))
    }
}
