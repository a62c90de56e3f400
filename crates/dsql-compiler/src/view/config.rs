//! Per-view configuration handed to the serving layer.

use std::fmt;

use dsql_core::lexer::Keyword;
use tracing::warn;

use super::parameter::Cardinality;
use crate::hint::{CacheHint, ViewHint, WarmupHint};
use crate::table::TableGraph;

/// HTTP method a view is served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Parses a method name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        [Self::Get, Self::Post, Self::Put, Self::Delete]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    /// Derives the method from the leading keywords of the statements.
    ///
    /// A single statement kind maps to its natural method; mixed statements
    /// and procedure calls are served with POST.
    #[must_use]
    pub fn infer(keywords: &[Keyword]) -> Self {
        let Some(first) = keywords.first() else {
            return Self::Get;
        };
        if keywords.iter().any(|k| k != first) {
            return Self::Post;
        }
        match first {
            Keyword::Select => Self::Get,
            Keyword::Update => Self::Put,
            Keyword::Delete => Self::Delete,
            _ => Self::Post,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serving settings of one relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationConfig {
    /// Dotted output path of the relation, e.g. `Items.Parts`.
    pub path: String,
    /// Child table name.
    pub table: String,
    /// Child table alias.
    pub alias: String,
    /// Rows per owner row.
    pub cardinality: Cardinality,
    /// Join keys as `owner = child` text.
    pub keys: Vec<String>,
    /// Connector override.
    pub connector: Option<String>,
    /// Cache settings.
    pub cache: Option<CacheHint>,
    /// Cache warmup values.
    pub warmup: Option<WarmupHint>,
    /// Required authorization.
    pub auth: Option<String>,
}

/// Serving settings of a compiled view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewConfig {
    /// Output field of the view.
    pub name: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Route URI.
    pub uri: Option<String>,
    /// Database connector.
    pub connector: Option<String>,
    /// Output style.
    pub style: Option<String>,
    /// Output cardinality.
    pub cardinality: Cardinality,
    /// Excluded output paths.
    pub exclude: Vec<String>,
    /// Cache settings.
    pub cache: Option<CacheHint>,
    /// Cache warmup values.
    pub warmup: Option<WarmupHint>,
    /// Required authorization.
    pub auth: Option<String>,
    /// Default row limit.
    pub limit: Option<u64>,
    /// Relations, depth first.
    pub relations: Vec<RelationConfig>,
}

impl ViewConfig {
    /// Combines statement shape, statement hint and table graph.
    #[must_use]
    pub fn build(keywords: &[Keyword], hint: Option<&ViewHint>, tables: Option<&TableGraph>) -> Self {
        let inferred = HttpMethod::infer(keywords);
        let method = match hint.and_then(|h| h.method.as_deref()) {
            Some(name) => HttpMethod::parse(name).unwrap_or_else(|| {
                warn!(method = name, "unknown method in hint, using {inferred}");
                inferred
            }),
            None => inferred,
        };

        let mut config = Self {
            method,
            cardinality: Cardinality::Many,
            ..Self::default()
        };
        if let Some(graph) = tables {
            config.name.clone_from(&graph.root().holder);
            config.exclude = graph.excluded_paths();
            collect_relations(graph, 0, "", &mut config.relations);
        }
        if let Some(hint) = hint {
            config.uri.clone_from(&hint.uri);
            config.connector.clone_from(&hint.connector);
            config.style.clone_from(&hint.style);
            config.cache.clone_from(&hint.cache);
            config.warmup.clone_from(&hint.warmup);
            config.auth.clone_from(&hint.auth);
            config.limit = hint.limit;
            if let Some(field) = &hint.field {
                config.name.clone_from(field);
            }
            if let Some(cardinality) = hint.cardinality {
                config.cardinality = cardinality;
            }
            for path in &hint.exclude {
                if !config.exclude.contains(path) {
                    config.exclude.push(path.clone());
                }
            }
        }
        config
    }
}

fn collect_relations(graph: &TableGraph, owner: usize, prefix: &str, out: &mut Vec<RelationConfig>) {
    for relation in graph.relations_of(owner) {
        let child = &graph.tables()[relation.child];
        let path = format!("{prefix}{}", child.holder);
        let hint = child.hint.as_ref();
        out.push(RelationConfig {
            path: path.clone(),
            table: child.name.clone(),
            alias: child.alias.clone(),
            cardinality: relation.cardinality,
            keys: relation.keys.iter().map(ToString::to_string).collect(),
            connector: hint.and_then(|h| h.connector.clone()),
            cache: hint.and_then(|h| h.cache.clone()),
            warmup: hint.and_then(|h| h.warmup.clone()),
            auth: hint.and_then(|h| h.auth.clone()),
        });
        if relation.child != owner {
            collect_relations(graph, relation.child, &format!("{path}."), out);
        }
    }
}
