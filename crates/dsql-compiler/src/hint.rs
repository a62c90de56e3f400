//! Comment hints.
//!
//! A hint is a `/* ... */` comment carrying JSON, JSON followed by SQL, or
//! plain SQL. Statement hints lead the whole statement, relation hints lead a
//! sub-select body and parameter hints directly follow a selector:
//!
//! ```sql
//! /* {"Method":"PUT"} */
//! UPDATE AD_ORDER SET STATUS = $Status /* {"Required":true} */
//! ```

use std::collections::BTreeMap;

use dsql_core::cursor::{Cursor, Matched, Matcher, TokenDef, match_block};
use dsql_core::text::{Replacement, apply_replacements};
use dsql_core::Span;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::param::SelectorParts;
use crate::view::{Cardinality, ParameterKind};

/// A hint comment attached to a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterHint {
    /// Holder name of the selector the hint follows.
    pub parameter: String,
    /// The comment, delimiters included.
    pub hint: String,
    /// Location of the comment.
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Comment,
    Selector,
    Other,
}

const SCAN: &[TokenDef<Scan>] = &[
    TokenDef::new(Scan::Comment, "comment", Matcher::Comment),
    TokenDef::new(Scan::Selector, "selector", Matcher::Selector),
    TokenDef::new(Scan::Other, "text", Matcher::Any),
];

/// Returns the comment block that leads `text`, if any.
#[must_use]
pub fn extract_hint(text: &str) -> Option<&str> {
    leading_comment(text).map(|span| span.text(text))
}

/// Returns the span of the comment block that leads `text`.
#[must_use]
pub fn leading_comment(text: &str) -> Option<Span> {
    let start = Matcher::Whitespace.matches(text, 0);
    let n = Matcher::Comment.matches(text, start);
    (n > 0).then(|| Span::new(start, start + n))
}

/// Finds every comment that directly follows a selector.
#[must_use]
pub fn extract_parameter_hints(text: &str, config: &CompilerConfig) -> Vec<ParameterHint> {
    let mut cursor = Cursor::new(text);
    let mut hints = Vec::new();
    while let Matched::Token(m) = cursor.next(SCAN) {
        if m.code != Scan::Selector {
            continue;
        }
        let after = m.span.end + Matcher::Whitespace.matches(text, m.span.end);
        let n = Matcher::Comment.matches(text, after);
        if n == 0 {
            continue;
        }
        let span = Span::new(after, after + n);
        let parts = SelectorParts::parse(m.text(text), config);
        hints.push(ParameterHint {
            parameter: parts.holder,
            hint: span.text(text).to_string(),
            span,
        });
        cursor.set_pos(span.end);
    }
    hints
}

/// Deletes previously extracted hints from `text`.
#[must_use]
pub fn remove_parameter_hints(text: &str, hints: &[ParameterHint]) -> String {
    let replacements = hints
        .iter()
        .filter(|h| h.span.text(text) == h.hint)
        .map(|h| Replacement::new(h.span, ""))
        .collect();
    apply_replacements(text, replacements)
}

/// Splits a hint into its JSON object and the SQL that follows it.
///
/// Comment delimiters are optional. A hint that does not start with `{` is
/// plain SQL and yields an empty JSON part.
#[must_use]
pub fn split_hint(hint: &str) -> (&str, &str) {
    let mut body = hint.trim();
    if let Some(inner) = body.strip_prefix("/*") {
        body = inner.strip_suffix("*/").unwrap_or(inner).trim();
    }
    if !body.starts_with('{') {
        return ("", body);
    }
    let n = match_block(body, 0, b'{', b'}');
    if n == 0 {
        // unbalanced: the last brace ends the object
        return match body.rfind('}') {
            Some(end) => (&body[..=end], body[end + 1..].trim()),
            None => (body, ""),
        };
    }
    (&body[..n], body[n..].trim())
}

/// Decodes the JSON part of a hint.
///
/// Returns `None` when the hint carries no JSON.
///
/// # Errors
///
/// Returns [`CompileError::HintDecode`] with the raw hint when decoding fails.
pub fn unmarshal_hint<T: DeserializeOwned>(hint: &str) -> Result<Option<T>> {
    let (json, _) = split_hint(hint);
    if json.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(json)
        .map(Some)
        .map_err(|source| CompileError::HintDecode {
            hint: hint.to_string(),
            source,
        })
}

/// Cache settings of a view or relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CacheHint {
    /// Cache name.
    pub name: Option<String>,
    /// Entry lifetime in milliseconds.
    pub time_to_live_ms: Option<u64>,
    /// Cache storage location.
    pub location: Option<String>,
}

/// Warmup values per parameter, used to pre-populate a cache.
pub type WarmupHint = BTreeMap<String, Vec<serde_json::Value>>;

/// Statement-level hint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ViewHint {
    /// Route URI.
    pub uri: Option<String>,
    /// HTTP method override.
    pub method: Option<String>,
    /// Database connector.
    pub connector: Option<String>,
    /// Output style.
    pub style: Option<String>,
    /// Output field name.
    pub field: Option<String>,
    /// Output cardinality.
    pub cardinality: Option<Cardinality>,
    /// Additional excluded output paths.
    pub exclude: Vec<String>,
    /// Cache settings.
    pub cache: Option<CacheHint>,
    /// Cache warmup values.
    pub warmup: Option<WarmupHint>,
    /// Required authorization.
    pub auth: Option<String>,
    /// Default row limit.
    pub limit: Option<u64>,
}

/// Hint leading a relation's sub-select.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RelationHint {
    /// Database connector override.
    pub connector: Option<String>,
    /// Output field name of the relation.
    pub field: Option<String>,
    /// Cache settings.
    pub cache: Option<CacheHint>,
    /// Cache warmup values.
    pub warmup: Option<WarmupHint>,
    /// Required authorization.
    pub auth: Option<String>,
    /// Cardinality override.
    pub cardinality: Option<Cardinality>,
}

/// Decoded JSON part of a parameter hint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ParameterConfig {
    /// Parameter location.
    pub kind: Option<ParameterKind>,
    /// Name at the location.
    pub location: Option<String>,
    /// Declared data type.
    pub data_type: Option<String>,
    /// Required override.
    pub required: Option<bool>,
    /// Cardinality override.
    pub cardinality: Option<Cardinality>,
    /// Value codec.
    pub codec: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_parameter_hints() {
        let text = "$abc\n$zyx \n/* first hint */\n\n$yyy\n\n$xx /* second hint */";
        let hints = extract_parameter_hints(text, &CompilerConfig::default());
        let pairs: Vec<_> = hints
            .iter()
            .map(|h| (h.parameter.as_str(), h.hint.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("zyx", "/* first hint */"), ("xx", "/* second hint */")]
        );
    }

    #[test]
    fn test_remove_parameter_hints() {
        let text = "ID = $Unsafe.Id /* {\"Required\":true} */ AND /* keep */ 1 = 1";
        let hints = extract_parameter_hints(text, &CompilerConfig::default());
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].parameter, "Id");
        assert_eq!(
            remove_parameter_hints(text, &hints),
            "ID = $Unsafe.Id  AND /* keep */ 1 = 1"
        );
    }

    #[test]
    fn test_extract_hint() {
        assert_eq!(
            extract_hint("\n  /* {\"Method\":\"GET\"} */ SELECT 1"),
            Some("/* {\"Method\":\"GET\"} */")
        );
        assert_eq!(extract_hint("SELECT 1 /* x */"), None);
    }

    #[test]
    fn test_split_hint() {
        assert_eq!(
            split_hint("/* {\"MaxConn\":2001} SELECT * FROM foo */"),
            ("{\"MaxConn\":2001}", "SELECT * FROM foo")
        );
        assert_eq!(
            split_hint("/* SELECT * FROM foo */"),
            ("", "SELECT * FROM foo")
        );
        assert_eq!(
            split_hint("{\"Kind\":\"data_view\"} SELECT ID FROM t WHERE ID = ${Id}"),
            ("{\"Kind\":\"data_view\"}", "SELECT ID FROM t WHERE ID = ${Id}")
        );
    }

    #[test]
    fn test_unmarshal_hint() {
        let config: ParameterConfig =
            unmarshal_hint("/* {\"Kind\":\"path\",\"Required\":true} */")
                .unwrap()
                .unwrap();
        assert_eq!(config.kind, Some(ParameterKind::Path));
        assert_eq!(config.required, Some(true));

        let none: Option<ParameterConfig> = unmarshal_hint("/* plain */").unwrap();
        assert!(none.is_none());

        let err = unmarshal_hint::<ViewHint>("/* {\"Limit\":\"ten\"} */").unwrap_err();
        match err {
            CompileError::HintDecode { hint, .. } => assert!(hint.contains("ten")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
