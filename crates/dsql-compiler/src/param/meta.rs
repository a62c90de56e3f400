//! Selector occurrences.

use dsql_core::Span;
use dsql_core::cursor::is_ident_part;

use crate::config::CompilerConfig;
use crate::context::ContextKind;
use crate::typer::Typer;

/// A selector split into namespace, holder and trailing path.
///
/// `$!{Unsafe.Order.ID}` has prefix `Unsafe`, holder `Order` and tail `.ID`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorParts {
    /// `$!` form.
    pub quiet: bool,
    /// `${...}` form.
    pub braced: bool,
    /// First path segment.
    pub head: String,
    /// Namespace segment preceding the holder.
    pub prefix: Option<String>,
    /// Bare holder name.
    pub holder: String,
    /// Member and index suffix after the holder.
    pub tail: String,
}

fn ident_len(text: &str) -> usize {
    text.bytes().take_while(|b| is_ident_part(*b)).count()
}

impl SelectorParts {
    /// Splits selector text as matched by the cursor.
    #[must_use]
    pub fn parse(text: &str, config: &CompilerConfig) -> Self {
        let mut body = text.strip_prefix('$').unwrap_or(text);
        let quiet = body.starts_with('!');
        if quiet {
            body = &body[1..];
        }
        let braced = body.starts_with('{') && body.ends_with('}');
        if braced {
            body = &body[1..body.len() - 1];
        }
        let n = ident_len(body);
        let head = &body[..n];
        let rest = &body[n..];

        if config.is_namespace(head) {
            if let Some(after) = rest.strip_prefix('.') {
                let m = ident_len(after);
                if m > 0 {
                    return Self {
                        quiet,
                        braced,
                        head: head.to_string(),
                        prefix: Some(head.to_string()),
                        holder: after[..m].to_string(),
                        tail: after[m..].to_string(),
                    };
                }
            }
        }
        Self {
            quiet,
            braced,
            head: head.to_string(),
            prefix: None,
            holder: head.to_string(),
            tail: rest.to_string(),
        }
    }

    /// Returns true when nothing follows the holder.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.tail.is_empty()
    }

    /// Returns the holder with its trailing path, without namespace.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}{}", self.holder, self.tail)
    }

    /// Renders a reference body (the text after `$`) in this selector's form.
    #[must_use]
    pub fn render(&self, body: &str) -> String {
        let quiet = if self.quiet { "!" } else { "" };
        if self.braced {
            format!("${quiet}{{{body}}}")
        } else {
            format!("${quiet}{body}")
        }
    }
}

/// One selector occurrence produced by the parameter iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMeta {
    /// Location of the selector.
    pub span: Span,
    /// Raw selector text.
    pub text: String,
    /// Parsed selector.
    pub parts: SelectorParts,
    /// Lexical context of the occurrence.
    pub context: ContextKind,
    /// The occurrence sits inside an `#if` body.
    pub conditional: bool,
    /// The holder is a template-local variable.
    pub is_variable: bool,
    /// Zero-based occurrence index of the holder.
    pub occurrence: usize,
    /// Inferred type.
    pub meta_type: Option<Typer>,
    /// Nearest reset keyword preceding the selector.
    pub last_keyword: Option<String>,
}

impl ParamMeta {
    /// Returns the bare holder name.
    #[must_use]
    pub fn holder(&self) -> &str {
        &self.parts.holder
    }

    /// Returns the namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.parts.prefix.as_deref()
    }

    /// Returns true inside an `IN` membership predicate.
    #[must_use]
    pub fn is_repeated(&self) -> bool {
        self.last_keyword
            .as_deref()
            .is_some_and(|kw| kw.eq_ignore_ascii_case("IN"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(text: &str) -> SelectorParts {
        SelectorParts::parse(text, &CompilerConfig::default())
    }

    #[test]
    fn test_plain_and_namespaced() {
        let p = parts("$Status");
        assert_eq!((p.prefix.as_deref(), p.holder.as_str()), (None, "Status"));
        assert!(p.is_simple());

        let p = parts("$Unsafe.Status");
        assert_eq!(p.prefix.as_deref(), Some("Unsafe"));
        assert_eq!(p.holder, "Status");
        assert!(p.is_simple());

        let p = parts("$r.ID");
        assert_eq!(p.prefix, None);
        assert_eq!(p.holder, "r");
        assert_eq!(p.tail, ".ID");
        assert!(!p.is_simple());
    }

    #[test]
    fn test_braced_quiet_render() {
        let p = parts("$!{Unsafe.Order.ID}");
        assert!(p.quiet && p.braced);
        assert_eq!(p.holder, "Order");
        assert_eq!(p.path(), "Order.ID");
        assert_eq!(p.render("x"), "$!{x}");
        assert_eq!(parts("$Id").render("Unsafe.Id"), "$Unsafe.Id");
    }

    #[test]
    fn test_namespace_alone_is_holder() {
        let p = parts("$Unsafe");
        assert_eq!(p.prefix, None);
        assert_eq!(p.holder, "Unsafe");
    }
}
