//! Offset-tracked text rewriting.

use crate::lexer::Span;

/// Replaces the bytes of `span` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Range in the original input.
    pub span: Span,
    /// Replacement text.
    pub text: String,
}

impl Replacement {
    /// Creates a replacement.
    #[must_use]
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }
}

/// Applies all replacements in a single forward pass.
///
/// Spans refer to the original input; earlier rewrites shift later ones
/// implicitly because the output is rebuilt segment by segment. Replacements
/// that overlap an already applied one are dropped.
#[must_use]
pub fn apply_replacements(input: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by_key(|r| (r.span.start, r.span.end));
    let extra: usize = replacements.iter().map(|r| r.text.len()).sum();
    let mut out = String::with_capacity(input.len() + extra);
    let mut copied = 0;
    for r in replacements {
        if r.span.start < copied || r.span.end > input.len() {
            continue;
        }
        out.push_str(&input[copied..r.span.start]);
        out.push_str(&r.text);
        copied = r.span.end;
    }
    out.push_str(&input[copied..]);
    out
}

/// Overwrites every span with spaces, keeping newlines and byte offsets intact.
#[must_use]
pub fn blank_spans(input: &str, spans: &[Span]) -> String {
    let mut bytes = input.as_bytes().to_vec();
    for span in spans {
        let end = span.end.min(bytes.len());
        for b in bytes.iter_mut().take(end).skip(span.start) {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    // whole characters are replaced, so multi-byte sequences never split
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_replacements_in_order() {
        let input = "a = $x AND b = $y";
        let out = apply_replacements(
            input,
            vec![
                Replacement::new(Span::new(15, 17), "bind($Unsafe.y)"),
                Replacement::new(Span::new(4, 6), "bind($Unsafe.x)"),
            ],
        );
        assert_eq!(out, "a = bind($Unsafe.x) AND b = bind($Unsafe.y)");
    }

    #[test]
    fn test_overlapping_replacement_is_dropped() {
        let out = apply_replacements(
            "abcdef",
            vec![
                Replacement::new(Span::new(0, 3), "X"),
                Replacement::new(Span::new(2, 4), "Y"),
            ],
        );
        assert_eq!(out, "Xdef");
    }

    #[test]
    fn test_blank_spans_keeps_offsets() {
        let input = "A #if($x)\nB #end C";
        let out = blank_spans(input, &[Span::new(2, 9), Span::new(12, 16)]);
        assert_eq!(out.len(), input.len());
        assert_eq!(out, format!("A{}\nB{}C", " ".repeat(8), " ".repeat(6)));
    }
}
