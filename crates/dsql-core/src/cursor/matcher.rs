//! Byte-level matchers composed by [`Cursor`](super::Cursor).
//!
//! Every matcher takes the input and a start offset and returns the number of
//! bytes it matched, `0` meaning "no match". Matchers only ever stop on ASCII
//! boundaries, so returned lengths always land on UTF-8 character boundaries.

/// A composable token matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// One or more ASCII whitespace characters.
    Whitespace,
    /// One or more `[A-Za-z0-9_]` characters.
    Word,
    /// An identifier with optional dotted qualifiers (`t.ID`, `schema.table`).
    Identifier,
    /// An unsigned integer or decimal number with optional exponent.
    Number,
    /// A single literal byte.
    Char(u8),
    /// A balanced block such as `( ... )` or `[ ... ]`, quote and escape aware.
    Block {
        /// Opening byte.
        open: u8,
        /// Closing byte.
        close: u8,
    },
    /// A single or double quoted string with doubled-quote or backslash escapes.
    Quoted,
    /// A `/* ... */` comment block.
    Comment,
    /// A case-insensitive keyword or fragment.
    Fragment(&'static str),
    /// The first matching of several case-insensitive fragments.
    Fragments(&'static [&'static str]),
    /// A template selector: `$name`, `$!name`, `${name}`, `$a.b`, `$a[b]`.
    Selector,
    /// A template directive keyword such as `#if`, `#foreach` or `#end`.
    Directive,
    /// One or more bytes up to (not including) any of the stop bytes.
    Until(&'static [u8]),
    /// Exactly one character.
    Any,
}

impl Matcher {
    /// Returns the length of the match at `pos`, or `0` if nothing matched.
    #[must_use]
    pub fn matches(&self, input: &str, pos: usize) -> usize {
        if pos >= input.len() {
            return 0;
        }
        match *self {
            Self::Whitespace => match_whitespace(input, pos),
            Self::Word => match_word(input, pos),
            Self::Identifier => match_identifier(input, pos),
            Self::Number => match_number(input, pos),
            Self::Char(c) => usize::from(input.as_bytes()[pos] == c),
            Self::Block { open, close } => match_block(input, pos, open, close),
            Self::Quoted => match_quoted(input, pos),
            Self::Comment => match_comment(input, pos),
            Self::Fragment(fragment) => match_fragment(input, pos, fragment),
            Self::Fragments(fragments) => fragments
                .iter()
                .map(|fragment| match_fragment(input, pos, fragment))
                .find(|&n| n > 0)
                .unwrap_or(0),
            Self::Selector => match_selector(input, pos),
            Self::Directive => match_directive(input, pos),
            Self::Until(stops) => input.as_bytes()[pos..]
                .iter()
                .position(|b| stops.contains(b))
                .unwrap_or(input.len() - pos),
            Self::Any => input[pos..].chars().next().map_or(0, char::len_utf8),
        }
    }
}

/// Returns true for bytes that may start an identifier.
#[must_use]
pub const fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

/// Returns true for bytes that may continue an identifier.
#[must_use]
pub const fn is_ident_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn match_whitespace(input: &str, pos: usize) -> usize {
    input.as_bytes()[pos..]
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count()
}

fn match_word(input: &str, pos: usize) -> usize {
    input.as_bytes()[pos..]
        .iter()
        .take_while(|b| is_ident_part(**b))
        .count()
}

fn ident_len(bytes: &[u8], pos: usize) -> usize {
    match bytes.get(pos) {
        Some(b) if is_ident_start(*b) => bytes[pos..]
            .iter()
            .take_while(|b| is_ident_part(**b))
            .count(),
        _ => 0,
    }
}

fn match_identifier(input: &str, pos: usize) -> usize {
    let bytes = input.as_bytes();
    let mut i = pos + ident_len(bytes, pos);
    if i == pos {
        return 0;
    }
    while bytes.get(i) == Some(&b'.') {
        let n = ident_len(bytes, i + 1);
        if n == 0 {
            break;
        }
        i += 1 + n;
    }
    i - pos
}

fn match_number(input: &str, pos: usize) -> usize {
    let bytes = input.as_bytes();
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();
    let mut i = pos + digits(pos);
    if i == pos {
        return 0;
    }
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1 + digits(i + 1);
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp = digits(j);
        if exp > 0 {
            i = j + exp;
        }
    }
    if bytes.get(i).is_some_and(|b| is_ident_start(*b)) {
        // `1abc` is a word, not a number
        return 0;
    }
    i - pos
}

fn match_quoted(input: &str, pos: usize) -> usize {
    let bytes = input.as_bytes();
    let quote = bytes[pos];
    if quote != b'\'' && quote != b'"' {
        return 0;
    }
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    return i + 1 - pos;
                }
            }
            _ => i += 1,
        }
    }
    0
}

fn match_comment(input: &str, pos: usize) -> usize {
    if !input[pos..].starts_with("/*") {
        return 0;
    }
    input[pos + 2..].find("*/").map_or(0, |end| end + 4)
}

/// Matches a balanced block starting with `open` at `pos`.
///
/// Quoted strings inside the block are skipped as a unit and a backslash
/// escapes the following byte, so `(')')` or `(\))` do not close early.
/// Returns `0` when the block is not terminated.
#[must_use]
pub fn match_block(input: &str, pos: usize, open: u8, close: u8) -> usize {
    let bytes = input.as_bytes();
    if bytes.get(pos) != Some(&open) {
        return 0;
    }
    let mut depth = 0usize;
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'\'' | b'"' => {
                let n = match_quoted(input, i);
                i += n.max(1);
                continue;
            }
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return i + 1 - pos;
                }
            }
            _ => {}
        }
        i += 1;
    }
    0
}

fn match_fragment(input: &str, pos: usize, fragment: &str) -> usize {
    let end = pos + fragment.len();
    let Some(candidate) = input.get(pos..end) else {
        return 0;
    };
    if !candidate.eq_ignore_ascii_case(fragment) {
        return 0;
    }
    let ends_in_word = fragment.as_bytes().last().is_some_and(|b| is_ident_part(*b));
    if ends_in_word && input.as_bytes().get(end).is_some_and(|b| is_ident_part(*b)) {
        return 0;
    }
    fragment.len()
}

/// Matches a template selector at `pos`.
///
/// Recognized forms are `$name`, `$!name`, `${...}`, dotted paths (`$a.b.c`)
/// and bracket indexes (`$a[$i]`). A trailing call argument list is not part of
/// the selector.
#[must_use]
pub fn match_selector(input: &str, pos: usize) -> usize {
    let bytes = input.as_bytes();
    if bytes.get(pos) != Some(&b'$') {
        return 0;
    }
    let mut i = pos + 1;
    if bytes.get(i) == Some(&b'!') {
        i += 1;
    }
    if bytes.get(i) == Some(&b'{') {
        if !bytes.get(i + 1).is_some_and(|b| is_ident_start(*b)) {
            return 0;
        }
        let n = match_block(input, i, b'{', b'}');
        return if n == 0 { 0 } else { i + n - pos };
    }
    let n = ident_len(bytes, i);
    if n == 0 {
        return 0;
    }
    i += n;
    loop {
        match bytes.get(i) {
            Some(b'.') => {
                let n = ident_len(bytes, i + 1);
                if n == 0 {
                    break;
                }
                i += 1 + n;
            }
            Some(b'[') => {
                let n = match_block(input, i, b'[', b']');
                if n == 0 {
                    break;
                }
                i += n;
            }
            _ => break,
        }
    }
    i - pos
}

fn match_directive(input: &str, pos: usize) -> usize {
    let bytes = input.as_bytes();
    if bytes[pos] != b'#' {
        return 0;
    }
    let n = bytes[pos + 1..]
        .iter()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if n == 0 { 0 } else { n + 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched<'a>(matcher: Matcher, input: &'a str) -> &'a str {
        &input[..matcher.matches(input, 0)]
    }

    #[test]
    fn test_selector_forms() {
        assert_eq!(matched(Matcher::Selector, "$Id AND"), "$Id");
        assert_eq!(matched(Matcher::Selector, "${Id}x"), "${Id}");
        assert_eq!(matched(Matcher::Selector, "$!Name,"), "$!Name");
        assert_eq!(matched(Matcher::Selector, "$Unsafe.Id)"), "$Unsafe.Id");
        assert_eq!(matched(Matcher::Selector, "$a[$b].c + 1"), "$a[$b].c");
        assert_eq!(matched(Matcher::Selector, "$criteria.In(\"ID\")"), "$criteria.In");
        assert_eq!(matched(Matcher::Selector, "$Name. "), "$Name");
        assert_eq!(matched(Matcher::Selector, "$1"), "");
        assert_eq!(matched(Matcher::Selector, "${1}"), "");
    }

    #[test]
    fn test_block_is_quote_and_escape_aware() {
        assert_eq!(matched(Matcher::Block { open: b'(', close: b')' }, "(a, (b)) c"), "(a, (b))");
        assert_eq!(matched(Matcher::Block { open: b'(', close: b')' }, "(')') x"), "(')')");
        assert_eq!(matched(Matcher::Block { open: b'(', close: b')' }, r"(\)) x"), r"(\))");
        assert_eq!(matched(Matcher::Block { open: b'(', close: b')' }, "(a"), "");
    }

    #[test]
    fn test_fragment_respects_word_boundary() {
        assert_eq!(matched(Matcher::Fragment("IN"), "in ("), "in");
        assert_eq!(matched(Matcher::Fragment("IN"), "INSERT"), "");
        assert_eq!(matched(Matcher::Fragments(&["OR", "AND"]), "and x"), "and");
    }

    #[test]
    fn test_number_word_and_identifier() {
        assert_eq!(matched(Matcher::Number, "12.5e3)"), "12.5e3");
        assert_eq!(matched(Matcher::Number, "1abc"), "");
        assert_eq!(matched(Matcher::Word, "AD_ORDER SET"), "AD_ORDER");
        assert_eq!(matched(Matcher::Identifier, "t.ID = 1"), "t.ID");
        assert_eq!(matched(Matcher::Identifier, "user.* x"), "user");
    }

    #[test]
    fn test_quoted_comment_directive_until() {
        assert_eq!(matched(Matcher::Quoted, "'it''s' x"), "'it''s'");
        assert_eq!(matched(Matcher::Quoted, "'open"), "");
        assert_eq!(matched(Matcher::Comment, "/* hint */ $x"), "/* hint */");
        assert_eq!(matched(Matcher::Directive, "#foreach($a in $b)"), "#foreach");
        assert_eq!(matched(Matcher::Directive, "# x"), "");
        assert_eq!(matched(Matcher::Until(b":]"), "int:true]"), "int");
        assert_eq!(matched(Matcher::Any, "é"), "é");
    }
}
