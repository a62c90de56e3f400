//! Template header declaring out-of-band parameters.
//!
//! ```sql
//! /*TEMPLATE
//!   PARAMETER Auth header:Authorization:string:true
//!   PARAMETER Page query:page:int
//! */
//! SELECT * FROM ORDERS
//! ```

use dsql_core::Span;
use dsql_core::cursor::{Cursor, CursorError, Matched, Matcher, TokenDef};

use crate::error::Result;
use crate::hint::leading_comment;
use crate::view::{Parameter, ParameterKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok {
    Template,
    Parameter,
    Word,
    Colon,
    Value,
}

const TEMPLATE: &[TokenDef<Tok>] = &[TokenDef::new(Tok::Template, "TEMPLATE", Matcher::Fragment("TEMPLATE"))];
const PARAMETER: &[TokenDef<Tok>] = &[TokenDef::new(Tok::Parameter, "PARAMETER", Matcher::Fragment("PARAMETER"))];
const WORD: &[TokenDef<Tok>] = &[TokenDef::new(Tok::Word, "word", Matcher::Word)];
const COLON: &[TokenDef<Tok>] = &[TokenDef::new(Tok::Colon, ":", Matcher::Char(b':'))];
const VALUE: &[TokenDef<Tok>] = &[TokenDef::new(Tok::Value, "value", Matcher::Until(b": \t\r\n,"))];

/// One `PARAMETER` entry of a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderParameter {
    /// Parameter id.
    pub id: String,
    /// Location kind.
    pub kind: ParameterKind,
    /// Name at the location.
    pub name: String,
    /// Declared data type.
    pub data_type: Option<String>,
    /// Declared required flag.
    pub required: Option<bool>,
}

impl HeaderParameter {
    /// Converts the entry into a view parameter.
    #[must_use]
    pub fn to_parameter(&self) -> Parameter {
        let mut parameter = Parameter::new(self.id.clone())
            .kind(self.kind)
            .required(self.required.unwrap_or(false));
        parameter.name.clone_from(&self.name);
        parameter.data_type.clone_from(&self.data_type);
        parameter
    }
}

/// A parsed `/*TEMPLATE ... */` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateHeader {
    /// Declared parameters in order.
    pub parameters: Vec<HeaderParameter>,
    /// Location of the header comment.
    pub span: Span,
}

impl TemplateHeader {
    /// Parses the header leading `text`.
    ///
    /// Returns `None` when the leading comment, if any, is not a header.
    ///
    /// # Errors
    ///
    /// Returns a lexical error naming the missing piece of a malformed
    /// `PARAMETER` entry.
    pub fn parse(text: &str) -> Result<Option<Self>> {
        let Some(span) = leading_comment(text) else {
            return Ok(None);
        };
        let mut cursor = Cursor::bounded(text, Span::new(span.start + 2, span.end - 2));
        cursor.skip_whitespace();
        if !matches!(cursor.next(TEMPLATE), Matched::Token(_)) {
            return Ok(None);
        }

        let mut parameters = Vec::new();
        loop {
            cursor.skip_whitespace();
            if cursor.is_eof() {
                break;
            }
            cursor.expect(PARAMETER)?;
            cursor.skip_whitespace();
            let id = cursor.expect(WORD)?.text(text).to_string();
            cursor.skip_whitespace();

            let at = cursor.pos();
            let word = cursor.expect(WORD)?.text(text);
            let kind = ParameterKind::parse(word)
                .ok_or_else(|| CursorError::new("parameter kind", at, word))?;
            cursor.expect(COLON)?;
            let name = cursor.expect(VALUE)?.text(text).to_string();

            let mut data_type = None;
            let mut required = None;
            if cursor.peek_byte() == Some(b':') {
                cursor.expect(COLON)?;
                data_type = Some(cursor.expect(VALUE)?.text(text).to_string());
                if cursor.peek_byte() == Some(b':') {
                    cursor.expect(COLON)?;
                    let at = cursor.pos();
                    let word = cursor.expect(WORD)?.text(text);
                    required = Some(match word.to_ascii_lowercase().as_str() {
                        "true" => true,
                        "false" => false,
                        _ => return Err(CursorError::new("true or false", at, word).into()),
                    });
                }
            }
            parameters.push(HeaderParameter {
                id,
                kind,
                name,
                data_type,
                required,
            });
        }
        Ok(Some(Self { parameters, span }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;

    #[test]
    fn test_parse_header() {
        let sql = "/*TEMPLATE\n  PARAMETER Auth header:X-Auth:string:true\n  PARAMETER Page query:page\n*/\nSELECT 1";
        let header = TemplateHeader::parse(sql).unwrap().unwrap();
        assert_eq!(
            header.parameters,
            vec![
                HeaderParameter {
                    id: "Auth".to_string(),
                    kind: ParameterKind::Header,
                    name: "X-Auth".to_string(),
                    data_type: Some("string".to_string()),
                    required: Some(true),
                },
                HeaderParameter {
                    id: "Page".to_string(),
                    kind: ParameterKind::Query,
                    name: "page".to_string(),
                    data_type: None,
                    required: None,
                },
            ]
        );
        assert_eq!(header.span.text(sql), &sql[..sql.find("*/").unwrap() + 2]);

        let parameter = header.parameters[0].to_parameter();
        assert_eq!(parameter.name, "X-Auth");
        assert!(parameter.required);
    }

    #[test]
    fn test_not_a_header() {
        assert_eq!(TemplateHeader::parse("/* {\"Method\":\"GET\"} */ SELECT 1").unwrap(), None);
        assert_eq!(TemplateHeader::parse("SELECT 1").unwrap(), None);
    }

    #[test]
    fn test_lexical_errors() {
        let err = TemplateHeader::parse("/*TEMPLATE PARAMETER Id path */").unwrap_err();
        match err {
            CompileError::Lexical(e) => assert_eq!(e.expected, ":"),
            other => panic!("unexpected {other:?}"),
        }
        let err = TemplateHeader::parse("/*TEMPLATE PARAMETER Id planet:x */").unwrap_err();
        assert!(matches!(err, CompileError::Lexical(ref e) if e.expected == "parameter kind"));
        let err = TemplateHeader::parse("/*TEMPLATE PARAMETER Id path:id:int:maybe */").unwrap_err();
        assert!(matches!(err, CompileError::Lexical(ref e) if e.expected == "true or false"));
    }
}
