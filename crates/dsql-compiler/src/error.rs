//! Error types for the template compiler.

use dsql_core::template::TemplateError;
use dsql_core::{CursorError, ParseError};

/// Errors that abort the compilation of a statement.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// An expected token is missing from a template header or location grammar.
    #[error("lexical error: {0}")]
    Lexical(#[from] CursorError),

    /// The template directives are malformed.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The SQL could not be parsed.
    #[error("SQL parse error: {0}")]
    Parse(#[from] ParseError),

    /// A JSON hint failed to decode.
    #[error("invalid hint {hint}: {source}")]
    HintDecode {
        /// The raw hint text.
        hint: String,
        /// The decode error.
        source: serde_json::Error,
    },

    /// A write-mode parameter carries more than one SQL statement.
    #[error("parameter '{parameter}' declares {count} statements, expected one")]
    Multiplicity {
        /// Parameter id.
        parameter: String,
        /// Number of statements found.
        count: usize,
    },

    /// A join predicate or except list references an unknown alias.
    #[error("unresolved alias '{alias}' in {relation}")]
    UnresolvedAlias {
        /// The alias that could not be resolved.
        alias: String,
        /// The relation or clause the alias appeared in.
        relation: String,
    },

    /// A relation has no usable join key.
    #[error("relation '{relation}' has no join key")]
    MissingJoinKey {
        /// The relation alias.
        relation: String,
    },

    /// The column registry failed to resolve a table.
    #[error("failed to resolve columns of '{table}': {message}")]
    Registry {
        /// Table name.
        table: String,
        /// Error message.
        message: String,
    },

    /// The compiler configuration is invalid.
    #[error("invalid compiler configuration: {0}")]
    Config(#[source] serde_json::Error),
}

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use dsql_core::Span;

    #[test]
    fn test_messages() {
        let err = CompileError::Multiplicity {
            parameter: "Ids".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "parameter 'Ids' declares 2 statements, expected one"
        );

        let err: CompileError = TemplateError::new("unterminated #if", Span::new(0, 3)).into();
        assert!(err.to_string().starts_with("template error: unterminated #if"));
    }
}
