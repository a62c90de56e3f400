//! Compiler configuration.
//!
//! Every lookup table the compiler consults (namespaces, built-in identifiers,
//! SQL keywords) lives here, so several compilers with different dialects can
//! coexist in one process.

use serde::Deserialize;

use crate::error::{CompileError, Result};

/// Lookup tables and naming conventions used during compilation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CompilerConfig {
    /// Namespace of request parameters, e.g. `$Unsafe.Id`.
    pub params_namespace: String,
    /// Namespace of parameter presence metadata, e.g. `$Has.Id`.
    pub metadata_namespace: String,
    /// Namespace compile-time constants are rewritten into.
    pub constants_namespace: String,
    /// Predicate builder namespaces, e.g. `$and.Id`.
    pub predicate_namespaces: Vec<String>,
    /// Template function that binds a value as a SQL parameter.
    pub binding_function: String,
    /// Root identifiers that are never parameters.
    pub builtins: Vec<String>,
    /// Template functions that are never rewritten.
    pub standalone_functions: Vec<String>,
    /// Keywords tracked as the nearest preceding keyword of a parameter.
    pub reset_keywords: Vec<String>,
    /// Words never treated as column names by type inference.
    pub sql_keywords: Vec<String>,
    /// Root identifier referencing other views, e.g. `$View.orders.SQL`.
    pub view_reference: String,
}

const RESET_KEYWORDS: &[&str] = &[
    "AND", "OR", "WHERE", "FROM", "JOIN", "ON", "SELECT", "SET", "VALUES", "LIMIT", "OFFSET",
    "ORDER", "GROUP", "BY", "HAVING", "IN", "UNION", "NOT", "LIKE", "BETWEEN", "IS",
];

const SQL_KEYWORDS: &[&str] = &[
    "INSERT", "INTO", "UPDATE", "DELETE", "CALL", "AS", "DISTINCT", "ALL", "CASE", "WHEN", "THEN",
    "ELSE", "END", "NULL", "EXISTS", "ASC", "DESC", "LEFT", "RIGHT", "INNER", "OUTER", "FULL",
    "CROSS", "USING", "EXCEPT", "INTERSECT", "CAST", "WITH", "ANY", "SOME", "ESCAPE",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        let reset_keywords = strings(RESET_KEYWORDS);
        let mut sql_keywords = reset_keywords.clone();
        sql_keywords.extend(strings(SQL_KEYWORDS));
        Self {
            params_namespace: "Unsafe".to_string(),
            metadata_namespace: "Has".to_string(),
            constants_namespace: "Unsafe".to_string(),
            predicate_namespaces: strings(&["and", "or", "where"]),
            binding_function: "criteria.AppendBinding".to_string(),
            builtins: strings(&[
                "criteria",
                "sql",
                "sqlx",
                "logger",
                "fmt",
                "sequencer",
                "differ",
                "http",
                "response",
                "predicate",
                "View",
                "ParentView",
            ]),
            standalone_functions: strings(&["Nop", "Len", "IndexBy", "Contains"]),
            reset_keywords,
            sql_keywords,
            view_reference: "View".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Loads a configuration from JSON; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Config`] when the JSON does not decode.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(CompileError::Config)
    }

    /// Returns true for root identifiers excluded from parameterization.
    #[must_use]
    pub fn is_builtin(&self, name: &str) -> bool {
        name == self.view_reference || self.builtins.iter().any(|b| b == name)
    }

    /// Returns true for standalone template functions such as `$Len`.
    #[must_use]
    pub fn is_standalone_function(&self, name: &str) -> bool {
        self.standalone_functions.iter().any(|f| f == name)
    }

    /// Returns true for a namespace segment that precedes the holder name.
    #[must_use]
    pub fn is_namespace(&self, segment: &str) -> bool {
        segment == self.params_namespace
            || segment == self.metadata_namespace
            || self.predicate_namespaces.iter().any(|ns| ns == segment)
    }

    /// Returns true for keywords that reset the nearest preceding keyword.
    #[must_use]
    pub fn is_reset_keyword(&self, word: &str) -> bool {
        self.reset_keywords
            .iter()
            .any(|kw| kw.eq_ignore_ascii_case(word))
    }

    /// Returns true for SQL reserved words.
    #[must_use]
    pub fn is_sql_keyword(&self, word: &str) -> bool {
        self.sql_keywords.iter().any(|kw| kw.eq_ignore_ascii_case(word))
    }

    /// Returns the namespaced reference to a request parameter.
    #[must_use]
    pub fn param_ref(&self, path: &str) -> String {
        format!("{}.{path}", self.params_namespace)
    }

    /// Returns the namespaced reference to a compile-time constant.
    #[must_use]
    pub fn constant_ref(&self, path: &str) -> String {
        format!("{}.{path}", self.constants_namespace)
    }

    /// Wraps a reference body in the binding call.
    ///
    /// `binding_call("Unsafe.Id")` gives `criteria.AppendBinding($Unsafe.Id)`.
    #[must_use]
    pub fn binding_call(&self, body: &str) -> String {
        format!("{}(${body})", self.binding_function)
    }
}
