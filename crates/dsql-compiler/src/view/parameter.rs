//! View parameters.

use serde::Deserialize;

use crate::typer::Typer;

/// How many rows a parameter or relation yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Cardinality {
    /// Exactly one.
    #[default]
    One,
    /// Zero or more.
    Many,
}

impl Cardinality {
    /// Returns the name used in hints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::One => "One",
            Self::Many => "Many",
        }
    }
}

/// Where a parameter value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// URL query string.
    #[default]
    Query,
    /// URL path segment.
    Path,
    /// HTTP header.
    Header,
    /// HTTP cookie.
    Cookie,
    /// Request body.
    Body,
    /// Literal value fixed at compile time.
    Literal,
    /// Result of another SQL statement.
    DataView,
    /// Compile-time constant.
    Const,
}

impl ParameterKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Query,
        Self::Path,
        Self::Header,
        Self::Cookie,
        Self::Body,
        Self::Literal,
        Self::DataView,
        Self::Const,
    ];

    /// Returns the name used in hints and headers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Body => "body",
            Self::Literal => "literal",
            Self::DataView => "data_view",
            Self::Const => "const",
        }
    }

    /// Parses a kind name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

/// An externally visible view parameter.
///
/// Parameters are deduplicated by id: see [`Parameter::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Unique id within the view, usually the holder name.
    pub id: String,
    /// Name at the parameter location, e.g. the query string key.
    pub name: String,
    /// Parameter location.
    pub kind: ParameterKind,
    /// The request must supply a value.
    pub required: bool,
    /// Declared or inferred data type.
    pub data_type: Option<String>,
    /// The parameter takes a list of values, e.g. inside `IN (...)`.
    pub repeated: bool,
    /// Cardinality of the value.
    pub cardinality: Cardinality,
    /// Type inferred from the surrounding SQL.
    pub typer: Option<Typer>,
    /// SQL of a data view parameter.
    pub sql: Option<String>,
    /// Value codec.
    pub codec: Option<String>,
    /// Full text of the first selector that referenced the parameter.
    pub selector: String,
    /// Byte offsets of every occurrence in the source.
    pub positions: Vec<usize>,
}

impl Parameter {
    /// Creates a query parameter named after its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: ParameterKind::default(),
            required: false,
            data_type: None,
            repeated: false,
            cardinality: Cardinality::One,
            typer: None,
            sql: None,
            codec: None,
            selector: String::new(),
            positions: Vec::new(),
        }
    }

    /// Sets the kind.
    #[must_use]
    pub const fn kind(mut self, kind: ParameterKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the required flag.
    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the repeated flag; repeated parameters have cardinality `Many`.
    #[must_use]
    pub const fn repeated(mut self, repeated: bool) -> Self {
        self.repeated = repeated;
        if repeated {
            self.cardinality = Cardinality::Many;
        }
        self
    }

    /// Merges a later occurrence into this parameter.
    ///
    /// Flags are OR-combined, positions are appended and fields already set
    /// on `self` win over the other occurrence.
    pub fn merge(&mut self, other: Self) {
        self.required |= other.required;
        self.repeated |= other.repeated;
        if self.repeated {
            self.cardinality = Cardinality::Many;
        }
        if self.typer.is_none() {
            self.typer = other.typer;
        }
        if self.data_type.is_none() {
            self.data_type = other.data_type;
        }
        if self.sql.is_none() {
            self.sql = other.sql;
        }
        if self.codec.is_none() {
            self.codec = other.codec;
        }
        if self.selector.is_empty() {
            self.selector = other.selector;
        }
        for pos in other.positions {
            if !self.positions.contains(&pos) {
                self.positions.push(pos);
            }
        }
    }

    /// Returns the column this parameter is compared with, if inferred.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        self.typer.as_ref().and_then(Typer::column_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_widens_flags() {
        let mut first = Parameter::new("Ids").required(true);
        first.positions.push(10);
        let mut second = Parameter::new("Ids").repeated(true);
        second.typer = Some(Typer::column("ID"));
        second.positions.push(42);

        first.merge(second);
        assert!(first.required);
        assert!(first.repeated);
        assert_eq!(first.cardinality, Cardinality::Many);
        assert_eq!(first.column(), Some("ID"));
        assert_eq!(first.positions, vec![10, 42]);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ParameterKind::parse("Path"), Some(ParameterKind::Path));
        assert_eq!(ParameterKind::parse("data_view"), Some(ParameterKind::DataView));
        assert_eq!(ParameterKind::parse("env"), None);
        let kind: ParameterKind = serde_json::from_str("\"body\"").unwrap();
        assert_eq!(kind, ParameterKind::Body);
    }
}
