//! Inferred parameter types.

use core::fmt;

/// Runtime type of a scanned literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralType {
    /// Integer literal.
    Int,
    /// Decimal literal.
    Float,
    /// Quoted string.
    String,
    /// `true` or `false`.
    Bool,
}

impl LiteralType {
    /// Returns the data type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
        }
    }

    /// Classifies a number literal by whether it parses as an integer.
    #[must_use]
    pub fn of_number(text: &str) -> Self {
        if text.parse::<i64>().is_ok() {
            Self::Int
        } else {
            Self::Float
        }
    }
}

/// Where a parameter's type comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Typer {
    /// Compared with or assigned a literal.
    Literal(LiteralType),
    /// Compared with or assigned to a column.
    Column(String),
}

impl Typer {
    /// Creates a column typer, dropping any alias qualifier (`t.ID` → `ID`).
    #[must_use]
    pub fn column(name: &str) -> Self {
        let bare = name.rsplit('.').next().unwrap_or(name);
        Self::Column(bare.to_string())
    }

    /// Returns the data type for literal typers.
    #[must_use]
    pub const fn data_type(&self) -> Option<&'static str> {
        match self {
            Self::Literal(literal) => Some(literal.as_str()),
            Self::Column(_) => None,
        }
    }

    /// Returns the column name for column typers.
    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Self::Column(name) => Some(name),
            Self::Literal(_) => None,
        }
    }
}

impl fmt::Display for Typer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => f.write_str(literal.as_str()),
            Self::Column(column) => write!(f, "column {column}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_drops_qualifier() {
        assert_eq!(Typer::column("o.STATUS"), Typer::Column("STATUS".to_string()));
        assert_eq!(Typer::column("ID"), Typer::Column("ID".to_string()));
    }

    #[test]
    fn test_number_classification() {
        assert_eq!(LiteralType::of_number("42"), LiteralType::Int);
        assert_eq!(LiteralType::of_number("4.2"), LiteralType::Float);
        assert_eq!(LiteralType::of_number("1e3"), LiteralType::Float);
    }
}
