//! Relations and template meta parameters.

use std::fmt;

use crate::view::{Cardinality, ViewMeta};

/// A column of the owner table matched with a column of the child table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Owner table alias as written in the predicate.
    pub owner_alias: Option<String>,
    /// Owner column.
    pub owner_column: String,
    /// Child column.
    pub child_column: String,
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.owner_alias {
            write!(f, "{alias}.")?;
        }
        write!(f, "{} = {}", self.owner_column, self.child_column)
    }
}

/// A correlated sub-select joined to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Position of the owner table in the graph.
    pub owner: usize,
    /// Position of the child table in the graph.
    pub child: usize,
    /// Join keys.
    pub keys: Vec<KeyPair>,
    /// Rows of the child per owner row.
    pub cardinality: Cardinality,
}

/// A sub-select reusing another view's SQL, e.g.
/// `JOIN (SELECT COUNT(*) AS CNT FROM ($View.items.SQL) t) meta ON meta.ID = items.ID`.
///
/// The sub-select becomes a parameter of the table it names rather than a
/// join.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaTemplate {
    /// Alias of the sub-select.
    pub name: String,
    /// Output field.
    pub holder: String,
    /// Alias of the table whose SQL is reused.
    pub owner: String,
    /// Sub-select body.
    pub sql: String,
    /// Compiled view of the body.
    pub view: Option<ViewMeta>,
    /// Columns excluded from the output.
    pub except: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_display() {
        let key = KeyPair {
            owner_alias: Some("o".to_string()),
            owner_column: "ID".to_string(),
            child_column: "ORDER_ID".to_string(),
        };
        assert_eq!(key.to_string(), "o.ID = ORDER_ID");
    }
}
