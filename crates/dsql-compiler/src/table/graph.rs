//! Tables and the graph relating them.

use std::collections::{BTreeMap, HashMap};

use heck::ToUpperCamelCase;

use super::relation::{MetaTemplate, Relation};
use crate::hint::RelationHint;
use crate::view::ViewMeta;

/// A projected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Output name: the alias, or the bare column name.
    pub name: String,
    /// Table qualifier as written.
    pub table: Option<String>,
    /// Projection expression as SQL text.
    pub expression: String,
    /// Columns excluded by `alias.* EXCEPT ...`.
    pub except: Vec<String>,
}

/// One FROM or JOIN participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Physical table name, or the selector of a template table.
    pub name: String,
    /// Alias in the enclosing query.
    pub alias: String,
    /// Alias of the table inside its own sub-select.
    pub inner_alias: Option<String>,
    /// Output field holding the table's rows.
    pub holder: String,
    /// Sub-select body, for tables that are not plain names.
    pub sql: Option<String>,
    /// Projected columns.
    pub columns: Vec<Column>,
    /// Columns excluded from the output.
    pub except: Vec<String>,
    /// Plain tables joined by this table, keyed by alias.
    pub dependents: BTreeMap<String, String>,
    /// Compiled view of a templated body.
    pub view: Option<ViewMeta>,
    /// Relation hint leading the body.
    pub hint: Option<RelationHint>,
    /// Template meta parameters owned by this table.
    pub meta_templates: Vec<MetaTemplate>,
}

impl Table {
    /// Creates a table referenced by `alias`.
    #[must_use]
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            name: name.into(),
            holder: alias.to_upper_camel_case(),
            alias,
            ..Self::default()
        }
    }

    /// Returns true when `name` is this table's alias, ignoring case.
    #[must_use]
    pub fn is_alias(&self, name: &str) -> bool {
        self.alias.eq_ignore_ascii_case(name)
    }

    /// Returns true when the table body is a sub-select.
    #[must_use]
    pub const fn is_correlated(&self) -> bool {
        self.sql.is_some()
    }
}

/// Tables of a read statement and their relations.
///
/// The first table is the root: the FROM item of the statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableGraph {
    tables: Vec<Table>,
    index: HashMap<String, usize>,
    relations: Vec<Relation>,
}

impl TableGraph {
    /// Creates a graph rooted at `root`.
    #[must_use]
    pub fn new(root: Table) -> Self {
        let mut graph = Self::default();
        graph.add_table(root);
        graph
    }

    /// Registers a table under its alias and returns its position.
    ///
    /// A table registered twice under the same alias replaces nothing: the
    /// existing position is returned.
    pub fn add_table(&mut self, table: Table) -> usize {
        let key = table.alias.to_lowercase();
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.tables.len();
        self.index.insert(key, i);
        self.tables.push(table);
        i
    }

    pub(crate) fn add_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    /// Returns the root table.
    #[must_use]
    pub fn root(&self) -> &Table {
        &self.tables[0]
    }

    /// Returns every table, root first.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub(crate) fn tables_mut(&mut self) -> &mut [Table] {
        &mut self.tables
    }

    /// Returns the position of the table aliased `alias`.
    #[must_use]
    pub fn position(&self, alias: &str) -> Option<usize> {
        self.index.get(&alias.to_lowercase()).copied()
    }

    /// Looks up a table by alias.
    #[must_use]
    pub fn table(&self, alias: &str) -> Option<&Table> {
        self.position(alias).map(|i| &self.tables[i])
    }

    /// Returns every relation in registration order.
    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Returns the relations owned by the table at `owner`.
    pub fn relations_of(&self, owner: usize) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(move |r| r.owner == owner)
    }

    /// Returns the excluded output paths of the whole graph.
    ///
    /// Root exclusions are bare column names; exclusions of related tables
    /// are prefixed with the holder of every relation leading to them.
    #[must_use]
    pub fn excluded_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_excluded(0, "", &mut paths, &mut vec![0]);
        paths
    }

    fn collect_excluded(
        &self,
        at: usize,
        prefix: &str,
        paths: &mut Vec<String>,
        visited: &mut Vec<usize>,
    ) {
        let table = &self.tables[at];
        for column in &table.except {
            paths.push(format!("{prefix}{column}"));
        }
        for meta in &table.meta_templates {
            for column in &meta.except {
                paths.push(format!("{prefix}{}.{column}", meta.holder));
            }
        }
        for relation in self.relations_of(at) {
            if visited.contains(&relation.child) {
                continue;
            }
            visited.push(relation.child);
            let child = &self.tables[relation.child];
            let prefix = format!("{prefix}{}.", child.holder);
            self.collect_excluded(relation.child, &prefix, paths, visited);
        }
    }
}
