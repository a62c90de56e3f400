//! Builds the table graph of a read statement.

use std::collections::BTreeMap;

use dsql_core::ast::{Expr, JoinClause, SelectColumn, SelectStatement, TableRef};
use dsql_core::cursor::{Cursor, Matched, Matcher, TokenDef};
use dsql_core::template::strip_directives;
use dsql_core::Parser;
use tracing::{debug, warn};

use super::graph::{Column, Table, TableGraph};
use super::relation::{KeyPair, MetaTemplate, Relation};
use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::hint::{RelationHint, leading_comment, unmarshal_hint};
use crate::view::Cardinality;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Comment,
    Quoted,
    Selector,
    Other,
}

const SCAN: &[TokenDef<Scan>] = &[
    TokenDef::new(Scan::Comment, "comment", Matcher::Comment),
    TokenDef::new(Scan::Quoted, "quoted", Matcher::Quoted),
    TokenDef::new(Scan::Selector, "selector", Matcher::Selector),
    TokenDef::new(Scan::Other, "character", Matcher::Any),
];

/// Turns a sanitized SELECT into a [`TableGraph`].
///
/// Plain joined tables become dependents of the root. Sub-selects and
/// template tables become relations, or template meta parameters when they
/// read another table's SQL through the view reference.
#[derive(Debug, Clone, Copy)]
pub struct Assembler<'a> {
    config: &'a CompilerConfig,
}

impl<'a> Assembler<'a> {
    /// Creates an assembler.
    #[must_use]
    pub const fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    /// Assembles the graph of `sql`.
    ///
    /// # Errors
    ///
    /// Returns a parse error when the statement is not a SELECT, a hint
    /// decode error for a malformed relation hint, and a structural error
    /// when a join predicate names an unknown alias or has no key.
    pub fn assemble(&self, sql: &str) -> Result<TableGraph> {
        let text = strip_directives(sql);
        let mut parser = Parser::new(&text);
        let select = parser.parse_select_statement()?;
        for error in parser.recovered() {
            warn!(%error, "skipped unparsable clause");
        }

        let mut root = match &select.from {
            Some(from) => self.table(from, sql)?,
            None => Table::default(),
        };
        let mut pending: Vec<(String, Vec<String>)> = Vec::new();
        root.columns = select
            .columns
            .iter()
            .map(|c| {
                let column = column(c);
                if !column.except.is_empty() {
                    let alias = column.table.clone().unwrap_or_default();
                    pending.push((alias, column.except.clone()));
                }
                column
            })
            .collect();

        let mut graph = TableGraph::new(root);
        for join in &select.joins {
            self.join(&mut graph, join, sql)?;
        }

        for (alias, except) in pending {
            self.resolve_except(&mut graph, &alias, except);
        }
        debug!(
            root = %graph.root().name,
            tables = graph.tables().len(),
            relations = graph.relations().len(),
            "assembled table graph"
        );
        Ok(graph)
    }

    fn table(&self, from: &TableRef, source: &str) -> Result<Table> {
        let mut table = match from {
            TableRef::Table { schema, name, .. } => {
                let name = match schema {
                    Some(schema) => format!("{schema}.{name}"),
                    None => name.clone(),
                };
                return Ok(Table::new(name, from.reference_name().unwrap_or_default()));
            }
            TableRef::Template { selector, alias } => {
                let mut table = Table::new(selector.clone(), alias.clone().unwrap_or_default());
                table.sql = Some(selector.clone());
                table
            }
            TableRef::Subquery {
                span, query, alias, ..
            } => {
                let body = span.text(source).trim();
                let mut table = match query {
                    Ok(select) => subquery_table(select, alias.as_deref()),
                    Err(error) => {
                        warn!(%error, alias = ?alias, "relation body is opaque");
                        let alias = alias.clone().unwrap_or_default();
                        Table::new(alias.clone(), alias)
                    }
                };
                table.sql = Some(body.to_string());
                table
            }
        };
        let body = table.sql.as_deref().unwrap_or_default();
        if let Some(span) = leading_comment(body) {
            table.hint = unmarshal_hint::<RelationHint>(span.text(body))?;
        }
        if let Some(field) = table.hint.as_ref().and_then(|h| h.field.clone()) {
            table.holder = field;
        }
        Ok(table)
    }

    fn join(&self, graph: &mut TableGraph, join: &JoinClause, source: &str) -> Result<()> {
        if let TableRef::Table { schema, name, .. } = &join.table {
            let alias = join.table.reference_name().unwrap_or(name).to_string();
            let name = match schema {
                Some(schema) => format!("{schema}.{name}"),
                None => name.clone(),
            };
            graph.tables_mut()[0].dependents.insert(alias, name);
            return Ok(());
        }

        let child = self.table(&join.table, source)?;
        if let Some(owner) = self.meta_owner(child.sql.as_deref().unwrap_or_default()) {
            let Some(at) = graph.position(&owner) else {
                return Err(CompileError::UnresolvedAlias {
                    alias: owner,
                    relation: child.alias,
                });
            };
            debug!(meta = %child.alias, owner = %owner, "template meta parameter");
            graph.tables_mut()[at].meta_templates.push(MetaTemplate {
                name: child.alias,
                holder: child.holder,
                owner,
                sql: child.sql.unwrap_or_default(),
                view: None,
                except: child.except,
            });
            return Ok(());
        }

        let (owner, keys) = join_keys(graph, join, &child.alias)?;
        let cardinality = child
            .hint
            .as_ref()
            .and_then(|h| h.cardinality)
            .unwrap_or_else(|| {
                if join.on.as_ref().is_some_and(has_always_true) {
                    Cardinality::One
                } else {
                    Cardinality::Many
                }
            });
        debug!(
            relation = %child.alias,
            owner = %graph.tables()[owner].alias,
            keys = keys.len(),
            cardinality = cardinality.as_str(),
            "relation"
        );
        let child = graph.add_table(child);
        graph.add_relation(Relation {
            owner,
            child,
            keys,
            cardinality,
        });
        Ok(())
    }

    /// Returns the alias named by a `$View.<alias>.SQL` reference in `sql`.
    fn meta_owner(&self, sql: &str) -> Option<String> {
        let mut cursor = Cursor::new(sql);
        while let Matched::Token(m) = cursor.next(SCAN) {
            if m.code != Scan::Selector {
                continue;
            }
            let body = m.text(sql).trim_start_matches(['$', '!']);
            let body = body
                .strip_prefix('{')
                .and_then(|b| b.strip_suffix('}'))
                .unwrap_or(body);
            let segments: Vec<&str> = body.split('.').collect();
            if let [root, alias, sql_field, ..] = segments[..] {
                if root == self.config.view_reference && sql_field.eq_ignore_ascii_case("SQL") {
                    return Some(alias.to_string());
                }
            }
        }
        None
    }

    fn resolve_except(&self, graph: &mut TableGraph, alias: &str, except: Vec<String>) {
        let at = if alias.is_empty() {
            Some(0)
        } else {
            graph.position(alias)
        };
        if let Some(at) = at {
            graph.tables_mut()[at].except.extend(except);
            return;
        }
        let meta = graph
            .tables_mut()
            .iter_mut()
            .flat_map(|t| t.meta_templates.iter_mut())
            .find(|m| m.name.eq_ignore_ascii_case(alias));
        match meta {
            Some(meta) => meta.except.extend(except),
            None => warn!(alias, "except list names an unknown alias"),
        }
    }
}

fn column(c: &SelectColumn) -> Column {
    let table = match &c.expr {
        Expr::Column { table, .. } | Expr::Wildcard { table } => table.clone(),
        _ => None,
    };
    let expression = c.expr.to_string();
    Column {
        name: c.output_name().map_or_else(|| expression.clone(), ToString::to_string),
        table,
        expression,
        except: c.except.clone(),
    }
}

fn subquery_table(select: &SelectStatement, alias: Option<&str>) -> Table {
    let (name, inner_alias) = match &select.from {
        Some(TableRef::Table { name, .. }) => (
            Some(name.clone()),
            select.from.as_ref().and_then(TableRef::reference_name),
        ),
        Some(from) => (None, from.reference_name()),
        None => (None, None),
    };
    let alias = alias.or(inner_alias).unwrap_or_default();
    let mut table = Table::new(name.unwrap_or_else(|| alias.to_string()), alias);
    table.inner_alias = inner_alias.map(ToString::to_string);
    table.columns = select.columns.iter().map(column).collect();
    table.except = select.columns.iter().flat_map(|c| c.except.clone()).collect();
    table.dependents = select
        .joins
        .iter()
        .filter_map(|join| match &join.table {
            TableRef::Table { name, .. } => Some((
                join.table.reference_name().unwrap_or(name).to_string(),
                name.clone(),
            )),
            _ => None,
        })
        .collect::<BTreeMap<_, _>>();
    table
}

/// Finds the table owning `alias`, directly or through its dependents.
fn resolve_owner(graph: &TableGraph, alias: &str) -> Option<usize> {
    graph.position(alias).or_else(|| {
        graph
            .tables()
            .iter()
            .position(|t| t.dependents.keys().any(|d| d.eq_ignore_ascii_case(alias)))
    })
}

fn join_keys(graph: &TableGraph, join: &JoinClause, child: &str) -> Result<(usize, Vec<KeyPair>)> {
    let mut owner = None;
    let mut keys = Vec::new();
    if let Some(on) = &join.on {
        let mut operands = Vec::new();
        key_operands(on, &mut operands);
        for (left, right) in operands {
            let (
                Expr::Column {
                    table: left_table,
                    name: left_name,
                    ..
                },
                Expr::Column {
                    table: right_table,
                    name: right_name,
                    ..
                },
            ) = (left.unparen(), right.unparen())
            else {
                continue;
            };
            let is_child = |t: &Option<String>| t.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(child));
            let (owner_alias, owner_column, child_column) = if is_child(left_table) {
                (right_table, right_name, left_name)
            } else if is_child(right_table) {
                (left_table, left_name, right_name)
            } else {
                continue;
            };
            let at = match owner_alias {
                Some(alias) => {
                    resolve_owner(graph, alias).ok_or_else(|| CompileError::UnresolvedAlias {
                        alias: alias.clone(),
                        relation: child.to_string(),
                    })?
                }
                None => 0,
            };
            owner.get_or_insert(at);
            keys.push(KeyPair {
                owner_alias: owner_alias.clone(),
                owner_column: owner_column.clone(),
                child_column: child_column.clone(),
            });
        }
    } else {
        for column in &join.using {
            owner.get_or_insert(0);
            keys.push(KeyPair {
                owner_alias: None,
                owner_column: column.clone(),
                child_column: column.clone(),
            });
        }
    }
    match owner {
        Some(owner) if !keys.is_empty() => Ok((owner, keys)),
        _ => Err(CompileError::MissingJoinKey {
            relation: child.to_string(),
        }),
    }
}

/// Collects the compared operand pairs of a join predicate.
///
/// A comparison whose right side is itself a conjunction pairs its left
/// operand with the conjunction's plain operand, the right one when the left
/// one is a nested comparison such as `1 = 1`. The other side of the
/// conjunction is decomposed on its own.
fn key_operands<'e>(expr: &'e Expr, out: &mut Vec<(&'e Expr, &'e Expr)>) {
    let Expr::Binary { left, op, right } = expr.unparen() else {
        return;
    };
    if op.is_logical() {
        key_operands(left, out);
        key_operands(right, out);
        return;
    }
    if !op.is_comparison() {
        return;
    }
    if let Expr::Binary {
        left: inner_left,
        op: inner_op,
        right: inner_right,
    } = right.unparen()
    {
        if inner_op.is_logical() {
            let (key, rest) = if matches!(inner_left.unparen(), Expr::Binary { .. }) {
                (inner_right, inner_left)
            } else {
                (inner_left, inner_right)
            };
            out.push((left, key));
            key_operands(rest, out);
            return;
        }
    }
    out.push((left, right));
}

/// Returns true when the predicate contains a literal comparison such as `1 = 1`.
fn has_always_true(expr: &Expr) -> bool {
    if expr.is_literal_comparison() {
        return true;
    }
    match expr.unparen() {
        Expr::Binary { left, right, .. } => has_always_true(left) || has_always_true(right),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsql_core::ast::BinaryOp;

    fn assemble(sql: &str) -> Result<TableGraph> {
        Assembler::new(&CompilerConfig::default()).assemble(sql)
    }

    const ORDERS: &str = "SELECT o.*, i.* FROM ORDERS o \
                          JOIN (SELECT * FROM ORDER_ITEMS) i ON o.ID = i.ORDER_ID";

    #[test]
    fn test_relation() {
        let graph = assemble(ORDERS).unwrap();
        assert_eq!(graph.root().name, "ORDERS");
        assert_eq!(graph.root().alias, "o");
        assert_eq!(graph.relations().len(), 1);

        let relation = &graph.relations()[0];
        assert_eq!(relation.owner, 0);
        assert_eq!(relation.cardinality, Cardinality::Many);
        assert_eq!(relation.keys.len(), 1);
        assert_eq!(relation.keys[0].to_string(), "o.ID = ORDER_ID");

        let child = &graph.tables()[relation.child];
        assert_eq!(child.name, "ORDER_ITEMS");
        assert_eq!(child.alias, "i");
        assert_eq!(child.holder, "I");
        assert_eq!(child.sql.as_deref(), Some("SELECT * FROM ORDER_ITEMS"));
    }

    #[test]
    fn test_cardinality_marker() {
        let graph = assemble(&format!("{ORDERS} AND 1 = 1")).unwrap();
        assert_eq!(graph.relations()[0].cardinality, Cardinality::One);
        assert_eq!(graph.relations()[0].keys.len(), 1);
    }

    #[test]
    fn test_nested_conjunction_keys() {
        let on = Expr::qualified_column("o", "ID").eq(Expr::Binary {
            left: Box::new(Expr::qualified_column("i", "ORDER_ID")),
            op: BinaryOp::And,
            right: Box::new(Expr::integer(1).eq(Expr::integer(1))),
        });
        let mut operands = Vec::new();
        key_operands(&on, &mut operands);
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[0].0.to_string(), "o.ID");
        assert_eq!(operands[0].1.to_string(), "i.ORDER_ID");
        assert!(has_always_true(&on));

        let on = Expr::qualified_column("o", "ID").eq(Expr::Binary {
            left: Box::new(Expr::integer(1).eq(Expr::integer(1))),
            op: BinaryOp::And,
            right: Box::new(Expr::qualified_column("i", "ORDER_ID")),
        });
        let mut operands = Vec::new();
        key_operands(&on, &mut operands);
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[0].0.to_string(), "o.ID");
        assert_eq!(operands[0].1.to_string(), "i.ORDER_ID");
        assert_eq!(operands[1].0.to_string(), "1");
    }

    #[test]
    fn test_relation_hint() {
        let graph = assemble(
            "SELECT o.* FROM ORDERS o JOIN ( /* {\"Field\":\"Lines\",\"Cardinality\":\"One\"} */ \
             SELECT * FROM ORDER_ITEMS) i ON i.ORDER_ID = o.ID",
        )
        .unwrap();
        let relation = &graph.relations()[0];
        assert_eq!(relation.cardinality, Cardinality::One);
        let child = &graph.tables()[relation.child];
        assert_eq!(child.holder, "Lines");
        assert_eq!(
            child.hint.as_ref().and_then(|h| h.field.as_deref()),
            Some("Lines")
        );
    }

    #[test]
    fn test_meta_template() {
        let graph = assemble(
            "SELECT o.*, meta.* EXCEPT ORDER_ID FROM (SELECT * FROM ORDERS) o \
             JOIN (SELECT ORDER_ID, COUNT(*) AS CNT FROM ($View.o.SQL) t GROUP BY ORDER_ID) meta \
             ON meta.ORDER_ID = o.ID",
        )
        .unwrap();
        assert!(graph.relations().is_empty());
        let root = graph.root();
        assert_eq!(root.name, "ORDERS");
        assert_eq!(root.meta_templates.len(), 1);
        let meta = &root.meta_templates[0];
        assert_eq!(meta.name, "meta");
        assert_eq!(meta.owner, "o");
        assert_eq!(meta.except, vec!["ORDER_ID"]);
        assert_eq!(graph.excluded_paths(), vec!["Meta.ORDER_ID"]);
    }

    #[test]
    fn test_except_forward_reference() {
        let graph = assemble(
            "SELECT o.* EXCEPT SECRET, i.* EXCEPT (PRICE, COST) FROM ORDERS o \
             JOIN (SELECT * FROM ORDER_ITEMS) i ON i.ORDER_ID = o.ID",
        )
        .unwrap();
        assert_eq!(graph.root().except, vec!["SECRET"]);
        assert_eq!(graph.table("i").unwrap().except, vec!["PRICE", "COST"]);
        assert_eq!(graph.excluded_paths(), vec!["SECRET", "I.PRICE", "I.COST"]);
    }

    #[test]
    fn test_plain_joins_are_dependents() {
        let graph = assemble(
            "SELECT o.*, c.NAME FROM ORDERS o JOIN CUSTOMERS c ON c.ID = o.CUSTOMER_ID \
             JOIN (SELECT * FROM ADDRESSES) a ON a.CUSTOMER_ID = c.ID",
        )
        .unwrap();
        assert_eq!(
            graph.root().dependents.get("c").map(String::as_str),
            Some("CUSTOMERS")
        );
        assert_eq!(graph.relations().len(), 1);
        assert_eq!(graph.relations()[0].owner, 0);
        assert_eq!(graph.relations()[0].keys[0].owner_alias.as_deref(), Some("c"));
    }

    #[test]
    fn test_templated_body_keeps_directives() {
        let graph = assemble(
            "SELECT o.* FROM ORDERS o JOIN (SELECT * FROM ORDER_ITEMS WHERE 1 = 1 \
             #if($Has.Sku) AND SKU = $criteria.AppendBinding($Unsafe.Sku) #end) i \
             ON i.ORDER_ID = o.ID",
        )
        .unwrap();
        let child = graph.table("i").unwrap();
        assert!(child.sql.as_deref().unwrap().contains("#if($Has.Sku)"));
        assert_eq!(child.name, "ORDER_ITEMS");
    }

    #[test]
    fn test_structural_errors() {
        let err = assemble(
            "SELECT o.* FROM ORDERS o JOIN (SELECT * FROM ORDER_ITEMS) i ON i.ORDER_ID = x.ID",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnresolvedAlias { ref alias, ref relation } if alias == "x" && relation == "i"
        ));

        let err = assemble("SELECT o.* FROM ORDERS o JOIN (SELECT * FROM ORDER_ITEMS) i ON 1 = 1")
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingJoinKey { ref relation } if relation == "i"));

        let err = assemble("SELECT o.* FROM ORDERS o, (SELECT * FROM ORDER_ITEMS) i").unwrap_err();
        assert!(matches!(err, CompileError::MissingJoinKey { .. }));
    }

    #[test]
    fn test_not_a_select() {
        assert!(matches!(
            assemble("UPDATE t SET a = 1"),
            Err(CompileError::Parse(_))
        ));
    }
}
