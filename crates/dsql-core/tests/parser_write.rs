//! Tests for write statements carrying sanitized template calls.

mod common;
use common::*;

use dsql_core::ast::{Expr, InsertSource};
use dsql_core::Parser;

#[test]
fn update_with_bound_parameters() {
    let u = parse_update(
        "UPDATE AD_ORDER SET STATUS = $criteria.AppendBinding($Unsafe.Status), \
         NOTE = 'x' WHERE ID IN ($criteria.AppendBinding($Unsafe.Ids))",
    );
    assert_eq!(u.table, "AD_ORDER");
    let columns: Vec<_> = u.assignments.iter().map(|a| a.column.as_str()).collect();
    assert_eq!(columns, vec!["STATUS", "NOTE"]);
    assert!(matches!(&u.assignments[0].value, Expr::Selector { text, .. }
        if text == "$criteria.AppendBinding($Unsafe.Status)"));
    match u.where_clause {
        Some(Expr::In { expr, list, negated: false }) => {
            assert_eq!(expr.to_string(), "ID");
            assert_eq!(list.len(), 1);
            assert!(matches!(list[0], Expr::Selector { .. }));
        }
        other => panic!("Expected IN predicate, got {other:?}"),
    }
}

#[test]
fn insert_values_pair_with_columns() {
    let i = parse_insert(
        "INSERT INTO sales.AD_ORDER (ID, STATUS) \
         VALUES ($criteria.AppendBinding($Unsafe.Id), 'NEW')",
    );
    assert_eq!(i.schema.as_deref(), Some("sales"));
    assert_eq!(i.table, "AD_ORDER");
    assert_eq!(i.columns, vec!["ID", "STATUS"]);
    let InsertSource::Values(rows) = &i.values else {
        panic!("Expected VALUES");
    };
    assert_eq!(rows.len(), 1);
    assert!(matches!(rows[0][0], Expr::Selector { .. }));
    assert_eq!(rows[0][1].to_string(), "'NEW'");
}

#[test]
fn delete_with_predicate() {
    let d = parse_delete("DELETE FROM AD_ORDER WHERE ID = $criteria.AppendBinding($Unsafe.Id)");
    assert_eq!(d.table, "AD_ORDER");
    assert_eq!(
        d.where_clause.map(|w| w.to_string()).as_deref(),
        Some("ID = $criteria.AppendBinding($Unsafe.Id)")
    );
}

#[test]
fn several_statements() {
    let statements = Parser::new(
        "UPDATE A SET X = 1 WHERE ID = 2;\n\
         DELETE FROM B WHERE ID = 3;\n\
         INSERT INTO C (ID) VALUES (4);",
    )
    .parse_statements()
    .unwrap();
    assert_eq!(statements.len(), 3);
}

#[test]
fn predicate_of_a_conditional_body() {
    let expr = Parser::new(" OR NOTE LIKE $criteria.AppendBinding($Unsafe.Note)")
        .parse_predicate()
        .unwrap();
    assert_eq!(expr.to_string(), "NOTE LIKE $criteria.AppendBinding($Unsafe.Note)");
}

#[test]
fn unknown_statement_is_an_error() {
    let err = parse_err("MERGE INTO t");
    assert!(err.to_string().contains("SELECT, INSERT, UPDATE, or DELETE"));
}
