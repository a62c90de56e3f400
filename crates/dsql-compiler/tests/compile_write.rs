//! Write statements: sanitized SQL, parameter flags and column typers.

mod common;
use common::*;

use dsql_compiler::{Cardinality, CompileError, HttpMethod, ParameterKind};
use serde_json::json;

#[test]
fn update_with_in_list() {
    let c = compile("UPDATE AD_ORDER\nSET STATUS = $Status\nWHERE ID IN ($Ids);");

    assert_eq!(
        c.view.source,
        "UPDATE AD_ORDER\nSET STATUS = $criteria.AppendBinding($Unsafe.Status)\n\
         WHERE ID IN ($criteria.AppendBinding($Unsafe.Ids));"
    );
    assert_eq!(c.view.len(), 2);

    let status = c.view.parameter("Status").unwrap();
    assert!(status.required);
    assert!(!status.repeated);
    assert_eq!(status.cardinality, Cardinality::One);
    assert_eq!(status.column(), Some("STATUS"));
    assert_eq!(status.selector, "$Status");

    let ids = c.view.parameter("Ids").unwrap();
    assert!(ids.repeated);
    assert_eq!(ids.cardinality, Cardinality::Many);
    assert_eq!(ids.column(), Some("ID"));

    assert_eq!(c.view.tables, vec!["AD_ORDER"]);
    assert!(!c.view.templated);
    assert!(c.tables.is_none());
    assert_eq!(c.config.method, HttpMethod::Put);
}

#[test]
fn insert_values_are_typed_by_position() {
    let c = compile("INSERT INTO AD_ORDER (ID, STATUS) VALUES ($Id, $Status)");
    assert_eq!(c.config.method, HttpMethod::Post);
    assert_eq!(c.view.parameter("Id").unwrap().column(), Some("ID"));
    assert_eq!(c.view.parameter("Status").unwrap().column(), Some("STATUS"));
}

#[test]
fn conditional_criteria_are_optional() {
    let c = compile(
        "UPDATE AD_ORDER SET STATUS = $Status WHERE 1 = 1\n\
         #if($Has.Note) AND NOTE = $Note #end",
    );
    assert!(c.view.templated);
    let note = c.view.parameter("Note").unwrap();
    assert!(!note.required);
    assert_eq!(note.column(), Some("NOTE"));
    assert!(c.view.source.contains("#if($Has.Note) AND NOTE = $criteria.AppendBinding($Unsafe.Note) #end"));
}

#[test]
fn foreach_records_stay_local() {
    let c = compile(
        "#foreach($rec in $Unsafe.Records)\n\
         INSERT INTO AD_ORDER (ID, STATUS) VALUES ($rec.Id, $rec.Status);\n\
         #end",
    );
    assert_eq!(
        c.view.source,
        "#foreach($rec in $Unsafe.Records)\n\
         INSERT INTO AD_ORDER (ID, STATUS) VALUES \
         ($criteria.AppendBinding($rec.Id), $criteria.AppendBinding($rec.Status));\n\
         #end"
    );
    let ids: Vec<_> = c.view.parameters().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["Records"]);
    assert!(!c.view.parameters()[0].required);
    assert_eq!(c.view.tables, vec!["AD_ORDER"]);
}

#[test]
fn parameter_hint_with_sql_is_a_data_view() {
    let c = compile(
        "UPDATE AD_ORDER SET STATUS = $Status \
         WHERE ID IN ($Ids /* {\"Required\":true} SELECT ID FROM AD_ORDER WHERE STATUS = 'NEW' */)",
    );
    let ids = c.view.parameter("Ids").unwrap();
    assert_eq!(ids.kind, ParameterKind::DataView);
    assert_eq!(ids.sql.as_deref(), Some("SELECT ID FROM AD_ORDER WHERE STATUS = 'NEW'"));
    assert!(ids.required);
    assert!(!c.view.source.contains("SELECT ID"));
}

#[test]
fn data_view_with_several_statements_fails() {
    let err = compile_err(
        "UPDATE AD_ORDER SET STATUS = $Status \
         WHERE ID IN ($Ids /* SELECT ID FROM A; SELECT ID FROM B */)",
    );
    match err {
        CompileError::Multiplicity { parameter, count } => {
            assert_eq!(parameter, "Ids");
            assert_eq!(count, 2);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn constants_are_namespaced_not_bound() {
    let c = compile_with_constants(
        "DELETE FROM AD_ORDER WHERE REGION = $Region AND ID = $Id",
        json!({ "Region": "EU" }),
    );
    assert_eq!(
        c.view.source,
        "DELETE FROM AD_ORDER WHERE REGION = $Unsafe.Region AND ID = $criteria.AppendBinding($Unsafe.Id)"
    );
    assert!(c.view.parameter("Region").is_none());
    assert_eq!(c.config.method, HttpMethod::Delete);
}

#[test]
fn mixed_statements_are_posted() {
    let c = compile(
        "UPDATE AD_ORDER SET STATUS = $Status WHERE ID = $Id;\n\
         INSERT INTO AD_ORDER_LOG (ORDER_ID) VALUES ($Id);",
    );
    assert_eq!(c.config.method, HttpMethod::Post);
    assert_eq!(c.view.tables, vec!["AD_ORDER", "AD_ORDER_LOG"]);
    let id = c.view.parameter("Id").unwrap();
    assert_eq!(id.positions.len(), 2);
    assert_eq!(c.view.len(), 2);
}

#[test]
fn keywords_inside_literals_are_not_targets() {
    let c = compile_with_registry(
        "INSERT INTO AD_ORDER (NOTE, ID) VALUES ('please update me', $Id) /* delete from AUDIT */",
    )
    .unwrap();
    assert_eq!(c.view.tables, vec!["AD_ORDER"]);
    assert_eq!(c.view.parameter("Id").unwrap().data_type.as_deref(), Some("BIGINT"));
}
