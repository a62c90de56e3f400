//! Template header parameters and registry-backed column types.

mod common;
use common::*;

use dsql_compiler::{CompileError, ParameterKind};

#[test]
fn header_parameters_come_first_and_win() {
    let c = compile(
        "/*TEMPLATE\n\
           PARAMETER Auth header:Authorization:string:true\n\
           PARAMETER Page query:page:int\n\
         */\n\
         SELECT o.* FROM ORDERS o WHERE o.ID = $Id AND o.OWNER = $Auth",
    );
    let header = c.header.as_ref().unwrap();
    assert_eq!(header.parameters.len(), 2);
    assert!(c.hint.is_none());

    let ids: Vec<_> = c.view.parameters().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["Auth", "Page", "Id"]);

    let auth = c.view.parameter("Auth").unwrap();
    assert_eq!(auth.kind, ParameterKind::Header);
    assert_eq!(auth.name, "Authorization");
    assert_eq!(auth.data_type.as_deref(), Some("string"));
    assert!(auth.required);
    assert_eq!(auth.column(), Some("OWNER"));

    let page = c.view.parameter("Page").unwrap();
    assert_eq!(page.kind, ParameterKind::Query);
    assert_eq!(page.name, "page");
    assert!(!page.required);
}

#[test]
fn header_with_statement_hint() {
    let c = compile(
        "/*TEMPLATE PARAMETER Id path:id */\n\
         /* {\"Uri\":\"/orders/{id}\"} */\n\
         SELECT o.* FROM ORDERS o WHERE o.ID = $Id",
    );
    assert_eq!(c.config.uri.as_deref(), Some("/orders/{id}"));
    assert_eq!(
        c.view.source,
        "SELECT o.* FROM ORDERS o WHERE o.ID = $criteria.AppendBinding($Unsafe.Id)"
    );
    let id = c.view.parameter("Id").unwrap();
    assert_eq!(id.kind, ParameterKind::Path);
    assert!(id.required);
}

#[test]
fn malformed_header() {
    let err = compile_err("/*TEMPLATE PARAMETER Id path */ SELECT 1");
    assert!(matches!(err, CompileError::Lexical(ref e) if e.expected == ":"));
}

#[test]
fn registry_types_read_parameters() {
    let c = compile_with_registry("SELECT o.* FROM ORDERS o WHERE o.STATUS = $Status AND o.ID IN ($Ids)")
        .unwrap();
    assert_eq!(c.view.parameter("Status").unwrap().data_type.as_deref(), Some("VARCHAR"));
    assert_eq!(c.view.parameter("Ids").unwrap().data_type.as_deref(), Some("INTEGER"));
}

#[test]
fn registry_types_write_parameters() {
    let c = compile_with_registry("UPDATE AD_ORDER SET STATUS = $Status WHERE ID = $Id").unwrap();
    assert_eq!(c.view.parameter("Status").unwrap().data_type.as_deref(), Some("TEXT"));
    assert_eq!(c.view.parameter("Id").unwrap().data_type.as_deref(), Some("BIGINT"));
}

#[test]
fn hint_type_beats_registry() {
    let c = compile_with_registry(
        "SELECT o.* FROM ORDERS o WHERE o.ID = $Id /* {\"DataType\":\"string\"} */",
    )
    .unwrap();
    assert_eq!(c.view.parameter("Id").unwrap().data_type.as_deref(), Some("string"));
}

#[test]
fn registry_failure_is_reported() {
    let err = compile_with_registry("SELECT m.* FROM MISSING m WHERE m.A = $A").unwrap_err();
    assert!(matches!(err, CompileError::Registry { ref table, .. } if table == "MISSING"));
}
