#![allow(dead_code)]

use dsql_core::ast::{DeleteStatement, InsertStatement, SelectStatement, Statement, UpdateStatement};
use dsql_core::template::{Template, parse_template, strip_directives};
use dsql_core::{ParseError, Parser};

pub fn parse(sql: &str) -> Statement {
    Parser::new(sql)
        .parse_statement()
        .unwrap_or_else(|e| panic!("Failed to parse: {sql}\nError: {e:?}"))
}

pub fn parse_err(sql: &str) -> ParseError {
    Parser::new(sql)
        .parse_statement()
        .expect_err(&format!("Expected parse error for: {sql}"))
}

pub fn parse_select(sql: &str) -> SelectStatement {
    match parse(sql) {
        Statement::Select(s) => s,
        other => panic!("Expected SELECT, got {other:?}"),
    }
}

pub fn parse_insert(sql: &str) -> InsertStatement {
    match parse(sql) {
        Statement::Insert(i) => i,
        other => panic!("Expected INSERT, got {other:?}"),
    }
}

pub fn parse_update(sql: &str) -> UpdateStatement {
    match parse(sql) {
        Statement::Update(u) => u,
        other => panic!("Expected UPDATE, got {other:?}"),
    }
}

pub fn parse_delete(sql: &str) -> DeleteStatement {
    match parse(sql) {
        Statement::Delete(d) => d,
        other => panic!("Expected DELETE, got {other:?}"),
    }
}

/// Parses a template's SQL with every directive blanked out.
pub fn parse_stripped(template: &str) -> SelectStatement {
    parse_select(&strip_directives(template))
}

pub fn template(input: &str) -> Template {
    parse_template(input).unwrap_or_else(|e| panic!("Failed to parse template: {input}\nError: {e}"))
}
