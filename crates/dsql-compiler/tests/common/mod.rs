#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use dsql_compiler::{
    ColumnInfo, ColumnRegistry, ColumnSource, CompileError, Compilation, Compiler, CompilerConfig,
};
use serde_json::Value;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn compile(sql: &str) -> Compilation {
    init_tracing();
    Compiler::new(CompilerConfig::default())
        .compile(sql)
        .unwrap_or_else(|e| panic!("Failed to compile: {sql}\nError: {e}"))
}

pub fn compile_err(sql: &str) -> CompileError {
    init_tracing();
    Compiler::new(CompilerConfig::default())
        .compile(sql)
        .expect_err(&format!("Expected compile error for: {sql}"))
}

pub fn compile_with_constants(sql: &str, constants: Value) -> Compilation {
    let Value::Object(map) = constants else {
        panic!("constants must be a JSON object");
    };
    Compiler::new(CompilerConfig::default())
        .with_constants(map.into_iter().collect::<HashMap<_, _>>())
        .compile(sql)
        .unwrap_or_else(|e| panic!("Failed to compile: {sql}\nError: {e}"))
}

/// Column source backed by a fixed catalog.
pub struct Catalog(pub HashMap<String, Vec<ColumnInfo>>);

impl ColumnSource for Catalog {
    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, String> {
        self.0
            .get(&table.to_uppercase())
            .cloned()
            .ok_or_else(|| format!("table {table} does not exist"))
    }
}

pub fn orders_catalog() -> Arc<ColumnRegistry> {
    Arc::new(ColumnRegistry::new(Catalog(HashMap::from([
        (
            "ORDERS".to_string(),
            vec![
                ColumnInfo::new("ID", "INTEGER"),
                ColumnInfo::new("STATUS", "VARCHAR"),
                ColumnInfo::new("OWNER", "VARCHAR"),
            ],
        ),
        (
            "AD_ORDER".to_string(),
            vec![
                ColumnInfo::new("ID", "BIGINT"),
                ColumnInfo::new("STATUS", "TEXT"),
            ],
        ),
    ]))))
}

pub fn compile_with_registry(sql: &str) -> Result<Compilation, CompileError> {
    init_tracing();
    Compiler::new(CompilerConfig::default())
        .with_registry(orders_catalog())
        .compile(sql)
}
