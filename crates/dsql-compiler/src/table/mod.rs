//! Table graph of a statement.

mod assembler;
mod criteria;
mod graph;
mod relation;

pub use assembler::Assembler;
pub use criteria::{
    Criterion, bind_typers, check_multiplicity, criteria, is_write, statement_keywords,
    write_criteria, write_tables,
};
pub use graph::{Column, Table, TableGraph};
pub use relation::{KeyPair, MetaTemplate, Relation};
