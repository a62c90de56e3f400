//! Abstract Syntax Tree (AST) types for SQL statements.

mod expression;
mod statement;

pub use expression::{BinaryOp, Expr, FunctionCall, Literal, UnaryOp};
pub use statement::{
    DeleteStatement, InsertSource, InsertStatement, JoinClause, JoinType, OrderBy, OrderDirection,
    SelectColumn, SelectStatement, Statement, TableRef, UpdateAssignment, UpdateStatement,
};
