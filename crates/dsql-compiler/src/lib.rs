//! # dsql-compiler
//!
//! Compiles DSQL templates, SQL decorated with `$selectors`, `#if`/`#foreach`/
//! `#set` directives and comment hints, into:
//!
//! - a [`ViewMeta`] holding the deduplicated request parameters and the
//!   rewritten SQL, where every external selector is bound through
//!   `$criteria.AppendBinding(...)`;
//! - for read statements, a [`TableGraph`] of the FROM/JOIN participants with
//!   join keys, cardinalities and meta templates;
//! - a [`ViewConfig`] with the serving settings.
//!
//! ## Example
//!
//! ```rust
//! use dsql_compiler::{Compiler, CompilerConfig};
//!
//! let compiled = Compiler::new(CompilerConfig::default())
//!     .compile("UPDATE AD_ORDER SET STATUS = $Status WHERE ID IN ($Ids)")?;
//!
//! assert_eq!(
//!     compiled.view.source,
//!     "UPDATE AD_ORDER SET STATUS = $criteria.AppendBinding($Unsafe.Status) \
//!      WHERE ID IN ($criteria.AppendBinding($Unsafe.Ids))"
//! );
//! let ids = compiled.view.parameter("Ids").unwrap();
//! assert!(ids.repeated);
//! assert_eq!(ids.column(), Some("ID"));
//! # Ok::<(), dsql_compiler::CompileError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod header;
pub mod hint;
pub mod infer;
pub mod param;
pub mod registry;
pub mod sanitize;
pub mod table;
pub mod typer;
pub mod view;

pub use compiler::{Compilation, Compiler};
pub use config::CompilerConfig;
pub use error::{CompileError, Result};
pub use header::{HeaderParameter, TemplateHeader};
pub use hint::{ParameterConfig, RelationHint, ViewHint};
pub use param::{ParamIterator, ParamMeta};
pub use registry::{ColumnInfo, ColumnRegistry, ColumnSource};
pub use sanitize::Sanitizer;
pub use table::{Assembler, TableGraph};
pub use typer::{LiteralType, Typer};
pub use view::{Cardinality, HttpMethod, Parameter, ParameterKind, ViewConfig, ViewMeta};
