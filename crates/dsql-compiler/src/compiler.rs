//! The compilation pipeline.
//!
//! [`Compiler::compile`] runs the stages in order: header, statement hint,
//! parameter iteration, sanitization, parameter registration, table assembly
//! (read statements) or criteria binding (write statements), type resolution
//! and finally the view configuration.

use std::collections::HashMap;
use std::sync::Arc;

use dsql_core::cursor::is_ident_part;
use dsql_core::lexer::Keyword;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::CompilerConfig;
use crate::context::ContextKind;
use crate::error::Result;
use crate::header::TemplateHeader;
use crate::hint::{ParameterConfig, ParameterHint, ViewHint, leading_comment, split_hint, unmarshal_hint};
use crate::param::{ParamIterator, ParamMeta};
use crate::registry::ColumnRegistry;
use crate::sanitize::Sanitizer;
use crate::table::{
    Assembler, TableGraph, bind_typers, check_multiplicity, statement_keywords, write_criteria,
    write_tables,
};
use crate::view::{Cardinality, Parameter, ParameterKind, ViewConfig, ViewMeta};

/// Output of one compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Parameters and rewritten SQL.
    pub view: ViewMeta,
    /// Table graph of a read statement.
    pub tables: Option<TableGraph>,
    /// Serving configuration.
    pub config: ViewConfig,
    /// Decoded statement hint.
    pub hint: Option<ViewHint>,
    /// Template header, when present.
    pub header: Option<TemplateHeader>,
}

/// Compiles DSQL templates.
///
/// A compiler is immutable once built and can be shared between threads;
/// only the optional [`ColumnRegistry`] is shared state.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
    constants: HashMap<String, Value>,
    registry: Option<Arc<ColumnRegistry>>,
}

impl Compiler {
    /// Creates a compiler with `config`.
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            constants: HashMap::new(),
            registry: None,
        }
    }

    /// Sets the compile-time constants.
    #[must_use]
    pub fn with_constants(mut self, constants: HashMap<String, Value>) -> Self {
        self.constants = constants;
        self
    }

    /// Resolves column typers through `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ColumnRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles one statement.
    ///
    /// The template header and the statement hint are decoded into the
    /// compilation and do not appear in the rewritten source.
    ///
    /// # Errors
    ///
    /// Fails on a malformed header, template or read statement, on hint JSON
    /// that does not decode, on unresolved join aliases or keys, on
    /// write parameters governing several statements, and on registry
    /// lookup failures.
    pub fn compile(&self, sql: &str) -> Result<Compilation> {
        let header = TemplateHeader::parse(sql)?;
        let body = header.as_ref().map_or(sql, |h| &sql[h.span.end..]);
        let hint_span = leading_comment(body);
        let hint = match hint_span {
            Some(span) => unmarshal_hint::<ViewHint>(span.text(body))?,
            None => None,
        };
        let template = hint_span.map_or(body, |span| &body[span.end..]).trim_start();

        let mut view = self.build_view(template, header.as_ref())?;
        let keywords = statement_keywords(&view.source);
        let write = keywords.iter().any(|k| !matches!(k, Keyword::Select));

        let mut tables = None;
        if write {
            view.tables = write_tables(&view.source);
            let criteria = write_criteria(&view.source);
            bind_typers(&mut view, &criteria, &self.config);
            for parameter in view.parameters() {
                if let Some(sql) = &parameter.sql {
                    check_multiplicity(&parameter.id, sql)?;
                }
            }
        } else if keywords.is_empty() {
            warn!("no statement found, skipping table assembly");
        } else {
            let mut graph = Assembler::new(&self.config).assemble(&view.source)?;
            self.compile_nested(&mut graph)?;
            tables = Some(graph);
        }

        self.resolve_types(&mut view, tables.as_ref())?;
        let config = ViewConfig::build(&keywords, hint.as_ref(), tables.as_ref());
        debug!(
            view = %config.name,
            method = %config.method,
            parameters = view.len(),
            templated = view.templated,
            write,
            "compiled statement"
        );
        Ok(Compilation {
            view,
            tables,
            config,
            hint,
            header,
        })
    }

    /// Iterates, sanitizes and registers the parameters of `sql`.
    fn build_view(&self, sql: &str, header: Option<&TemplateHeader>) -> Result<ViewMeta> {
        let mut iter = ParamIterator::new(sql, &self.config)?;
        let metas: Vec<ParamMeta> = iter.by_ref().collect();
        let source = Sanitizer::new(&self.config, &self.constants).rewrite(iter.text(), &metas);

        let mut view = ViewMeta::new(source);
        view.templated = iter.is_templated();
        if let Some(header) = header {
            for declared in &header.parameters {
                view.add_parameter(declared.to_parameter());
            }
        }
        for meta in &metas {
            if let Some(parameter) = self.parameter(meta) {
                view.add_parameter(parameter);
            }
        }
        for hint in iter.hints() {
            apply_hint(&mut view, hint)?;
        }
        if let Some(header) = header {
            for declared in &header.parameters {
                if let Some(parameter) = view.parameter_mut(&declared.id) {
                    parameter.kind = declared.kind;
                    parameter.name.clone_from(&declared.name);
                    if declared.data_type.is_some() {
                        parameter.data_type.clone_from(&declared.data_type);
                    }
                    if let Some(required) = declared.required {
                        parameter.required = required;
                    }
                }
            }
        }
        for parameter in view.parameters_mut() {
            if parameter.data_type.is_none() {
                parameter.data_type = parameter
                    .typer
                    .as_ref()
                    .and_then(|t| t.data_type())
                    .map(str::to_string);
            }
        }
        Ok(view)
    }

    /// Converts an occurrence into a parameter, skipping locals, functions
    /// and constants.
    fn parameter(&self, meta: &ParamMeta) -> Option<Parameter> {
        if meta.is_variable
            || self.config.is_standalone_function(&meta.parts.head)
            || self.constants.contains_key(meta.holder())
        {
            return None;
        }
        let mut parameter = Parameter::new(meta.holder())
            .required(meta.context == ContextKind::Append && !meta.conditional)
            .repeated(meta.is_repeated());
        parameter.typer.clone_from(&meta.meta_type);
        parameter.selector.clone_from(&meta.text);
        parameter.positions.push(meta.span.start);
        Some(parameter)
    }

    /// Compiles the templated bodies of sub-selects and meta templates.
    fn compile_nested(&self, graph: &mut TableGraph) -> Result<()> {
        for table in graph.tables_mut() {
            if let Some(sql) = table.sql.clone() {
                if is_templated(&sql) {
                    trace!(table = %table.alias, "compiling nested view");
                    table.view = Some(self.build_view(&sql, None)?);
                }
            }
            for meta in &mut table.meta_templates {
                if is_templated(&meta.sql) {
                    trace!(template = %meta.name, "compiling meta template view");
                    meta.view = Some(self.build_view(&meta.sql, None)?);
                }
            }
        }
        Ok(())
    }

    /// Turns column typers into data types through the registry.
    fn resolve_types(&self, view: &mut ViewMeta, tables: Option<&TableGraph>) -> Result<()> {
        let Some(registry) = &self.registry else {
            return Ok(());
        };
        let candidates: Vec<String> = match tables {
            Some(graph) => graph
                .tables()
                .iter()
                .map(|t| t.name.clone())
                .filter(|name| is_table_name(name))
                .collect(),
            None => view.tables.clone(),
        };
        for parameter in view.parameters_mut() {
            if parameter.data_type.is_some() {
                continue;
            }
            let Some(column) = parameter.column().map(str::to_string) else {
                continue;
            };
            for table in &candidates {
                if let Some(data_type) = registry.data_type(table, &column)? {
                    trace!(parameter = %parameter.id, table = %table, data_type = %data_type, "resolved column type");
                    parameter.data_type = Some(data_type);
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Applies a parameter hint to the parameter it follows.
fn apply_hint(view: &mut ViewMeta, hint: &ParameterHint) -> Result<()> {
    let Some(parameter) = view.parameter_mut(&hint.parameter) else {
        trace!(parameter = %hint.parameter, "hint on a non-parameter selector");
        return Ok(());
    };
    let mut explicit_kind = false;
    if let Some(config) = unmarshal_hint::<ParameterConfig>(&hint.hint)? {
        if let Some(kind) = config.kind {
            parameter.kind = kind;
            explicit_kind = true;
        }
        if let Some(location) = config.location {
            parameter.name = location;
        }
        if config.data_type.is_some() {
            parameter.data_type = config.data_type;
        }
        if let Some(required) = config.required {
            parameter.required = required;
        }
        if let Some(cardinality) = config.cardinality {
            parameter.cardinality = cardinality;
            parameter.repeated = cardinality == Cardinality::Many;
        }
        if config.codec.is_some() {
            parameter.codec = config.codec;
        }
    }
    let (_, sql) = split_hint(&hint.hint);
    if !sql.is_empty() {
        parameter.sql = Some(sql.to_string());
        if !explicit_kind {
            parameter.kind = ParameterKind::DataView;
        }
    }
    Ok(())
}

fn is_templated(sql: &str) -> bool {
    sql.contains('$') || sql.contains('#')
}

fn is_table_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| is_ident_part(b) || b == b'.')
}
