use std::{collections::HashMap, fmt, sync::Arc};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    analyzer::{AnalyzerError, QueryInfo, ScopeId, ScopeTree, SourceInfo, TableSymbol},
    config::CompilerConfig,
    methods::NameCache,
    schema::{MethodContext, Schema, SchemaProvider},
    types::{RuntimeType, TypeCatalog},
};

/// Part of a query block an expression belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    From,
    JoinCondition,
    Where,
    GroupBy,
    Having,
    Select,
    OrderBy,
    Paging,
}

impl Clause {
    pub fn allows_aggregates(&self) -> bool {
        matches!(self, Clause::Select | Clause::Having | Clause::OrderBy)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Clause::From => "FROM",
            Clause::JoinCondition => "JOIN",
            Clause::Where => "WHERE",
            Clause::GroupBy => "GROUP BY",
            Clause::Having => "HAVING",
            Clause::Select => "SELECT",
            Clause::OrderBy => "ORDER BY",
            Clause::Paging => "SKIP/TAKE",
        };
        write!(f, "{}", name)
    }
}

/// State of the query block currently being analyzed.
pub struct QueryFrame {
    pub scope: ScopeId,
    pub clause: Clause,
    pub info: QueryInfo,
    /// Schema whose table call is being bound; its library resolves
    /// unaliased calls among the table arguments
    pub from_schema: Option<Arc<dyn Schema>>,
}

/// Everything resolvers share while one tree is analyzed.
pub struct AnalysisContext<'a> {
    pub provider: &'a dyn SchemaProvider,
    pub cache: &'a NameCache,
    pub config: &'a CompilerConfig,
    pub cancel: &'a CancellationToken,
    pub scopes: ScopeTree,
    frames: Vec<QueryFrame>,
    queries: IndexMap<usize, QueryInfo>,
    schemas: HashMap<String, Arc<dyn Schema>>,
    next_query: usize,
    next_alias: usize,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(provider: &'a dyn SchemaProvider, cache: &'a NameCache, config: &'a CompilerConfig, cancel: &'a CancellationToken) -> Self {
        Self {
            provider,
            cache,
            config,
            cancel,
            scopes: ScopeTree::new(),
            frames: Vec::new(),
            queries: IndexMap::new(),
            schemas: HashMap::new(),
            next_query: 0,
            next_alias: 0,
        }
    }

    pub fn catalog(&self) -> &'a TypeCatalog {
        let provider: &'a dyn SchemaProvider = self.provider;
        provider.type_catalog()
    }

    pub fn method_context(&self) -> MethodContext<'a> {
        MethodContext { catalog: self.catalog(), cache: self.cache }
    }

    pub fn check_cancelled(&self) -> Result<(), AnalyzerError> {
        if self.cancel.is_cancelled() { Err(AnalyzerError::Cancelled) } else { Ok(()) }
    }

    /// Schema by name, fetched from the provider once per analysis.
    pub fn schema(&mut self, name: &str) -> Result<Arc<dyn Schema>, AnalyzerError> {
        if let Some(schema) = self.schemas.get(name) {
            return Ok(schema.clone());
        }
        self.check_cancelled()?;
        let schema = self.provider.schema(name, self.cancel)?;
        debug!(schema = name, "schema bound");
        self.schemas.insert(name.to_string(), schema.clone());
        Ok(schema)
    }

    /// Open a query block in a child scope of the enclosing one; returns its id.
    pub fn open_query(&mut self) -> usize {
        let id = self.next_query;
        self.next_query += 1;
        let parent = self.scope();
        let scope = self.scopes.child(parent);
        self.frames.push(QueryFrame { scope, clause: Clause::From, info: QueryInfo::new(id), from_schema: None });
        id
    }

    pub fn close_query(&mut self) -> Result<QueryFrame, AnalyzerError> {
        self.frames.pop().ok_or_else(|| AnalyzerError::unexpected("an open query block", "end of query"))
    }

    pub fn store_query(&mut self, info: QueryInfo) {
        self.queries.insert(info.id, info);
    }

    pub fn frame(&self) -> Result<&QueryFrame, AnalyzerError> {
        self.frames.last().ok_or_else(|| AnalyzerError::unexpected("a query block", "expression outside of a query"))
    }

    pub fn frame_mut(&mut self) -> Result<&mut QueryFrame, AnalyzerError> {
        self.frames.last_mut().ok_or_else(|| AnalyzerError::unexpected("a query block", "expression outside of a query"))
    }

    pub fn scope(&self) -> ScopeId {
        self.frames.last().map(|f| f.scope).unwrap_or_else(|| self.scopes.root())
    }

    pub fn clause(&self) -> Option<Clause> {
        self.frames.last().map(|f| f.clause)
    }

    pub fn set_clause(&mut self, clause: Clause) {
        if let Some(frame) = self.frames.last_mut() {
            frame.clause = clause;
        }
    }

    /// Alias for a source written without one, e.g. `_files1`.
    pub fn auto_alias(&mut self, method: &str) -> String {
        self.next_alias += 1;
        format!("{}{}{}", self.config.auto_alias_prefix, method.to_lowercase(), self.next_alias)
    }

    /// Register a bound source in the current scope and query block.
    pub fn define_source(&mut self, symbol: TableSymbol, args: Vec<RuntimeType>) -> Result<(), AnalyzerError> {
        let scope = self.scope();
        self.scopes.define(scope, symbol.clone())?;
        let frame = self.frame_mut()?;
        let info = SourceInfo {
            query_id: frame.info.id,
            alias: symbol.alias.clone(),
            schema: symbol.schema,
            table: symbol.table,
            entity: symbol.entity_type,
            args,
            columns: symbol.columns,
            used_columns: Default::default(),
            pushed_where: None,
            hints: None,
            nullable_side: false,
        };
        frame.info.sources.insert(symbol.alias, info);
        Ok(())
    }

    /// Move the sources behind `aliases` to the optional side of an outer
    /// join or apply.
    pub fn mark_nullable(&mut self, aliases: &[String]) -> Result<(), AnalyzerError> {
        let scope = self.scope();
        for alias in aliases {
            let Some(symbol) = self.scopes.lookup(scope, alias).map(TableSymbol::on_nullable_side) else {
                continue;
            };
            self.scopes.replace(scope, symbol);
            if let Some(source) = self.frame_mut()?.info.sources.get_mut(alias) {
                source.nullable_side = true;
            }
        }
        Ok(())
    }

    /// Record that `alias.column` is read, in whichever open block owns the alias.
    pub fn mark_used(&mut self, alias: &str, column: &str) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.info.sources.contains_key(alias)) {
            frame.info.mark_used(alias, column);
        }
    }

    pub fn into_queries(self) -> IndexMap<usize, QueryInfo> {
        self.queries
    }
}
