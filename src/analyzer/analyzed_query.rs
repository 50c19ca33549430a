use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::{ast::Node, schema::ColumnInfo, types::RuntimeType};

/// Paging and de-duplication a single source may apply on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryHints {
    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub distinct: bool,
}

impl QueryHints {
    pub fn is_empty(&self) -> bool {
        self.skip.is_none() && self.take.is_none() && !self.distinct
    }
}

/// What the analysis learned about one bound source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub query_id: usize,
    pub alias: String,
    pub schema: String,
    pub table: String,
    /// Row type aliased method calls are evaluated against
    pub entity: RuntimeType,
    pub args: Vec<RuntimeType>,
    pub columns: Vec<ColumnInfo>,
    pub used_columns: IndexSet<String>,
    /// Conjunction of WHERE terms that only read this source
    pub pushed_where: Option<Node>,
    pub hints: Option<QueryHints>,
    pub nullable_side: bool,
}

/// Ordered, de-duplicated aggregate mutator calls of one query block, keyed
/// by the accumulator identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshSet {
    calls: IndexMap<String, Node>,
}

impl RefreshSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a mutator with the same identifier is already present.
    pub fn insert(&mut self, identifier: &str, call: Node) -> bool {
        if self.calls.contains_key(identifier) {
            return false;
        }
        self.calls.insert(identifier.to_string(), call);
        true
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.calls.contains_key(identifier)
    }

    pub fn calls(&self) -> impl Iterator<Item = &Node> {
        self.calls.values()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Side table of one analyzed query block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryInfo {
    pub id: usize,
    pub sources: IndexMap<String, SourceInfo>,
    pub refresh: RefreshSet,
    pub group_keys: Vec<Node>,
    pub has_aggregates: bool,
    pub distinct: bool,
}

impl QueryInfo {
    pub fn new(id: usize) -> Self {
        Self { id, ..Default::default() }
    }

    /// Explicit GROUP BY, DISTINCT or aggregates all need the two-phase rewrite.
    pub fn is_grouped(&self) -> bool {
        !self.group_keys.is_empty() || self.has_aggregates || self.distinct
    }

    pub fn is_multi_source(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn mark_used(&mut self, alias: &str, column: &str) {
        if let Some(source) = self.sources.get_mut(alias) {
            source.used_columns.insert(column.to_string());
        }
    }
}

/// Output of the semantic pass: the typed tree plus one `QueryInfo` per block.
#[derive(Debug, Clone)]
pub struct AnalyzedQuery {
    pub root: Node,
    pub queries: IndexMap<usize, QueryInfo>,
}

impl AnalyzedQuery {
    pub fn query(&self, id: usize) -> Option<&QueryInfo> {
        self.queries.get(&id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceInfo> {
        self.queries.values().flat_map(|q| q.sources.values())
    }
}
