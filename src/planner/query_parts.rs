use crate::{
    analyzer::{AnalyzerError, QueryInfo},
    ast::{Node, NodeKind},
};

/// A bound query block taken apart into its clause expressions.
#[derive(Debug, Clone)]
pub struct QueryParts {
    pub id: usize,
    pub from: Node,
    pub filter: Option<Node>,
    pub keys: Vec<Node>,
    pub having: Option<Node>,
    /// `Field` nodes
    pub fields: Vec<Node>,
    pub distinct: bool,
    /// `OrderField` nodes
    pub order_by: Vec<Node>,
    pub skip: Option<Node>,
    pub take: Option<Node>,
    pub refresh: Vec<Node>,
}

impl QueryParts {
    pub fn of(query: &Node, info: &QueryInfo) -> Result<Self, AnalyzerError> {
        let NodeKind::Query { id, from, filter, group_by, select, order_by, skip, take } = &query.kind else {
            return Err(AnalyzerError::unexpected("a query", query));
        };
        let filter = match filter.as_deref().map(|f| &f.kind) {
            Some(NodeKind::Where(expr)) => Some(expr.as_ref().clone()),
            Some(_) => return Err(AnalyzerError::unexpected("a WHERE clause", query)),
            None => None,
        };
        let (keys, having) = match group_by.as_deref().map(|g| &g.kind) {
            Some(NodeKind::GroupBy { keys, having }) => (keys.clone(), having.as_deref().cloned()),
            Some(_) => return Err(AnalyzerError::unexpected("a GROUP BY clause", query)),
            None => (Vec::new(), None),
        };
        let NodeKind::Select { fields, distinct } = &select.kind else {
            return Err(AnalyzerError::unexpected("a SELECT clause", select));
        };
        let order_by = match order_by.as_deref().map(|o| &o.kind) {
            Some(NodeKind::OrderBy(fields)) => fields.clone(),
            Some(_) => return Err(AnalyzerError::unexpected("an ORDER BY clause", query)),
            None => Vec::new(),
        };
        Ok(Self {
            id: *id,
            from: from.as_ref().clone(),
            filter,
            keys,
            having,
            fields: fields.clone(),
            distinct: *distinct,
            order_by,
            skip: skip.as_deref().cloned(),
            take: take.as_deref().cloned(),
            refresh: info.refresh.calls().cloned().collect(),
        })
    }

    /// Everything evaluated after the FROM clause.
    pub fn expressions(&self) -> impl Iterator<Item = &Node> {
        self.filter
            .iter()
            .chain(&self.keys)
            .chain(&self.having)
            .chain(&self.fields)
            .chain(&self.order_by)
            .chain(&self.skip)
            .chain(&self.take)
            .chain(&self.refresh)
    }

    /// Apply `f` to every expression evaluated after the FROM clause.
    pub fn map_expressions<F>(self, mut f: F) -> Result<Self, AnalyzerError>
    where
        F: FnMut(&Node) -> Result<Node, AnalyzerError>,
    {
        let mut all = |nodes: Vec<Node>| nodes.iter().map(&mut f).collect::<Result<Vec<_>, _>>();
        let keys = all(self.keys)?;
        let fields = all(self.fields)?;
        let order_by = all(self.order_by)?;
        let refresh = all(self.refresh)?;
        Ok(Self {
            filter: self.filter.as_ref().map(&mut f).transpose()?,
            having: self.having.as_ref().map(&mut f).transpose()?,
            skip: self.skip.as_ref().map(&mut f).transpose()?,
            take: self.take.as_ref().map(&mut f).transpose()?,
            keys,
            fields,
            order_by,
            refresh,
            ..self
        })
    }
}
