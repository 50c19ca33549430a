use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{Node, NodeKind},
    types::RuntimeType,
};

/// Source columns read by a set of expressions, grouped by alias in first-use order.
/// Aliased method calls read the whole row of their source.
#[derive(Debug, Clone, Default)]
pub struct ColumnUsage {
    by_alias: IndexMap<String, IndexMap<String, RuntimeType>>,
    rows: IndexSet<String>,
}

impl ColumnUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of<'n>(exprs: impl IntoIterator<Item = &'n Node>) -> Self {
        let mut usage = Self::new();
        for expr in exprs {
            usage.add(expr);
        }
        usage
    }

    pub fn add(&mut self, expr: &Node) {
        for node in expr.collect(|n| matches!(n.kind, NodeKind::Column { .. } | NodeKind::Method { alias: Some(_), .. })) {
            match &node.kind {
                NodeKind::Column { alias, name, .. } => self.insert(alias, name, node.ty.clone()),
                NodeKind::Method { alias: Some(alias), .. } => self.insert_row(alias),
                _ => {}
            }
        }
    }

    pub fn insert_row(&mut self, alias: &str) {
        self.rows.insert(alias.to_string());
    }

    pub fn reads_row(&self, alias: &str) -> bool {
        self.rows.contains(alias)
    }

    pub fn insert(&mut self, alias: &str, column: &str, ty: RuntimeType) {
        self.by_alias.entry(alias.to_string()).or_default().entry(column.to_string()).or_insert(ty);
    }

    pub fn merge(&mut self, other: &ColumnUsage) {
        for (alias, columns) in &other.by_alias {
            for (column, ty) in columns {
                self.insert(alias, column, ty.clone());
            }
        }
        self.rows.extend(other.rows.iter().cloned());
    }

    pub fn columns(&self, alias: &str) -> impl Iterator<Item = (&str, &RuntimeType)> {
        self.by_alias.get(alias).into_iter().flat_map(|c| c.iter().map(|(name, ty)| (name.as_str(), ty)))
    }

    pub fn contains(&self, alias: &str, column: &str) -> bool {
        self.by_alias.get(alias).is_some_and(|c| c.contains_key(column))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.by_alias.values().all(IndexMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn column(alias: &str, name: &str, ty: RuntimeType) -> Node {
        Node::typed(NodeKind::Column { alias: alias.into(), name: name.into(), intended_type: None }, ty)
    }

    #[test]
    fn first_use_order_per_alias() {
        let cond = Node::typed(
            NodeKind::Binary {
                op: BinaryOp::Eq,
                left: column("b", "Sha", RuntimeType::String).into_box(),
                right: column("a", "Name", RuntimeType::String).into_box(),
            },
            RuntimeType::Bool,
        );
        let usage = ColumnUsage::of([&cond, &column("a", "Length", RuntimeType::Long), &column("a", "Name", RuntimeType::String)]);
        let a: Vec<_> = usage.columns("a").map(|(n, _)| n).collect();
        assert_eq!(a, vec!["Name", "Length"]);
        assert!(usage.contains("b", "Sha"));
        assert!(!usage.contains("c", "Sha"));
        assert_eq!(usage.columns("missing").count(), 0);
        assert!(!usage.reads_row("a"));
    }

    #[test]
    fn aliased_calls_read_the_row() {
        let call = Node::typed(
            NodeKind::Method { alias: Some("f".into()), name: "Name".into(), args: Vec::new(), binding: None },
            RuntimeType::String,
        );
        let usage = ColumnUsage::of([&call]);
        assert!(usage.reads_row("f"));
        assert_eq!(usage.columns("f").count(), 0);
        assert!(!usage.is_empty());
    }
}
