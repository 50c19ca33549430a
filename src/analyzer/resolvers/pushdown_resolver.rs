use indexmap::IndexSet;

use crate::{
    analyzer::{QueryHints, QueryInfo},
    ast::{BinaryOp, Node, NodeKind},
    config::CompilerConfig,
    types::RuntimeType,
};

/// What a query block shows its sources beyond the columns they must produce.
pub struct PushdownResolver;

impl PushdownResolver {
    /// Top-level AND terms, left to right.
    pub fn conjuncts(expr: &Node) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut pending = vec![expr];
        while let Some(node) = pending.pop() {
            match &node.kind {
                NodeKind::Binary { op: BinaryOp::And, left, right } => {
                    pending.push(right);
                    pending.push(left);
                }
                _ => out.push(node),
            }
        }
        out
    }

    /// Source aliases an expression reads through columns or aliased calls.
    pub fn referenced_aliases(expr: &Node) -> IndexSet<String> {
        expr.collect(|n| matches!(n.kind, NodeKind::Column { .. } | NodeKind::Method { alias: Some(_), .. }))
            .into_iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Column { alias, .. } => Some(alias.clone()),
                NodeKind::Method { alias, .. } => alias.clone(),
                _ => None,
            })
            .collect()
    }

    /// Attach WHERE terms to the sources they exclusively read. A single
    /// source takes the whole predicate; sources on the optional side of an
    /// outer join take nothing.
    pub fn push_filter(info: &mut QueryInfo, filter: &Node) {
        if filter.any(Node::is_placeholder) {
            return;
        }
        if info.sources.len() == 1 {
            if let Some(source) = info.sources.values_mut().next() {
                source.pushed_where = Some(filter.clone());
            }
            return;
        }
        for term in Self::conjuncts(filter) {
            let refs = Self::referenced_aliases(term);
            let Some(alias) = refs.first().filter(|_| refs.len() == 1) else {
                continue;
            };
            let Some(source) = info.sources.get_mut(alias) else {
                continue;
            };
            if source.nullable_side {
                continue;
            }
            source.pushed_where = Some(match source.pushed_where.take() {
                Some(prev) => Node::typed(
                    NodeKind::Binary { op: BinaryOp::And, left: prev.into_box(), right: term.clone().into_box() },
                    RuntimeType::Bool,
                ),
                None => term.clone(),
            });
        }
    }

    /// Skip/take/distinct are handed to the source only when nothing between the
    /// source and the output can change which rows survive. A WHERE counts too:
    /// the pushed predicate is advisory, so a source paging on its own could
    /// drop rows the filter keeps.
    pub fn hints(
        info: &QueryInfo,
        has_filter: bool,
        has_order_by: bool,
        skip: Option<&Node>,
        take: Option<&Node>,
        config: &CompilerConfig,
    ) -> Option<QueryHints> {
        let simple = info.sources.len() == 1 && !has_filter && !has_order_by && !info.is_grouped();
        if !config.forward_source_hints || !simple {
            return None;
        }
        let literal = |n: Option<&Node>| match n.map(|n| &n.kind) {
            Some(NodeKind::Literal(l)) => l.as_integer(),
            _ => None,
        };
        let hints = QueryHints { skip: literal(skip), take: literal(take), distinct: info.distinct };
        (!hints.is_empty()).then_some(hints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyzer::SourceInfo, ast::Literal};

    fn source(alias: &str, nullable_side: bool) -> SourceInfo {
        SourceInfo {
            query_id: 0,
            alias: alias.into(),
            schema: "#os".into(),
            table: "files".into(),
            entity: RuntimeType::named("FileEntity"),
            args: Vec::new(),
            columns: Vec::new(),
            used_columns: Default::default(),
            pushed_where: None,
            hints: None,
            nullable_side,
        }
    }

    fn cmp(alias: &str) -> Node {
        let col = Node::typed(NodeKind::Column { alias: alias.into(), name: "Length".into(), intended_type: None }, RuntimeType::Long);
        let lit = Node::typed(NodeKind::Literal(Literal::Integer(1)), RuntimeType::Long);
        Node::typed(NodeKind::Binary { op: BinaryOp::Gt, left: col.into_box(), right: lit.into_box() }, RuntimeType::Bool)
    }

    fn and(l: Node, r: Node) -> Node {
        Node::typed(NodeKind::Binary { op: BinaryOp::And, left: l.into_box(), right: r.into_box() }, RuntimeType::Bool)
    }

    #[test]
    fn terms_go_to_the_source_they_read() {
        let mut info = QueryInfo::new(0);
        info.sources.insert("a".into(), source("a", false));
        info.sources.insert("b".into(), source("b", true));
        let both = Node::typed(
            NodeKind::Binary {
                op: BinaryOp::Eq,
                left: Node::typed(NodeKind::Column { alias: "a".into(), name: "X".into(), intended_type: None }, RuntimeType::Int).into_box(),
                right: Node::typed(NodeKind::Column { alias: "b".into(), name: "X".into(), intended_type: None }, RuntimeType::Int).into_box(),
            },
            RuntimeType::Bool,
        );
        let filter = and(and(cmp("a"), cmp("b")), both);

        PushdownResolver::push_filter(&mut info, &filter);
        assert_eq!(info.sources["a"].pushed_where.as_ref().map(|n| n.to_string()), Some("(a.Length > 1)".to_string()));
        assert!(info.sources["b"].pushed_where.is_none());
    }

    #[test]
    fn hints_need_a_plain_single_source() {
        let mut info = QueryInfo::new(0);
        info.sources.insert("a".into(), source("a", false));
        let five = Node::typed(NodeKind::Literal(Literal::Integer(5)), RuntimeType::Int);
        let cfg = CompilerConfig::default();

        let hints = PushdownResolver::hints(&info, false, false, None, Some(&five), &cfg).unwrap();
        assert_eq!(hints.take, Some(5));
        assert!(PushdownResolver::hints(&info, false, true, None, Some(&five), &cfg).is_none());
        assert!(PushdownResolver::hints(&info, true, false, None, Some(&five), &cfg).is_none());
        assert!(PushdownResolver::hints(&info, false, false, None, Some(&five), &cfg.clone().without_source_hints()).is_none());
    }

    #[test]
    fn distinct_keeps_paging_away_from_the_source() {
        let mut info = QueryInfo::new(0);
        info.sources.insert("a".into(), source("a", false));
        info.distinct = true;
        let five = Node::typed(NodeKind::Literal(Literal::Integer(5)), RuntimeType::Int);
        assert!(PushdownResolver::hints(&info, false, false, None, Some(&five), &CompilerConfig::default()).is_none());
    }
}
