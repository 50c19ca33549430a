use tracing::debug;

use crate::{
    analyzer::AnalyzerError,
    ast::{InternalQuery, Literal, Node, NodeKind},
    planner::{FieldSplitter, PlanFragment, QueryParts, TableNamer, create_table, in_memory, internal_query},
    types::RuntimeType,
};

/// Two-phase rewrite of grouped queries: accumulate per group, then project.
pub struct GroupByRewriter;

impl GroupByRewriter {
    /// GROUP BY keys, the selected expressions for a plain DISTINCT, or one
    /// constant key when only aggregates make the query grouped.
    pub fn effective_keys(parts: &QueryParts) -> Vec<Node> {
        if !parts.keys.is_empty() {
            parts.keys.clone()
        } else if parts.distinct {
            parts.fields.iter().filter_map(|f| f.as_field().map(|(expr, _)| expr.clone())).collect()
        } else {
            vec![Node::typed(NodeKind::Literal(Literal::Integer(1)), RuntimeType::Int)]
        }
    }

    pub fn rewrite(parts: QueryParts, base: &str, namer: &mut TableNamer) -> Result<PlanFragment, AnalyzerError> {
        let keys = Self::effective_keys(&parts);
        let mut splitter = FieldSplitter::new(&keys);
        let fields = parts.fields.iter().map(|f| splitter.split_wrapped(f)).collect::<Result<Vec<_>, _>>()?;
        let having = parts.having.as_ref().map(|h| splitter.split(h)).transpose()?;
        let order_by = parts.order_by.iter().map(|o| splitter.split_wrapped(o)).collect::<Result<Vec<_>, _>>()?;
        let inner = splitter.finish(&keys);
        let key_names = keys.iter().map(Node::to_string).collect();

        let grouping = namer.name(&[base, "grouped"]);
        let result = namer.name(&[base]);
        debug!(grouping = %grouping, accumulated = inner.len(), projected = fields.len(), "group by split");

        let accumulate = InternalQuery {
            filter: parts.filter,
            group_by: keys,
            refresh: parts.refresh,
            ..InternalQuery::new(&grouping, parts.from, inner.clone())
        };
        let project = InternalQuery {
            filter: having,
            order_by,
            skip: parts.skip,
            take: parts.take,
            ..InternalQuery::new(&result, in_memory(&grouping), fields.clone())
        };
        let statements = vec![
            create_table(&grouping, &inner, key_names, true),
            internal_query(accumulate),
            create_table(&result, &fields, Vec::new(), false),
            internal_query(project),
        ];
        Ok(PlanFragment { statements, result, fields, base: base.to_string(), retargetable: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::AnalyzedQuery,
        ast::{BinaryOp, QueryBuilder},
        test_fixtures::{analyze, files},
    };

    fn rewrite(analyzed: &AnalyzedQuery) -> PlanFragment {
        let parts = QueryParts::of(&analyzed.root, analyzed.query(0).unwrap()).unwrap();
        GroupByRewriter::rewrite(parts, "os_files", &mut TableNamer::new()).unwrap()
    }

    fn select_of(statement: &Node) -> Vec<String> {
        match &statement.kind {
            NodeKind::InternalQuery(q) => q.select.iter().map(|f| f.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn key_and_sum_split_into_two_phases() {
        let q = QueryBuilder::new(files("f"))
            .group_by(vec![Node::qualified("f", "Directory")])
            .select(vec![Node::qualified("f", "Directory"), Node::call("Sum", vec![Node::qualified("f", "Length")])])
            .build();
        let fragment = rewrite(&analyze(&q).unwrap());

        assert_eq!(fragment.statements.len(), 4);
        assert_eq!(select_of(&fragment.statements[1]), vec!["f.Directory as f.Directory", "Sum(f.Length) as Sum(f.Length)"]);
        let NodeKind::InternalQuery(accumulate) = &fragment.statements[1].kind else { panic!("expected a query") };
        assert_eq!(accumulate.refresh.len(), 1);
        assert_eq!(accumulate.group_by.len(), 1);

        let NodeKind::InternalQuery(project) = &fragment.statements[3].kind else { panic!("expected a query") };
        assert!(matches!(&project.from.kind, NodeKind::InMemoryFrom { table, .. } if table == "os_files_grouped"));
        let kinds: Vec<_> = project.select.iter().filter_map(|f| f.as_field().map(|(e, _)| e.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::GroupKeyRef { index: 0, name: "f.Directory".into() },
                NodeKind::AggregateRef { index: 1, name: "Sum(f.Length)".into() },
            ]
        );
        assert!(matches!(&fragment.statements[0].kind, NodeKind::CreateTable { for_grouping: true, keys, .. } if keys == &vec!["f.Directory".to_string()]));
        assert_eq!(fragment.result, "os_files");
    }

    #[test]
    fn accumulation_holds_aggregates_and_uncovered_keys() {
        let count = || Node::call("Count", vec![Node::qualified("f", "Name")]);
        let q = QueryBuilder::new(files("f"))
            .group_by(vec![Node::qualified("f", "Directory"), Node::qualified("f", "Extension")])
            .having(Node::binary(BinaryOp::Gt, count(), Node::integer(2)))
            .select(vec![count(), Node::call("Sum", vec![Node::qualified("f", "Length")]), count()])
            .order_by(Node::call("Max", vec![Node::qualified("f", "Modified")]), true)
            .build();
        let fragment = rewrite(&analyze(&q).unwrap());

        // Count, Sum, Max, then both keys
        let NodeKind::InternalQuery(accumulate) = &fragment.statements[1].kind else { panic!("expected a query") };
        assert_eq!(accumulate.select.len(), 5);
        assert_eq!(accumulate.refresh.len(), 3);
        assert_eq!(fragment.fields.len(), 3);
        let NodeKind::InternalQuery(project) = &fragment.statements[3].kind else { panic!("expected a query") };
        assert_eq!(project.filter.as_ref().map(|h| h.to_string()), Some("([Count(f.Name)] > 2)".to_string()));
        assert_eq!(project.order_by.len(), 1);
    }

    #[test]
    fn aggregates_without_keys_group_by_a_constant() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::call("Count", vec![Node::qualified("f", "Name")])]).build();
        let fragment = rewrite(&analyze(&q).unwrap());
        let NodeKind::InternalQuery(accumulate) = &fragment.statements[1].kind else { panic!("expected a query") };
        assert_eq!(accumulate.group_by, vec![Node::typed(NodeKind::Literal(Literal::Integer(1)), RuntimeType::Int)]);
        assert_eq!(accumulate.select.len(), 2);
    }

    #[test]
    fn distinct_groups_by_the_selection() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::qualified("f", "Extension")]).distinct().build();
        let fragment = rewrite(&analyze(&q).unwrap());
        let NodeKind::InternalQuery(project) = &fragment.statements[3].kind else { panic!("expected a query") };
        let (expr, _) = project.select[0].as_field().unwrap();
        assert_eq!(expr.kind, NodeKind::GroupKeyRef { index: 0, name: "f.Extension".into() });
    }
}
