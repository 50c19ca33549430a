use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::{
    analyzer::{AnalyzedQuery, AnalyzerError, QueryInfo},
    ast::{InternalQuery, Node, NodeKind, StackUnderflow, Visitor, walk},
    planner::{
        GroupByRewriter, JoinRewriter, PlanFragment, QueryParts, SetOperatorRewriter, TableNamer, create_table, internal_query,
    },
    types::RuntimeType,
};

/// Turns an analyzed tree into a `Root` statement list of table creations and
/// internal queries.
///
/// Set operators are walked bottom-up; each query block is decomposed on its
/// own: joins first, then either the two-phase group-by or a single query.
pub struct RewritePass<'q> {
    queries: &'q IndexMap<usize, QueryInfo>,
    namer: TableNamer,
}

impl<'q> RewritePass<'q> {
    #[instrument(level = "debug", skip_all)]
    pub fn rewrite(analyzed: &'q AnalyzedQuery) -> Result<Node, AnalyzerError> {
        if let Some(failed) = analyzed.root.find(Node::is_placeholder) {
            return Err(AnalyzerError::unexpected("a fully bound tree", failed));
        }
        let mut pass = RewritePass { queries: &analyzed.queries, namer: TableNamer::new() };
        let fragment = walk(&analyzed.root, &mut pass)?;
        debug!(statements = fragment.statements.len(), result = %fragment.result, "rewrite finished");
        Ok(Node::typed(NodeKind::Root { statements: fragment.statements, result: fragment.result }, RuntimeType::Void))
    }

    fn query(&mut self, node: &Node) -> Result<PlanFragment, AnalyzerError> {
        let id = node.query_id().ok_or_else(|| AnalyzerError::unexpected("a query", node))?;
        let queries = self.queries;
        let info = queries.get(&id).ok_or_else(|| AnalyzerError::unexpected("an analyzed query block", node))?;
        let parts = QueryParts::of(node, info)?;
        let base = TableNamer::source_name(&parts.from);

        let joins = JoinRewriter::rewrite(&parts, info, &mut self.namer)?;
        let parts = QueryParts { from: joins.from.clone(), ..parts.map_expressions(|e| joins.remap(e))? };

        let fragment = if info.is_grouped() {
            GroupByRewriter::rewrite(parts, &base, &mut self.namer)?
        } else {
            self.plain(parts, &base)
        };
        debug!(query = id, joins = joins.statements.len() / 2, grouped = info.is_grouped(), "query block rewritten");
        let mut statements = joins.statements;
        statements.extend(fragment.statements);
        Ok(PlanFragment { statements, ..fragment })
    }

    fn plain(&mut self, parts: QueryParts, base: &str) -> PlanFragment {
        let result = self.namer.name(&[base]);
        let query = InternalQuery {
            filter: parts.filter,
            order_by: parts.order_by,
            skip: parts.skip,
            take: parts.take,
            ..InternalQuery::new(&result, parts.from, parts.fields.clone())
        };
        PlanFragment {
            statements: vec![create_table(&result, &parts.fields, Vec::new(), false), internal_query(query)],
            result,
            fields: parts.fields,
            base: base.to_string(),
            retargetable: true,
        }
    }
}

impl<'n> Visitor<'n> for RewritePass<'_> {
    type Output = PlanFragment;
    type Error = AnalyzerError;

    fn children(&mut self, node: &'n Node) -> Vec<&'n Node> {
        match node.kind {
            NodeKind::SetOperator { .. } => node.children(),
            _ => Vec::new(),
        }
    }

    fn leave(&mut self, node: &'n Node, children: Vec<PlanFragment>) -> Result<PlanFragment, AnalyzerError> {
        match &node.kind {
            NodeKind::Query { .. } => self.query(node),
            NodeKind::SetOperator { op, keys, .. } => {
                let mut sides = children.into_iter();
                let (Some(left), Some(right)) = (sides.next(), sides.next()) else {
                    return Err(StackUnderflow(node.to_string()).into());
                };
                SetOperatorRewriter::rewrite(*op, keys, left, right, &mut self.namer)
            }
            _ => Err(AnalyzerError::unexpected("a query or set operator", node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{BinaryOp, JoinKind, QueryBuilder, SetOp},
        test_fixtures::{analyze, commits, files},
    };

    fn plan(tree: &Node) -> (Vec<Node>, String) {
        let analyzed = analyze(tree).unwrap();
        match RewritePass::rewrite(&analyzed).unwrap().kind {
            NodeKind::Root { statements, result } => (statements, result),
            other => panic!("expected a root, got {:?}", other),
        }
    }

    fn query_of(statement: &Node) -> &InternalQuery {
        match &statement.kind {
            NodeKind::InternalQuery(q) => q,
            _ => panic!("expected an internal query, got {}", statement),
        }
    }

    fn named(alias: &str, column: &str, name: &str) -> Node {
        Node::named_field(Node::qualified(alias, column), name)
    }

    #[test]
    fn plain_query_keeps_its_projection() {
        let q = QueryBuilder::new(files("f"))
            .filter(Node::binary(BinaryOp::Gt, Node::qualified("f", "Length"), Node::integer(100)))
            .select(vec![Node::qualified("f", "Name"), Node::qualified("f", "Length")])
            .order_by(Node::qualified("f", "Length"), true)
            .take(10)
            .build();
        let analyzed = analyze(&q).unwrap();
        let root = RewritePass::rewrite(&analyzed).unwrap();
        let NodeKind::Root { statements, result } = &root.kind else { panic!("expected a root") };

        assert_eq!(statements.len(), 2);
        assert_eq!(result, "os_files");
        assert!(matches!(&statements[0].kind, NodeKind::CreateTable { name, for_grouping: false, .. } if name == "os_files"));
        let query = query_of(&statements[1]);
        assert_eq!(query.select, analyzed.root.output_fields());
        assert_eq!(query.filter.as_ref().map(|f| f.to_string()), Some("(f.Length > 100)".to_string()));
        assert_eq!(query.order_by.len(), 1);
        assert!(query.take.is_some());
    }

    #[test]
    fn joined_query_reads_the_last_step() {
        let cond = Node::binary(BinaryOp::Eq, Node::qualified("f", "Name"), Node::qualified("c", "Message"));
        let q = QueryBuilder::new(Node::join(JoinKind::Inner, files("f"), commits("c"), cond))
            .filter(Node::binary(BinaryOp::Gt, Node::qualified("c", "Additions"), Node::integer(0)))
            .select(vec![Node::qualified("f", "Name"), Node::qualified("c", "Sha")])
            .build();
        let (statements, result) = plan(&q);

        assert_eq!(statements.len(), 4);
        assert_eq!(result, "os_files_git_commits");
        let last = query_of(&statements[3]);
        assert!(matches!(&last.from.kind, NodeKind::InMemoryFrom { table, .. } if table == "os_files_git_commits_joined"));
        assert_eq!(last.filter.as_ref().map(|f| f.to_string()), Some("(os_files_git_commits_joined.c.Additions > 0)".to_string()));
        let fields: Vec<_> = last.select.iter().map(|f| f.to_string()).collect();
        assert_eq!(
            fields,
            vec!["os_files_git_commits_joined.f.Name as f.Name", "os_files_git_commits_joined.c.Sha as c.Sha"]
        );
    }

    #[test]
    fn grouped_join_accumulates_from_the_join_table() {
        let cond = Node::binary(BinaryOp::Eq, Node::qualified("f", "Name"), Node::qualified("c", "Message"));
        let q = QueryBuilder::new(Node::join(JoinKind::Inner, files("f"), commits("c"), cond))
            .group_by(vec![Node::qualified("c", "Author")])
            .select(vec![Node::qualified("c", "Author"), Node::alias_call("f", "Sum", vec![Node::qualified("f", "Length")])])
            .build();
        let (statements, _) = plan(&q);

        assert_eq!(statements.len(), 6);
        let accumulate = query_of(&statements[3]);
        assert!(matches!(&accumulate.from.kind, NodeKind::InMemoryFrom { table, .. } if table == "os_files_git_commits_joined"));
        assert_eq!(
            accumulate.refresh[0].to_string(),
            "os_files_git_commits_joined.f.SetSum('f.Sum(f.Length)', os_files_git_commits_joined.f.Length)"
        );
        let NodeKind::CreateTable { columns, .. } = &statements[0].kind else { panic!("expected a table") };
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["f.Length", "f", "c.Author"]);
    }

    #[test]
    fn union_writes_both_sides_into_one_keyed_table() {
        let left = QueryBuilder::new(files("a")).select(vec![named("a", "Name", "Name")]).build();
        let right = QueryBuilder::new(files("b")).select(vec![named("b", "Directory", "Dir")]).build();
        let (statements, result) = plan(&Node::set_operator(SetOp::Union, &["Name"], left, right));

        assert_eq!(statements.len(), 3);
        assert_eq!(result, "os_files_union_os_files");
        assert!(matches!(&statements[0].kind, NodeKind::CreateTable { keys, .. } if keys == &vec!["Name".to_string()]));
        let (first, second) = (query_of(&statements[1]), query_of(&statements[2]));
        assert_eq!((first.into.as_str(), second.into.as_str()), (result.as_str(), result.as_str()));
        assert_eq!(
            second.filter.as_ref().map(|f| f.to_string()),
            Some("not contains(@os_files_union_os_files, (Name), (b.Directory))".to_string())
        );
    }

    #[test]
    fn union_all_has_no_guard() {
        let left = QueryBuilder::new(files("a")).select(vec![named("a", "Name", "Name")]).build();
        let right = QueryBuilder::new(files("b")).select(vec![named("b", "Name", "Name")]).build();
        let (statements, _) = plan(&Node::set_operator(SetOp::UnionAll, &["Name"], left, right));
        assert!(statements.iter().filter_map(|s| match &s.kind {
            NodeKind::InternalQuery(q) => Some(q),
            _ => None,
        }).all(|q| q.filter.is_none()));
    }

    #[test]
    fn except_after_union_reads_the_union_table() {
        let side = |alias: &str| QueryBuilder::new(files(alias)).select(vec![named(alias, "Name", "Name")]).build();
        let union = Node::set_operator(SetOp::Union, &["Name"], side("a"), side("b"));
        let tree = Node::set_operator(SetOp::Except, &["Name"], union, side("c"));
        let (statements, result) = plan(&tree);

        // three union statements, two for the right side, then the except table and its copy
        assert_eq!(statements.len(), 7);
        assert_eq!(result, "os_files_union_os_files_except_os_files");
        let NodeKind::CreateTable { name: companion, keys, .. } = &statements[3].kind else { panic!("expected a table") };
        assert_eq!(keys, &vec!["Name".to_string()]);
        let copy = query_of(&statements[6]);
        assert!(matches!(&copy.from.kind, NodeKind::InMemoryFrom { table, .. } if table == "os_files_union_os_files"));
        assert_eq!(
            copy.filter.as_ref().map(|f| f.to_string()),
            Some(format!("not contains(@{}, (Name), (os_files_union_os_files.Name))", companion))
        );
    }

    #[test]
    fn chained_union_appends_to_the_first_table() {
        let side = |alias: &str| QueryBuilder::new(files(alias)).select(vec![named(alias, "Name", "Name")]).build();
        let first = Node::set_operator(SetOp::Union, &["Name"], side("a"), side("b"));
        let tree = Node::set_operator(SetOp::UnionAll, &["Name"], first, side("c"));
        let (statements, result) = plan(&tree);

        assert_eq!(statements.len(), 4);
        assert_eq!(result, "os_files_union_os_files");
        assert_eq!(statements.iter().filter(|s| matches!(s.kind, NodeKind::CreateTable { .. })).count(), 1);
        assert_eq!(query_of(&statements[3]).into, result);
    }

    #[test]
    fn intersect_keeps_rows_found_on_the_right() {
        let left = QueryBuilder::new(files("a")).select(vec![named("a", "Name", "Name")]).build();
        let right = QueryBuilder::new(commits("c")).select(vec![named("c", "Author", "Who")]).build();
        let (statements, _) = plan(&Node::set_operator(SetOp::Intersect, &["Name"], left, right));

        let last = query_of(statements.last().unwrap());
        assert_eq!(last.filter.as_ref().map(|f| f.to_string()), Some("contains(@git_commits, (Who), (a.Name))".to_string()));
    }
}
