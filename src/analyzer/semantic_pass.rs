use std::ptr;

use tracing::{debug, instrument};

use crate::{
    analyzer::{
        AnalysisContext, AnalyzedQuery, AnalyzerError, Clause, ClauseValidator, ColumnResolver, DiagnosticSink, MemberResolver,
        MethodBinder, OperatorResolver, ProjectionResolver, PushdownResolver, QueryInfo, SourceResolver,
    },
    ast::{Node, NodeKind, StackUnderflow, Visitor, walk},
    config::CompilerConfig,
    types::RuntimeType,
};

/// Clause roots of an open query block, compared by address to learn which
/// clause the traversal is in.
struct ClauseRoots<'n> {
    filter: Option<&'n Node>,
    group_by: Option<&'n Node>,
    group_keys: Vec<&'n Node>,
    having: Option<&'n Node>,
    select: &'n Node,
    order_by: Option<&'n Node>,
    paging: Vec<&'n Node>,
    join_conditions: Vec<&'n Node>,
}

impl<'n> ClauseRoots<'n> {
    fn of(query: &'n Node) -> Option<Self> {
        let NodeKind::Query { filter, group_by, select, order_by, skip, take, .. } = &query.kind else {
            return None;
        };
        let (group_keys, having) = match group_by.as_deref().map(|g| &g.kind) {
            Some(NodeKind::GroupBy { keys, having }) => (keys.iter().collect(), having.as_deref()),
            _ => (Vec::new(), None),
        };
        Some(Self {
            filter: filter.as_deref(),
            group_by: group_by.as_deref(),
            group_keys,
            having,
            select,
            order_by: order_by.as_deref(),
            paging: skip.as_deref().into_iter().chain(take.as_deref()).collect(),
            join_conditions: Vec::new(),
        })
    }

    fn clause_of(&self, node: &Node) -> Option<Clause> {
        let is = |root: Option<&Node>| root.is_some_and(|r| ptr::eq(r, node));
        if is(self.filter) {
            Some(Clause::Where)
        } else if is(self.group_by) {
            Some(Clause::GroupBy)
        } else if is(self.having) {
            Some(Clause::Having)
        } else if ptr::eq(self.select, node) {
            Some(Clause::Select)
        } else if is(self.order_by) {
            Some(Clause::OrderBy)
        } else if self.paging.iter().any(|p| ptr::eq(*p, node)) {
            Some(Clause::Paging)
        } else if self.join_conditions.iter().any(|c| ptr::eq(*c, node)) {
            Some(Clause::JoinCondition)
        } else {
            None
        }
    }

    fn is_group_key(&self, node: &Node) -> bool {
        self.group_keys.iter().any(|k| ptr::eq(*k, node))
    }
}

/// Binds every identifier, call and operator of a tree and types every node.
///
/// Recoverable errors either abort the pass or, with a diagnostic sink, are
/// recorded while the failing subtree is replaced by a placeholder.
pub struct SemanticPass<'a, 'n> {
    ctx: AnalysisContext<'a>,
    diagnostics: Option<DiagnosticSink>,
    roots: Vec<ClauseRoots<'n>>,
}

impl<'a, 'n> SemanticPass<'a, 'n> {
    pub fn analyze(root: &'n Node, ctx: AnalysisContext<'a>) -> Result<AnalyzedQuery, AnalyzerError> {
        Self::run(root, ctx, None)
    }

    /// Like `analyze`, recording recoverable errors into `sink` instead of
    /// stopping at the first one.
    pub fn analyze_with_sink(root: &'n Node, ctx: AnalysisContext<'a>, sink: &mut DiagnosticSink) -> Result<AnalyzedQuery, AnalyzerError> {
        Self::run(root, ctx, Some(sink))
    }

    #[instrument(level = "debug", skip_all)]
    fn run(root: &'n Node, ctx: AnalysisContext<'a>, sink: Option<&mut DiagnosticSink>) -> Result<AnalyzedQuery, AnalyzerError> {
        let mut pass = SemanticPass { ctx, diagnostics: sink.as_ref().map(|_| DiagnosticSink::new()), roots: Vec::new() };
        let bound = walk(root, &mut pass);
        if let (Some(sink), Some(recorded)) = (sink, pass.diagnostics.take()) {
            sink.merge(recorded);
        }
        let bound = bound?;
        if let Some(unset) = bound.first_unset() {
            return Err(AnalyzerError::unexpected("a typed node", unset));
        }
        let queries = pass.ctx.into_queries();
        debug!(queries = queries.len(), "semantic pass finished");
        Ok(AnalyzedQuery { root: bound, queries })
    }

    fn placeholder() -> Node {
        Node::typed(NodeKind::Placeholder, RuntimeType::Object)
    }

    /// Expression kinds that cannot be bound once an operand failed.
    fn propagates_failure(node: &Node) -> bool {
        matches!(
            node.kind,
            NodeKind::Property { .. }
                | NodeKind::Index { .. }
                | NodeKind::Method { .. }
                | NodeKind::Binary { .. }
                | NodeKind::DynamicOperator { .. }
                | NodeKind::Unary { .. }
                | NodeKind::Case { .. }
                | NodeKind::InList { .. }
                | NodeKind::IsNull { .. }
        )
    }

    fn is_alias(&self, name: &str) -> bool {
        self.ctx.scopes.lookup(self.ctx.scope(), name).is_some()
    }

    fn bind(&mut self, node: &'n Node, children: Vec<Node>) -> Result<Node, AnalyzerError> {
        if Self::propagates_failure(node) && children.iter().any(Node::is_placeholder) {
            return Ok(Self::placeholder());
        }
        let config = self.ctx.config;
        let mut ops = children.into_iter();

        match &node.kind {
            NodeKind::Literal(literal) => Ok(Node::typed(NodeKind::Literal(literal.clone()), literal.natural_type())),
            NodeKind::Identifier(name) => ColumnResolver::bind_name(name, &mut self.ctx),
            NodeKind::Property { root, member } => match (ops.next(), &root.kind) {
                (Some(bound), _) => MemberResolver::property(bound, member, self.ctx.catalog(), config),
                (None, NodeKind::Identifier(alias)) => ColumnResolver::bind_qualified(alias, member, &mut self.ctx),
                (None, _) => Err(AnalyzerError::unexpected("a property root", node)),
            },
            NodeKind::Index { .. } => {
                let (root, index) = (operand(&mut ops, node)?, operand(&mut ops, node)?);
                MemberResolver::index(root, index, self.ctx.catalog())
            }
            NodeKind::Method { alias, name, .. } => MethodBinder::bind(alias.as_deref(), name, ops.collect(), &mut self.ctx),
            NodeKind::Binary { op, .. } | NodeKind::DynamicOperator { op, .. } => {
                let (left, right) = (operand(&mut ops, node)?, operand(&mut ops, node)?);
                OperatorResolver::binary(*op, left, right)
            }
            NodeKind::Unary { op, .. } => OperatorResolver::unary(*op, operand(&mut ops, node)?),
            NodeKind::Case { otherwise, .. } => OperatorResolver::case(ops.collect(), otherwise.is_some()),
            NodeKind::InList { negated, .. } => {
                let expr = operand(&mut ops, node)?;
                OperatorResolver::in_list(expr, ops.collect(), *negated)
            }
            NodeKind::IsNull { negated, .. } => Ok(OperatorResolver::is_null(operand(&mut ops, node)?, *negated)),
            NodeKind::FieldLink(index) => ProjectionResolver::field_link(*index, &self.ctx),
            NodeKind::Wildcard { alias } => ProjectionResolver::check_wildcard(alias.as_deref(), &self.ctx),
            NodeKind::Placeholder => Ok(Self::placeholder()),

            NodeKind::Field { name, .. } => {
                let expr = operand(&mut ops, node)?;
                if !matches!(expr.kind, NodeKind::Wildcard { .. }) {
                    ClauseValidator::primitive(Clause::Select, &expr, config)?;
                }
                let ty = expr.ty.clone();
                Ok(Node::typed(NodeKind::Field { expr: expr.into_box(), name: name.clone() }, ty))
            }
            NodeKind::Select { distinct, .. } => {
                let fields = ProjectionResolver::expand(ops.collect(), &mut self.ctx);
                self.ctx.frame_mut()?.info.distinct = *distinct;
                Ok(Node::typed(NodeKind::Select { fields, distinct: *distinct }, RuntimeType::Void))
            }
            NodeKind::Where(_) => {
                let expr = operand(&mut ops, node)?;
                ClauseValidator::predicate(Clause::Where, &expr, config)?;
                Ok(Node::typed(NodeKind::Where(expr.into_box()), RuntimeType::Void))
            }
            NodeKind::GroupBy { keys, having } => {
                let keys: Vec<Node> = (0..keys.len()).map(|_| operand(&mut ops, node)).collect::<Result<_, _>>()?;
                for key in &keys {
                    ClauseValidator::primitive(Clause::GroupBy, key, config)?;
                }
                let having = if having.is_some() { Some(operand(&mut ops, node)?) } else { None };
                if let Some(having) = &having {
                    ClauseValidator::predicate(Clause::Having, having, config)?;
                }
                Ok(Node::typed(NodeKind::GroupBy { keys, having: having.map(Box::new) }, RuntimeType::Void))
            }
            NodeKind::OrderBy(_) => Ok(Node::typed(NodeKind::OrderBy(ops.collect()), RuntimeType::Void)),
            NodeKind::OrderField { descending, .. } => {
                let expr = operand(&mut ops, node)?;
                ClauseValidator::primitive(Clause::OrderBy, &expr, config)?;
                let ty = expr.ty.clone();
                Ok(Node::typed(NodeKind::OrderField { expr: expr.into_box(), descending: *descending }, ty))
            }

            NodeKind::SchemaFrom { schema, method, alias, .. } => {
                if let Ok(frame) = self.ctx.frame_mut() {
                    frame.from_schema = None;
                }
                SourceResolver::bind_schema_from(schema, method, ops.collect(), alias.as_deref(), &mut self.ctx)
            }
            NodeKind::PropertyFrom { source, property, alias } => {
                SourceResolver::bind_property_from(source, property, alias.as_deref(), &mut self.ctx)
            }
            NodeKind::Join { kind, .. } => {
                self.ctx.set_clause(Clause::From);
                let (left, right, condition) = (operand(&mut ops, node)?, operand(&mut ops, node)?, operand(&mut ops, node)?);
                SourceResolver::bind_join(*kind, left, right, condition, &mut self.ctx)
            }
            NodeKind::Apply { kind, .. } => {
                let (left, right) = (operand(&mut ops, node)?, operand(&mut ops, node)?);
                SourceResolver::bind_apply(*kind, left, right, &mut self.ctx)
            }

            NodeKind::Query { .. } => self.bind_query(node, ops.collect()),
            NodeKind::SetOperator { op, keys, .. } => {
                let (left, right) = (operand(&mut ops, node)?, operand(&mut ops, node)?);
                ClauseValidator::set_operator(*op, keys, &left, &right)?;
                Ok(Node::typed(
                    NodeKind::SetOperator { op: *op, keys: keys.clone(), left: left.into_box(), right: right.into_box() },
                    RuntimeType::Void,
                ))
            }

            NodeKind::Column { .. }
            | NodeKind::SourceRow { .. }
            | NodeKind::InMemoryFrom { .. }
            | NodeKind::JoinStep { .. }
            | NodeKind::ApplyStep { .. }
            | NodeKind::AggregateRef { .. }
            | NodeKind::GroupKeyRef { .. }
            | NodeKind::TableContains { .. }
            | NodeKind::CreateTable { .. }
            | NodeKind::InternalQuery(_)
            | NodeKind::Root { .. } => Err(AnalyzerError::Unsupported(format!("'{}' cannot appear in a query", node))),
        }
    }

    /// Close the block, then check what needs the whole query: paging, group
    /// coverage, predicate pushdown and source hints.
    fn bind_query(&mut self, node: &'n Node, children: Vec<Node>) -> Result<Node, AnalyzerError> {
        self.roots.pop();
        let frame = self.ctx.close_query()?;
        let mut info = frame.info;
        let rebuilt = node.rebuild(children)?;
        let NodeKind::Query { from, filter, group_by, select, order_by, skip, take, .. } = rebuilt.kind else {
            return Err(AnalyzerError::unexpected("a query", node));
        };

        let config = self.ctx.config;
        let outcome = Self::check_query(&info, &select, group_by.as_deref(), order_by.as_deref(), [skip.as_deref(), take.as_deref()], config);

        let where_expr = match filter.as_deref().map(|w| &w.kind) {
            Some(NodeKind::Where(expr)) => Some(expr.as_ref()),
            _ => None,
        };
        if let Some(expr) = where_expr {
            PushdownResolver::push_filter(&mut info, expr);
        }
        let hints = PushdownResolver::hints(&info, where_expr.is_some(), order_by.is_some(), skip.as_deref(), take.as_deref(), config);
        if let (Some(hints), Some(source)) = (hints, info.sources.values_mut().next()) {
            source.hints = Some(hints);
        }

        let id = info.id;
        debug!(query = id, sources = info.sources.len(), aggregates = info.refresh.len(), "query block bound");
        self.ctx.store_query(info);
        outcome?;

        Ok(Node::typed(NodeKind::Query { id, from, filter, group_by, select, order_by, skip, take }, RuntimeType::Void))
    }

    fn check_query(
        info: &QueryInfo,
        select: &Node,
        group_by: Option<&Node>,
        order_by: Option<&Node>,
        paging: [Option<&Node>; 2],
        config: &CompilerConfig,
    ) -> Result<(), AnalyzerError> {
        for expr in paging.into_iter().flatten() {
            ClauseValidator::primitive(Clause::Paging, expr, config)?;
        }
        let having = match group_by.map(|g| &g.kind) {
            Some(NodeKind::GroupBy { having, .. }) => having.as_deref(),
            _ => None,
        };
        let order_fields = order_by.map(Node::children).unwrap_or_default();
        let selected: Vec<&Node> = select.select_fields().iter().filter_map(|f| f.as_field().map(|(expr, _)| expr)).collect();
        let order_exprs = order_fields.into_iter().flat_map(Node::children);
        ClauseValidator::group_coverage(info, &selected, having.into_iter().chain(order_exprs))
    }
}

fn operand(ops: &mut std::vec::IntoIter<Node>, node: &Node) -> Result<Node, AnalyzerError> {
    ops.next().ok_or_else(|| StackUnderflow(node.to_string()).into())
}

impl<'a, 'n> Visitor<'n> for SemanticPass<'a, 'n> {
    type Output = Node;
    type Error = AnalyzerError;

    fn children(&mut self, node: &'n Node) -> Vec<&'n Node> {
        match &node.kind {
            // `alias.column` binds as a whole
            NodeKind::Property { root, .. } if matches!(&root.kind, NodeKind::Identifier(a) if self.is_alias(a)) => Vec::new(),
            _ => node.children(),
        }
    }

    fn enter(&mut self, node: &'n Node) -> Result<(), AnalyzerError> {
        match &node.kind {
            NodeKind::Query { .. } => {
                self.ctx.open_query();
                self.roots.extend(ClauseRoots::of(node));
            }
            NodeKind::SchemaFrom { schema, .. } => {
                // a failing lookup surfaces again when the source is bound
                let schema = self.ctx.schema(schema).ok();
                if let Ok(frame) = self.ctx.frame_mut() {
                    frame.from_schema = schema;
                }
            }
            NodeKind::Join { condition, .. } => {
                if let Some(roots) = self.roots.last_mut() {
                    roots.join_conditions.push(condition);
                }
            }
            _ => {}
        }
        if let Some(clause) = self.roots.last().and_then(|r| r.clause_of(node)) {
            self.ctx.set_clause(clause);
        }
        Ok(())
    }

    fn leave(&mut self, node: &'n Node, children: Vec<Node>) -> Result<Node, AnalyzerError> {
        let bound = match self.bind(node, children) {
            Ok(bound) => bound,
            Err(err) if err.is_recoverable() && self.diagnostics.is_some() => {
                if let Some(sink) = self.diagnostics.as_mut() {
                    sink.record(&err, node);
                }
                Self::placeholder()
            }
            Err(err) => return Err(err),
        };
        if self.roots.last().is_some_and(|r| r.is_group_key(node)) {
            self.ctx.frame_mut()?.info.group_keys.push(bound.clone());
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::ErrorKind,
        ast::{ApplyKind, BinaryOp, JoinKind, Literal, QueryBuilder, SetOp},
        methods::NameCache,
        test_fixtures::{analyze, analyze_collecting, analyze_with, dirs, files, provider},
    };
    use tokio_util::sync::CancellationToken;

    fn field_types(analyzed: &AnalyzedQuery) -> Vec<(String, RuntimeType)> {
        analyzed.root.output_fields().iter().filter_map(|f| f.as_field().map(|(e, n)| (n.to_string(), e.ty.clone()))).collect()
    }

    #[test]
    fn binds_columns_and_pushes_the_filter() {
        let q = QueryBuilder::new(files("f"))
            .filter(Node::binary(BinaryOp::Gt, Node::qualified("f", "Length"), Node::integer(10)))
            .select(vec![Node::qualified("f", "Name")])
            .build();
        let analyzed = analyze(&q).unwrap();

        assert_eq!(field_types(&analyzed), vec![("f.Name".to_string(), RuntimeType::String)]);
        let source = analyzed.sources().next().unwrap();
        assert_eq!(source.alias, "f");
        assert_eq!(source.used_columns.iter().cloned().collect::<Vec<_>>(), vec!["Length".to_string(), "Name".to_string()]);
        assert_eq!(source.pushed_where.as_ref().map(|w| w.to_string()), Some("(f.Length > 10)".to_string()));
        let pushed = source.pushed_where.as_ref().unwrap();
        assert!(pushed.children().iter().all(|c| c.ty == RuntimeType::Long || c.ty == RuntimeType::Bool));
        assert!(source.hints.is_none());
    }

    #[test]
    fn misspelled_column_comes_with_suggestions() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::qualified("f", "Nmae")]).build();
        let err = analyze(&q).unwrap_err();
        assert_eq!(err, AnalyzerError::UnknownColumn { name: "f.Nmae".into(), suggestions: vec!["Name".into()] });
    }

    #[test]
    fn bare_names_must_be_unique_across_sources() {
        let cond = Node::binary(BinaryOp::Eq, Node::qualified("a", "Name"), Node::qualified("b", "Name"));
        let q = QueryBuilder::new(Node::join(JoinKind::Inner, files("a"), files("b"), cond)).select(vec![Node::ident("Name")]).build();
        assert_eq!(
            analyze(&q).unwrap_err(),
            AnalyzerError::AmbiguousColumn { name: "Name".into(), aliases: vec!["a".into(), "b".into()] }
        );
    }

    #[test]
    fn outer_join_lifts_the_optional_side() {
        let cond = Node::binary(BinaryOp::Eq, Node::qualified("a", "Name"), Node::qualified("b", "Name"));
        let q = QueryBuilder::new(Node::join(JoinKind::LeftOuter, files("a"), files("b"), cond))
            .select(vec![Node::qualified("a", "Length"), Node::qualified("b", "Length")])
            .build();
        let analyzed = analyze(&q).unwrap();
        let types: Vec<_> = field_types(&analyzed).into_iter().map(|(_, t)| t).collect();
        assert_eq!(types, vec![RuntimeType::Long, RuntimeType::nullable(RuntimeType::Long)]);
        assert!(analyzed.sources().any(|s| s.alias == "b" && s.nullable_side));
    }

    #[test]
    fn aggregates_register_one_mutator_per_identifier() {
        let q = QueryBuilder::new(files("f"))
            .group_by(vec![Node::qualified("f", "Directory")])
            .select(vec![
                Node::qualified("f", "Directory"),
                Node::call("Sum", vec![Node::qualified("f", "Length")]),
                Node::call("sum", vec![Node::qualified("f", "Length")]),
            ])
            .build();
        let analyzed = analyze(&q).unwrap();
        let info = analyzed.query(0).unwrap();
        assert_eq!(info.refresh.len(), 1);
        let refresh = info.refresh.calls().next().unwrap();
        assert_eq!(refresh.to_string(), "SetSum('Sum(f.Length)', f.Length)");
        assert_eq!(refresh.ty, RuntimeType::Void);
        assert_eq!(field_types(&analyzed)[1].1, RuntimeType::Decimal);
    }

    #[test]
    fn generic_aggregate_result_follows_the_argument() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::call("Max", vec![Node::qualified("f", "Modified")])]).build();
        let analyzed = analyze(&q).unwrap();
        assert_eq!(field_types(&analyzed)[0].1, RuntimeType::DateTime);
        assert!(analyzed.query(0).unwrap().is_grouped());
    }

    #[test]
    fn ungrouped_column_is_rejected() {
        let q = QueryBuilder::new(files("f"))
            .group_by(vec![Node::qualified("f", "Directory")])
            .select(vec![Node::qualified("f", "Name"), Node::call("Count", vec![Node::qualified("f", "Name")])])
            .build();
        assert_eq!(analyze(&q).unwrap_err(), AnalyzerError::NonGroupedColumn { column: "f.Name".into() });
    }

    #[test]
    fn aggregates_are_not_allowed_in_where() {
        let q = QueryBuilder::new(files("f"))
            .filter(Node::binary(BinaryOp::Gt, Node::call("Count", vec![Node::qualified("f", "Name")]), Node::integer(1)))
            .select(vec![Node::qualified("f", "Name")])
            .build();
        assert_eq!(analyze(&q).unwrap_err().kind(), ErrorKind::Structural);
    }

    #[test]
    fn field_links_resolve_to_group_keys() {
        let q = QueryBuilder::new(files("f"))
            .group_by(vec![Node::qualified("f", "Extension")])
            .select(vec![Node::named_field(Node::field_link(1), "ext"), Node::call("Count", vec![Node::qualified("f", "Name")])])
            .build();
        let analyzed = analyze(&q).unwrap();
        let (expr, _) = analyzed.root.output_fields()[0].as_field().unwrap();
        assert_eq!(expr.to_string(), "f.Extension");

        let q = QueryBuilder::new(files("f"))
            .group_by(vec![Node::qualified("f", "Extension")])
            .select(vec![Node::field_link(2)])
            .build();
        assert_eq!(analyze(&q).unwrap_err(), AnalyzerError::GroupFieldOutOfRange { index: 2, count: 1 });
    }

    #[test]
    fn wildcard_expands_primitive_columns() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::wildcard(None)]).build();
        let names: Vec<_> = field_types(&analyze(&q).unwrap()).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Name", "Length", "Directory", "Extension", "Modified"]);

        let all = analyze_with(&q, &CompilerConfig::permissive()).unwrap();
        assert_eq!(all.root.output_fields().len(), 7);
    }

    #[test]
    fn structured_columns_expose_their_intended_type() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::property(Node::qualified("f", "Owner"), "Email")]).build();
        assert_eq!(field_types(&analyze(&q).unwrap())[0].1, RuntimeType::String);

        let q = QueryBuilder::new(files("f")).select(vec![Node::qualified("f", "Owner")]).build();
        assert!(matches!(analyze(&q).unwrap_err(), AnalyzerError::NonPrimitiveType { .. }));
    }

    #[test]
    fn entity_methods_need_an_alias_with_several_sources() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::call("Name", vec![])]).build();
        assert_eq!(field_types(&analyze(&q).unwrap())[0].1, RuntimeType::String);

        let cond = Node::binary(BinaryOp::Eq, Node::qualified("a", "Name"), Node::qualified("b", "Name"));
        let q = QueryBuilder::new(Node::join(JoinKind::Inner, files("a"), files("b"), cond))
            .select(vec![Node::call("Name", vec![])])
            .build();
        assert_eq!(analyze(&q).unwrap_err(), AnalyzerError::MissingAlias { method: "Name".into() });
    }

    #[test]
    fn apply_over_an_enumerable_column() {
        let q = QueryBuilder::new(Node::apply(ApplyKind::Cross, dirs("d"), Node::property_from("d", "Files", Some("x"))))
            .select(vec![Node::qualified("d", "Path"), Node::qualified("x", "Length")])
            .build();
        let analyzed = analyze(&q).unwrap();
        assert_eq!(field_types(&analyzed)[1].1, RuntimeType::Long);
        assert_eq!(analyzed.sources().count(), 2);
    }

    #[test]
    fn paging_hints_reach_a_plain_source() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::qualified("f", "Name")]).skip(2).take(5).build();
        let hints = analyze(&q).unwrap().sources().next().unwrap().hints.clone().unwrap();
        assert_eq!((hints.skip, hints.take, hints.distinct), (Some(2), Some(5), false));
    }

    #[test]
    fn distinct_sources_get_no_paging_hints() {
        let q = QueryBuilder::new(files("f")).select(vec![Node::qualified("f", "Name")]).distinct().take(5).build();
        assert!(analyze(&q).unwrap().sources().next().unwrap().hints.is_none());
    }

    #[test]
    fn distinct_ordering_must_use_selected_columns() {
        let q = QueryBuilder::new(files("f"))
            .select(vec![Node::qualified("f", "Name")])
            .distinct()
            .order_by(Node::qualified("f", "Length"), false)
            .build();
        assert_eq!(analyze(&q).unwrap_err(), AnalyzerError::NonGroupedColumn { column: "f.Length".into() });

        let q = QueryBuilder::new(files("f"))
            .select(vec![Node::qualified("f", "Name")])
            .distinct()
            .order_by(Node::qualified("f", "Name"), true)
            .build();
        assert!(analyze(&q).is_ok());
    }

    #[test]
    fn prebound_columns_are_rejected() {
        let column = Node::new(NodeKind::Column { alias: "f".into(), name: "Name".into(), intended_type: None });
        let q = QueryBuilder::new(files("f")).select(vec![column]).build();
        assert!(matches!(analyze(&q).unwrap_err(), AnalyzerError::Unsupported(_)));
    }

    #[test]
    fn unaliased_sources_get_generated_aliases() {
        let q = QueryBuilder::new(Node::schema_from("#os", "files", vec![Node::string("/")], None))
            .select(vec![Node::ident("Name")])
            .build();
        let analyzed = analyze(&q).unwrap();
        assert_eq!(analyzed.sources().next().unwrap().alias, "_files1");
    }

    #[test]
    fn set_operator_shapes_must_agree() {
        let left = QueryBuilder::new(files("a")).select(vec![Node::named_field(Node::qualified("a", "Name"), "Name")]).build();
        let right = QueryBuilder::new(files("b"))
            .select(vec![Node::named_field(Node::qualified("b", "Name"), "Name"), Node::qualified("b", "Length")])
            .build();
        let q = Node::set_operator(SetOp::Union, &["Name"], left.clone(), right);
        assert!(matches!(analyze(&q).unwrap_err(), AnalyzerError::SetOperatorColumnCount { left: 1, right: 2, .. }));

        let q = Node::set_operator(SetOp::Except, &[], left.clone(), left.clone());
        assert!(matches!(analyze(&q).unwrap_err(), AnalyzerError::SetOperatorMissingKeys { .. }));

        let mismatched = QueryBuilder::new(files("b")).select(vec![Node::named_field(Node::qualified("b", "Length"), "Name")]).build();
        let q = Node::set_operator(SetOp::Union, &["Name"], left.clone(), mismatched);
        assert!(matches!(
            analyze(&q).unwrap_err(),
            AnalyzerError::SetOperatorColumnType { position: 1, left: RuntimeType::String, right: RuntimeType::Long, .. }
        ));

        let q = Node::set_operator(SetOp::Union, &["Name"], left.clone(), left);
        let analyzed = analyze(&q).unwrap();
        assert_eq!(analyzed.queries.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn diagnostics_collect_every_recoverable_error() {
        let q = QueryBuilder::new(files("f"))
            .select(vec![Node::qualified("f", "Nme"), Node::qualified("f", "Lenght"), Node::qualified("f", "Name")])
            .build();
        let (result, sink) = analyze_collecting(&q);
        let analyzed = result.unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.diagnostics()[0].code, "QRW101");
        assert_eq!(sink.diagnostics()[1].suggestions, vec!["Length".to_string()]);
        assert_eq!(analyzed.root.output_fields().len(), 3);
    }

    #[test]
    fn date_literals_are_parsed_against_the_column() {
        let q = QueryBuilder::new(files("f"))
            .filter(Node::binary(BinaryOp::GtEq, Node::qualified("f", "Modified"), Node::string("2024-03-01 10:00:00")))
            .select(vec![Node::qualified("f", "Name")])
            .build();
        let analyzed = analyze(&q).unwrap();
        let pushed = analyzed.sources().next().unwrap().pushed_where.clone().unwrap();
        let NodeKind::Binary { right, .. } = pushed.kind else { panic!("expected a comparison") };
        assert!(matches!(right.kind, NodeKind::Literal(Literal::DateTime(_))));
    }

    #[test]
    fn unknown_schema_and_cancellation() {
        let q = QueryBuilder::new(Node::schema_from("#nope", "x", vec![], Some("n"))).select(vec![Node::integer(1)]).build();
        assert_eq!(analyze(&q).unwrap_err(), AnalyzerError::SchemaNotDefined("#nope".into()));

        let provider = provider();
        let cache = NameCache::new();
        let config = CompilerConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let q = QueryBuilder::new(files("f")).select(vec![Node::qualified("f", "Name")]).build();
        let err = SemanticPass::analyze(&q, AnalysisContext::new(&provider, &cache, &config, &cancel)).unwrap_err();
        assert_eq!(err, AnalyzerError::Cancelled);
    }
}
