use tracing::debug;

use crate::{
    analyzer::{AnalyzerError, QueryInfo},
    ast::{ApplyKind, InternalQuery, JoinKind, Node, NodeKind, rewrite},
    planner::{ColumnUsage, QueryParts, TableNamer, create_table, in_memory, internal_query},
    types::RuntimeType,
};

enum Link {
    Join { kind: JoinKind, condition: Node },
    Apply(ApplyKind),
}

struct Step {
    link: Link,
    right: Node,
}

/// Result of decomposing a multi-source FROM.
#[derive(Debug, Clone)]
pub struct JoinRewrite {
    /// Source downstream clauses read from
    pub from: Node,
    pub statements: Vec<Node>,
    /// Table of the last step and the aliases merged into it
    pub table: Option<String>,
    pub aliases: Vec<String>,
}

impl JoinRewrite {
    /// Point columns of merged sources at the last step's table.
    pub fn remap(&self, expr: &Node) -> Result<Node, AnalyzerError> {
        match &self.table {
            Some(table) => remap_columns(expr, table, &self.aliases),
            None => Ok(expr.clone()),
        }
    }
}

/// `alias.column` read from a materialized table whose columns are named `alias.column`.
/// Whole rows live in a column named after the alias, so aliased calls move to `table.alias`.
fn remap_columns(expr: &Node, table: &str, aliases: &[String]) -> Result<Node, AnalyzerError> {
    rewrite(expr, |node: Node| -> Result<Node, AnalyzerError> {
        match node.kind {
            NodeKind::Column { alias, name, intended_type } if aliases.contains(&alias) => Ok(Node::typed(
                NodeKind::Column { alias: table.to_string(), name: format!("{}.{}", alias, name), intended_type },
                node.ty,
            )),
            NodeKind::SourceRow { alias } if aliases.contains(&alias) => {
                Ok(Node::typed(NodeKind::Column { alias: table.to_string(), name: alias, intended_type: None }, node.ty))
            }
            NodeKind::Method { alias: Some(alias), name, args, binding } if aliases.contains(&alias) => Ok(Node::typed(
                NodeKind::Method { alias: Some(format!("{}.{}", table, alias)), name, args, binding },
                node.ty,
            )),
            kind => Ok(Node::typed(kind, node.ty)),
        }
    })
}

fn alias_of(source: &Node) -> Result<String, AnalyzerError> {
    source.from_alias().map(str::to_string).ok_or_else(|| AnalyzerError::unexpected("an aliased source", source))
}

/// Decomposes joins and applies into a left-deep chain of pairwise steps,
/// each materialized into a table holding only the columns read later.
pub struct JoinRewriter;

impl JoinRewriter {
    fn flatten(from: &Node) -> Result<(Node, Vec<Step>), AnalyzerError> {
        let mut steps = Vec::new();
        let mut node = from;
        loop {
            match &node.kind {
                NodeKind::Join { kind, left, right, condition } => {
                    steps.push(Step { link: Link::Join { kind: *kind, condition: condition.as_ref().clone() }, right: right.as_ref().clone() });
                    node = left;
                }
                NodeKind::Apply { kind, left, right } => {
                    steps.push(Step { link: Link::Apply(*kind), right: right.as_ref().clone() });
                    node = left;
                }
                NodeKind::SchemaFrom { .. } | NodeKind::PropertyFrom { .. } | NodeKind::InMemoryFrom { .. } => break,
                _ => return Err(AnalyzerError::unexpected("a source", node)),
            }
        }
        steps.reverse();
        if let Some(step) = steps.iter().find(|s| matches!(s.right.kind, NodeKind::Join { .. } | NodeKind::Apply { .. })) {
            return Err(AnalyzerError::Unsupported(format!("nested source '{}' on the right of a join", step.right)));
        }
        Ok((node.clone(), steps))
    }

    fn property_type(info: &QueryInfo, alias: &str, property: &str) -> RuntimeType {
        info.sources
            .get(alias)
            .and_then(|s| s.columns.iter().find(|c| c.name == property))
            .map(|c| c.ty.clone())
            .unwrap_or(RuntimeType::Object)
    }

    fn entity_type(info: &QueryInfo, alias: &str) -> RuntimeType {
        info.sources.get(alias).map(|s| s.entity.clone()).unwrap_or(RuntimeType::Object)
    }

    /// Columns each step must carry: whatever the query body, later join
    /// conditions or later applies still read.
    fn needed_after(steps: &[Step], parts: &QueryParts, info: &QueryInfo) -> Vec<ColumnUsage> {
        let mut needed = vec![ColumnUsage::new(); steps.len()];
        let mut acc = ColumnUsage::of(parts.expressions());
        for (i, step) in steps.iter().enumerate().rev() {
            needed[i] = acc.clone();
            if let Link::Join { condition, .. } = &step.link {
                acc.add(condition);
            }
            if let NodeKind::PropertyFrom { source, property, .. } = &step.right.kind {
                acc.insert(source, property, Self::property_type(info, source, property));
            }
        }
        needed
    }

    pub fn rewrite(parts: &QueryParts, info: &QueryInfo, namer: &mut TableNamer) -> Result<JoinRewrite, AnalyzerError> {
        let (first, steps) = Self::flatten(&parts.from)?;
        let mut aliases = vec![alias_of(&first)?];
        if steps.is_empty() {
            return Ok(JoinRewrite { from: first, statements: Vec::new(), table: None, aliases });
        }

        let needed = Self::needed_after(&steps, parts, info);
        let mut statements = Vec::with_capacity(steps.len() * 2);
        let mut base = TableNamer::source_name(&first);
        let mut left = first;
        let mut previous: Option<String> = None;

        for (step, needed) in steps.into_iter().zip(needed) {
            let merged = aliases.len();
            let read = |expr: &Node| match &previous {
                Some(table) => remap_columns(expr, table, &aliases[..merged]),
                None => Ok(expr.clone()),
            };

            let right = match (&step.right.kind, &previous) {
                (NodeKind::PropertyFrom { source, property, alias }, Some(table)) if aliases.contains(source) => Node::typed(
                    NodeKind::PropertyFrom { source: table.clone(), property: format!("{}.{}", source, property), alias: alias.clone() },
                    step.right.ty.clone(),
                ),
                _ => step.right.clone(),
            };
            let right_alias = alias_of(&step.right)?;
            base = format!("{}_{}", base, TableNamer::source_name(&step.right));

            let source = match step.link {
                Link::Join { kind, condition } => Node::typed(
                    NodeKind::JoinStep { kind, left: left.into_box(), right: right.into_box(), condition: read(&condition)?.into_box() },
                    RuntimeType::Void,
                ),
                Link::Apply(kind) => Node::typed(NodeKind::ApplyStep { kind, left: left.into_box(), right: right.into_box() }, RuntimeType::Void),
            };

            let mut fields = Vec::new();
            for alias in aliases.iter().chain(std::iter::once(&right_alias)) {
                for (column, ty) in needed.columns(alias) {
                    let expr = Node::typed(NodeKind::Column { alias: alias.clone(), name: column.to_string(), intended_type: None }, ty.clone());
                    let name = format!("{}.{}", alias, column);
                    fields.push(Node::typed(NodeKind::Field { expr: read(&expr)?.into_box(), name }, ty.clone()));
                }
                if needed.reads_row(alias) {
                    let ty = Self::entity_type(info, alias);
                    let row = Node::typed(NodeKind::SourceRow { alias: alias.clone() }, ty.clone());
                    fields.push(Node::typed(NodeKind::Field { expr: read(&row)?.into_box(), name: alias.clone() }, ty));
                }
            }

            let table = namer.name(&[base.as_str(), "joined"]);
            debug!(table = %table, columns = fields.len(), "join step");
            statements.push(create_table(&table, &fields, Vec::new(), false));
            statements.push(internal_query(InternalQuery::new(&table, source, fields)));

            aliases.push(right_alias);
            left = in_memory(&table);
            previous = Some(table);
        }

        Ok(JoinRewrite { from: left, statements, table: previous, aliases })
    }
}
