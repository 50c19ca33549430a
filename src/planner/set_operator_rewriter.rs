use tracing::debug;

use crate::{
    analyzer::AnalyzerError,
    ast::{InternalQuery, Node, NodeKind, SetOp},
    planner::{PlanFragment, TableNamer, and, create_table, in_memory, internal_query, read_all},
    types::RuntimeType,
};

/// Membership test added to the query feeding a set-operator table.
struct Guard {
    table: String,
    columns: Vec<String>,
    negated: bool,
}

impl Guard {
    fn test(&self, values: Vec<Node>) -> Node {
        Node::typed(
            NodeKind::TableContains { table: self.table.clone(), columns: self.columns.clone(), values, negated: self.negated },
            RuntimeType::Bool,
        )
    }
}

/// Rewrites UNION, UNION ALL, EXCEPT and INTERSECT into keyed table writes.
///
/// UNION writes both sides into one keyed table, skipping rows whose key is
/// already there; UNION ALL skips nothing. EXCEPT and INTERSECT materialize
/// the right side and keep left rows whose key is absent from it or present
/// in it. A chained UNION appends to the table of the operator before it.
pub struct SetOperatorRewriter;

impl SetOperatorRewriter {
    pub fn rewrite(
        op: SetOp,
        keys: &[String],
        left: PlanFragment,
        right: PlanFragment,
        namer: &mut TableNamer,
    ) -> Result<PlanFragment, AnalyzerError> {
        if keys.is_empty() {
            return Err(AnalyzerError::SetOperatorMissingKeys { op: op.to_string() });
        }
        let left_names = left.field_names();
        let positions = keys
            .iter()
            .map(|k| {
                left_names
                    .iter()
                    .position(|n| n == k)
                    .ok_or_else(|| AnalyzerError::SetOperatorUnknownKey { op: op.to_string(), key: k.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match op {
            SetOp::Union | SetOp::UnionAll => Self::union(op, keys, &positions, left, right, namer),
            SetOp::Except | SetOp::Intersect => Self::filter_by(op, keys, &positions, left, right, namer),
        }
    }

    fn union(
        op: SetOp,
        keys: &[String],
        positions: &[usize],
        left: PlanFragment,
        right: PlanFragment,
        namer: &mut TableNamer,
    ) -> Result<PlanFragment, AnalyzerError> {
        let guard = |table: &str| {
            (op == SetOp::Union).then(|| Guard { table: table.to_string(), columns: keys.to_vec(), negated: true })
        };

        if !left.retargetable {
            // a set-operator result already: keep appending to its table
            let (prefix, last) = Self::retarget(right, &left.result, positions, guard(&left.result).as_ref())?;
            debug!(table = %left.result, op = %op, "set operator appends");
            let mut statements = left.statements;
            statements.extend(prefix);
            statements.push(last);
            return Ok(PlanFragment { statements, ..left });
        }

        let table = namer.name(&[left.base.as_str(), op.to_string().as_str(), right.base.as_str()]);
        debug!(table = %table, op = %op, "set operator table");
        let guard = guard(&table);
        let fields = left.fields.clone();
        let (left_prefix, left_last) = Self::retarget(left, &table, positions, guard.as_ref())?;
        let (right_prefix, right_last) = Self::retarget(right, &table, positions, guard.as_ref())?;

        let mut statements = left_prefix;
        statements.push(create_table(&table, &fields, keys.to_vec(), false));
        statements.push(left_last);
        statements.extend(right_prefix);
        statements.push(right_last);
        Ok(PlanFragment { statements, result: table.clone(), fields, base: table, retargetable: false })
    }

    fn filter_by(
        op: SetOp,
        keys: &[String],
        positions: &[usize],
        left: PlanFragment,
        mut right: PlanFragment,
        namer: &mut TableNamer,
    ) -> Result<PlanFragment, AnalyzerError> {
        let right_names = right.field_names();
        let columns: Vec<String> = positions.iter().filter_map(|p| right_names.get(*p).cloned()).collect();
        if right.retargetable {
            Self::key_result_table(&mut right, &columns);
        }
        let guard = Guard { table: right.result.clone(), columns, negated: op == SetOp::Except };

        let table = namer.name(&[left.base.as_str(), op.to_string().as_str(), right.base.as_str()]);
        debug!(table = %table, op = %op, against = %right.result, "set operator table");
        let fields = left.fields.clone();
        let (left_prefix, left_last) = Self::retarget(left, &table, positions, Some(&guard))?;

        let mut statements = left_prefix;
        statements.extend(right.statements);
        statements.push(create_table(&table, &fields, keys.to_vec(), false));
        statements.push(left_last);
        Ok(PlanFragment { statements, result: table.clone(), fields, base: table, retargetable: false })
    }

    fn key_result_table(fragment: &mut PlanFragment, columns: &[String]) {
        let Some(index) = fragment.statements.len().checked_sub(2) else {
            return;
        };
        if let Some(NodeKind::CreateTable { keys, .. }) = fragment.statements.get_mut(index).map(|s| &mut s.kind) {
            *keys = columns.to_vec();
        }
    }

    /// Statements that write `fragment`'s rows into `into`, split into the
    /// preparation steps and the final write. A single query is redirected;
    /// a set-operator result is copied over.
    fn retarget(
        mut fragment: PlanFragment,
        into: &str,
        positions: &[usize],
        guard: Option<&Guard>,
    ) -> Result<(Vec<Node>, Node), AnalyzerError> {
        let values = fragment.values_at(positions);
        if fragment.retargetable {
            let last = fragment.statements.pop().ok_or_else(|| AnalyzerError::unexpected("a final query", &fragment.result))?;
            let NodeKind::InternalQuery(mut query) = last.kind else {
                return Err(AnalyzerError::unexpected("a final query", &fragment.result));
            };
            // drop the table the query was writing to
            fragment.statements.pop();
            query.into = into.to_string();
            if let Some(guard) = guard {
                query.filter = Some(and(query.filter.take(), guard.test(values)));
            }
            return Ok((fragment.statements, internal_query(*query)));
        }

        let copy = InternalQuery {
            filter: guard.map(|g| g.test(values)),
            ..InternalQuery::new(into, in_memory(&fragment.result), read_all(&fragment.result, &fragment.fields))
        };
        Ok((fragment.statements, internal_query(copy)))
    }
}
