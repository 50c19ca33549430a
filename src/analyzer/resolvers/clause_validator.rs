use std::collections::HashSet;

use crate::{
    analyzer::{AnalyzerError, Clause, OperatorResolver, QueryInfo},
    ast::{Node, NodeKind, SetOp},
    config::CompilerConfig,
    types::RuntimeType,
};

/// Clause-level checks run once a clause is fully bound.
pub struct ClauseValidator;

impl ClauseValidator {
    /// Relational clauses only carry primitive values. Subtrees that already
    /// failed are skipped.
    pub fn primitive(clause: Clause, expr: &Node, config: &CompilerConfig) -> Result<(), AnalyzerError> {
        if !config.validate_primitive_types || expr.any(Node::is_placeholder) || expr.ty.is_primitive_safe() {
            return Ok(());
        }
        Err(AnalyzerError::NonPrimitiveType { clause: clause.to_string(), expr: expr.to_string(), ty: expr.ty.clone() })
    }

    pub fn predicate(clause: Clause, expr: &Node, config: &CompilerConfig) -> Result<(), AnalyzerError> {
        OperatorResolver::expect_bool(&clause.to_string(), expr)?;
        Self::primitive(clause, expr, config)
    }

    /// Every column read by SELECT, HAVING or ORDER BY of a grouped query must be
    /// a group key or sit inside an aggregate. A DISTINCT without GROUP BY is
    /// keyed by its `selected` expressions.
    pub fn group_coverage<'n>(
        info: &QueryInfo,
        selected: &[&'n Node],
        others: impl IntoIterator<Item = &'n Node>,
    ) -> Result<(), AnalyzerError> {
        if !info.is_grouped() {
            return Ok(());
        }
        let keys: HashSet<String> = if info.group_keys.is_empty() && info.distinct {
            selected.iter().map(|e| e.to_string()).collect()
        } else {
            info.group_keys.iter().map(|k| k.to_string()).collect()
        };
        for expr in selected.iter().copied().chain(others) {
            let mut pending = vec![expr];
            while let Some(node) = pending.pop() {
                if node.is_aggregate() || keys.contains(&node.to_string()) {
                    continue;
                }
                if let NodeKind::Column { .. } = node.kind {
                    return Err(AnalyzerError::NonGroupedColumn { column: node.to_string() });
                }
                pending.extend(node.children());
            }
        }
        Ok(())
    }

    /// Both sides of a set operator line up column by column, and every key
    /// names an output column of the left side.
    pub fn set_operator(op: SetOp, keys: &[String], left: &Node, right: &Node) -> Result<(), AnalyzerError> {
        if keys.is_empty() {
            return Err(AnalyzerError::SetOperatorMissingKeys { op: op.to_string() });
        }
        if left.is_placeholder() || right.is_placeholder() {
            return Ok(());
        }
        let (lf, rf) = (left.output_fields(), right.output_fields());
        if lf.len() != rf.len() {
            return Err(AnalyzerError::SetOperatorColumnCount { op: op.to_string(), left: lf.len(), right: rf.len() });
        }
        for (position, (l, r)) in lf.iter().zip(rf).enumerate() {
            let skip = l.is_placeholder() || r.is_placeholder() || l.ty == RuntimeType::Null || r.ty == RuntimeType::Null;
            if !skip && l.ty != r.ty {
                return Err(AnalyzerError::SetOperatorColumnType {
                    op: op.to_string(),
                    position: position + 1,
                    left: l.ty.clone(),
                    right: r.ty.clone(),
                });
            }
        }
        let names: HashSet<&str> = lf.iter().filter_map(|f| f.as_field().map(|(_, name)| name)).collect();
        match keys.iter().find(|k| !names.contains(k.as_str())) {
            Some(key) => Err(AnalyzerError::SetOperatorUnknownKey { op: op.to_string(), key: key.clone() }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn column(name: &str) -> Node {
        Node::typed(NodeKind::Column { alias: "f".into(), name: name.into(), intended_type: None }, RuntimeType::String)
    }

    #[test]
    fn objects_are_rejected_unless_permissive() {
        let obj = Node::typed(NodeKind::Column { alias: "f".into(), name: "Raw".into(), intended_type: None }, RuntimeType::Object);
        assert!(ClauseValidator::primitive(Clause::Select, &obj, &CompilerConfig::default()).is_err());
        assert!(ClauseValidator::primitive(Clause::Select, &obj, &CompilerConfig::permissive()).is_ok());
    }

    #[test]
    fn ungrouped_columns_are_reported() {
        let mut info = QueryInfo::new(0);
        info.group_keys.push(column("Directory"));

        let ok = Node::binary(BinaryOp::Add, column("Directory"), column("Directory"));
        assert!(ClauseValidator::group_coverage(&info, &[], [&ok]).is_ok());

        let bad = column("Name");
        assert_eq!(
            ClauseValidator::group_coverage(&info, &[&bad], []),
            Err(AnalyzerError::NonGroupedColumn { column: "f.Name".into() })
        );
    }

    #[test]
    fn distinct_is_keyed_by_the_selection() {
        let mut info = QueryInfo::new(0);
        info.distinct = true;
        let (name, length) = (column("Name"), column("Length"));

        assert!(ClauseValidator::group_coverage(&info, &[&name], [&name]).is_ok());
        assert_eq!(
            ClauseValidator::group_coverage(&info, &[&name], [&length]),
            Err(AnalyzerError::NonGroupedColumn { column: "f.Length".into() })
        );
    }
}
