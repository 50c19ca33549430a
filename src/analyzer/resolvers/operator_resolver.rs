use crate::{
    analyzer::AnalyzerError,
    ast::{BinaryOp, Literal, Node, NodeKind, UnaryOp},
    types::{RuntimeType, TypeCompatibility},
};

/// Types operators and reconciles literals with the operand on the other side.
pub struct OperatorResolver;

impl OperatorResolver {
    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Result<Node, AnalyzerError> {
        if left.ty.unwrap_nullable().is_object() || right.ty.unwrap_nullable().is_object() {
            let ty = if op.is_arithmetic() { RuntimeType::Object } else { RuntimeType::Bool };
            return Ok(Node::typed(NodeKind::DynamicOperator { op, left: left.into_box(), right: right.into_box() }, ty));
        }

        if op.is_logical() {
            Self::expect_bool(&op.to_string(), &left)?;
            Self::expect_bool(&op.to_string(), &right)?;
            return Ok(Self::build(op, left, right, RuntimeType::Bool));
        }

        let (left, right) = Self::coerce_pair(left, right)?;

        let ty = if op.is_pattern() {
            let is_text = |t: &RuntimeType| matches!(t.unwrap_nullable(), RuntimeType::String | RuntimeType::Null);
            if !is_text(&left.ty) || !is_text(&right.ty) {
                return Err(Self::mismatch(op, &left, &right));
            }
            RuntimeType::Bool
        } else if op.is_comparison() {
            if !Self::comparable(&left.ty, &right.ty) {
                return Err(Self::mismatch(op, &left, &right));
            }
            RuntimeType::Bool
        } else {
            Self::arithmetic(op, &left.ty, &right.ty).ok_or_else(|| Self::mismatch(op, &left, &right))?
        };
        Ok(Self::build(op, left, right, ty))
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Result<Node, AnalyzerError> {
        let ty = match op {
            UnaryOp::Not => {
                Self::expect_bool("NOT", &operand)?;
                RuntimeType::Bool
            }
            UnaryOp::Neg => {
                let bare = operand.ty.unwrap_nullable();
                if !bare.is_numeric() && *bare != RuntimeType::TimeSpan && !bare.is_object() {
                    return Err(AnalyzerError::OperatorTypeMismatch {
                        op: "-".into(),
                        left: operand.ty.clone(),
                        right: operand.ty.clone(),
                    });
                }
                operand.ty.clone()
            }
        };
        Ok(Node::typed(NodeKind::Unary { op, operand: operand.into_box() }, ty))
    }

    /// `children` holds when/then pairs followed by the optional else branch.
    pub fn case(children: Vec<Node>, has_otherwise: bool) -> Result<Node, AnalyzerError> {
        let mut iter = children.into_iter();
        let branch_count = if has_otherwise { iter.len().saturating_sub(1) } else { iter.len() };
        let pair_count = branch_count / 2;
        let mut whens = Vec::with_capacity(pair_count);
        for _ in 0..pair_count {
            let (Some(when), Some(then)) = (iter.next(), iter.next()) else {
                return Err(AnalyzerError::unexpected("a WHEN/THEN pair", "end of CASE"));
            };
            Self::expect_bool("CASE", &when)?;
            whens.push((when, then));
        }
        let otherwise = iter.next();

        let mut branches: Vec<RuntimeType> = whens.iter().map(|(_, t)| t.ty.clone()).collect();
        branches.push(otherwise.as_ref().map(|o| o.ty.clone()).unwrap_or(RuntimeType::Null));
        let ty = if branches.iter().any(|t| t.unwrap_nullable().is_object()) {
            RuntimeType::Object
        } else {
            TypeCompatibility::common_type(&branches).ok_or_else(|| AnalyzerError::OperatorTypeMismatch {
                op: "case".into(),
                left: branches[0].clone(),
                right: branches.iter().find(|t| **t != branches[0]).cloned().unwrap_or(RuntimeType::Null),
            })?
        };
        Ok(Node::typed(NodeKind::Case { whens, otherwise: otherwise.map(Box::new) }, ty))
    }

    pub fn in_list(expr: Node, list: Vec<Node>, negated: bool) -> Result<Node, AnalyzerError> {
        let mut items = Vec::with_capacity(list.len());
        for item in list {
            let (e, item) = Self::coerce_pair(expr.clone(), item)?;
            if !e.ty.is_object() && !item.ty.is_object() && !Self::comparable(&e.ty, &item.ty) {
                return Err(Self::mismatch(BinaryOp::Eq, &e, &item));
            }
            items.push(item);
        }
        Ok(Node::typed(NodeKind::InList { expr: expr.into_box(), list: items, negated }, RuntimeType::Bool))
    }

    pub fn is_null(expr: Node, negated: bool) -> Node {
        Node::typed(NodeKind::IsNull { expr: expr.into_box(), negated }, RuntimeType::Bool)
    }

    pub fn expect_bool(clause: &str, node: &Node) -> Result<(), AnalyzerError> {
        if node.ty.is_bool() || node.ty == RuntimeType::Null || node.ty.is_object() || node.is_placeholder() {
            Ok(())
        } else {
            Err(AnalyzerError::ExpectedBoolean { clause: clause.to_string(), expr: node.to_string(), ty: node.ty.clone() })
        }
    }

    fn build(op: BinaryOp, left: Node, right: Node, ty: RuntimeType) -> Node {
        Node::typed(NodeKind::Binary { op, left: left.into_box(), right: right.into_box() }, ty)
    }

    fn mismatch(op: BinaryOp, left: &Node, right: &Node) -> AnalyzerError {
        AnalyzerError::OperatorTypeMismatch { op: op.to_string(), left: left.ty.clone(), right: right.ty.clone() }
    }

    /// Rewrite a literal operand into the type of the other side: date/time
    /// strings are parsed, numeric literals converted when lossless.
    fn coerce_pair(left: Node, right: Node) -> Result<(Node, Node), AnalyzerError> {
        let left = Self::coerce_literal(left, &right)?;
        let right = Self::coerce_literal(right, &left)?;
        Ok((left, right))
    }

    fn coerce_literal(node: Node, other: &Node) -> Result<Node, AnalyzerError> {
        let NodeKind::Literal(literal) = &node.kind else {
            return Ok(node);
        };
        if other.is_literal() {
            return Ok(node);
        }
        let target = other.ty.unwrap_nullable();
        match literal {
            Literal::String(text) if target.is_date_time() => {
                let parsed = Literal::parse_temporal(text, target)
                    .ok_or_else(|| AnalyzerError::InvalidLiteral { literal: literal.to_string(), target: target.clone() })?;
                Ok(Node::typed(NodeKind::Literal(parsed), target.clone()))
            }
            Literal::Integer(_) | Literal::Decimal(_) | Literal::Real(_) if target.is_numeric() && node.ty != *target => {
                match literal.convert_numeric(target) {
                    Some(converted) => Ok(Node::typed(NodeKind::Literal(converted), target.clone())),
                    None => Ok(node),
                }
            }
            _ => Ok(node),
        }
    }

    fn comparable(left: &RuntimeType, right: &RuntimeType) -> bool {
        let (l, r) = (left.unwrap_nullable(), right.unwrap_nullable());
        if *l == RuntimeType::Null || *r == RuntimeType::Null {
            let other = if *l == RuntimeType::Null { right } else { left };
            return *other == RuntimeType::Null || other.is_nullable() || other.is_reference_type();
        }
        l == r
            || TypeCompatibility::promote_numeric(l, r).is_some()
            || matches!((l, r), (RuntimeType::String, RuntimeType::Char) | (RuntimeType::Char, RuntimeType::String))
    }

    fn arithmetic(op: BinaryOp, left: &RuntimeType, right: &RuntimeType) -> Option<RuntimeType> {
        use RuntimeType::*;
        let lifted = left.is_nullable() || right.is_nullable();
        let (l, r) = (left.unwrap_nullable(), right.unwrap_nullable());

        let ty = match (op, l, r) {
            (BinaryOp::Add, String, String | Char | Null) | (BinaryOp::Add, Char | Null, String) => return Some(String),
            (_, Null, other) | (_, other, Null) if other.is_numeric() || *other == TimeSpan => other.clone(),
            (BinaryOp::Sub, DateTime, DateTime) | (BinaryOp::Sub, DateTimeOffset, DateTimeOffset) => TimeSpan,
            (BinaryOp::Add | BinaryOp::Sub, DateTime | DateTimeOffset, TimeSpan) => l.clone(),
            (BinaryOp::Add, TimeSpan, DateTime | DateTimeOffset) => r.clone(),
            (BinaryOp::Add | BinaryOp::Sub, TimeSpan, TimeSpan) => TimeSpan,
            _ => TypeCompatibility::promote_numeric(l, r)?,
        };
        let null_operand = *l == Null || *r == Null;
        Some(if lifted || null_operand { RuntimeType::nullable(ty) } else { ty })
    }
}
