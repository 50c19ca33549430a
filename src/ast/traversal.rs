use thiserror::Error;

use crate::{
    ast::{InternalQuery, Node, NodeKind},
    types::RuntimeType,
};

/// A pass popped more operands than the node it was rebuilding produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operand stack underflow while rebuilding '{0}'")]
pub struct StackUnderflow(pub String);

/// Bottom-up pass over a tree, driven by `walk`.
///
/// `leave` receives the outputs of the node's children in the order
/// `children` listed them.
pub trait Visitor<'n> {
    type Output;
    type Error: From<StackUnderflow>;

    fn children(&mut self, node: &'n Node) -> Vec<&'n Node> {
        node.children()
    }

    fn enter(&mut self, _node: &'n Node) -> Result<(), Self::Error> {
        Ok(())
    }

    fn leave(&mut self, node: &'n Node, children: Vec<Self::Output>) -> Result<Self::Output, Self::Error>;
}

enum Frame<'n> {
    Enter(&'n Node),
    Exit(&'n Node, usize),
}

/// Post-order traversal with an explicit work stack and operand stack, so
/// deeply nested expressions never grow the native call stack.
pub fn walk<'n, V: Visitor<'n>>(root: &'n Node, visitor: &mut V) -> Result<V::Output, V::Error> {
    let mut work = vec![Frame::Enter(root)];
    let mut operands: Vec<V::Output> = Vec::new();

    while let Some(frame) = work.pop() {
        match frame {
            Frame::Enter(node) => {
                visitor.enter(node)?;
                let children = visitor.children(node);
                work.push(Frame::Exit(node, children.len()));
                work.extend(children.into_iter().rev().map(Frame::Enter));
            }
            Frame::Exit(node, arity) => {
                let split = operands
                    .len()
                    .checked_sub(arity)
                    .ok_or_else(|| StackUnderflow(node.to_string()))?;
                let args = operands.split_off(split);
                operands.push(visitor.leave(node, args)?);
            }
        }
    }

    operands.pop().ok_or_else(|| StackUnderflow(root.to_string()).into())
}

struct Rebuilder<F> {
    f: F,
}

impl<'n, E, F> Visitor<'n> for Rebuilder<F>
where
    E: From<StackUnderflow>,
    F: FnMut(Node) -> Result<Node, E>,
{
    type Output = Node;
    type Error = E;

    fn leave(&mut self, node: &'n Node, children: Vec<Node>) -> Result<Node, E> {
        let rebuilt = node.rebuild(children)?;
        (self.f)(rebuilt)
    }
}

/// Rebuild `root` bottom-up, passing every rebuilt node through `f`.
pub fn rewrite<E, F>(root: &Node, f: F) -> Result<Node, E>
where
    E: From<StackUnderflow>,
    F: FnMut(Node) -> Result<Node, E>,
{
    walk(root, &mut Rebuilder { f })
}

struct Operands<'a> {
    iter: std::vec::IntoIter<Node>,
    owner: &'a Node,
}

impl Operands<'_> {
    fn one(&mut self) -> Result<Node, StackUnderflow> {
        self.iter.next().ok_or_else(|| StackUnderflow(self.owner.to_string()))
    }

    fn boxed(&mut self) -> Result<Box<Node>, StackUnderflow> {
        self.one().map(Box::new)
    }

    fn many(&mut self, n: usize) -> Result<Vec<Node>, StackUnderflow> {
        (0..n).map(|_| self.one()).collect()
    }

    fn maybe(&mut self, present: bool) -> Result<Option<Node>, StackUnderflow> {
        if present { self.one().map(Some) } else { Ok(None) }
    }

    fn maybe_boxed(&mut self, present: bool) -> Result<Option<Box<Node>>, StackUnderflow> {
        Ok(self.maybe(present)?.map(Box::new))
    }
}

impl Node {
    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Literal(_)
            | NodeKind::Identifier(_)
            | NodeKind::Column { .. }
            | NodeKind::FieldLink(_)
            | NodeKind::Wildcard { .. }
            | NodeKind::Placeholder
            | NodeKind::AggregateRef { .. }
            | NodeKind::GroupKeyRef { .. }
            | NodeKind::SourceRow { .. }
            | NodeKind::InMemoryFrom { .. }
            | NodeKind::PropertyFrom { .. }
            | NodeKind::CreateTable { .. } => Vec::new(),
            NodeKind::Property { root, .. } => vec![root.as_ref()],
            NodeKind::Index { root, index } => vec![root.as_ref(), index.as_ref()],
            NodeKind::Method { args, .. } | NodeKind::SchemaFrom { args, .. } => args.iter().collect(),
            NodeKind::Binary { left, right, .. }
            | NodeKind::DynamicOperator { left, right, .. }
            | NodeKind::Apply { left, right, .. }
            | NodeKind::ApplyStep { left, right, .. }
            | NodeKind::SetOperator { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            NodeKind::Unary { operand, .. } => vec![operand.as_ref()],
            NodeKind::Case { whens, otherwise } => whens
                .iter()
                .flat_map(|(w, t)| [w, t])
                .chain(otherwise.as_deref())
                .collect(),
            NodeKind::InList { expr, list, .. } => std::iter::once(expr.as_ref()).chain(list).collect(),
            NodeKind::IsNull { expr, .. }
            | NodeKind::Field { expr, .. }
            | NodeKind::Where(expr)
            | NodeKind::OrderField { expr, .. } => vec![expr.as_ref()],
            NodeKind::Select { fields, .. } | NodeKind::OrderBy(fields) => fields.iter().collect(),
            NodeKind::GroupBy { keys, having } => keys.iter().chain(having.as_deref()).collect(),
            NodeKind::TableContains { values, .. } => values.iter().collect(),
            NodeKind::Join { left, right, condition, .. } | NodeKind::JoinStep { left, right, condition, .. } => {
                vec![left.as_ref(), right.as_ref(), condition.as_ref()]
            }
            NodeKind::Query { from, filter, group_by, select, order_by, skip, take, .. } => {
                let mut out: Vec<&Node> = vec![from.as_ref()];
                out.extend(filter.as_deref());
                out.extend(group_by.as_deref());
                out.push(select.as_ref());
                out.extend(order_by.as_deref());
                out.extend(skip.as_deref());
                out.extend(take.as_deref());
                out
            }
            NodeKind::InternalQuery(q) => {
                let mut out: Vec<&Node> = vec![&q.from];
                out.extend(q.filter.as_ref());
                out.extend(&q.group_by);
                out.extend(&q.refresh);
                out.extend(&q.select);
                out.extend(&q.order_by);
                out.extend(q.skip.as_ref());
                out.extend(q.take.as_ref());
                out
            }
            NodeKind::Root { statements, .. } => statements.iter().collect(),
        }
    }

    /// Copy of this node with its children replaced, in `children()` order.
    /// The node keeps its own type.
    pub fn rebuild(&self, children: Vec<Node>) -> Result<Node, StackUnderflow> {
        let mut ops = Operands { iter: children.into_iter(), owner: self };
        let kind = match &self.kind {
            NodeKind::Literal(_)
            | NodeKind::Identifier(_)
            | NodeKind::Column { .. }
            | NodeKind::FieldLink(_)
            | NodeKind::Wildcard { .. }
            | NodeKind::Placeholder
            | NodeKind::AggregateRef { .. }
            | NodeKind::GroupKeyRef { .. }
            | NodeKind::SourceRow { .. }
            | NodeKind::InMemoryFrom { .. }
            | NodeKind::PropertyFrom { .. }
            | NodeKind::CreateTable { .. } => self.kind.clone(),
            NodeKind::Property { member, .. } => NodeKind::Property { root: ops.boxed()?, member: member.clone() },
            NodeKind::Index { .. } => NodeKind::Index { root: ops.boxed()?, index: ops.boxed()? },
            NodeKind::Method { alias, name, args, binding } => NodeKind::Method {
                alias: alias.clone(),
                name: name.clone(),
                args: ops.many(args.len())?,
                binding: binding.clone(),
            },
            NodeKind::SchemaFrom { schema, method, args, alias } => NodeKind::SchemaFrom {
                schema: schema.clone(),
                method: method.clone(),
                args: ops.many(args.len())?,
                alias: alias.clone(),
            },
            NodeKind::Binary { op, .. } => NodeKind::Binary { op: *op, left: ops.boxed()?, right: ops.boxed()? },
            NodeKind::DynamicOperator { op, .. } => NodeKind::DynamicOperator { op: *op, left: ops.boxed()?, right: ops.boxed()? },
            NodeKind::Apply { kind, .. } => NodeKind::Apply { kind: *kind, left: ops.boxed()?, right: ops.boxed()? },
            NodeKind::ApplyStep { kind, .. } => NodeKind::ApplyStep { kind: *kind, left: ops.boxed()?, right: ops.boxed()? },
            NodeKind::SetOperator { op, keys, .. } => NodeKind::SetOperator {
                op: *op,
                keys: keys.clone(),
                left: ops.boxed()?,
                right: ops.boxed()?,
            },
            NodeKind::Unary { op, .. } => NodeKind::Unary { op: *op, operand: ops.boxed()? },
            NodeKind::Case { whens, otherwise } => {
                let mut rebuilt = Vec::with_capacity(whens.len());
                for _ in whens {
                    rebuilt.push((ops.one()?, ops.one()?));
                }
                NodeKind::Case { whens: rebuilt, otherwise: ops.maybe_boxed(otherwise.is_some())? }
            }
            NodeKind::InList { list, negated, .. } => NodeKind::InList {
                expr: ops.boxed()?,
                list: ops.many(list.len())?,
                negated: *negated,
            },
            NodeKind::IsNull { negated, .. } => NodeKind::IsNull { expr: ops.boxed()?, negated: *negated },
            NodeKind::Field { name, .. } => NodeKind::Field { expr: ops.boxed()?, name: name.clone() },
            NodeKind::Where(_) => NodeKind::Where(ops.boxed()?),
            NodeKind::OrderField { descending, .. } => NodeKind::OrderField { expr: ops.boxed()?, descending: *descending },
            NodeKind::Select { fields, distinct } => NodeKind::Select { fields: ops.many(fields.len())?, distinct: *distinct },
            NodeKind::OrderBy(fields) => NodeKind::OrderBy(ops.many(fields.len())?),
            NodeKind::GroupBy { keys, having } => NodeKind::GroupBy {
                keys: ops.many(keys.len())?,
                having: ops.maybe_boxed(having.is_some())?,
            },
            NodeKind::TableContains { table, columns, values, negated } => NodeKind::TableContains {
                table: table.clone(),
                columns: columns.clone(),
                values: ops.many(values.len())?,
                negated: *negated,
            },
            NodeKind::Join { kind, .. } => NodeKind::Join {
                kind: *kind,
                left: ops.boxed()?,
                right: ops.boxed()?,
                condition: ops.boxed()?,
            },
            NodeKind::JoinStep { kind, .. } => NodeKind::JoinStep {
                kind: *kind,
                left: ops.boxed()?,
                right: ops.boxed()?,
                condition: ops.boxed()?,
            },
            NodeKind::Query { id, filter, group_by, order_by, skip, take, .. } => NodeKind::Query {
                id: *id,
                from: ops.boxed()?,
                filter: ops.maybe_boxed(filter.is_some())?,
                group_by: ops.maybe_boxed(group_by.is_some())?,
                select: ops.boxed()?,
                order_by: ops.maybe_boxed(order_by.is_some())?,
                skip: ops.maybe_boxed(skip.is_some())?,
                take: ops.maybe_boxed(take.is_some())?,
            },
            NodeKind::InternalQuery(q) => NodeKind::InternalQuery(Box::new(InternalQuery {
                into: q.into.clone(),
                from: ops.one()?,
                filter: ops.maybe(q.filter.is_some())?,
                group_by: ops.many(q.group_by.len())?,
                refresh: ops.many(q.refresh.len())?,
                select: ops.many(q.select.len())?,
                order_by: ops.many(q.order_by.len())?,
                skip: ops.maybe(q.skip.is_some())?,
                take: ops.maybe(q.take.is_some())?,
            })),
            NodeKind::Root { statements, result } => NodeKind::Root {
                statements: ops.many(statements.len())?,
                result: result.clone(),
            },
        };
        Ok(Node::typed(kind, self.ty.clone()))
    }

    /// Pre-order search without recursion.
    pub fn find(&self, mut pred: impl FnMut(&Node) -> bool) -> Option<&Node> {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if pred(node) {
                return Some(node);
            }
            pending.extend(node.children().into_iter().rev());
        }
        None
    }

    pub fn any(&self, pred: impl FnMut(&Node) -> bool) -> bool {
        self.find(pred).is_some()
    }

    /// Every node matching `pred`, pre-order.
    pub fn collect(&self, mut pred: impl FnMut(&Node) -> bool) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if pred(node) {
                out.push(node);
            }
            pending.extend(node.children().into_iter().rev());
        }
        out
    }

    /// First node still typed `Unset`. A successfully analyzed tree has none.
    pub fn first_unset(&self) -> Option<&Node> {
        self.find(|n| n.ty == RuntimeType::Unset)
    }
}
