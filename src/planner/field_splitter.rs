use std::collections::{HashMap, HashSet};

use crate::{
    analyzer::AnalyzerError,
    ast::{Node, NodeKind, Visitor, walk},
};

/// Splits grouped expressions into the accumulation projection (aggregate
/// getters and group keys, each once) and the projection-phase expressions
/// that refer back to it.
#[derive(Debug, Default)]
pub struct FieldSplitter {
    keys: HashSet<String>,
    inner: Vec<Node>,
    positions: HashMap<String, usize>,
}

struct Splitting<'s> {
    splitter: &'s mut FieldSplitter,
}

impl<'n> Visitor<'n> for Splitting<'_> {
    type Output = Node;
    type Error = AnalyzerError;

    fn children(&mut self, node: &'n Node) -> Vec<&'n Node> {
        if self.splitter.stops_at(node) { Vec::new() } else { node.children() }
    }

    fn leave(&mut self, node: &'n Node, children: Vec<Node>) -> Result<Node, AnalyzerError> {
        if node.is_aggregate() {
            let (index, name) = self.splitter.record(node);
            return Ok(Node::typed(NodeKind::AggregateRef { index, name }, node.ty.clone()));
        }
        if self.splitter.is_key(node) {
            let (index, name) = self.splitter.record(node);
            return Ok(Node::typed(NodeKind::GroupKeyRef { index, name }, node.ty.clone()));
        }
        Ok(node.rebuild(children)?)
    }
}

impl FieldSplitter {
    pub fn new(keys: &[Node]) -> Self {
        Self { keys: keys.iter().map(Node::to_string).collect(), ..Self::default() }
    }

    fn is_key(&self, node: &Node) -> bool {
        self.keys.contains(&node.to_string())
    }

    fn stops_at(&self, node: &Node) -> bool {
        node.is_aggregate() || self.is_key(node)
    }

    fn record(&mut self, expr: &Node) -> (usize, String) {
        let name = expr.to_string();
        if let Some(index) = self.positions.get(&name) {
            return (*index, name);
        }
        let index = self.inner.len();
        self.inner.push(Node::typed(NodeKind::Field { expr: expr.clone().into_box(), name: name.clone() }, expr.ty.clone()));
        self.positions.insert(name.clone(), index);
        (index, name)
    }

    /// Projection-phase form of `expr`.
    pub fn split(&mut self, expr: &Node) -> Result<Node, AnalyzerError> {
        walk(expr, &mut Splitting { splitter: self })
    }

    /// Splits the expression under a `Field` or `OrderField`, keeping the wrapper.
    pub fn split_wrapped(&mut self, wrapper: &Node) -> Result<Node, AnalyzerError> {
        let children = wrapper.children().into_iter().map(|c| self.split(c)).collect::<Result<Vec<_>, _>>()?;
        Ok(wrapper.rebuild(children)?)
    }

    pub fn inner(&self) -> &[Node] {
        &self.inner
    }

    /// Accumulation projection: everything recorded, then the keys nothing referenced.
    pub fn finish(mut self, keys: &[Node]) -> Vec<Node> {
        for key in keys {
            self.record(key);
        }
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ast::{BinaryOp, Literal, MethodBinding},
        methods::MethodDescriptor,
        types::RuntimeType,
    };

    fn column(name: &str) -> Node {
        Node::typed(NodeKind::Column { alias: "f".into(), name: name.into(), intended_type: None }, RuntimeType::Long)
    }

    fn aggregate(name: &str, arg: Node) -> Node {
        let getter = Arc::new(MethodDescriptor::new(name, "Library").aggregate_getter());
        let setter = Arc::new(MethodDescriptor::new(format!("Set{}", name), "Library").aggregate_setter());
        let identifier = format!("{}({})", name, arg);
        Node::typed(
            NodeKind::Method {
                alias: None,
                name: name.into(),
                args: vec![arg],
                binding: Some(MethodBinding { descriptor: getter, setter: Some(setter), identifier: Some(identifier) }),
            },
            RuntimeType::Decimal,
        )
    }

    fn add(l: Node, r: Node) -> Node {
        Node::typed(NodeKind::Binary { op: BinaryOp::Add, left: l.into_box(), right: r.into_box() }, RuntimeType::Decimal)
    }

    #[test]
    fn keys_and_aggregates_become_references() {
        let keys = vec![column("Directory")];
        let mut splitter = FieldSplitter::new(&keys);

        let outer_key = splitter.split(&column("Directory")).unwrap();
        let outer_sum = splitter.split(&add(aggregate("Sum", column("Length")), aggregate("Sum", column("Length")))).unwrap();

        assert_eq!(outer_key.kind, NodeKind::GroupKeyRef { index: 0, name: "f.Directory".into() });
        let NodeKind::Binary { left, right, .. } = &outer_sum.kind else { panic!("expected a sum") };
        assert_eq!(left.kind, NodeKind::AggregateRef { index: 1, name: "Sum(f.Length)".into() });
        assert_eq!(left, right);

        let inner = splitter.finish(&keys);
        let names: Vec<_> = inner.iter().filter_map(|f| f.as_field().map(|(_, n)| n.to_string())).collect();
        assert_eq!(names, vec!["f.Directory", "Sum(f.Length)"]);
    }

    #[test]
    fn unreferenced_keys_are_appended() {
        let one = Node::typed(NodeKind::Literal(Literal::Integer(1)), RuntimeType::Int);
        let mut splitter = FieldSplitter::new(std::slice::from_ref(&one));
        let outer = splitter.split(&aggregate("Count", column("Name"))).unwrap();
        assert!(matches!(outer.kind, NodeKind::AggregateRef { index: 0, .. }));
        let inner = splitter.finish(&[one]);
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[1].as_field().map(|(_, n)| n), Some("1"));
    }
}
