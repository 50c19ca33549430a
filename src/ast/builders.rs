use ordered_float::NotNan;

use crate::ast::{ApplyKind, BinaryOp, JoinKind, Literal, Node, NodeKind, SetOp, UnaryOp};

/// Constructors for unbound trees, as a parser would produce them.
impl Node {
    pub fn literal(literal: Literal) -> Node {
        Node::new(NodeKind::Literal(literal))
    }

    pub fn integer(value: i64) -> Node {
        Node::literal(Literal::Integer(value))
    }

    pub fn decimal(text: impl Into<String>) -> Node {
        Node::literal(Literal::Decimal(text.into()))
    }

    pub fn real(value: f64) -> Node {
        match NotNan::new(value) {
            Ok(v) => Node::literal(Literal::Real(v)),
            Err(_) => Node::null(),
        }
    }

    pub fn string(value: impl Into<String>) -> Node {
        Node::literal(Literal::String(value.into()))
    }

    pub fn boolean(value: bool) -> Node {
        Node::literal(Literal::Bool(value))
    }

    pub fn null() -> Node {
        Node::literal(Literal::Null)
    }

    pub fn ident(name: impl Into<String>) -> Node {
        Node::new(NodeKind::Identifier(name.into()))
    }

    /// `alias.column` as written in the query.
    pub fn qualified(alias: impl Into<String>, column: impl Into<String>) -> Node {
        Node::property(Node::ident(alias), column)
    }

    pub fn property(root: Node, member: impl Into<String>) -> Node {
        Node::new(NodeKind::Property { root: Box::new(root), member: member.into() })
    }

    pub fn index(root: Node, index: Node) -> Node {
        Node::new(NodeKind::Index { root: Box::new(root), index: Box::new(index) })
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Node {
        Node::new(NodeKind::Method { alias: None, name: name.into(), args, binding: None })
    }

    pub fn alias_call(alias: impl Into<String>, name: impl Into<String>, args: Vec<Node>) -> Node {
        Node::new(NodeKind::Method { alias: Some(alias.into()), name: name.into(), args, binding: None })
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::new(NodeKind::Binary { op, left: Box::new(left), right: Box::new(right) })
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        Node::new(NodeKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn case(whens: Vec<(Node, Node)>, otherwise: Option<Node>) -> Node {
        Node::new(NodeKind::Case { whens, otherwise: otherwise.map(Box::new) })
    }

    pub fn in_list(expr: Node, list: Vec<Node>, negated: bool) -> Node {
        Node::new(NodeKind::InList { expr: Box::new(expr), list, negated })
    }

    pub fn is_null(expr: Node, negated: bool) -> Node {
        Node::new(NodeKind::IsNull { expr: Box::new(expr), negated })
    }

    pub fn field_link(n: usize) -> Node {
        Node::new(NodeKind::FieldLink(n))
    }

    pub fn wildcard(alias: Option<&str>) -> Node {
        Node::new(NodeKind::Wildcard { alias: alias.map(str::to_string) })
    }

    /// Output field named after the expression text.
    pub fn field(expr: Node) -> Node {
        let name = expr.to_string();
        Node::named_field(expr, name)
    }

    pub fn named_field(expr: Node, name: impl Into<String>) -> Node {
        Node::new(NodeKind::Field { expr: Box::new(expr), name: name.into() })
    }

    pub fn schema_from(schema: impl Into<String>, method: impl Into<String>, args: Vec<Node>, alias: Option<&str>) -> Node {
        Node::new(NodeKind::SchemaFrom {
            schema: schema.into(),
            method: method.into(),
            args,
            alias: alias.map(str::to_string),
        })
    }

    pub fn property_from(source: impl Into<String>, property: impl Into<String>, alias: Option<&str>) -> Node {
        Node::new(NodeKind::PropertyFrom {
            source: source.into(),
            property: property.into(),
            alias: alias.map(str::to_string),
        })
    }

    pub fn join(kind: JoinKind, left: Node, right: Node, condition: Node) -> Node {
        Node::new(NodeKind::Join {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            condition: Box::new(condition),
        })
    }

    pub fn apply(kind: ApplyKind, left: Node, right: Node) -> Node {
        Node::new(NodeKind::Apply { kind, left: Box::new(left), right: Box::new(right) })
    }

    pub fn set_operator(op: SetOp, keys: &[&str], left: Node, right: Node) -> Node {
        Node::new(NodeKind::SetOperator {
            op,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}

/// Assembles a `Query` node clause by clause.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    from: Node,
    filter: Option<Node>,
    keys: Vec<Node>,
    having: Option<Node>,
    fields: Vec<Node>,
    distinct: bool,
    order: Vec<Node>,
    skip: Option<Node>,
    take: Option<Node>,
}

impl QueryBuilder {
    pub fn new(from: Node) -> Self {
        Self {
            from,
            filter: None,
            keys: Vec::new(),
            having: None,
            fields: Vec::new(),
            distinct: false,
            order: Vec::new(),
            skip: None,
            take: None,
        }
    }

    pub fn filter(mut self, expr: Node) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn group_by(mut self, keys: Vec<Node>) -> Self {
        self.keys = keys;
        self
    }

    pub fn having(mut self, expr: Node) -> Self {
        self.having = Some(expr);
        self
    }

    /// Adds fields; bare expressions are wrapped into fields named after their text.
    pub fn select(mut self, exprs: Vec<Node>) -> Self {
        for expr in exprs {
            let field = match expr.kind {
                NodeKind::Field { .. } => expr,
                _ => Node::field(expr),
            };
            self.fields.push(field);
        }
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, expr: Node, descending: bool) -> Self {
        self.order.push(Node::new(NodeKind::OrderField { expr: Box::new(expr), descending }));
        self
    }

    pub fn skip(mut self, n: i64) -> Self {
        self.skip = Some(Node::integer(n));
        self
    }

    pub fn take(mut self, n: i64) -> Self {
        self.take = Some(Node::integer(n));
        self
    }

    pub fn build(self) -> Node {
        let group_by = (!self.keys.is_empty() || self.having.is_some()).then(|| {
            Node::new(NodeKind::GroupBy { keys: self.keys, having: self.having.map(Box::new) })
        });
        let order_by = (!self.order.is_empty()).then(|| Node::new(NodeKind::OrderBy(self.order)));
        Node::new(NodeKind::Query {
            id: 0,
            from: Box::new(self.from),
            filter: self.filter.map(|f| Box::new(Node::new(NodeKind::Where(Box::new(f))))),
            group_by: group_by.map(Box::new),
            select: Box::new(Node::new(NodeKind::Select { fields: self.fields, distinct: self.distinct })),
            order_by: order_by.map(Box::new),
            skip: self.skip.map(Box::new),
            take: self.take.map(Box::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_text_follows_clause_order() {
        let q = QueryBuilder::new(Node::schema_from("#os", "files", vec![Node::string("/tmp")], Some("f")))
            .filter(Node::binary(BinaryOp::Gt, Node::qualified("f", "Length"), Node::integer(10)))
            .select(vec![Node::qualified("f", "Name")])
            .order_by(Node::qualified("f", "Name"), true)
            .take(5)
            .build();
        assert_eq!(
            q.to_string(),
            "select f.Name as f.Name from #os.files('/tmp') f where (f.Length > 10) order by f.Name desc take 5"
        );
    }
}
