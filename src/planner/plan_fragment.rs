use crate::{
    ast::{BinaryOp, InternalQuery, Node, NodeKind},
    schema::ColumnInfo,
    types::RuntimeType,
};

/// Statements materializing one query or set-operator result into `result`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanFragment {
    pub statements: Vec<Node>,
    pub result: String,
    /// Output `Field`s of the result table
    pub fields: Vec<Node>,
    /// Source names the result is built from, used to name derived tables
    pub base: String,
    /// The last two statements create `result` and fill it from one query,
    /// so that query may be redirected into another table
    pub retargetable: bool,
}

impl PlanFragment {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().filter_map(|f| f.as_field().map(|(_, n)| n.to_string())).collect()
    }

    /// Expressions the final query of this fragment writes for `positions`.
    pub fn values_at(&self, positions: &[usize]) -> Vec<Node> {
        let fields = match self.statements.last().map(|s| &s.kind) {
            Some(NodeKind::InternalQuery(q)) if self.retargetable => q.select.as_slice(),
            _ => return positions.iter().filter_map(|p| self.fields.get(*p)).map(|f| Self::read_back(&self.result, f)).collect(),
        };
        positions.iter().filter_map(|p| fields.get(*p)).filter_map(|f| f.as_field().map(|(e, _)| e.clone())).collect()
    }

    /// Column of `table` holding `field`.
    pub fn read_back(table: &str, field: &Node) -> Node {
        let name = field.as_field().map(|(_, n)| n.to_string()).unwrap_or_else(|| field.to_string());
        Node::typed(NodeKind::Column { alias: table.to_string(), name, intended_type: None }, field.ty.clone())
    }
}

pub fn create_table(name: &str, fields: &[Node], keys: Vec<String>, for_grouping: bool) -> Node {
    let columns = fields
        .iter()
        .enumerate()
        .filter_map(|(index, f)| f.as_field().map(|(_, n)| ColumnInfo::new(n, index, f.ty.clone())))
        .collect();
    Node::typed(NodeKind::CreateTable { name: name.to_string(), columns, keys, for_grouping }, RuntimeType::Void)
}

pub fn internal_query(query: InternalQuery) -> Node {
    Node::typed(NodeKind::InternalQuery(Box::new(query)), RuntimeType::Void)
}

pub fn in_memory(table: &str) -> Node {
    Node::typed(NodeKind::InMemoryFrom { table: table.to_string(), alias: table.to_string() }, RuntimeType::Void)
}

pub fn and(left: Option<Node>, right: Node) -> Node {
    match left {
        Some(left) => {
            Node::typed(NodeKind::Binary { op: BinaryOp::And, left: left.into_box(), right: right.into_box() }, RuntimeType::Bool)
        }
        None => right,
    }
}

/// `Field`s reading every column of `table` back under the same names.
pub fn read_all(table: &str, fields: &[Node]) -> Vec<Node> {
    fields
        .iter()
        .filter_map(|f| {
            let (_, name) = f.as_field()?;
            let expr = PlanFragment::read_back(table, f);
            Some(Node::typed(NodeKind::Field { expr: expr.into_box(), name: name.to_string() }, f.ty.clone()))
        })
        .collect()
}
