use std::sync::Arc;

use serde::Serialize;

use crate::{
    ast::{ApplyKind, BinaryOp, JoinKind, Literal, SetOp, UnaryOp},
    methods::MethodDescriptor,
    schema::ColumnInfo,
    types::RuntimeType,
};

/// Expression tree node. Passes never mutate nodes in place; they build new
/// ones. `ty` stays `Unset` until the semantic pass binds the node.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: RuntimeType,
}

/// Resolution result attached to a bound method call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MethodBinding {
    pub descriptor: Arc<MethodDescriptor>,
    pub setter: Option<Arc<MethodDescriptor>>,
    /// Key of the accumulator state shared by an aggregate getter and its mutator
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Literal(Literal),
    /// Unqualified name; binds to a column of a visible source
    Identifier(String),
    Column {
        alias: String,
        name: String,
        intended_type: Option<String>,
    },
    /// `root.member`; `alias.column` before binding
    Property {
        root: Box<Node>,
        member: String,
    },
    Index {
        root: Box<Node>,
        index: Box<Node>,
    },
    Method {
        alias: Option<String>,
        name: String,
        args: Vec<Node>,
        binding: Option<MethodBinding>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Operator over an `Object` operand, dispatched at runtime
    DynamicOperator {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Case {
        whens: Vec<(Node, Node)>,
        otherwise: Option<Box<Node>>,
    },
    InList {
        expr: Box<Node>,
        list: Vec<Node>,
        negated: bool,
    },
    IsNull {
        expr: Box<Node>,
        negated: bool,
    },
    /// `::n`, 1-based reference to a GROUP BY key
    FieldLink(usize),
    Wildcard {
        alias: Option<String>,
    },
    /// Stands in for a subtree whose analysis failed and was recorded as a diagnostic
    Placeholder,

    Field {
        expr: Box<Node>,
        name: String,
    },
    Select {
        fields: Vec<Node>,
        distinct: bool,
    },
    Where(Box<Node>),
    GroupBy {
        keys: Vec<Node>,
        having: Option<Box<Node>>,
    },
    OrderBy(Vec<Node>),
    OrderField {
        expr: Box<Node>,
        descending: bool,
    },

    SchemaFrom {
        schema: String,
        method: String,
        args: Vec<Node>,
        alias: Option<String>,
    },
    /// `APPLY source.property alias`: an enumerable column of an earlier source
    PropertyFrom {
        source: String,
        property: String,
        alias: Option<String>,
    },
    InMemoryFrom {
        table: String,
        alias: String,
    },
    Join {
        kind: JoinKind,
        left: Box<Node>,
        right: Box<Node>,
        condition: Box<Node>,
    },
    Apply {
        kind: ApplyKind,
        left: Box<Node>,
        right: Box<Node>,
    },
    JoinStep {
        kind: JoinKind,
        left: Box<Node>,
        right: Box<Node>,
        condition: Box<Node>,
    },
    ApplyStep {
        kind: ApplyKind,
        left: Box<Node>,
        right: Box<Node>,
    },

    Query {
        id: usize,
        from: Box<Node>,
        filter: Option<Box<Node>>,
        group_by: Option<Box<Node>>,
        select: Box<Node>,
        order_by: Option<Box<Node>>,
        skip: Option<Box<Node>>,
        take: Option<Box<Node>>,
    },
    SetOperator {
        op: SetOp,
        keys: Vec<String>,
        left: Box<Node>,
        right: Box<Node>,
    },

    AggregateRef {
        index: usize,
        name: String,
    },
    GroupKeyRef {
        index: usize,
        name: String,
    },
    /// Whole row of a source, carried through join steps for aliased method calls
    SourceRow {
        alias: String,
    },
    /// Row membership test: does `table` hold a row whose `columns` equal `values`
    TableContains {
        table: String,
        columns: Vec<String>,
        values: Vec<Node>,
        negated: bool,
    },
    CreateTable {
        name: String,
        columns: Vec<ColumnInfo>,
        keys: Vec<String>,
        for_grouping: bool,
    },
    InternalQuery(Box<InternalQuery>),
    Root {
        statements: Vec<Node>,
        result: String,
    },
}

/// One primitive dataflow step: read `from`, write the projection into `into`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InternalQuery {
    pub into: String,
    pub from: Node,
    pub filter: Option<Node>,
    pub group_by: Vec<Node>,
    /// Aggregate mutator calls evaluated for every accepted row
    pub refresh: Vec<Node>,
    pub select: Vec<Node>,
    pub order_by: Vec<Node>,
    pub skip: Option<Node>,
    pub take: Option<Node>,
}

impl InternalQuery {
    pub fn new(into: impl Into<String>, from: Node, select: Vec<Node>) -> Self {
        Self {
            into: into.into(),
            from,
            filter: None,
            group_by: Vec::new(),
            refresh: Vec::new(),
            select,
            order_by: Vec::new(),
            skip: None,
            take: None,
        }
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, ty: RuntimeType::Unset }
    }

    pub fn typed(kind: NodeKind, ty: RuntimeType) -> Self {
        Self { kind, ty }
    }

    pub fn with_type(mut self, ty: RuntimeType) -> Self {
        self.ty = ty;
        self
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(&self.kind, NodeKind::Method { binding: Some(b), .. } if b.setter.is_some())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, NodeKind::Placeholder)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(_))
    }

    /// Expression and output name of a `Field`.
    pub fn as_field(&self) -> Option<(&Node, &str)> {
        match &self.kind {
            NodeKind::Field { expr, name } => Some((expr, name)),
            _ => None,
        }
    }

    pub fn select_fields(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Select { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn query_id(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::Query { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Output fields of a query, or of the left-most query of a set operator.
    pub fn output_fields(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Query { select, .. } => select.select_fields(),
            NodeKind::SetOperator { left, .. } => left.output_fields(),
            _ => &[],
        }
    }

    /// Alias a from-node binds, if any.
    pub fn from_alias(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::SchemaFrom { alias, .. } | NodeKind::PropertyFrom { alias, .. } => alias.as_deref(),
            NodeKind::InMemoryFrom { alias, .. } => Some(alias),
            _ => None,
        }
    }

    pub fn into_box(self) -> Box<Node> {
        Box::new(self)
    }
}
