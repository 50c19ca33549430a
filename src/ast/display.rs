use std::fmt;

use crate::ast::{InternalQuery, Node, NodeKind};

fn list(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for (i, n) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", n)?;
    }
    Ok(())
}

/// Canonical text. Two bound expressions with the same text are treated as
/// the same expression by aggregate de-duplication and group-key matching.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(l) => write!(f, "{}", l),
            NodeKind::Identifier(name) => write!(f, "{}", name),
            NodeKind::Column { alias, name, .. } => write!(f, "{}.{}", alias, name),
            NodeKind::Property { root, member } => write!(f, "{}.{}", root, member),
            NodeKind::Index { root, index } => write!(f, "{}[{}]", root, index),
            NodeKind::Method { alias, name, args, .. } => {
                if let Some(alias) = alias {
                    write!(f, "{}.", alias)?;
                }
                write!(f, "{}(", name)?;
                list(f, args)?;
                write!(f, ")")
            }
            NodeKind::Binary { op, left, right } | NodeKind::DynamicOperator { op, left, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            NodeKind::Unary { op, operand } => write!(f, "{}{}", op, operand),
            NodeKind::Case { whens, otherwise } => {
                write!(f, "case")?;
                for (when, then) in whens {
                    write!(f, " when {} then {}", when, then)?;
                }
                if let Some(otherwise) = otherwise {
                    write!(f, " else {}", otherwise)?;
                }
                write!(f, " end")
            }
            NodeKind::InList { expr, list: items, negated } => {
                write!(f, "{} {}in (", expr, if *negated { "not " } else { "" })?;
                list(f, items)?;
                write!(f, ")")
            }
            NodeKind::IsNull { expr, negated } => write!(f, "{} is {}null", expr, if *negated { "not " } else { "" }),
            NodeKind::FieldLink(n) => write!(f, "::{}", n),
            NodeKind::Wildcard { alias: Some(alias) } => write!(f, "{}.*", alias),
            NodeKind::Wildcard { alias: None } => write!(f, "*"),
            NodeKind::Placeholder => write!(f, "<error>"),

            NodeKind::Field { expr, name } => write!(f, "{} as {}", expr, name),
            NodeKind::Select { fields, distinct } => {
                write!(f, "select {}", if *distinct { "distinct " } else { "" })?;
                list(f, fields)
            }
            NodeKind::Where(expr) => write!(f, "where {}", expr),
            NodeKind::GroupBy { keys, having } => {
                write!(f, "group by ")?;
                list(f, keys)?;
                if let Some(having) = having {
                    write!(f, " having {}", having)?;
                }
                Ok(())
            }
            NodeKind::OrderBy(fields) => {
                write!(f, "order by ")?;
                list(f, fields)
            }
            NodeKind::OrderField { expr, descending } => write!(f, "{} {}", expr, if *descending { "desc" } else { "asc" }),

            NodeKind::SchemaFrom { schema, method, args, alias } => {
                write!(f, "{}.{}(", schema, method)?;
                list(f, args)?;
                write!(f, ")")?;
                if let Some(alias) = alias {
                    write!(f, " {}", alias)?;
                }
                Ok(())
            }
            NodeKind::PropertyFrom { source, property, alias } => {
                write!(f, "{}.{}", source, property)?;
                if let Some(alias) = alias {
                    write!(f, " {}", alias)?;
                }
                Ok(())
            }
            NodeKind::InMemoryFrom { table, alias } => write!(f, "@{} {}", table, alias),
            NodeKind::Join { kind, left, right, condition } | NodeKind::JoinStep { kind, left, right, condition } => {
                write!(f, "{} {} {} on {}", left, kind, right, condition)
            }
            NodeKind::Apply { kind, left, right } | NodeKind::ApplyStep { kind, left, right } => {
                write!(f, "{} {} {}", left, kind, right)
            }

            NodeKind::Query { from, filter, group_by, select, order_by, skip, take, .. } => {
                write!(f, "{} from {}", select, from)?;
                if let Some(filter) = filter {
                    write!(f, " {}", filter)?;
                }
                if let Some(group_by) = group_by {
                    write!(f, " {}", group_by)?;
                }
                if let Some(order_by) = order_by {
                    write!(f, " {}", order_by)?;
                }
                if let Some(skip) = skip {
                    write!(f, " skip {}", skip)?;
                }
                if let Some(take) = take {
                    write!(f, " take {}", take)?;
                }
                Ok(())
            }
            NodeKind::SetOperator { op, keys, left, right } => {
                write!(f, "{} {} ({}) {}", left, op, keys.join(", "), right)
            }

            NodeKind::AggregateRef { name, .. } | NodeKind::GroupKeyRef { name, .. } => write!(f, "[{}]", name),
            NodeKind::SourceRow { alias } => write!(f, "row({})", alias),
            NodeKind::TableContains { table, columns, values, negated } => {
                write!(f, "{}contains(@{}, ({}), (", if *negated { "not " } else { "" }, table, columns.join(", "))?;
                list(f, values)?;
                write!(f, "))")
            }
            NodeKind::CreateTable { name, columns, keys, for_grouping } => {
                write!(f, "create {}table @{} (", if *for_grouping { "grouping " } else { "" }, name)?;
                for (i, c) in columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", c.name, c.ty)?;
                }
                write!(f, ")")?;
                if !keys.is_empty() {
                    write!(f, " keys ({})", keys.join(", "))?;
                }
                Ok(())
            }
            NodeKind::InternalQuery(q) => write!(f, "{}", q),
            NodeKind::Root { statements, result } => {
                for s in statements {
                    writeln!(f, "{};", s)?;
                }
                write!(f, "result @{}", result)
            }
        }
    }
}

impl fmt::Display for InternalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insert into @{} select ", self.into)?;
        list(f, &self.select)?;
        write!(f, " from {}", self.from)?;
        if let Some(filter) = &self.filter {
            write!(f, " where {}", filter)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " group by ")?;
            list(f, &self.group_by)?;
        }
        if !self.refresh.is_empty() {
            write!(f, " refresh ")?;
            list(f, &self.refresh)?;
        }
        if !self.order_by.is_empty() {
            write!(f, " order by ")?;
            list(f, &self.order_by)?;
        }
        if let Some(skip) = &self.skip {
            write!(f, " skip {}", skip)?;
        }
        if let Some(take) = &self.take {
            write!(f, " take {}", take)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self, self.ty)
    }
}
