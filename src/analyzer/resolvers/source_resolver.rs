use tracing::debug;

use crate::{
    analyzer::{AnalysisContext, AnalyzerError, OperatorResolver, Suggestions, TableSymbol},
    ast::{ApplyKind, JoinKind, Node, NodeKind},
    schema::TableDescriptor,
    types::RuntimeType,
};

/// Binds FROM sources, joins and applies into the current scope.
pub struct SourceResolver;

impl SourceResolver {
    pub fn bind_schema_from(
        schema_name: &str,
        method: &str,
        args: Vec<Node>,
        alias: Option<&str>,
        ctx: &mut AnalysisContext,
    ) -> Result<Node, AnalyzerError> {
        ctx.check_cancelled()?;
        let schema = ctx.schema(schema_name)?;
        let types: Vec<RuntimeType> = args.iter().map(|a| a.ty.clone()).collect();
        let table = schema.table(method, &types, ctx.cancel)?;

        let alias = match alias {
            Some(a) => a.to_string(),
            None => ctx.auto_alias(method),
        };
        debug!(schema = schema_name, table = %table.name, alias = %alias, columns = table.columns.len(), "source bound");
        let entity = table.entity_type.clone();
        ctx.define_source(TableSymbol::from_table(&alias, schema_name, &table), types)?;

        Ok(Node::typed(
            NodeKind::SchemaFrom { schema: schema_name.to_string(), method: method.to_string(), args, alias: Some(alias) },
            entity,
        ))
    }

    /// `APPLY a.Items x`: rows of an enumerable column of an earlier source.
    pub fn bind_property_from(source: &str, property: &str, alias: Option<&str>, ctx: &mut AnalysisContext) -> Result<Node, AnalyzerError> {
        ctx.check_cancelled()?;
        let scope = ctx.scope();
        let owner = ctx.scopes.lookup(scope, source).cloned().ok_or_else(|| {
            let visible = ctx.scopes.visible_aliases(scope);
            AnalyzerError::UnknownAlias {
                alias: source.to_string(),
                suggestions: Suggestions::for_name(source, visible.iter().map(String::as_str), ctx.config),
            }
        })?;
        let column = owner.column(property).ok_or_else(|| AnalyzerError::UnknownColumn {
            name: format!("{}.{}", source, property),
            suggestions: Suggestions::for_name(property, owner.column_names(), ctx.config),
        })?;
        let element = column.shape_type().unwrap_nullable().element_type().cloned().ok_or_else(|| {
            AnalyzerError::Unsupported(format!("'{}.{}' of type '{}' is not enumerable", source, column.name, column.ty))
        })?;

        let catalog = ctx.catalog();
        let mut table = TableDescriptor::new(column.name.clone(), element.clone());
        match &element {
            RuntimeType::Named(name) if catalog.get(name).is_some() && !catalog.is_dynamic(name) => {
                for prop in catalog.property_names(name) {
                    let ty = catalog.property(name, &prop).unwrap_or(RuntimeType::Object);
                    table = table.with_column(prop, ty);
                }
            }
            _ => table = table.with_column("Value", element.clone()),
        }

        let alias = match alias {
            Some(a) => a.to_string(),
            None => ctx.auto_alias(property),
        };
        ctx.mark_used(&owner.alias, &column.name);
        ctx.define_source(TableSymbol::from_table(&alias, &owner.schema, &table), Vec::new())?;

        Ok(Node::typed(
            NodeKind::PropertyFrom { source: owner.alias.clone(), property: column.name, alias: Some(alias) },
            element,
        ))
    }

    pub fn bind_join(kind: JoinKind, left: Node, right: Node, condition: Node, ctx: &mut AnalysisContext) -> Result<Node, AnalyzerError> {
        OperatorResolver::expect_bool("JOIN", &condition)?;
        match kind {
            JoinKind::Inner => {}
            JoinKind::LeftOuter => ctx.mark_nullable(&Self::aliases(&right))?,
            JoinKind::RightOuter => ctx.mark_nullable(&Self::aliases(&left))?,
        }
        Ok(Node::typed(
            NodeKind::Join { kind, left: left.into_box(), right: right.into_box(), condition: condition.into_box() },
            RuntimeType::Void,
        ))
    }

    pub fn bind_apply(kind: ApplyKind, left: Node, right: Node, ctx: &mut AnalysisContext) -> Result<Node, AnalyzerError> {
        if kind == ApplyKind::Outer {
            ctx.mark_nullable(&Self::aliases(&right))?;
        }
        Ok(Node::typed(NodeKind::Apply { kind, left: left.into_box(), right: right.into_box() }, RuntimeType::Void))
    }

    /// Aliases bound anywhere under a from-tree.
    pub fn aliases(from: &Node) -> Vec<String> {
        from.collect(|n| n.from_alias().is_some())
            .into_iter()
            .filter_map(|n| n.from_alias().map(str::to_string))
            .collect()
    }
}
