use crate::{
    analyzer::{AnalysisContext, AnalyzerError, Suggestions, TableSymbol},
    ast::{Node, NodeKind},
    types::RuntimeType,
};

/// Wildcards and `::n` group links.
pub struct ProjectionResolver;

impl ProjectionResolver {
    pub fn check_wildcard(alias: Option<&str>, ctx: &AnalysisContext) -> Result<Node, AnalyzerError> {
        let scope = ctx.scope();
        if let Some(alias) = alias {
            if ctx.scopes.lookup(scope, alias).is_none() {
                let visible = ctx.scopes.visible_aliases(scope);
                return Err(AnalyzerError::UnknownAlias {
                    alias: alias.to_string(),
                    suggestions: Suggestions::for_name(alias, visible.iter().map(String::as_str), ctx.config),
                });
            }
        }
        Ok(Node::typed(NodeKind::Wildcard { alias: alias.map(str::to_string) }, RuntimeType::Void))
    }

    /// Replace wildcard fields by one field per column. Output names are bare
    /// column names for a single source and `alias.column` otherwise. With
    /// primitive validation on, non-primitive columns are left out.
    pub fn expand(fields: Vec<Node>, ctx: &mut AnalysisContext) -> Vec<Node> {
        let scope = ctx.scope();
        let qualify = ctx.scopes.symbols(scope).count() > 1;
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            let alias = match field.as_field().map(|(expr, _)| &expr.kind) {
                Some(NodeKind::Wildcard { alias }) => alias.clone(),
                _ => {
                    out.push(field);
                    continue;
                }
            };
            let sources: Vec<TableSymbol> = match &alias {
                Some(a) => ctx.scopes.lookup(scope, a).cloned().into_iter().collect(),
                None => ctx.scopes.symbols(scope).cloned().collect(),
            };
            let columns = sources.iter().flat_map(|s| {
                s.columns.iter().filter_map(move |c| s.column(&c.name).map(|c| (s.alias.clone(), c.name, c.intended_type, c.ty)))
            });
            let keep_all = !ctx.config.validate_primitive_types;
            for (alias, name, intended_type, ty) in columns.filter(|c| keep_all || c.3.is_primitive_safe()) {
                ctx.mark_used(&alias, &name);
                let field_name = if qualify { format!("{}.{}", alias, name) } else { name.clone() };
                let expr = Node::typed(NodeKind::Column { alias, name, intended_type }, ty.clone());
                out.push(Node::typed(NodeKind::Field { expr: expr.into_box(), name: field_name }, ty));
            }
        }
        out
    }

    pub fn field_link(index: usize, ctx: &AnalysisContext) -> Result<Node, AnalyzerError> {
        let keys = &ctx.frame()?.info.group_keys;
        index
            .checked_sub(1)
            .and_then(|i| keys.get(i))
            .cloned()
            .ok_or(AnalyzerError::GroupFieldOutOfRange { index, count: keys.len() })
    }
}
