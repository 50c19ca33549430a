use crate::{
    analyzer::{AnalysisContext, AnalyzerError, Suggestions},
    ast::{Node, NodeKind},
    schema::ColumnInfo,
};

pub struct ColumnResolver;

impl ColumnResolver {
    /// Bind a bare name against the sources of the current query block.
    pub fn bind_name(name: &str, ctx: &mut AnalysisContext) -> Result<Node, AnalyzerError> {
        let scope = ctx.scope();
        let matches: Vec<(String, ColumnInfo)> = ctx
            .scopes
            .symbols(scope)
            .filter_map(|s| s.column(name).map(|c| (s.alias.clone(), c)))
            .collect();

        match matches.len() {
            0 => {
                let candidates: Vec<String> =
                    ctx.scopes.symbols(scope).flat_map(|s| s.column_names().map(str::to_string)).collect();
                Err(AnalyzerError::UnknownColumn {
                    name: name.to_string(),
                    suggestions: Suggestions::for_name(name, candidates.iter().map(String::as_str), ctx.config),
                })
            }
            1 => {
                let (alias, column) = matches.into_iter().next().ok_or_else(|| AnalyzerError::unexpected("a column", name))?;
                Ok(Self::column_node(&alias, column, ctx))
            }
            _ => Err(AnalyzerError::AmbiguousColumn {
                name: name.to_string(),
                aliases: matches.into_iter().map(|(alias, _)| alias).collect(),
            }),
        }
    }

    /// Bind `alias.name`; the alias may belong to an enclosing block.
    pub fn bind_qualified(alias: &str, name: &str, ctx: &mut AnalysisContext) -> Result<Node, AnalyzerError> {
        let scope = ctx.scope();
        let symbol = ctx.scopes.lookup(scope, alias).ok_or_else(|| {
            let visible = ctx.scopes.visible_aliases(scope);
            AnalyzerError::UnknownAlias {
                alias: alias.to_string(),
                suggestions: Suggestions::for_name(alias, visible.iter().map(String::as_str), ctx.config),
            }
        })?;
        let column = symbol.column(name).ok_or_else(|| AnalyzerError::UnknownColumn {
            name: format!("{}.{}", alias, name),
            suggestions: Suggestions::for_name(name, symbol.column_names(), ctx.config),
        })?;
        Ok(Self::column_node(alias, column, ctx))
    }

    fn column_node(alias: &str, column: ColumnInfo, ctx: &mut AnalysisContext) -> Node {
        ctx.mark_used(alias, &column.name);
        Node::typed(
            NodeKind::Column { alias: alias.to_string(), name: column.name, intended_type: column.intended_type },
            column.ty,
        )
    }
}
