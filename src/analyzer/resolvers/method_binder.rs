use std::sync::Arc;

use tracing::trace;

use crate::{
    analyzer::{AnalysisContext, AnalyzerError, Suggestions},
    ast::{Literal, MethodBinding, Node, NodeKind},
    methods::ResolvedMethod,
    schema::Schema,
    types::RuntimeType,
};

/// Where a call is resolved: the schema library and the row entity, if any.
struct CallTarget {
    alias: Option<String>,
    schema: Arc<dyn Schema>,
    entity: Option<RuntimeType>,
}

/// Binds method calls to library descriptors and pairs aggregates with their
/// accumulator mutator.
pub struct MethodBinder;

impl MethodBinder {
    pub fn bind(alias: Option<&str>, name: &str, args: Vec<Node>, ctx: &mut AnalysisContext) -> Result<Node, AnalyzerError> {
        let target = Self::target(alias, name, ctx)?;
        let types: Vec<RuntimeType> = args.iter().map(|a| a.ty.clone()).collect();
        let mctx = ctx.method_context();
        let resolved = match &target.entity {
            Some(entity) => target.schema.resolve_method(name, &types, Some(entity), mctx)?,
            None => target.schema.resolve_raw_method(name, &types, mctx)?,
        };
        trace!(call = name, descriptor = %resolved.descriptor, "method bound");

        if resolved.is_aggregate() {
            return Self::bind_aggregate(target.alias, resolved, args, ctx);
        }
        Ok(Node::typed(
            NodeKind::Method {
                alias: target.alias,
                name: resolved.descriptor.name.clone(),
                args,
                binding: Some(MethodBinding { descriptor: resolved.descriptor, setter: None, identifier: None }),
            },
            resolved.return_type,
        ))
    }

    fn target(alias: Option<&str>, name: &str, ctx: &mut AnalysisContext) -> Result<CallTarget, AnalyzerError> {
        let scope = ctx.scope();
        if let Some(alias) = alias {
            let symbol = ctx.scopes.lookup(scope, alias).ok_or_else(|| {
                let visible = ctx.scopes.visible_aliases(scope);
                AnalyzerError::UnknownAlias {
                    alias: alias.to_string(),
                    suggestions: Suggestions::for_name(alias, visible.iter().map(String::as_str), ctx.config),
                }
            })?;
            let (schema_name, entity) = (symbol.schema.clone(), symbol.entity_type.clone());
            let schema = ctx.schema(&schema_name)?;
            return Ok(CallTarget { alias: Some(alias.to_string()), schema, entity: Some(entity) });
        }

        let frame = ctx.frame()?;
        if let Some(schema) = frame.from_schema.clone() {
            return Ok(CallTarget { alias: None, schema, entity: None });
        }

        let sources: Vec<(String, RuntimeType)> =
            ctx.scopes.symbols(scope).take(2).map(|s| (s.schema.clone(), s.entity_type.clone())).collect();
        match sources.as_slice() {
            [(schema_name, entity)] => {
                let schema = ctx.schema(schema_name)?;
                Ok(CallTarget { alias: None, schema, entity: Some(entity.clone()) })
            }
            _ => Err(AnalyzerError::MissingAlias { method: name.to_string() }),
        }
    }

    fn bind_aggregate(
        alias: Option<String>,
        resolved: ResolvedMethod,
        args: Vec<Node>,
        ctx: &mut AnalysisContext,
    ) -> Result<Node, AnalyzerError> {
        let name = resolved.descriptor.name.clone();
        let frame = ctx.frame_mut()?;
        if !frame.clause.allows_aggregates() {
            return Err(AnalyzerError::Unsupported(format!("aggregate {} inside {}", name, frame.clause)));
        }
        if args.iter().any(|a| a.any(Node::is_aggregate)) {
            return Err(AnalyzerError::Unsupported(format!("aggregate nested inside {}", name)));
        }
        let Some(setter) = resolved.setter.clone() else {
            return Err(AnalyzerError::unexpected("an aggregate mutator", &name));
        };

        let getter = Node::typed(
            NodeKind::Method { alias: alias.clone(), name: name.clone(), args: args.clone(), binding: None },
            resolved.return_type.clone(),
        );
        // the getter text keys the accumulator state
        let identifier = getter.to_string();

        let mut setter_args = vec![Node::typed(NodeKind::Literal(Literal::String(identifier.clone())), RuntimeType::String)];
        setter_args.extend(args.iter().cloned());
        let refresh = Node::typed(
            NodeKind::Method {
                alias: alias.clone(),
                name: setter.name.clone(),
                args: setter_args,
                binding: Some(MethodBinding { descriptor: setter.clone(), setter: None, identifier: Some(identifier.clone()) }),
            },
            RuntimeType::Void,
        );
        frame.info.has_aggregates = true;
        frame.info.refresh.insert(&identifier, refresh);

        Ok(Node::typed(
            NodeKind::Method {
                alias,
                name,
                args,
                binding: Some(MethodBinding { descriptor: resolved.descriptor, setter: Some(setter), identifier: Some(identifier) }),
            },
            resolved.return_type,
        ))
    }
}
