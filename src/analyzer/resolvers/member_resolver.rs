use crate::{
    analyzer::{AnalyzerError, Suggestions},
    ast::{Node, NodeKind},
    config::CompilerConfig,
    types::{RuntimeType, TypeCatalog, TypeCompatibility},
};

/// Property access and indexing on bound expressions.
pub struct MemberResolver;

impl MemberResolver {
    /// Shape the value really has: structured columns carry their intended type.
    fn shape(root: &Node) -> RuntimeType {
        match &root.kind {
            NodeKind::Column { intended_type: Some(t), .. } => RuntimeType::named(t.as_str()),
            _ => root.ty.unwrap_nullable().clone(),
        }
    }

    fn lift(root: &Node, ty: RuntimeType) -> RuntimeType {
        if root.ty.is_nullable() { RuntimeType::nullable(ty) } else { ty }
    }

    pub fn property(root: Node, member: &str, catalog: &TypeCatalog, config: &CompilerConfig) -> Result<Node, AnalyzerError> {
        let shape = Self::shape(&root);
        let ty = match &shape {
            RuntimeType::Object => RuntimeType::Object,
            RuntimeType::Named(name) => match catalog.property(name, member) {
                Some(ty) => ty,
                None if catalog.is_dynamic(name) => RuntimeType::Object,
                None => {
                    let known = catalog.property_names(name);
                    return Err(AnalyzerError::UnknownProperty {
                        ty: shape.clone(),
                        property: member.to_string(),
                        suggestions: Suggestions::for_name(member, known.iter().map(String::as_str), config),
                    });
                }
            },
            RuntimeType::Dictionary(_, value) => value.as_ref().clone(),
            RuntimeType::String | RuntimeType::Array(_) if member == "Length" => RuntimeType::Int,
            RuntimeType::Enumerable(_) if member == "Count" => RuntimeType::Int,
            _ => {
                return Err(AnalyzerError::UnknownProperty { ty: shape.clone(), property: member.to_string(), suggestions: Vec::new() });
            }
        };
        let ty = Self::lift(&root, ty);
        Ok(Node::typed(NodeKind::Property { root: root.into_box(), member: member.to_string() }, ty))
    }

    pub fn index(root: Node, index: Node, catalog: &TypeCatalog) -> Result<Node, AnalyzerError> {
        let shape = Self::shape(&root);
        let integral = index.ty.unwrap_nullable().is_integral();
        let element = match &shape {
            RuntimeType::Object => Some(RuntimeType::Object),
            RuntimeType::Array(e) | RuntimeType::Enumerable(e) if integral => Some(e.as_ref().clone()),
            RuntimeType::String if integral => Some(RuntimeType::Char),
            RuntimeType::Dictionary(key, value) if TypeCompatibility::can_supply(&index.ty, key, catalog) => {
                Some(value.as_ref().clone())
            }
            RuntimeType::Named(name) => catalog
                .indexer(name)
                .filter(|(key, _)| TypeCompatibility::can_supply(&index.ty, key, catalog))
                .map(|(_, element)| element),
            _ => None,
        };
        let element = element.ok_or_else(|| AnalyzerError::IndexerRequired { expr: root.to_string(), ty: shape.clone() })?;
        let ty = Self::lift(&root, element);
        Ok(Node::typed(NodeKind::Index { root: root.into_box(), index: index.into_box() }, ty))
    }
}
