use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::RuntimeType;

/// Shape of a named (entity or structured-format) type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    /// Single base type, `Object` when absent
    pub base: Option<String>,
    /// Capabilities (interfaces) the type implements
    pub capabilities: Vec<String>,
    /// Declared properties in declaration order
    pub properties: IndexMap<String, RuntimeType>,
    /// Element type returned by `value[...]`, with its key type
    pub indexer: Option<(RuntimeType, RuntimeType)>,
    /// Unknown properties resolve to `Object` instead of failing
    pub dynamic: bool,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, ty: RuntimeType) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }

    pub fn with_indexer(mut self, key: RuntimeType, element: RuntimeType) -> Self {
        self.indexer = Some((key, element));
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }
}

/// Registry of named types used for property resolution, capability checks
/// and "most derived" comparisons during overload resolution.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: IndexMap<String, TypeDescriptor>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Find a property on a named type or any of its bases.
    pub fn property(&self, type_name: &str, property: &str) -> Option<RuntimeType> {
        let mut visited = HashSet::new();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                return None;
            }
            let descriptor = self.types.get(&name)?;
            if let Some(ty) = descriptor.properties.get(property) {
                return Some(ty.clone());
            }
            current = descriptor.base.clone();
        }
        None
    }

    /// All property names visible on a type, bases included.
    pub fn property_names(&self, type_name: &str) -> Vec<String> {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                break;
            }
            let Some(descriptor) = self.types.get(&name) else { break };
            names.extend(descriptor.properties.keys().cloned());
            current = descriptor.base.clone();
        }
        names
    }

    pub fn is_dynamic(&self, type_name: &str) -> bool {
        self.types.get(type_name).map(|d| d.dynamic).unwrap_or(false)
    }

    pub fn indexer(&self, type_name: &str) -> Option<(RuntimeType, RuntimeType)> {
        let mut visited = HashSet::new();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                return None;
            }
            let descriptor = self.types.get(&name)?;
            if let Some(indexer) = &descriptor.indexer {
                return Some(indexer.clone());
            }
            current = descriptor.base.clone();
        }
        None
    }

    /// Base chain and capabilities of a named type, the type itself first.
    pub fn ancestry(&self, type_name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut pending = vec![type_name.to_string()];
        while let Some(name) = pending.pop() {
            if out.contains(&name) {
                continue;
            }
            if let Some(descriptor) = self.types.get(&name) {
                pending.extend(descriptor.capabilities.iter().rev().cloned());
                if let Some(base) = &descriptor.base {
                    pending.push(base.clone());
                }
            }
            out.push(name);
        }
        out
    }

    /// Reference assignability: identity, anything to `Object`, derived named
    /// types to their bases and capabilities, arrays to enumerables.
    pub fn is_assignable(&self, from: &RuntimeType, to: &RuntimeType) -> bool {
        if from == to || to.is_object() {
            return true;
        }
        match (from, to) {
            (RuntimeType::Named(from), RuntimeType::Named(to)) => self.ancestry(from).iter().any(|n| n == to),
            (RuntimeType::Array(a), RuntimeType::Enumerable(b))
            | (RuntimeType::Array(a), RuntimeType::Array(b))
            | (RuntimeType::Enumerable(a), RuntimeType::Enumerable(b)) => {
                a == b || (a.is_reference_type() && self.is_assignable(a, b))
            }
            _ => false,
        }
    }
}
