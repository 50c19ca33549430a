use std::collections::HashMap;

use indexmap::IndexMap;

use crate::analyzer::{AnalyzerError, TableSymbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: IndexMap<String, TableSymbol>,
    attributes: HashMap<String, String>,
}

/// Arena of nested naming environments. A query block opens a child scope of
/// the enclosing one; lookups walk towards the root.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self { scopes: vec![Scope::default()] }
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope { parent: Some(parent), ..Default::default() });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes.get(id.0).and_then(|s| s.parent)
    }

    fn chain(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        std::iter::successors(self.scopes.get(id.0), |s| s.parent.and_then(|p| self.scopes.get(p.0)))
    }

    /// Register `symbol`; an alias already visible from `id` is rejected.
    pub fn define(&mut self, id: ScopeId, symbol: TableSymbol) -> Result<(), AnalyzerError> {
        if self.lookup(id, &symbol.alias).is_some() {
            return Err(AnalyzerError::DuplicateAlias(symbol.alias));
        }
        if let Some(scope) = self.scopes.get_mut(id.0) {
            scope.symbols.insert(symbol.alias.clone(), symbol);
        }
        Ok(())
    }

    /// Swap the symbol registered under the same alias in `id`.
    pub fn replace(&mut self, id: ScopeId, symbol: TableSymbol) {
        if let Some(scope) = self.scopes.get_mut(id.0) {
            scope.symbols.insert(symbol.alias.clone(), symbol);
        }
    }

    pub fn lookup(&self, id: ScopeId, alias: &str) -> Option<&TableSymbol> {
        self.chain(id).find_map(|s| s.symbols.get(alias))
    }

    /// Symbols defined directly in `id`, in definition order.
    pub fn symbols(&self, id: ScopeId) -> impl Iterator<Item = &TableSymbol> {
        self.scopes.get(id.0).into_iter().flat_map(|s| s.symbols.values())
    }

    pub fn visible_aliases(&self, id: ScopeId) -> Vec<String> {
        self.chain(id).flat_map(|s| s.symbols.keys().cloned()).collect()
    }

    pub fn set_attribute(&mut self, id: ScopeId, key: &str, value: impl Into<String>) {
        if let Some(scope) = self.scopes.get_mut(id.0) {
            scope.attributes.insert(key.to_string(), value.into());
        }
    }

    pub fn remove_attribute(&mut self, id: ScopeId, key: &str) {
        if let Some(scope) = self.scopes.get_mut(id.0) {
            scope.attributes.remove(key);
        }
    }

    /// Nearest value of `key` on the way to the root.
    pub fn attribute(&self, id: ScopeId, key: &str) -> Option<&str> {
        self.chain(id).find_map(|s| s.attributes.get(key).map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::TableDescriptor, types::RuntimeType};

    fn symbol(alias: &str) -> TableSymbol {
        TableSymbol::from_table(alias, "#os", &TableDescriptor::new("files", RuntimeType::Object))
    }

    #[test]
    fn lookups_walk_the_parent_chain() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let outer = tree.child(root);
        tree.define(outer, symbol("a")).unwrap();
        let inner = tree.child(outer);
        tree.define(inner, symbol("b")).unwrap();

        assert!(tree.lookup(inner, "a").is_some());
        assert!(tree.lookup(outer, "b").is_none());
        assert_eq!(tree.symbols(inner).count(), 1);
        assert_eq!(tree.visible_aliases(inner), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn duplicate_alias_in_chain_is_rejected() {
        let mut tree = ScopeTree::new();
        let outer = tree.child(tree.root());
        tree.define(outer, symbol("a")).unwrap();
        let inner = tree.child(outer);
        assert_eq!(tree.define(inner, symbol("a")), Err(AnalyzerError::DuplicateAlias("a".into())));

        let sibling = tree.child(tree.root());
        assert!(tree.define(sibling, symbol("a")).is_ok());
    }

    #[test]
    fn attributes_are_inherited() {
        let mut tree = ScopeTree::new();
        let outer = tree.child(tree.root());
        tree.set_attribute(outer, "schema", "#os");
        let inner = tree.child(outer);
        assert_eq!(tree.attribute(inner, "schema"), Some("#os"));
        tree.remove_attribute(outer, "schema");
        assert_eq!(tree.attribute(inner, "schema"), None);
    }
}
