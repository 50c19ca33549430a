use std::sync::Arc;

use indexmap::IndexMap;

use crate::methods::{MethodDescriptor, NameCache};

/// Callables of one schema, populated once at registration time.
#[derive(Debug, Clone, Default)]
pub struct MethodLibrary {
    /// declared name -> overloads
    by_name: IndexMap<String, Vec<Arc<MethodDescriptor>>>,
    /// normalized name -> declared names
    by_normalized: IndexMap<String, Vec<String>>,
}

impl MethodLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: MethodDescriptor) {
        let normalized = NameCache::normalize_uncached(&descriptor.name);
        let declared = self.by_normalized.entry(normalized).or_default();
        if !declared.contains(&descriptor.name) {
            declared.push(descriptor.name.clone());
        }
        self.by_name.entry(descriptor.name.clone()).or_default().push(Arc::new(descriptor));
    }

    pub fn with(mut self, descriptor: MethodDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Overloads under the exact declared name.
    pub fn exact(&self, name: &str) -> &[Arc<MethodDescriptor>] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Overloads whose declared name normalizes to the same key as `name`.
    pub fn normalized(&self, name: &str, cache: &NameCache) -> Vec<Arc<MethodDescriptor>> {
        let key = cache.normalize(name);
        self.by_normalized
            .get(&*key)
            .into_iter()
            .flatten()
            .flat_map(|declared| self.exact(declared).iter().cloned())
            .collect()
    }

    /// Exact spelling first, normalized spelling as fallback.
    pub fn lookup(&self, name: &str, cache: &NameCache) -> Vec<Arc<MethodDescriptor>> {
        let exact = self.exact(name);
        if !exact.is_empty() {
            return exact.to_vec();
        }
        self.normalized(name, cache)
    }

    pub fn contains(&self, name: &str, cache: &NameCache) -> bool {
        !self.lookup(name, cache).is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.by_name.keys()
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
