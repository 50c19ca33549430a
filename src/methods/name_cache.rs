use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

/// Shared cache of call-site spellings to their normalized lookup key.
///
/// Independent compilations may share one instance. Population is idempotent:
/// two threads normalizing the same spelling store the same value.
#[derive(Debug, Default)]
pub struct NameCache {
    entries: RwLock<HashMap<String, Arc<str>>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case and underscore insensitive form: `A_B_S` → `abs`.
    pub fn normalize_uncached(name: &str) -> String {
        name.chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect()
    }

    pub fn normalize(&self, name: &str) -> Arc<str> {
        if let Some(hit) = self.entries.read().get(name) {
            return hit.clone();
        }
        let normalized: Arc<str> = Arc::from(Self::normalize_uncached(name));
        self.entries
            .write()
            .entry(name.to_string())
            .or_insert(normalized)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_underscores() {
        let cache = NameCache::new();
        assert_eq!(&*cache.normalize("A_B_S"), "abs");
        assert_eq!(&*cache.normalize("abs"), "abs");
        assert_eq!(&*cache.normalize("ToUpper"), "toupper");
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn repeated_lookups_share_the_entry() {
        let cache = NameCache::new();
        let a = cache.normalize("Sum");
        let b = cache.normalize("Sum");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_population_is_idempotent() {
        let cache = Arc::new(NameCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for name in ["Count", "SetCount", "To_Upper", "abs"] {
                        cache.normalize(name);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 4);
        assert_eq!(&*cache.normalize("To_Upper"), "toupper");
    }
}
