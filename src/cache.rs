//! Per-dialect cache of binding engines.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::binding::GpxBinding;
use crate::dialect::GpxVersion;
use crate::registry::SchemaRegistry;

/// Lazily built binding engines, rebuilt whenever the registry moves on.
///
/// Engines are only published fully built. A slot is never replaced by an
/// engine from an older registry generation, so two racing builds of the same
/// dialect simply leave one of two interchangeable engines in place.
#[derive(Debug)]
pub struct BindingCache {
    registry: Arc<SchemaRegistry>,
    slots: RwLock<HashMap<GpxVersion, Arc<GpxBinding>>>,
}

impl BindingCache {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn get_or_build(&self, version: GpxVersion) -> Arc<GpxBinding> {
        let generation = self.registry.generation();
        let cached = self.slots.read().get(&version).cloned();
        if let Some(binding) = cached {
            if binding.generation() == generation {
                return binding;
            }
        }

        let binding = Arc::new(GpxBinding::new(version, self.registry.snapshot()));
        tracing::debug!(%version, generation = binding.generation(), "built binding engine");

        let mut slots = self.slots.write();
        if let Some(existing) = slots.get(&version) {
            if existing.generation() >= binding.generation() {
                return Arc::clone(existing);
            }
        }
        slots.insert(version, Arc::clone(&binding));
        binding
    }

    /// Drop every cached engine.
    pub fn invalidate_all(&self) {
        let mut slots = self.slots.write();
        if !slots.is_empty() {
            tracing::trace!(dropped = slots.len(), "invalidated binding engines");
        }
        slots.clear();
    }

    /// Dialects with a cached engine, fresh or stale.
    pub fn cached_versions(&self) -> Vec<GpxVersion> {
        self.slots.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_engine_until_registry_changes() {
        let registry = Arc::new(SchemaRegistry::new());
        let cache = BindingCache::new(Arc::clone(&registry));

        let first = cache.get_or_build(GpxVersion::V1_1);
        let second = cache.get_or_build(GpxVersion::V1_1);
        assert!(Arc::ptr_eq(&first, &second));

        registry.register_namespace("ex", "http://example.com/").unwrap();
        let third = cache.get_or_build(GpxVersion::V1_1);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.generation(), registry.generation());
        assert_eq!(third.namespaces().get("ex"), Some("http://example.com/"));
    }

    #[test]
    fn test_engines_per_dialect() {
        let cache = BindingCache::new(Arc::new(SchemaRegistry::new()));
        let v10 = cache.get_or_build(GpxVersion::V1_0);
        let v11 = cache.get_or_build(GpxVersion::V1_1);
        assert_eq!(v10.default_namespace(), "http://www.topografix.com/GPX/1/0");
        assert_eq!(v11.default_namespace(), "http://www.topografix.com/GPX/1/1");
        assert_eq!(cache.cached_versions().len(), 2);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = BindingCache::new(Arc::new(SchemaRegistry::new()));
        let before = cache.get_or_build(GpxVersion::V1_0);
        cache.invalidate_all();
        assert!(cache.cached_versions().is_empty());
        let after = cache.get_or_build(GpxVersion::V1_0);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Arc::new(SchemaRegistry::new());
        let cache = Arc::new(BindingCache::new(Arc::clone(&registry)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        if j % 10 == 0 {
                            let _ = registry.register_namespace(&format!("p{i}x{j}"), "http://example.com/");
                        }
                        let binding = cache.get_or_build(GpxVersion::V1_1);
                        assert_eq!(binding.version(), GpxVersion::V1_1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let binding = cache.get_or_build(GpxVersion::V1_1);
        assert_eq!(binding.generation(), registry.generation());
        assert_eq!(binding.namespaces().len(), 40);
    }
}
