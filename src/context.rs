//! The `Gpx` handle: one schema registry plus the engine cache built from it.

use std::sync::{Arc, OnceLock};

use crate::binding::GpxBinding;
use crate::cache::BindingCache;
use crate::dialect::GpxVersion;
use crate::error::Result;
use crate::extensions::GpxExtension;
use crate::registry::SchemaRegistry;

/// Entry point for loading and saving GPX documents.
///
/// Cloning is cheap and clones share the registry and cache, so an extension
/// type registered through one clone is visible to all of them.
#[derive(Debug, Clone)]
pub struct Gpx {
    registry: Arc<SchemaRegistry>,
    cache: Arc<BindingCache>,
}

impl Default for Gpx {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpx {
    /// A handle with an empty registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SchemaRegistry::new()))
    }

    pub fn with_registry(registry: Arc<SchemaRegistry>) -> Self {
        let cache = Arc::new(BindingCache::new(Arc::clone(&registry)));
        Self { registry, cache }
    }

    /// Process-wide handle behind the crate-level functions.
    pub fn global() -> &'static Gpx {
        static GLOBAL: OnceLock<Gpx> = OnceLock::new();
        GLOBAL.get_or_init(Gpx::new)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &BindingCache {
        &self.cache
    }

    /// Binding engine for `version`, current with the registry.
    pub fn binding(&self, version: GpxVersion) -> Arc<GpxBinding> {
        self.cache.get_or_build(version)
    }

    /// Bind `prefix` to `uri` in every document saved from now on.
    ///
    /// Registering the same pair twice is a no-op; a prefix already bound to
    /// another URI fails with [`GpxError::DuplicatePrefix`](crate::GpxError::DuplicatePrefix).
    pub fn register_namespace(&self, prefix: &str, uri: &str) -> Result<()> {
        if self.registry.register_namespace(prefix, uri)? {
            self.cache.invalidate_all();
        }
        Ok(())
    }

    /// Decode `<extensions>` children matching `T` into `T` on every later load.
    pub fn register_extension_type<T: GpxExtension>(&self) {
        if self.registry.register_extension_type::<T>() {
            self.cache.invalidate_all();
        }
    }
}
