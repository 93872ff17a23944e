//! Caller-registered extension types and namespace prefixes.

use std::any::TypeId;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{GpxError, Result};
use crate::extensions::{ExtensionType, GpxExtension};
use crate::gpx_types::Namespaces;

/// Append-only schema registry.
///
/// Every successful new registration bumps [`SchemaRegistry::generation`];
/// binding engines remember the generation they were built from and are
/// rebuilt once it moves.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    generation: u64,
    namespaces: Namespaces,
    extension_types: Vec<ExtensionType>,
}

/// Consistent view of the registry used to configure one binding engine.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub generation: u64,
    pub namespaces: Namespaces,
    pub extension_types: Arc<[ExtensionType]>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix` to `uri` for every document written from now on.
    ///
    /// Returns `Ok(true)` if the pair was new, `Ok(false)` if it was already
    /// registered.
    pub fn register_namespace(&self, prefix: &str, uri: &str) -> Result<bool> {
        let mut state = self.state.write();
        if let Some(registered) = state.namespaces.get(prefix) {
            if registered != uri {
                return Err(GpxError::DuplicatePrefix {
                    prefix: prefix.to_string(),
                    registered_uri: registered.to_string(),
                    requested_uri: uri.to_string(),
                });
            }
            return Ok(false);
        }
        state.namespaces.insert(prefix, uri);
        state.generation += 1;
        tracing::debug!(prefix, uri, generation = state.generation, "registered namespace");
        Ok(true)
    }

    /// Register `T` so that `<extensions>` children matching its namespace
    /// and local name are decoded into it. Returns `false` if already known.
    pub fn register_extension_type<T: GpxExtension>(&self) -> bool {
        let mut state = self.state.write();
        if state
            .extension_types
            .iter()
            .any(|t| t.type_id() == TypeId::of::<T>())
        {
            return false;
        }
        let extension_type = ExtensionType::of::<T>();
        tracing::debug!(
            type_name = extension_type.type_name(),
            namespace = extension_type.namespace(),
            local_name = extension_type.local_name(),
            "registered extension type"
        );
        state.extension_types.push(extension_type);
        state.generation += 1;
        true
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn namespaces(&self) -> Namespaces {
        self.state.read().namespaces.clone()
    }

    pub fn extension_types(&self) -> Vec<ExtensionType> {
        self.state.read().extension_types.clone()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        RegistrySnapshot {
            generation: state.generation,
            namespaces: state.namespaces.clone(),
            extension_types: state.extension_types.iter().cloned().collect(),
        }
    }
}
