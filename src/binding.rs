//! The structural binding engine: one configured reader/writer per dialect.

use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::dialect::GpxVersion;
use crate::error::{GpxError, Result};
use crate::extensions::ExtensionType;
use crate::gpx_types::{GpxFile, Namespaces};
use crate::options::SaveOptions;
use crate::parser;
use crate::registry::RegistrySnapshot;
use crate::save::PreparedFile;
use crate::writer;

/// A binding engine configured for one dialect and one registry generation.
#[derive(Debug)]
pub struct GpxBinding {
    version: GpxVersion,
    generation: u64,
    namespaces: Namespaces,
    extension_types: Arc<[ExtensionType]>,
}

impl GpxBinding {
    pub fn new(version: GpxVersion, snapshot: RegistrySnapshot) -> Self {
        Self {
            version,
            generation: snapshot.generation,
            namespaces: snapshot.namespaces,
            extension_types: snapshot.extension_types,
        }
    }

    pub fn version(&self) -> GpxVersion {
        self.version
    }

    pub fn default_namespace(&self) -> &'static str {
        self.version.namespace()
    }

    /// Registry generation this engine was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Registered namespace bindings, used on the write path.
    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn extension_types(&self) -> &[ExtensionType] {
        &self.extension_types
    }

    pub(crate) fn extension_type_for(&self, namespace: Option<&str>, local_name: &str) -> Option<&ExtensionType> {
        let namespace = namespace?;
        self.extension_types
            .iter()
            .find(|t| t.namespace() == namespace && t.local_name() == local_name)
    }

    /// Parse a complete document. Every failure is reported as
    /// [`GpxError::DeserializationFailed`].
    pub fn deserialize<R: BufRead>(&self, source: R) -> Result<GpxFile> {
        parser::parse_gpx(source, self).map_err(GpxError::deserialization)
    }

    pub fn serialize<W: Write>(&self, file: &PreparedFile<'_>, sink: W, options: &SaveOptions) -> Result<()> {
        writer::write_gpx(file, sink, options)
    }
}
