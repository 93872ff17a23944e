//! Save pipeline: every document is written as namespace-correct GPX 1.1.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::context::Gpx;
use crate::dialect::{GPX_1_1_NAMESPACE, GpxVersion};
use crate::error::{GpxError, Result};
use crate::extensions::Extensions;
use crate::gpx_types::{GpxFile, Metadata, Namespaces, Route, Track, Waypoint};
use crate::options::SaveOptions;

/// Value written to the `creator` attribute of every saved document.
pub const CREATOR: &str = "gpx-compat";

/// Borrowed view of a document as it will be written.
///
/// Shares the caller's content; only the root attributes and the namespace
/// declarations are replaced.
#[derive(Debug)]
pub struct PreparedFile<'a> {
    pub version: &'static str,
    pub creator: &'static str,
    pub metadata: Option<&'a Metadata>,
    pub waypoints: &'a [Waypoint],
    pub routes: &'a [Route],
    pub tracks: &'a [Track],
    pub extensions: Option<&'a Extensions>,
    pub namespaces: Namespaces,
}

/// Build the 1.1 view of `file`, declaring the `registered` namespaces too.
pub fn prepare<'a>(file: &'a GpxFile, registered: &Namespaces) -> Result<PreparedFile<'a>> {
    let namespaces = rewrite_namespaces(&merge_namespaces(&file.namespaces, registered))?;
    Ok(PreparedFile {
        version: GpxVersion::V1_1.tag(),
        creator: CREATOR,
        metadata: file.metadata.as_ref(),
        waypoints: &file.waypoints,
        routes: &file.routes,
        tracks: &file.tracks,
        extensions: file.extensions.as_ref(),
        namespaces,
    })
}

/// Document declarations followed by the registered ones; a registered
/// prefix overrides the document's binding of the same prefix.
pub fn merge_namespaces(document: &Namespaces, registered: &Namespaces) -> Namespaces {
    let mut merged = document.clone();
    for decl in registered.iter() {
        merged.insert(decl.prefix.as_str(), decl.uri.as_str());
    }
    merged
}

/// Drop both GPX namespaces and make GPX 1.1 the only default namespace.
pub fn rewrite_namespaces(namespaces: &Namespaces) -> Result<Namespaces> {
    let mut rewritten = Namespaces::new();
    rewritten.insert("", GPX_1_1_NAMESPACE);
    for decl in namespaces.iter() {
        if GpxVersion::is_gpx_namespace(&decl.uri) {
            continue;
        }
        if decl.prefix.is_empty() {
            return Err(GpxError::UnknownDefaultNamespace(decl.uri.clone()));
        }
        rewritten.insert(decl.prefix.as_str(), decl.uri.as_str());
    }
    Ok(rewritten)
}

impl Gpx {
    /// Write `file` as GPX 1.1 to `sink` with explicit output options.
    pub fn save_with_options<W: Write>(&self, file: &GpxFile, sink: W, options: &SaveOptions) -> Result<()> {
        let binding = self.binding(GpxVersion::V1_1);
        let prepared = prepare(file, binding.namespaces())?;
        tracing::debug!(
            source_version = %file.version,
            namespaces = prepared.namespaces.len(),
            points = file.point_count(),
            "saving GPX 1.1 document"
        );
        binding.serialize(&prepared, sink, options)
    }

    pub fn save_to_writer<W: Write>(&self, file: &GpxFile, sink: W) -> Result<()> {
        self.save_with_options(file, sink, &SaveOptions::default())
    }

    pub fn save_to_vec(&self, file: &GpxFile) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.save_to_writer(file, &mut out)?;
        Ok(out)
    }

    pub fn save_to_string(&self, file: &GpxFile) -> Result<String> {
        Ok(String::from_utf8(self.save_to_vec(file)?)?)
    }

    /// Create (or truncate) the file at `path` and write `file` into it.
    pub fn save_path(&self, file: &GpxFile, path: impl AsRef<Path>) -> Result<()> {
        let mut sink = BufWriter::new(File::create(path)?);
        self.save_to_writer(file, &mut sink)?;
        sink.flush()?;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Gpx {
    /// Serialize in memory, then write the bytes to `sink`.
    pub async fn save_async<W>(&self, file: &GpxFile, mut sink: W) -> Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        use tokio::io::AsyncWriteExt;

        let bytes = self.save_to_vec(file)?;
        sink.write_all(&bytes).await?;
        sink.flush().await?;
        Ok(())
    }

    pub async fn save_path_async(&self, file: &GpxFile, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.save_to_vec(file)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}
