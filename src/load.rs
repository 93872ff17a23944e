//! Load pipeline: policy-driven dialect handling in front of the binding engines.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::context::Gpx;
use crate::dialect::{self, GpxVersion};
use crate::error::Result;
use crate::gpx_types::GpxFile;
use crate::options::LoadPolicy;

impl Gpx {
    /// Load a document from text.
    ///
    /// Under [`LoadPolicy::Compatibility`] the dialect is sniffed and the XML
    /// declaration dropped before parsing, so GPX 1.0 documents and documents
    /// declared as XML 1.1 load too.
    pub fn load_str(&self, text: &str, policy: LoadPolicy) -> Result<GpxFile> {
        match policy {
            LoadPolicy::Compatibility => {
                let (version, body) = dialect::normalize(text)?;
                self.deserialize(version, body.as_bytes())
            }
            LoadPolicy::StrictGpx1_1 => self.deserialize(GpxVersion::V1_1, text.as_bytes()),
        }
    }

    pub fn load_bytes(&self, bytes: &[u8], policy: LoadPolicy) -> Result<GpxFile> {
        match policy {
            LoadPolicy::Compatibility => self.load_str(std::str::from_utf8(bytes)?, policy),
            LoadPolicy::StrictGpx1_1 => self.deserialize(GpxVersion::V1_1, bytes),
        }
    }

    /// Load from any reader. The strict policy parses while reading; the
    /// compatibility policy needs the whole input first.
    pub fn load_reader<R: Read>(&self, mut source: R, policy: LoadPolicy) -> Result<GpxFile> {
        match policy {
            LoadPolicy::Compatibility => {
                let mut bytes = Vec::new();
                source.read_to_end(&mut bytes)?;
                self.load_bytes(&bytes, policy)
            }
            LoadPolicy::StrictGpx1_1 => self.deserialize(GpxVersion::V1_1, BufReader::new(source)),
        }
    }

    pub fn load_path(&self, path: impl AsRef<Path>, policy: LoadPolicy) -> Result<GpxFile> {
        let path = path.as_ref();
        tracing::trace!(path = %path.display(), %policy, "opening GPX file");
        self.load_reader(File::open(path)?, policy)
    }

    fn deserialize<R: BufRead>(&self, version: GpxVersion, source: R) -> Result<GpxFile> {
        let binding = self.binding(version);
        let file = binding.deserialize(source)?;
        tracing::debug!(
            engine = %version,
            declared = %file.version,
            waypoints = file.waypoints.len(),
            routes = file.routes.len(),
            tracks = file.tracks.len(),
            "loaded GPX document"
        );
        Ok(file)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Gpx {
    /// Read `source` to the end, then parse on the blocking thread pool.
    pub async fn load_async<R>(&self, mut source: R, policy: LoadPolicy) -> Result<GpxFile>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        use tokio::io::AsyncReadExt;

        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).await?;
        self.load_blocking(bytes, policy).await
    }

    pub async fn load_path_async(&self, path: impl AsRef<Path>, policy: LoadPolicy) -> Result<GpxFile> {
        let bytes = tokio::fs::read(path).await?;
        self.load_blocking(bytes, policy).await
    }

    async fn load_blocking(&self, bytes: Vec<u8>, policy: LoadPolicy) -> Result<GpxFile> {
        let gpx = self.clone();
        tokio::task::spawn_blocking(move || gpx.load_bytes(&bytes, policy))
            .await
            .map_err(|e| crate::error::GpxError::Task(e.to_string()))?
    }
}
