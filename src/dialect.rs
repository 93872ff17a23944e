//! GPX dialect detection and input normalization.

use std::fmt;

use crate::error::{GpxError, Result};

pub const GPX_1_0_NAMESPACE: &str = "http://www.topografix.com/GPX/1/0";
pub const GPX_1_1_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

const GPX_1_1_DEFAULT_DECLARATION: &str = "xmlns=\"http://www.topografix.com/GPX/1/1\"";
const PROLOG_START: &str = "<?xml";
const PROLOG_END: &str = "?>";
const BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpxVersion {
    V1_0,
    V1_1,
}

impl GpxVersion {
    pub fn namespace(self) -> &'static str {
        match self {
            GpxVersion::V1_0 => GPX_1_0_NAMESPACE,
            GpxVersion::V1_1 => GPX_1_1_NAMESPACE,
        }
    }

    /// Value of the `version` attribute on `<gpx>`.
    pub fn tag(self) -> &'static str {
        match self {
            GpxVersion::V1_0 => "1.0",
            GpxVersion::V1_1 => "1.1",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "1.0" => Some(GpxVersion::V1_0),
            "1.1" => Some(GpxVersion::V1_1),
            _ => None,
        }
    }

    pub fn is_gpx_namespace(uri: &str) -> bool {
        uri == GPX_1_0_NAMESPACE || uri == GPX_1_1_NAMESPACE
    }
}

impl fmt::Display for GpxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPX {}", self.tag())
    }
}

/// Guess the dialect from the raw text.
///
/// Only the literal unprefixed 1.1 declaration counts; a document binding the
/// 1.1 namespace to a prefix is reported as 1.0.
pub fn detect_version(text: &str) -> GpxVersion {
    if text.contains(GPX_1_1_DEFAULT_DECLARATION) {
        GpxVersion::V1_1
    } else {
        GpxVersion::V1_0
    }
}

/// Drop a leading XML declaration (and byte-order mark) from `text`.
pub fn strip_prolog(text: &str) -> Result<&str> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    if !text.starts_with(PROLOG_START) {
        return Ok(text);
    }
    let end = text.find(PROLOG_END).ok_or(GpxError::MalformedProlog)?;
    Ok(&text[end + PROLOG_END.len()..])
}

/// Detect the dialect and produce the body the binding engine will parse.
pub fn normalize(text: &str) -> Result<(GpxVersion, &str)> {
    let version = detect_version(text);
    let body = strip_prolog(text)?;
    tracing::trace!(%version, stripped = text.len() - body.len(), "normalized GPX input");
    Ok((version, body))
}
