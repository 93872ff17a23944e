use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::GpxError;

/// How the load pipeline treats its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Buffer the whole input, sniff the dialect and strip the XML declaration.
    #[default]
    Compatibility,
    /// Parse directly as GPX 1.1 without any normalization.
    StrictGpx1_1,
}

impl LoadPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadPolicy::Compatibility => "compatibility",
            LoadPolicy::StrictGpx1_1 => "strictGpx1_1",
        }
    }
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadPolicy {
    type Err = GpxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compatibility" => Ok(LoadPolicy::Compatibility),
            "strictGpx1_1" | "strict" => Ok(LoadPolicy::StrictGpx1_1),
            other => Err(GpxError::UnsupportedPolicy(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for LoadPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Options for loading a GPX document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    /// Dialect handling (default: compatibility)
    #[serde(default)]
    pub policy: LoadPolicy,
}

/// Options for writing a GPX document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOptions {
    /// Spaces per nesting level; 0 writes everything on one line (default: 2)
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Emit `<?xml version="1.0" encoding="utf-8"?>` first (default: true)
    #[serde(default = "default_true")]
    pub xml_declaration: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            xml_declaration: true,
        }
    }
}

/// Options accepted by the JS entry points: load and save settings in one object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpxOptions {
    #[serde(flatten)]
    pub load: LoadOptions,

    #[serde(flatten)]
    pub save: SaveOptions,
}

fn default_indent() -> usize {
    2
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_str() {
        assert_eq!("compatibility".parse::<LoadPolicy>().unwrap(), LoadPolicy::Compatibility);
        assert_eq!("strictGpx1_1".parse::<LoadPolicy>().unwrap(), LoadPolicy::StrictGpx1_1);
        let err = "lenient".parse::<LoadPolicy>().unwrap_err();
        assert!(matches!(err, GpxError::UnsupportedPolicy(name) if name == "lenient"));
    }

    #[test]
    fn test_policy_display_round_trips() {
        for policy in [LoadPolicy::Compatibility, LoadPolicy::StrictGpx1_1] {
            assert_eq!(policy.to_string().parse::<LoadPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_save_defaults() {
        let opts = SaveOptions::default();
        assert_eq!(opts.indent, 2);
        assert!(opts.xml_declaration);
    }
}
