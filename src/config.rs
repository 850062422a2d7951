//! Pack configuration
//!
//! Package-level choices for the encoder, usually kept next to the files
//! being packed:
//!
//! ```toml
//! name = "assets"
//! compression = "zstd"
//! encrypt = true
//!
//! [metadata]
//! channel = "stable"
//! revision = 12
//! ```

use crate::error::{JpkgError, Result};
use crate::plugins::Compression;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Encoder settings loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackConfig {
    /// Package name stored in the manifest
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub compression: Compression,

    /// Seal payloads with AES-256-GCM; the key is supplied separately
    #[serde(default)]
    pub encrypt: bool,

    /// Free-form package metadata, stored as JSON
    #[serde(default)]
    pub metadata: toml::Table,
}

impl PackConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            JpkgError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }
}
