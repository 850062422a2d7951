//! Package manifest
//!
//! The manifest follows the header and carries package-level facts: when the
//! package was built, how many file records follow, its name, and opaque
//! package metadata stored as JSON text. The metadata schema belongs to the
//! application; this crate only guarantees it is valid JSON.
//!
//! ```text
//! packaged_at  i64 (Unix seconds)
//! file_count   u64
//! name         text
//! metadata     text (JSON)
//! padding      filler up to the next 16-byte boundary
//! ```

use crate::archive::codec::{
    padding_len, read_record, write_padding, write_record, BinaryRecord, FieldKind, FieldValue,
    Fields,
};
use crate::archive::skip_padding;
use crate::error::{JpkgError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// JSON stored when the caller supplies no metadata
pub const EMPTY_METADATA: &str = "{}";

/// Package-level metadata block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Build time, Unix seconds
    pub packaged_at: i64,

    /// Number of file records following the manifest
    pub file_count: u64,

    /// Human-readable package name
    pub name: String,

    /// Opaque package metadata (JSON)
    pub metadata_json: String,
}

impl Manifest {
    pub fn new(name: impl Into<String>, packaged_at: SystemTime) -> Self {
        Self {
            packaged_at: unix_seconds(packaged_at),
            file_count: 0,
            name: name.into(),
            metadata_json: EMPTY_METADATA.to_string(),
        }
    }

    /// Replace the package metadata with the JSON form of `metadata`
    pub fn set_metadata<T: Serialize>(&mut self, metadata: &T) -> Result<()> {
        self.metadata_json = metadata_to_json(metadata)?;
        Ok(())
    }

    /// Deserialize the package metadata into a caller-chosen shape
    pub fn metadata<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.metadata_json).map_err(|source| JpkgError::MetadataParse {
            path: format!("package {}", self.name),
            source,
        })
    }

    /// Build time as a `SystemTime`
    pub fn packaged_at_time(&self) -> SystemTime {
        let secs = Duration::from_secs(self.packaged_at.unsigned_abs());
        if self.packaged_at >= 0 {
            UNIX_EPOCH + secs
        } else {
            UNIX_EPOCH - secs
        }
    }

    /// Write the manifest starting at stream offset `start`, padded to the next boundary
    pub fn write_to<W: Write>(&self, mut writer: W, start: u64) -> Result<usize> {
        let written = write_record(&mut writer, self)?;
        let padding = write_padding(&mut writer, padding_len(start + written as u64))?;
        Ok(written + padding)
    }

    /// Read a manifest that starts at stream offset `start` and skip its padding
    pub fn read_from<R: Read>(mut reader: R, start: u64) -> Result<(Self, u64)> {
        let manifest: Manifest = read_record(&mut reader)?;
        let size = manifest.encoded_size();
        let padding = padding_len(start + size);
        skip_padding(&mut reader, padding)?;
        Ok((manifest, size + padding))
    }

    /// Encoded size without padding
    pub fn encoded_size(&self) -> u64 {
        8 + 8
            + 8
            + 4 * self.name.chars().count() as u64
            + 8
            + 4 * self.metadata_json.chars().count() as u64
    }
}

impl BinaryRecord for Manifest {
    const NAME: &'static str = "Manifest";
    const SCHEMA: &'static [FieldKind] = &[
        FieldKind::I64,
        FieldKind::U64,
        FieldKind::Text,
        FieldKind::Text,
    ];

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::I64(self.packaged_at),
            FieldValue::U64(self.file_count),
            FieldValue::Text(self.name.clone()),
            FieldValue::Text(self.metadata_json.clone()),
        ]
    }

    fn from_fields(mut fields: Fields) -> Result<Self> {
        Ok(Self {
            packaged_at: fields.i64()?,
            file_count: fields.u64()?,
            name: fields.text()?,
            metadata_json: fields.text()?,
        })
    }
}

/// Serialize caller metadata; `null` (including `()`) becomes `{}`
pub fn metadata_to_json<T: Serialize + ?Sized>(metadata: &T) -> Result<String> {
    let value = serde_json::to_value(metadata)?;
    if value.is_null() {
        return Ok(EMPTY_METADATA.to_string());
    }
    Ok(serde_json::to_string(&value)?)
}

pub(crate) fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}
