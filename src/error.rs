use std::io;
use thiserror::Error;

/// Result type for package operations
pub type Result<T> = std::result::Result<T, JpkgError>;

/// Broad failure class of a [`JpkgError`].
///
/// `Format` and `Io` failures abort a whole decode, `Codec` failures abort the
/// single encode/open in progress, and `NotFound` leaves the package usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Format,
    Codec,
    NotFound,
    Io,
    Type,
}

/// Unified error type for all package operations
#[derive(Debug, Error)]
pub enum JpkgError {
    // Format errors
    #[error("Invalid magic number in package header: {found:02x?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("Unsupported package version: {0}")]
    UnsupportedVersion(u64),

    #[error("Unknown {axis} flag {flag} at offset {offset}")]
    UnknownFlag {
        axis: &'static str,
        flag: u8,
        offset: u64,
    },

    #[error("Duplicate path in package: {path} (record {index})")]
    DuplicatePath { path: String, index: usize },

    #[error("Path tree conflict at {path}: {reason}")]
    TreeConflict { path: String, reason: &'static str },

    #[error("Invalid Unicode scalar value in text cell: {0:#x}")]
    InvalidScalar(u32),

    #[error("Invalid package format at offset {offset}: {reason}")]
    InvalidFormat { offset: u64, reason: String },

    // Codec errors
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed for {path}: {reason}")]
    DecompressionFailed { path: String, reason: String },

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed for {path}: authentication tag mismatch or truncated payload")]
    DecryptionFailed { path: String },

    #[error("Package is encrypted but no decryption key was provided")]
    MissingKey,

    #[error("Invalid encryption key length: {0} bytes (expected 32)")]
    InvalidKeyLength(usize),

    // Lookup errors
    #[error("Not found in package: {0}")]
    NotFound(String),

    // Type errors
    #[error("Unsupported field type in record {record}: field {field} is a nested aggregate")]
    NestedField { record: &'static str, field: usize },

    #[error("Field type mismatch in record {record}: field {field} expected {expected}")]
    FieldMismatch {
        record: &'static str,
        field: usize,
        expected: &'static str,
    },

    #[error("Failed to parse metadata of {path}: {source}")]
    MetadataParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("I/O error at offset {offset}: {source}")]
    IoAt {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("Handle is closed: {0}")]
    Closed(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl JpkgError {
    /// Which failure class this error belongs to
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidMagic { .. }
            | Self::UnsupportedVersion(_)
            | Self::UnknownFlag { .. }
            | Self::DuplicatePath { .. }
            | Self::TreeConflict { .. }
            | Self::InvalidScalar(_)
            | Self::InvalidFormat { .. } => ErrorClass::Format,

            Self::CompressionFailed(_)
            | Self::DecompressionFailed { .. }
            | Self::EncryptionFailed
            | Self::DecryptionFailed { .. }
            | Self::MissingKey
            | Self::InvalidKeyLength(_) => ErrorClass::Codec,

            Self::NotFound(_) => ErrorClass::NotFound,

            Self::NestedField { .. }
            | Self::FieldMismatch { .. }
            | Self::MetadataParse { .. }
            | Self::JsonError(_)
            | Self::TomlError(_)
            | Self::InvalidConfig(_) => ErrorClass::Type,

            Self::Io(_) | Self::IoAt { .. } | Self::Closed(_) => ErrorClass::Io,
        }
    }

    /// Attach a stream offset to a bare I/O error
    pub(crate) fn at(offset: u64) -> impl FnOnce(io::Error) -> JpkgError {
        move |source| JpkgError::IoAt { offset, source }
    }

    /// Report an unexpected end of input as a format error located at `offset`
    pub(crate) fn truncated(self, offset: u64, within: &str) -> Self {
        match self {
            Self::Io(source) if source.kind() == io::ErrorKind::UnexpectedEof => {
                Self::InvalidFormat {
                    offset,
                    reason: format!("package truncated inside {within}"),
                }
            }
            other => other,
        }
    }
}

impl From<toml::de::Error> for JpkgError {
    fn from(err: toml::de::Error) -> Self {
        JpkgError::TomlError(err.to_string())
    }
}
