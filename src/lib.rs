//! jpkg-rs: seekable package container with a read-only virtual filesystem
//!
//! A package bundles many named files plus per-file and per-package JSON
//! metadata into one stream:
//! - Big-endian header, manifest and file records with 16-byte alignment
//! - Per-package compression (LZW, LZ4, Zstd) and AES-256-GCM sealing
//! - Directory tree rebuilt from the flat path set on read
//! - Random access to any file after a single forward scan
//! - Lookup by path, UUID, identifier pattern or metadata predicate
//!
//! # Example
//!
//! ```no_run
//! use jpkg_rs::{read_package, Compression, Encoder};
//! use std::fs::File;
//!
//! // Write a package
//! let mut encoder = Encoder::new(File::create("example.jpkg")?)
//!     .with_name("example")
//!     .with_compression(Compression::Zstd);
//! encoder.add_bytes("docs/readme.txt", b"Hello, World!".to_vec(), &())?;
//! encoder.encode()?;
//!
//! // Read it back
//! let mut package = read_package(File::open("example.jpkg")?, None)?;
//! let data = package.read_file("/docs/readme.txt")?;
//! # Ok::<(), jpkg_rs::error::JpkgError>(())
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod manifest;
pub mod plugins;
pub mod tree;
pub mod vfs;

pub use archive::{
    Encoder, FileRecord, FileToEncode, Header, PackageIndex, FORMAT_VERSION, HEADER_SIZE,
    MAGIC_NUMBER,
};
pub use config::PackConfig;
pub use error::{ErrorClass, JpkgError, Result};
pub use manifest::Manifest;
pub use plugins::{
    derive_key, derive_key_with_rounds, Compression, Encryption, Hasher, Plugins, Signer,
};
pub use tree::{canonicalize, NodeKind, PathTree};
pub use vfs::{read_package, DirHandle, EntryInfo, FileHandle, Handle, Package};
