use crate::archive::format::Header;
use crate::archive::record::FileRecord;
use crate::config::PackConfig;
use crate::error::{JpkgError, Result};
use crate::manifest::{metadata_to_json, Manifest};
use crate::plugins::{Compression, Encryption, Plugins};
use crate::tree::{canonicalize, PathTree};
use serde::Serialize;
use std::io::{BufWriter, Cursor, Read, Write};
use std::time::SystemTime;
use tracing::{debug, trace};
use uuid::Uuid;

/// A file queued for encoding
pub struct FileToEncode<'a> {
    pub path: String,
    pub source: Box<dyn Read + 'a>,
    pub identifier: String,
    /// Generated (v4) when `None`
    pub uuid: Option<Uuid>,
    /// Any JSON value; `null` is stored as `{}`
    pub metadata: serde_json::Value,
}

impl<'a> FileToEncode<'a> {
    pub fn new(path: impl Into<String>, source: impl Read + 'a) -> Self {
        Self {
            path: path.into(),
            source: Box::new(source),
            identifier: String::new(),
            uuid: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_metadata<M: Serialize + ?Sized>(mut self, metadata: &M) -> Result<Self> {
        self.metadata = serde_json::to_value(metadata)?;
        Ok(self)
    }
}

struct PendingFile<'a> {
    path: String,
    source: Box<dyn Read + 'a>,
    identifier: String,
    uuid: Uuid,
    metadata_json: String,
}

/// Package encoder
///
/// Files are queued with [`Encoder::add_file`] and friends; nothing is read
/// until [`Encoder::encode`], which drains the queue in order. Each source is
/// read to completion, compressed as one buffer and sealed in one encryption
/// call before its record is written, so memory is bounded by one file.
pub struct Encoder<'a, W: Write> {
    writer: W,
    name: String,
    metadata_json: String,
    packaged_at: SystemTime,
    plugins: Plugins,
    files: Vec<PendingFile<'a>>,
    tree: PathTree,
}

impl<'a, W: Write> Encoder<'a, W> {
    /// Create an encoder with no compression or encryption
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            name: String::new(),
            metadata_json: "{}".to_string(),
            packaged_at: SystemTime::now(),
            plugins: Plugins::default(),
            files: Vec::new(),
            tree: PathTree::new(),
        }
    }

    /// Create an encoder from a pack configuration.
    ///
    /// `key` is required when the configuration asks for encryption.
    pub fn from_config(writer: W, config: &PackConfig, key: Option<&[u8]>) -> Result<Self> {
        let encryption = if config.encrypt {
            Encryption::aes_gcm(key.ok_or(JpkgError::MissingKey)?)?
        } else {
            Encryption::None
        };
        Ok(Self::new(writer)
            .with_name(&config.name)
            .with_compression(config.compression)
            .with_encryption(encryption)
            .with_metadata(&config.metadata)?)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Package-level metadata, stored as JSON
    pub fn with_metadata<M: Serialize + ?Sized>(mut self, metadata: &M) -> Result<Self> {
        self.metadata_json = metadata_to_json(metadata)?;
        Ok(self)
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.plugins.compression = compression;
        self
    }

    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.plugins.encryption = encryption;
        self
    }

    /// Override the build timestamp (defaults to now)
    pub fn with_packaged_at(mut self, packaged_at: SystemTime) -> Self {
        self.packaged_at = packaged_at;
        self
    }

    /// Number of files queued so far
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Queue a file with an empty identifier and a fresh UUID
    pub fn add_file<S, M>(&mut self, path: &str, source: S, metadata: &M) -> Result<()>
    where
        S: Read + 'a,
        M: Serialize + ?Sized,
    {
        self.add_entry(FileToEncode::new(path, source).with_metadata(metadata)?)
    }

    /// Queue an in-memory file
    pub fn add_bytes<M>(&mut self, path: &str, data: impl Into<Vec<u8>>, metadata: &M) -> Result<()>
    where
        M: Serialize + ?Sized,
    {
        self.add_file(path, Cursor::new(data.into()), metadata)
    }

    /// Queue a file with an explicit identifier and optional UUID.
    ///
    /// The path is canonicalized here; a path already queued, or one that
    /// collides with a queued file or directory, is rejected immediately.
    pub fn add_entry(&mut self, file: FileToEncode<'a>) -> Result<()> {
        let path = canonicalize(&file.path);
        let queued_file = self
            .tree
            .lookup(&path)
            .and_then(|i| self.tree.node(i))
            .is_some_and(|node| !node.is_dir());
        if queued_file {
            return Err(JpkgError::DuplicatePath {
                path,
                index: self.files.len(),
            });
        }
        self.tree.insert(&path)?;

        let metadata_json = metadata_to_json(&file.metadata)?;
        trace!(path = %path, identifier = %file.identifier, "queued file");
        self.files.push(PendingFile {
            path,
            source: file.source,
            identifier: file.identifier,
            uuid: file.uuid.unwrap_or_else(Uuid::new_v4),
            metadata_json,
        });
        Ok(())
    }

    /// Write the whole package and hand back the writer
    pub fn encode(self) -> Result<W> {
        let Self {
            mut writer,
            name,
            metadata_json,
            packaged_at,
            plugins,
            files,
            ..
        } = self;

        {
            let mut out = BufWriter::new(&mut writer);

            let mut offset = Header::new(plugins.flags()).write_to(&mut out)? as u64;

            let mut manifest = Manifest::new(name, packaged_at);
            manifest.file_count = files.len() as u64;
            manifest.metadata_json = metadata_json;
            offset += manifest.write_to(&mut out, offset)? as u64;

            debug!(
                name = %manifest.name,
                files = files.len(),
                compression = plugins.compression.name(),
                encryption = plugins.encryption.name(),
                "encoding package"
            );

            for (index, mut file) in files.into_iter().enumerate() {
                let mut data = Vec::new();
                file.source.read_to_end(&mut data)?;

                let compressed = plugins.compression.compress(&data)?;
                let sealed = plugins.encryption.seal(&compressed)?;

                let mut record = FileRecord {
                    path: file.path,
                    identifier: file.identifier,
                    uuid: file.uuid,
                    metadata_json: file.metadata_json,
                    payload_offset: 0,
                    compressed_size: sealed.len() as u64,
                    uncompressed_size: data.len() as u64,
                };
                record.payload_offset = offset + record.header_size();
                offset += record.write_to(&mut out, &sealed)? as u64;

                trace!(
                    index,
                    path = %record.path,
                    original = record.uncompressed_size,
                    stored = record.compressed_size,
                    "encoded file"
                );
            }

            out.flush()?;
            debug!(bytes = offset, "package written");
        }

        Ok(writer)
    }
}
