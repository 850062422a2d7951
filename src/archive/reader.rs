use crate::archive::codec::padding_len;
use crate::archive::format::{Header, FLAGS_OFFSET, HEADER_SIZE};
use crate::archive::record::FileRecord;
use crate::error::{JpkgError, Result};
use crate::manifest::Manifest;
use crate::plugins::Plugins;
use crate::tree::{canonicalize, PathTree};
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// Upper bound on records preallocated from an untrusted file count
const MAX_PREALLOCATED_RECORDS: usize = 1024;

/// Everything learned from one forward scan of a package
///
/// The index is immutable once built. It never caches payload bytes: every
/// load seeks the supplied source to the record's payload offset and runs the
/// decrypt and decompress pipeline for that record only.
#[derive(Debug, Clone)]
pub struct PackageIndex {
    header: Header,
    manifest: Manifest,
    plugins: Plugins,
    records: Vec<FileRecord>,
    by_path: HashMap<String, usize>,
    tree: PathTree,
}

impl PackageIndex {
    /// Scan a package from offset 0: header, manifest, then every record.
    ///
    /// Payloads are skipped using their declared sizes. The source is left
    /// positioned after the last record.
    pub fn scan<R: Read + Seek>(source: &mut R, key: Option<&[u8]>) -> Result<Self> {
        let source_len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(source);

        let header =
            Header::read_from(&mut reader).map_err(|e| e.truncated(0, "the header"))?;
        let plugins = Plugins::from_flags(header.flags(), key, FLAGS_OFFSET)?;

        let manifest_start = HEADER_SIZE + padding_len(HEADER_SIZE);
        let (manifest, _) = Manifest::read_from(&mut reader, manifest_start)
            .map_err(|e| e.truncated(manifest_start, "the manifest"))?;

        debug!(
            name = %manifest.name,
            files = manifest.file_count,
            compression = plugins.compression.name(),
            encryption = plugins.encryption.name(),
            "scanning package"
        );

        let capacity = usize::try_from(manifest.file_count)
            .unwrap_or(usize::MAX)
            .min(MAX_PREALLOCATED_RECORDS);
        let mut records = Vec::with_capacity(capacity);
        let mut by_path = HashMap::with_capacity(capacity);

        for index in 0..manifest.file_count {
            let index = index as usize;
            let mut record = FileRecord::read_from(&mut reader, source_len, index)?;
            skip_payload(&mut reader, &record)?;

            record.path = canonicalize(&record.path);
            if by_path.insert(record.path.clone(), index).is_some() {
                return Err(JpkgError::DuplicatePath {
                    path: record.path,
                    index,
                });
            }

            trace!(
                index,
                path = %record.path,
                offset = record.payload_offset,
                size = record.compressed_size,
                "indexed record"
            );
            records.push(record);
        }

        let tree = PathTree::build(records.iter().map(|r| r.path.as_str()))?;

        Ok(Self {
            header,
            manifest,
            plugins,
            records,
            by_path,
            tree,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn plugins(&self) -> &Plugins {
        &self.plugins
    }

    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    /// Records in package order
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Record for a path; the path is canonicalized first
    pub fn record(&self, path: &str) -> Option<&FileRecord> {
        self.by_path
            .get(&canonicalize(path))
            .map(|&index| &self.records[index])
    }

    /// True if `path` names a file or a directory
    pub fn contains(&self, path: &str) -> bool {
        self.tree.lookup(path).is_some()
    }

    /// Read, decrypt and decompress one record's payload from `source`
    pub fn load_payload<S: Read + Seek>(&self, source: &mut S, record: &FileRecord) -> Result<Vec<u8>> {
        let offset = record.payload_offset;
        let size = usize::try_from(record.compressed_size).map_err(|_| JpkgError::InvalidFormat {
            offset,
            reason: format!("payload of {} is too large to load", record.path),
        })?;

        source
            .seek(SeekFrom::Start(offset))
            .map_err(JpkgError::at(offset))?;
        let mut sealed = vec![0u8; size];
        source.read_exact(&mut sealed).map_err(JpkgError::at(offset))?;

        let compressed = self.plugins.encryption.open(&sealed, &record.path)?;
        let data = self
            .plugins
            .compression
            .decompress(&compressed, &record.path)?;

        if data.len() as u64 != record.uncompressed_size {
            return Err(JpkgError::DecompressionFailed {
                path: record.path.clone(),
                reason: format!(
                    "expected {} bytes, decoded {}",
                    record.uncompressed_size,
                    data.len()
                ),
            });
        }

        trace!(path = %record.path, offset, size = data.len(), "loaded payload");
        Ok(data)
    }
}

fn skip_payload<R: Read + Seek>(reader: &mut BufReader<R>, record: &FileRecord) -> Result<()> {
    let jump = i64::try_from(record.compressed_size).map_err(|_| JpkgError::InvalidFormat {
        offset: record.payload_offset,
        reason: format!("payload size {} is out of range", record.compressed_size),
    })?;
    reader
        .seek_relative(jump)
        .map_err(JpkgError::at(record.payload_offset))
}
