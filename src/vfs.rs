//! Read-only filesystem view of a package
//!
//! [`read_package`] scans a seekable source once and returns a [`Package`]
//! that owns the source. Paths are canonicalized the same way the encoder
//! does, so `a/b.txt`, `./a/b.txt` and `/a/b.txt` all name the same file.
//!
//! [`Package::open`] returns a handle whose payload is decoded on first
//! read. The query forms ([`Package::get_by_uuid`],
//! [`Package::get_by_identifier`], [`Package::get_by_metadata_query`]) decode
//! every matching payload before returning.
//!
//! Opening mutates the source cursor, so a `Package` serves one reader at a
//! time. For concurrent access share the [`PackageIndex`] and give each
//! reader its own source handle via [`PackageIndex::open_in`].

use crate::archive::{FileRecord, Header, PackageIndex};
use crate::error::{JpkgError, Result};
use crate::manifest::Manifest;
use crate::tree::{canonicalize, NodeKind};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::io::{self, Cursor, Read, Seek};
use std::time::SystemTime;
use tracing::debug;
use uuid::Uuid;

/// Scan `source` and build a package view over it.
///
/// `key` must be a 32-byte AES key when the package is encrypted.
pub fn read_package<R: Read + Seek>(mut source: R, key: Option<&[u8]>) -> Result<Package<R>> {
    let index = PackageIndex::scan(&mut source, key)?;
    Ok(Package { index, source })
}

/// Stat information for a file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Final path segment; empty for the root
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    /// Decoded size; `None` for directories
    pub size: Option<u64>,
    /// Packaged-at time; per-file timestamps are not stored
    pub modified: SystemTime,
}

impl EntryInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Result of opening a path
#[derive(Debug)]
pub enum Handle<'a> {
    File(FileHandle<'a>),
    Directory(DirHandle),
}

impl<'a> Handle<'a> {
    pub fn stat(&self) -> &EntryInfo {
        match self {
            Self::File(file) => file.stat(),
            Self::Directory(dir) => dir.stat(),
        }
    }

    pub fn into_file(self) -> Result<FileHandle<'a>> {
        match self {
            Self::File(file) => Ok(file),
            Self::Directory(dir) => Err(JpkgError::NotFound(format!(
                "{} is a directory",
                dir.info.path
            ))),
        }
    }

    pub fn into_dir(self) -> Result<DirHandle> {
        match self {
            Self::Directory(dir) => Ok(dir),
            Self::File(file) => Err(JpkgError::NotFound(format!(
                "{} is not a directory",
                file.info.path
            ))),
        }
    }
}

type Loader<'a> = Box<dyn FnMut() -> Result<Vec<u8>> + 'a>;

enum Contents<'a> {
    Deferred(Loader<'a>),
    Loaded(Cursor<Vec<u8>>),
    Closed,
}

/// Read-once handle over one file's decoded contents
pub struct FileHandle<'a> {
    info: EntryInfo,
    record: FileRecord,
    contents: Contents<'a>,
}

impl<'a> FileHandle<'a> {
    fn loaded(info: EntryInfo, record: FileRecord, data: Vec<u8>) -> Self {
        Self {
            info,
            record,
            contents: Contents::Loaded(Cursor::new(data)),
        }
    }

    pub fn stat(&self) -> &EntryInfo {
        &self.info
    }

    pub fn path(&self) -> &str {
        &self.record.path
    }

    pub fn identifier(&self) -> &str {
        &self.record.identifier
    }

    pub fn uuid(&self) -> Uuid {
        self.record.uuid
    }

    /// Raw metadata JSON as stored
    pub fn metadata_json(&self) -> &str {
        &self.record.metadata_json
    }

    /// Deserialize the file's metadata into a caller-chosen shape
    pub fn metadata<T: DeserializeOwned>(&self) -> Result<T> {
        parse_metadata(&self.record)
    }

    /// Decode the payload now if it has not been decoded yet.
    ///
    /// A failed decode leaves the handle deferred, so a later read reports
    /// the same failure again.
    pub fn load(&mut self) -> Result<()> {
        match &mut self.contents {
            Contents::Deferred(loader) => {
                let data = loader()?;
                self.contents = Contents::Loaded(Cursor::new(data));
                Ok(())
            }
            Contents::Loaded(_) => Ok(()),
            Contents::Closed => Err(JpkgError::Closed(self.record.path.clone())),
        }
    }

    /// Read everything not yet consumed
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.load()?;
        let mut out = Vec::new();
        if let Contents::Loaded(cursor) = &mut self.contents {
            cursor.read_to_end(&mut out)?;
        }
        Ok(out)
    }

    /// Release the decoded buffer; later reads fail
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.contents, Contents::Closed) {
            Contents::Closed => Err(JpkgError::Closed(self.record.path.clone())),
            _ => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.contents, Contents::Closed)
    }
}

impl Read for FileHandle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.load().map_err(into_io)?;
        match &mut self.contents {
            Contents::Loaded(cursor) => cursor.read(buf),
            _ => Err(into_io(JpkgError::Closed(self.record.path.clone()))),
        }
    }
}

impl std::fmt::Debug for FileHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.contents {
            Contents::Deferred(_) => "deferred",
            Contents::Loaded(_) => "loaded",
            Contents::Closed => "closed",
        };
        f.debug_struct("FileHandle")
            .field("path", &self.record.path)
            .field("state", &state)
            .finish()
    }
}

/// Keep the typed error reachable through `io::Error::into_inner`
fn into_io(err: JpkgError) -> io::Error {
    match err {
        JpkgError::Io(source) => source,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Paginated listing of one directory
#[derive(Debug, Clone)]
pub struct DirHandle {
    info: EntryInfo,
    entries: Vec<EntryInfo>,
    cursor: usize,
}

impl DirHandle {
    pub fn stat(&self) -> &EntryInfo {
        &self.info
    }

    /// Next `n` children in insertion order; `n == 0` means all remaining.
    ///
    /// Returns `None` once the listing is exhausted.
    pub fn read_dir(&mut self, n: usize) -> Option<Vec<EntryInfo>> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        let end = if n == 0 {
            self.entries.len()
        } else {
            (self.cursor + n).min(self.entries.len())
        };
        let page = self.entries[self.cursor..end].to_vec();
        self.cursor = end;
        Some(page)
    }

    /// All remaining children; empty once exhausted
    pub fn read_dir_all(&mut self) -> Vec<EntryInfo> {
        self.read_dir(0).unwrap_or_default()
    }
}

impl PackageIndex {
    /// Stat a path without decoding any payload
    pub fn stat(&self, path: &str) -> Result<EntryInfo> {
        let node = self
            .tree()
            .lookup(path)
            .ok_or_else(|| JpkgError::NotFound(canonicalize(path)))?;
        Ok(self.entry_info(node))
    }

    fn entry_info(&self, node: usize) -> EntryInfo {
        let tree = self.tree();
        let full_path = tree.full_path(node);
        let (name, kind) = tree
            .node(node)
            .map(|n| (n.name().to_string(), n.kind()))
            .unwrap_or((String::new(), NodeKind::Directory));
        let size = match kind {
            NodeKind::File => self.record(&full_path).map(|r| r.uncompressed_size),
            NodeKind::Directory => None,
        };
        EntryInfo {
            name,
            path: full_path,
            kind,
            size,
            modified: self.manifest().packaged_at_time(),
        }
    }

    /// Ordered children of a directory
    pub fn read_dir(&self, path: &str) -> Result<Vec<EntryInfo>> {
        let canonical = canonicalize(path);
        let node = self
            .tree()
            .lookup(&canonical)
            .and_then(|i| self.tree().node(i).map(|n| (i, n)))
            .filter(|(_, n)| n.is_dir())
            .ok_or(JpkgError::NotFound(canonical))?;
        Ok(node
            .1
            .children()
            .iter()
            .map(|&child| self.entry_info(child))
            .collect())
    }

    /// Open a path against a caller-supplied source handle.
    ///
    /// The source must hold the same package bytes the index was scanned
    /// from. File payloads are decoded on first read.
    pub fn open_in<'a, S: Read + Seek>(&'a self, source: &'a mut S, path: &str) -> Result<Handle<'a>> {
        let info = self.stat(path)?;
        debug!(path = %info.path, dir = info.is_dir(), "open");

        if info.is_dir() {
            let entries = self.read_dir(&info.path)?;
            return Ok(Handle::Directory(DirHandle {
                info,
                entries,
                cursor: 0,
            }));
        }

        let record = self
            .record(&info.path)
            .ok_or_else(|| JpkgError::NotFound(info.path.clone()))?
            .clone();
        let target = record.clone();
        let loader: Loader<'a> = Box::new(move || self.load_payload(&mut *source, &target));
        Ok(Handle::File(FileHandle {
            info,
            record,
            contents: Contents::Deferred(loader),
        }))
    }

    fn open_loaded<S: Read + Seek>(&self, source: &mut S, record: &FileRecord) -> Result<FileHandle<'static>> {
        let data = self.load_payload(source, record)?;
        let info = self.stat(&record.path)?;
        Ok(FileHandle::loaded(info, record.clone(), data))
    }

    /// First file whose UUID matches exactly, decoded
    pub fn get_by_uuid_in<S: Read + Seek>(&self, source: &mut S, uuid: &Uuid) -> Result<FileHandle<'static>> {
        let record = self
            .records()
            .iter()
            .find(|r| r.uuid == *uuid)
            .ok_or_else(|| JpkgError::NotFound(format!("uuid {uuid}")))?;
        self.open_loaded(source, record)
    }

    /// Every file whose identifier matches `pattern`, decoded, in package order
    pub fn get_by_identifier_in<S: Read + Seek>(
        &self,
        source: &mut S,
        pattern: &Regex,
    ) -> Result<Vec<FileHandle<'static>>> {
        let matches: Vec<&FileRecord> = self
            .records()
            .iter()
            .filter(|r| pattern.is_match(&r.identifier))
            .collect();
        if matches.is_empty() {
            return Err(JpkgError::NotFound(format!("identifier /{}/", pattern.as_str())));
        }
        matches
            .into_iter()
            .map(|r| self.open_loaded(source, r))
            .collect()
    }

    /// Every file whose metadata, parsed as `T`, satisfies `predicate`.
    ///
    /// Metadata that does not parse as `T` fails the whole query.
    pub fn get_by_metadata_query_in<S, T, F>(
        &self,
        source: &mut S,
        mut predicate: F,
    ) -> Result<Vec<FileHandle<'static>>>
    where
        S: Read + Seek,
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let mut matches = Vec::new();
        for record in self.records() {
            let metadata: T = parse_metadata(record)?;
            if predicate(&metadata) {
                matches.push(record);
            }
        }
        if matches.is_empty() {
            return Err(JpkgError::NotFound("metadata query".to_string()));
        }
        matches
            .into_iter()
            .map(|r| self.open_loaded(source, r))
            .collect()
    }
}

fn parse_metadata<T: DeserializeOwned>(record: &FileRecord) -> Result<T> {
    serde_json::from_str(&record.metadata_json).map_err(|source| JpkgError::MetadataParse {
        path: record.path.clone(),
        source,
    })
}

/// A scanned package together with the source it was scanned from
pub struct Package<R> {
    index: PackageIndex,
    source: R,
}

impl<R> std::fmt::Debug for Package<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("name", &self.index.manifest().name)
            .field("records", &self.index.records().len())
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> Package<R> {
    /// The immutable scan result, shareable across threads
    pub fn index(&self) -> &PackageIndex {
        &self.index
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    pub fn header(&self) -> &Header {
        self.index.header()
    }

    pub fn manifest(&self) -> &Manifest {
        self.index.manifest()
    }

    pub fn name(&self) -> &str {
        &self.index.manifest().name
    }

    pub fn packaged_at(&self) -> SystemTime {
        self.index.manifest().packaged_at_time()
    }

    pub fn file_count(&self) -> u64 {
        self.index.manifest().file_count
    }

    pub fn records(&self) -> &[FileRecord] {
        self.index.records()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains(path)
    }

    /// Package metadata deserialized into a caller-chosen shape
    pub fn package_metadata<T: DeserializeOwned>(&self) -> Result<T> {
        self.index.manifest().metadata()
    }

    pub fn open(&mut self, path: &str) -> Result<Handle<'_>> {
        self.index.open_in(&mut self.source, path)
    }

    pub fn stat(&self, path: &str) -> Result<EntryInfo> {
        self.index.stat(path)
    }

    pub fn read_dir(&self, path: &str) -> Result<Vec<EntryInfo>> {
        self.index.read_dir(path)
    }

    /// Open a file and read it to the end
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        self.open(path)?.into_file()?.read_all()
    }

    pub fn get_by_uuid(&mut self, uuid: &Uuid) -> Result<FileHandle<'static>> {
        self.index.get_by_uuid_in(&mut self.source, uuid)
    }

    pub fn get_by_identifier(&mut self, pattern: &Regex) -> Result<Vec<FileHandle<'static>>> {
        self.index.get_by_identifier_in(&mut self.source, pattern)
    }

    pub fn get_by_metadata_query<T, F>(&mut self, predicate: F) -> Result<Vec<FileHandle<'static>>>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        self.index.get_by_metadata_query_in(&mut self.source, predicate)
    }
}
