use crate::archive::codec::{read_cells, read_record, scalar_count, write_cells, write_record};
use crate::archive::format::{RecordHeader, RECORD_HEADER_SIZE};
use crate::error::{JpkgError, Result};
use std::io::{Read, Seek, Write};
use uuid::Uuid;

/// One file entry as found in a package
///
/// Everything except `payload_offset` is stored on disk. The offset is
/// captured while scanning and points at the first payload byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Canonical path, unique within the package
    pub path: String,

    /// Free-form tag, not required to be unique
    pub identifier: String,

    pub uuid: Uuid,

    /// Opaque per-file metadata (JSON)
    pub metadata_json: String,

    /// Absolute stream offset of the payload
    pub payload_offset: u64,

    /// Payload size as stored (compressed, then encrypted)
    pub compressed_size: u64,

    /// Size of the original file contents
    pub uncompressed_size: u64,
}

impl FileRecord {
    fn header(&self) -> RecordHeader {
        RecordHeader {
            identifier_len: scalar_count(&self.identifier),
            path_len: scalar_count(&self.path),
            uuid: *self.uuid.as_bytes(),
            metadata_len: scalar_count(&self.metadata_json),
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
        }
    }

    /// Bytes between the start of the record and its payload
    pub fn header_size(&self) -> u64 {
        RECORD_HEADER_SIZE + self.header().text_size()
    }

    /// Write the fixed header, the three texts and `payload` in one pass
    pub fn write_to<W: Write>(&self, mut writer: W, payload: &[u8]) -> Result<usize> {
        debug_assert_eq!(payload.len() as u64, self.compressed_size);

        let mut written = write_record(&mut writer, &self.header())?;
        written += write_cells(&mut writer, &self.identifier)?;
        written += write_cells(&mut writer, &self.path)?;
        written += write_cells(&mut writer, &self.metadata_json)?;
        writer.write_all(payload)?;
        Ok(written + payload.len())
    }

    /// Read one record's header and texts, leaving `reader` at its payload.
    ///
    /// `source_len` bounds every declared size so a corrupt count fails here
    /// instead of driving a huge read.
    pub fn read_from<R: Read + Seek>(reader: &mut R, source_len: u64, index: usize) -> Result<Self> {
        let start = reader.stream_position()?;
        let header: RecordHeader = read_record(&mut *reader)
            .map_err(|e| e.truncated(start, &format!("record {index}")))?;

        let texts_end = header
            .identifier_len
            .checked_add(header.path_len)
            .and_then(|n| n.checked_add(header.metadata_len))
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(start + RECORD_HEADER_SIZE))
            .filter(|&end| end <= source_len)
            .ok_or_else(|| JpkgError::InvalidFormat {
                offset: start,
                reason: format!("record {index} text lengths exceed the package size"),
            })?;

        let within = || format!("record {index}");
        let identifier = read_cells(&mut *reader, header.identifier_len)
            .map_err(|e| e.truncated(start, &within()))?;
        let path = read_cells(&mut *reader, header.path_len)
            .map_err(|e| e.truncated(start, &within()))?;
        let metadata_json = read_cells(&mut *reader, header.metadata_len)
            .map_err(|e| e.truncated(start, &within()))?;

        let payload_offset = reader.stream_position()?;
        debug_assert_eq!(payload_offset, texts_end);
        match payload_offset.checked_add(header.compressed_size) {
            Some(end) if end <= source_len => {}
            _ => {
                return Err(JpkgError::InvalidFormat {
                    offset: payload_offset,
                    reason: format!(
                        "record {index} payload of {} bytes runs past the end of the package",
                        header.compressed_size
                    ),
                })
            }
        }

        Ok(Self {
            path,
            identifier,
            uuid: Uuid::from_bytes(header.uuid),
            metadata_json,
            payload_offset,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
        })
    }
}
