use crate::archive::codec::{
    self, padding_len, read_record, write_padding, write_record, BinaryRecord, FieldKind,
    FieldValue, Fields,
};
use crate::error::{JpkgError, Result};
use std::io::{self, Read, Write};

/// Magic number: ASCII "jpkg"
pub const MAGIC_NUMBER: [u8; 4] = *b"jpkg";

/// Current format version
pub const FORMAT_VERSION: u64 = 1;

/// Header size in bytes, before alignment padding
pub const HEADER_SIZE: u64 = 16;

/// Offset of the first flag byte within the header
pub const FLAGS_OFFSET: u64 = 12;

/// Fixed part of every file record, before its text cells and payload
pub const RECORD_HEADER_SIZE: u64 = 56;

/// Package header: magic, version and one flag byte per transform axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u64,
    pub compression_flag: u8,
    pub encryption_flag: u8,
    pub hash_flag: u8,
    pub signature_flag: u8,
}

impl Header {
    pub fn new(flags: [u8; 4]) -> Self {
        Self {
            version: FORMAT_VERSION,
            compression_flag: flags[0],
            encryption_flag: flags[1],
            hash_flag: flags[2],
            signature_flag: flags[3],
        }
    }

    pub fn flags(&self) -> [u8; 4] {
        [
            self.compression_flag,
            self.encryption_flag,
            self.hash_flag,
            self.signature_flag,
        ]
    }

    /// Write the header and its alignment padding; the header always starts at offset 0
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let written = write_record(&mut writer, self)?;
        let padding = write_padding(&mut writer, padding_len(written as u64))?;
        Ok(written + padding)
    }

    /// Read and validate the header, then skip its alignment padding
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let header: Header = read_record(&mut reader)?;
        skip_padding(&mut reader, padding_len(HEADER_SIZE))?;
        Ok(header)
    }
}

impl BinaryRecord for Header {
    const NAME: &'static str = "Header";
    const SCHEMA: &'static [FieldKind] = &[
        FieldKind::U32,
        FieldKind::U64,
        FieldKind::U8,
        FieldKind::U8,
        FieldKind::U8,
        FieldKind::U8,
    ];

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::U32(u32::from_be_bytes(MAGIC_NUMBER)),
            FieldValue::U64(self.version),
            FieldValue::U8(self.compression_flag),
            FieldValue::U8(self.encryption_flag),
            FieldValue::U8(self.hash_flag),
            FieldValue::U8(self.signature_flag),
        ]
    }

    fn from_fields(mut fields: Fields) -> Result<Self> {
        let magic = fields.u32()?.to_be_bytes();
        if magic != MAGIC_NUMBER {
            return Err(JpkgError::InvalidMagic { found: magic });
        }
        let version = fields.u64()?;
        if version != FORMAT_VERSION {
            return Err(JpkgError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            compression_flag: fields.u8()?,
            encryption_flag: fields.u8()?,
            hash_flag: fields.u8()?,
            signature_flag: fields.u8()?,
        })
    }
}

/// Fixed part of a file record
///
/// The three `*_len` fields count Unicode scalar values; the texts follow as
/// bare codepoint cells in the order identifier, path, metadata, and then
/// `compressed_size` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub identifier_len: u64,
    pub path_len: u64,
    pub uuid: [u8; 16],
    pub metadata_len: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl RecordHeader {
    /// Total size of the three text fields in bytes
    pub fn text_size(&self) -> u64 {
        codec::cells_size(self.identifier_len + self.path_len + self.metadata_len)
    }
}

impl BinaryRecord for RecordHeader {
    const NAME: &'static str = "RecordHeader";
    const SCHEMA: &'static [FieldKind] = &[
        FieldKind::U64,
        FieldKind::U64,
        FieldKind::Uuid,
        FieldKind::U64,
        FieldKind::U64,
        FieldKind::U64,
    ];

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::U64(self.identifier_len),
            FieldValue::U64(self.path_len),
            FieldValue::Uuid(self.uuid),
            FieldValue::U64(self.metadata_len),
            FieldValue::U64(self.compressed_size),
            FieldValue::U64(self.uncompressed_size),
        ]
    }

    fn from_fields(mut fields: Fields) -> Result<Self> {
        Ok(Self {
            identifier_len: fields.u64()?,
            path_len: fields.u64()?,
            uuid: fields.uuid()?,
            metadata_len: fields.u64()?,
            compressed_size: fields.u64()?,
            uncompressed_size: fields.u64()?,
        })
    }
}

/// Consume `count` padding bytes without looking at them
pub fn skip_padding<R: Read>(mut reader: R, count: u64) -> Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(count), &mut io::sink())?;
    if skipped != count {
        return Err(JpkgError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "package truncated inside alignment padding",
        )));
    }
    Ok(())
}
