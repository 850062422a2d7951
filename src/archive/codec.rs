//! Flat record codec
//!
//! Every framing structure in a package is a flat record: a fixed sequence of
//! fixed-width numbers and text fields, written big-endian. A record type
//! declares its layout once as a [`FieldKind`] schema table and converts
//! itself to and from [`FieldValue`]s; [`write_record`] and [`read_record`]
//! do the byte work for all of them.
//!
//! Text is written as a `u64` count of Unicode scalar values followed by one
//! 4-byte big-endian cell per scalar value, so a text field takes
//! `8 + 4 * count` bytes regardless of its UTF-8 length.

use crate::error::{JpkgError, Result};
use std::io::{Read, Write};

/// Width of one text cell in bytes
pub const CELL_SIZE: u64 = 4;

/// Filler written into alignment padding
pub const PAD_PATTERN: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Alignment of the header and manifest sections
pub const ALIGNMENT: u64 = 16;

/// Field types a record schema may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    I64,
    Bool,
    /// 16 raw bytes
    Uuid,
    /// Count-prefixed codepoint cells
    Text,
    /// Nested aggregate; always rejected
    Record,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::Bool => "bool",
            Self::Uuid => "uuid",
            Self::Text => "text",
            Self::Record => "record",
        }
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    Bool(bool),
    Uuid([u8; 16]),
    Text(String),
    Record(Vec<FieldValue>),
}

impl FieldValue {
    fn kind(&self) -> FieldKind {
        match self {
            Self::U8(_) => FieldKind::U8,
            Self::U16(_) => FieldKind::U16,
            Self::U32(_) => FieldKind::U32,
            Self::U64(_) => FieldKind::U64,
            Self::I64(_) => FieldKind::I64,
            Self::Bool(_) => FieldKind::Bool,
            Self::Uuid(_) => FieldKind::Uuid,
            Self::Text(_) => FieldKind::Text,
            Self::Record(_) => FieldKind::Record,
        }
    }
}

/// A flat record with a declared binary layout
pub trait BinaryRecord: Sized {
    /// Record name used in error messages
    const NAME: &'static str;

    /// Field layout, in wire order
    const SCHEMA: &'static [FieldKind];

    fn to_fields(&self) -> Vec<FieldValue>;

    fn from_fields(fields: Fields) -> Result<Self>;
}

/// Decoded field values, consumed in schema order by [`BinaryRecord::from_fields`]
pub struct Fields {
    record: &'static str,
    index: usize,
    values: std::vec::IntoIter<FieldValue>,
}

impl Fields {
    fn new(record: &'static str, values: Vec<FieldValue>) -> Self {
        Self {
            record,
            index: 0,
            values: values.into_iter(),
        }
    }

    fn next(&mut self, expected: FieldKind) -> Result<FieldValue> {
        let field = self.index;
        self.index += 1;
        match self.values.next() {
            Some(value) if value.kind() == expected => Ok(value),
            _ => Err(JpkgError::FieldMismatch {
                record: self.record,
                field,
                expected: expected.name(),
            }),
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        match self.next(FieldKind::U8)? {
            FieldValue::U8(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }

    pub fn u16(&mut self) -> Result<u16> {
        match self.next(FieldKind::U16)? {
            FieldValue::U16(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.next(FieldKind::Bool)? {
            FieldValue::Bool(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }

    pub fn u32(&mut self) -> Result<u32> {
        match self.next(FieldKind::U32)? {
            FieldValue::U32(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }

    pub fn u64(&mut self) -> Result<u64> {
        match self.next(FieldKind::U64)? {
            FieldValue::U64(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }

    pub fn i64(&mut self) -> Result<i64> {
        match self.next(FieldKind::I64)? {
            FieldValue::I64(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }

    pub fn uuid(&mut self) -> Result<[u8; 16]> {
        match self.next(FieldKind::Uuid)? {
            FieldValue::Uuid(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }

    pub fn text(&mut self) -> Result<String> {
        match self.next(FieldKind::Text)? {
            FieldValue::Text(v) => Ok(v),
            _ => unreachable!("kind checked by Fields::next"),
        }
    }
}

/// Write a record, returning the number of bytes written
pub fn write_record<W: Write, T: BinaryRecord>(mut writer: W, record: &T) -> Result<usize> {
    let values = record.to_fields();
    if values.len() != T::SCHEMA.len() {
        return Err(JpkgError::FieldMismatch {
            record: T::NAME,
            field: values.len().min(T::SCHEMA.len()),
            expected: "schema field count",
        });
    }

    for (index, (value, kind)) in values.iter().zip(T::SCHEMA).enumerate() {
        if *kind == FieldKind::Record || value.kind() == FieldKind::Record {
            return Err(JpkgError::NestedField {
                record: T::NAME,
                field: index,
            });
        }
        if value.kind() != *kind {
            return Err(JpkgError::FieldMismatch {
                record: T::NAME,
                field: index,
                expected: kind.name(),
            });
        }
    }

    // Encode in full before touching the sink
    let mut buf = Vec::new();
    for value in &values {
        write_value(&mut buf, value)?;
    }
    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Read a record laid out according to `T::SCHEMA`
pub fn read_record<R: Read, T: BinaryRecord>(mut reader: R) -> Result<T> {
    if let Some(field) = T::SCHEMA.iter().position(|k| *k == FieldKind::Record) {
        return Err(JpkgError::NestedField {
            record: T::NAME,
            field,
        });
    }

    let mut values = Vec::with_capacity(T::SCHEMA.len());
    for kind in T::SCHEMA {
        values.push(read_value(&mut reader, *kind)?);
    }
    T::from_fields(Fields::new(T::NAME, values))
}

/// Fixed encoded size of a record whose schema has no text fields
pub fn fixed_size(schema: &[FieldKind]) -> Option<u64> {
    schema.iter().try_fold(0u64, |acc, kind| {
        let width = match kind {
            FieldKind::U8 | FieldKind::Bool => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 | FieldKind::I64 => 8,
            FieldKind::Uuid => 16,
            FieldKind::Text | FieldKind::Record => return None,
        };
        Some(acc + width)
    })
}

fn write_value<W: Write>(writer: &mut W, value: &FieldValue) -> Result<usize> {
    let written = match value {
        FieldValue::U8(v) => {
            writer.write_all(&[*v])?;
            1
        }
        FieldValue::U16(v) => {
            writer.write_all(&v.to_be_bytes())?;
            2
        }
        FieldValue::U32(v) => {
            writer.write_all(&v.to_be_bytes())?;
            4
        }
        FieldValue::U64(v) => {
            writer.write_all(&v.to_be_bytes())?;
            8
        }
        FieldValue::I64(v) => {
            writer.write_all(&v.to_be_bytes())?;
            8
        }
        FieldValue::Bool(v) => {
            writer.write_all(&[u8::from(*v)])?;
            1
        }
        FieldValue::Uuid(v) => {
            writer.write_all(v)?;
            16
        }
        FieldValue::Text(s) => {
            writer.write_all(&scalar_count(s).to_be_bytes())?;
            8 + write_cells(&mut *writer, s)?
        }
        FieldValue::Record(_) => unreachable!("nested records rejected before writing"),
    };
    Ok(written)
}

fn read_value<R: Read>(reader: &mut R, kind: FieldKind) -> Result<FieldValue> {
    let value = match kind {
        FieldKind::U8 => FieldValue::U8(read_array::<_, 1>(reader)?[0]),
        FieldKind::U16 => FieldValue::U16(u16::from_be_bytes(read_array(reader)?)),
        FieldKind::U32 => FieldValue::U32(u32::from_be_bytes(read_array(reader)?)),
        FieldKind::U64 => FieldValue::U64(u64::from_be_bytes(read_array(reader)?)),
        FieldKind::I64 => FieldValue::I64(i64::from_be_bytes(read_array(reader)?)),
        FieldKind::Bool => FieldValue::Bool(read_array::<_, 1>(reader)?[0] != 0),
        FieldKind::Uuid => FieldValue::Uuid(read_array(reader)?),
        FieldKind::Text => {
            let count = u64::from_be_bytes(read_array(reader)?);
            FieldValue::Text(read_cells(reader, count)?)
        }
        FieldKind::Record => unreachable!("nested records rejected before reading"),
    };
    Ok(value)
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Number of Unicode scalar values in `s`
pub fn scalar_count(s: &str) -> u64 {
    s.chars().count() as u64
}

/// Encoded size of `count` cells
pub fn cells_size(count: u64) -> u64 {
    count * CELL_SIZE
}

/// Write the cells of `s` without a count prefix
pub fn write_cells<W: Write>(mut writer: W, s: &str) -> Result<usize> {
    let mut buf = Vec::with_capacity(s.len() * CELL_SIZE as usize);
    for c in s.chars() {
        buf.extend_from_slice(&u32::from(c).to_be_bytes());
    }
    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Read `count` cells into a string
pub fn read_cells<R: Read>(mut reader: R, count: u64) -> Result<String> {
    // Counts come from untrusted input; grow as cells actually arrive
    let mut out = String::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        let mut cell = [0u8; 4];
        reader.read_exact(&mut cell)?;
        let scalar = u32::from_be_bytes(cell);
        let c = char::from_u32(scalar).ok_or(JpkgError::InvalidScalar(scalar))?;
        out.push(c);
    }
    Ok(out)
}

/// Filler bytes needed to bring a section of length `m` to the next 16-byte boundary
pub fn padding_len(m: u64) -> u64 {
    ((m / ALIGNMENT + 1) * ALIGNMENT - m) % ALIGNMENT
}

/// Write `count` filler bytes, returning `count`
pub fn write_padding<W: Write>(mut writer: W, count: u64) -> Result<usize> {
    let filler: Vec<u8> = PAD_PATTERN
        .iter()
        .copied()
        .cycle()
        .take(count as usize)
        .collect();
    writer.write_all(&filler)?;
    Ok(filler.len())
}
