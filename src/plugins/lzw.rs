//! Lempel-Ziv-Welch coding with LSB-first bit packing and 8-bit literals
//!
//! Stream layout matches the GIF/TIFF variable-width convention: codes start
//! at 9 bits and grow to 12, code 256 clears the dictionary, code 257 ends
//! the stream. The encoder emits a clear code first and resets itself when
//! the 12-bit code space is exhausted.

use std::collections::HashMap;
use thiserror::Error;

const LITERAL_WIDTH: u32 = 8;
const CLEAR: u16 = 1 << LITERAL_WIDTH;
const END: u16 = CLEAR + 1;
const MAX_WIDTH: u32 = 12;
const MAX_CODE: u16 = (1 << MAX_WIDTH) - 1;
const TABLE_SIZE: usize = 1 << MAX_WIDTH;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LzwError {
    #[error("stream ended before the end code")]
    Truncated,
    #[error("invalid code {0}")]
    InvalidCode(u16),
}

/// Packs variable-width codes least-significant bit first
struct BitWriter {
    out: Vec<u8>,
    bits: u32,
    n_bits: u32,
}

impl BitWriter {
    fn write(&mut self, code: u16, width: u32) {
        self.bits |= u32::from(code) << self.n_bits;
        self.n_bits += width;
        while self.n_bits >= 8 {
            self.out.push(self.bits as u8);
            self.bits >>= 8;
            self.n_bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.n_bits > 0 {
            self.out.push(self.bits as u8);
        }
        self.out
    }
}

struct BitReader<'a> {
    input: std::slice::Iter<'a, u8>,
    bits: u32,
    n_bits: u32,
}

impl BitReader<'_> {
    fn read(&mut self, width: u32) -> Option<u16> {
        while self.n_bits < width {
            let byte = *self.input.next()?;
            self.bits |= u32::from(byte) << self.n_bits;
            self.n_bits += 8;
        }
        let code = (self.bits & ((1 << width) - 1)) as u16;
        self.bits >>= width;
        self.n_bits -= width;
        Some(code)
    }
}

struct Encoder {
    table: HashMap<(u16, u8), u16>,
    width: u32,
    hi: u16,
    overflow: u32,
    sink: BitWriter,
}

impl Encoder {
    fn emit(&mut self, code: u16) {
        self.sink.write(code, self.width);
    }

    fn reset(&mut self) {
        self.width = LITERAL_WIDTH + 1;
        self.hi = END;
        self.overflow = 1 << (LITERAL_WIDTH + 1);
        self.table.clear();
    }

    /// Claim the next free code. Returns false when the code space ran out and
    /// the dictionary was cleared instead.
    fn advance(&mut self) -> bool {
        self.hi += 1;
        if u32::from(self.hi) == self.overflow {
            self.width += 1;
            self.overflow <<= 1;
        }
        if self.hi == MAX_CODE {
            self.emit(CLEAR);
            self.reset();
            return false;
        }
        true
    }
}

/// Compress `data` into a complete LZW stream
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut enc = Encoder {
        table: HashMap::new(),
        width: LITERAL_WIDTH + 1,
        hi: END,
        overflow: 1 << (LITERAL_WIDTH + 1),
        sink: BitWriter {
            out: Vec::with_capacity(data.len() / 2 + 4),
            bits: 0,
            n_bits: 0,
        },
    };
    enc.emit(CLEAR);

    if let Some((&first, rest)) = data.split_first() {
        let mut code = u16::from(first);
        for &literal in rest {
            let key = (code, literal);
            if let Some(&known) = enc.table.get(&key) {
                code = known;
                continue;
            }
            enc.emit(code);
            code = u16::from(literal);
            if enc.advance() {
                enc.table.insert(key, enc.hi);
            }
        }
        enc.emit(code);
        enc.advance();
    }

    enc.emit(END);
    enc.sink.finish()
}

/// Decompress a complete LZW stream
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, LzwError> {
    let mut reader = BitReader {
        input: data.iter(),
        bits: 0,
        n_bits: 0,
    };
    let mut prefix = vec![0u16; TABLE_SIZE];
    let mut suffix = vec![0u8; TABLE_SIZE];
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut chunk = Vec::new();

    let mut width = LITERAL_WIDTH + 1;
    let mut hi = END;
    let mut overflow: u32 = 1 << width;
    let mut last: Option<u16> = None;

    loop {
        let code = reader.read(width).ok_or(LzwError::Truncated)?;

        if code < CLEAR {
            out.push(code as u8);
            if let Some(prev) = last {
                suffix[hi as usize] = code as u8;
                prefix[hi as usize] = prev;
            }
        } else if code == CLEAR {
            width = LITERAL_WIDTH + 1;
            hi = END;
            overflow = 1 << width;
            last = None;
            continue;
        } else if code == END {
            return Ok(out);
        } else if code <= hi {
            // `code == hi` names the entry being defined right now: the
            // previous expansion followed by its own first byte.
            let mut c = if code == hi {
                last.ok_or(LzwError::InvalidCode(code))?
            } else {
                code
            };

            chunk.clear();
            while c >= CLEAR {
                chunk.push(suffix[c as usize]);
                c = prefix[c as usize];
            }
            let head = c as u8;
            chunk.push(head);
            chunk.reverse();
            if code == hi {
                chunk.push(head);
            }
            out.extend_from_slice(&chunk);

            if let Some(prev) = last {
                suffix[hi as usize] = head;
                prefix[hi as usize] = prev;
            }
        } else {
            return Err(LzwError::InvalidCode(code));
        }

        last = Some(code);
        hi += 1;
        if u32::from(hi) >= overflow {
            if width == MAX_WIDTH {
                last = None;
                hi -= 1;
            } else {
                width += 1;
                overflow <<= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let packed = compress(&[]);
        // clear (9 bits) + end (9 bits)
        assert_eq!(packed.len(), 3);
        assert_eq!(decompress(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_known_stream() {
        // clear=256, 'a'=97, end=257 at 9 bits each, LSB first
        let packed = compress(b"a");
        let mut expected = BitWriter {
            out: Vec::new(),
            bits: 0,
            n_bits: 0,
        };
        expected.write(256, 9);
        expected.write(97, 9);
        expected.write(257, 9);
        assert_eq!(packed, expected.finish());
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let data = b"TOBEORNOTTOBEORTOBEORNOT".repeat(200);
        let packed = compress(&data);
        assert!(packed.len() < data.len() / 4);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_kwkwk_case() {
        // "aaaa..." exercises the code == hi special case
        let data = vec![b'a'; 1000];
        assert_eq!(decompress(&compress(&data)).unwrap(), data);
    }

    #[test]
    fn test_dictionary_reset() {
        // Enough distinct pairs to exhaust 12-bit codes several times
        let data: Vec<u8> = (0..200_000u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect();
        assert_eq!(decompress(&compress(&data)).unwrap(), data);
    }

    #[test]
    fn test_truncated_stream() {
        let packed = compress(b"hello hello hello");
        let err = decompress(&packed[..packed.len() - 2]).unwrap_err();
        assert_eq!(err, LzwError::Truncated);
    }

    #[test]
    fn test_invalid_code() {
        let mut w = BitWriter {
            out: Vec::new(),
            bits: 0,
            n_bits: 0,
        };
        w.write(256, 9);
        w.write(400, 9);
        assert_eq!(decompress(&w.finish()), Err(LzwError::InvalidCode(400)));
    }
}
