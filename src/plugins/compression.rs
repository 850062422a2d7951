use crate::error::{JpkgError, Result};
use crate::plugins::lzw;
use serde::{Deserialize, Serialize};

/// Zstd level used for package payloads (balanced speed/ratio)
pub const ZSTD_LEVEL: i32 = 6;

/// Whole-buffer compression selected by the header's compression flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Compression {
    #[default]
    None = 0,
    Lzw = 1,
    Lz4 = 2,
    Zstd = 3,
}

impl Compression {
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Self::None),
            1 => Some(Self::Lzw),
            2 => Some(Self::Lz4),
            3 => Some(Self::Zstd),
            _ => None,
        }
    }

    pub fn flag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lzw => "lzw",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// Compress a fully buffered payload
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lzw => Ok(lzw::compress(data)),
            Self::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Self::Zstd => zstd::encode_all(data, ZSTD_LEVEL).map_err(|e| {
                JpkgError::CompressionFailed(format!("Zstd compression failed: {}", e))
            }),
        }
    }

    /// Decompress a fully buffered payload; `path` is only used for error context
    pub fn decompress(self, data: &[u8], path: &str) -> Result<Vec<u8>> {
        let failed = |reason: String| JpkgError::DecompressionFailed {
            path: path.to_string(),
            reason,
        };
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lzw => lzw::decompress(data).map_err(|e| failed(format!("LZW: {}", e))),
            Self::Lz4 => {
                lz4_flex::decompress_size_prepended(data).map_err(|e| failed(format!("LZ4: {}", e)))
            }
            Self::Zstd => zstd::decode_all(data).map_err(|e| failed(format!("Zstd: {}", e))),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = JpkgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lzw" => Ok(Self::Lzw),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            other => Err(JpkgError::InvalidConfig(format!(
                "unknown compression method: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flag() {
        assert_eq!(Compression::from_flag(0), Some(Compression::None));
        assert_eq!(Compression::from_flag(1), Some(Compression::Lzw));
        assert_eq!(Compression::from_flag(3), Some(Compression::Zstd));
        assert_eq!(Compression::from_flag(99), None);
    }

    #[test]
    fn test_every_method_restores_input() {
        let data = b"This is test data that should compress well. ".repeat(100);
        for method in [
            Compression::None,
            Compression::Lzw,
            Compression::Lz4,
            Compression::Zstd,
        ] {
            let packed = method.compress(&data).unwrap();
            assert_eq!(method.decompress(&packed, "/t").unwrap(), data, "{}", method.name());
        }
    }

    #[test]
    fn test_corrupt_zstd_reports_path() {
        let err = Compression::Zstd
            .decompress(b"definitely not zstd", "/docs/a.txt")
            .unwrap_err();
        assert!(err.to_string().contains("/docs/a.txt"));
    }

    #[test]
    fn test_parse_name() {
        assert_eq!("LZW".parse::<Compression>().unwrap(), Compression::Lzw);
        assert!("brotli".parse::<Compression>().is_err());
    }
}
