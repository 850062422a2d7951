//! Hash and signature axes
//!
//! Both axes are reserved in the header and only the null handler (flag 0)
//! resolves. Packages naming any other digest or signature scheme are
//! rejected at scan time.

use crate::error::{JpkgError, Result};

/// Content digest handler selected by the header's hash flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Hasher {
    #[default]
    None = 0,
}

impl Hasher {
    pub fn from_flag(flag: u8, offset: u64) -> Result<Self> {
        match flag {
            0 => Ok(Self::None),
            _ => Err(JpkgError::UnknownFlag {
                axis: "hash",
                flag,
                offset,
            }),
        }
    }

    pub fn flag(self) -> u8 {
        self as u8
    }
}

/// Signature handler selected by the header's signature flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Signer {
    #[default]
    None = 0,
}

impl Signer {
    pub fn from_flag(flag: u8, offset: u64) -> Result<Self> {
        match flag {
            0 => Ok(Self::None),
            _ => Err(JpkgError::UnknownFlag {
                axis: "signature",
                flag,
                offset,
            }),
        }
    }

    pub fn flag(self) -> u8 {
        self as u8
    }
}
