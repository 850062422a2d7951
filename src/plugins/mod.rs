//! Flag-selected payload transforms
//!
//! Four independent axes, each stored as one header byte and resolved back
//! to a handler when a package is read: compression, encryption, hashing and
//! signing. An unrecognized flag on any axis fails the decode.

mod compression;
mod encryption;
mod integrity;
pub mod lzw;

pub use compression::{Compression, ZSTD_LEVEL};
pub use encryption::{
    derive_key, derive_key_with_rounds, Encryption, OpenWriter, SealWriter, DEFAULT_KDF_ROUNDS,
    KEY_LEN, NONCE_LEN, TAG_LEN,
};
pub use integrity::{Hasher, Signer};

use crate::error::{JpkgError, Result};

/// The live handlers of one package
#[derive(Debug, Clone, Default)]
pub struct Plugins {
    pub compression: Compression,
    pub encryption: Encryption,
    pub hasher: Hasher,
    pub signer: Signer,
}

impl Plugins {
    /// Resolve the four header flags. `offset` is the position of the first flag byte.
    pub fn from_flags(flags: [u8; 4], key: Option<&[u8]>, offset: u64) -> Result<Self> {
        let compression =
            Compression::from_flag(flags[0]).ok_or(JpkgError::UnknownFlag {
                axis: "compression",
                flag: flags[0],
                offset,
            })?;
        let encryption = Encryption::from_flag(flags[1], key, offset + 1)?;
        let hasher = Hasher::from_flag(flags[2], offset + 2)?;
        let signer = Signer::from_flag(flags[3], offset + 3)?;
        Ok(Self {
            compression,
            encryption,
            hasher,
            signer,
        })
    }

    pub fn flags(&self) -> [u8; 4] {
        [
            self.compression.flag(),
            self.encryption.flag(),
            self.hasher.flag(),
            self.signer.flag(),
        ]
    }
}
