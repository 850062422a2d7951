//! Payload encryption selected by the header's encryption flag
//!
//! Encryption uses a sink contract: [`Encryption::encryptor`] and
//! [`Encryption::decryptor`] wrap a destination writer, transform every
//! `write` call independently and forward the result immediately.
//!
//! For AES-256-GCM each `write` call is one sealed unit with its own random
//! nonce, framed as `nonce (12 B) || ciphertext || tag (16 B)`. The wire
//! framing therefore depends on how a payload is split across calls, so
//! payloads must go through exactly one call on both sides. Use
//! [`Encryption::seal`] and [`Encryption::open`], which enforce that.

use crate::error::{JpkgError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sha2::Sha256;
use std::fmt;
use std::io::{self, Write};

/// Byte length of the AES-GCM nonce prepended to every sealed write
pub const NONCE_LEN: usize = 12;

/// Byte length of the AES-GCM authentication tag
pub const TAG_LEN: usize = 16;

/// Required key length for AES-256
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count used by [`derive_key`]
pub const DEFAULT_KDF_ROUNDS: u32 = 600_000;

/// Encryption handler for package payloads
#[derive(Clone, Default)]
pub enum Encryption {
    #[default]
    None,
    AesGcm { key: [u8; KEY_LEN] },
}

impl fmt::Debug for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("Encryption::None"),
            Self::AesGcm { .. } => f.write_str("Encryption::AesGcm { key: <redacted> }"),
        }
    }
}

impl Encryption {
    pub const FLAG_NONE: u8 = 0;
    pub const FLAG_AES_GCM: u8 = 1;

    /// AES-256-GCM handler from a raw key
    pub fn aes_gcm(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| JpkgError::InvalidKeyLength(key.len()))?;
        Ok(Self::AesGcm { key })
    }

    /// Resolve a stored flag into a handler, using `key` when the flag needs one
    pub fn from_flag(flag: u8, key: Option<&[u8]>, offset: u64) -> Result<Self> {
        match flag {
            Self::FLAG_NONE => Ok(Self::None),
            Self::FLAG_AES_GCM => Self::aes_gcm(key.ok_or(JpkgError::MissingKey)?),
            _ => Err(JpkgError::UnknownFlag {
                axis: "encryption",
                flag,
                offset,
            }),
        }
    }

    pub fn flag(&self) -> u8 {
        match self {
            Self::None => Self::FLAG_NONE,
            Self::AesGcm { .. } => Self::FLAG_AES_GCM,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AesGcm { .. } => "aes-256-gcm",
        }
    }

    fn cipher(&self) -> Option<Aes256Gcm> {
        match self {
            Self::None => None,
            Self::AesGcm { key } => Some(Aes256Gcm::new(key.into())),
        }
    }

    /// Wrap `out` in a writer that seals every write call
    pub fn encryptor<W: Write>(&self, out: W) -> SealWriter<W> {
        SealWriter {
            cipher: self.cipher(),
            out,
        }
    }

    /// Wrap `out` in a writer that opens every write call
    pub fn decryptor<W: Write>(&self, out: W) -> OpenWriter<W> {
        OpenWriter {
            cipher: self.cipher(),
            out,
        }
    }

    /// Encrypt a whole payload through exactly one sink write
    pub fn seal(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let extra = match self {
            Self::None => 0,
            Self::AesGcm { .. } => NONCE_LEN + TAG_LEN,
        };
        let mut sink = self.encryptor(Vec::with_capacity(payload.len() + extra));
        let n = sink.write(payload).map_err(|_| JpkgError::EncryptionFailed)?;
        if n != payload.len() {
            return Err(JpkgError::EncryptionFailed);
        }
        sink.finish().map_err(|_| JpkgError::EncryptionFailed)
    }

    /// Decrypt a whole payload through exactly one sink write; `path` is error context
    pub fn open(&self, payload: &[u8], path: &str) -> Result<Vec<u8>> {
        let failed = || JpkgError::DecryptionFailed {
            path: path.to_string(),
        };
        let mut sink = self.decryptor(Vec::with_capacity(payload.len()));
        let n = sink.write(payload).map_err(|_| failed())?;
        if n != payload.len() {
            return Err(failed());
        }
        sink.finish().map_err(|_| failed())
    }
}

/// Writer that seals each write call and forwards the sealed frame
pub struct SealWriter<W: Write> {
    cipher: Option<Aes256Gcm>,
    out: W,
}

impl<W: Write> SealWriter<W> {
    /// Close the sink, returning the destination
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> Write for SealWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(cipher) = &self.cipher else {
            self.out.write_all(buf)?;
            return Ok(buf.len());
        };

        // Fresh nonce for every sealed unit
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, buf)
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "AES-GCM seal failed"))?;

        self.out.write_all(&nonce_bytes)?;
        self.out.write_all(&sealed)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Writer that opens each write call as one sealed frame and forwards the plaintext
pub struct OpenWriter<W: Write> {
    cipher: Option<Aes256Gcm>,
    out: W,
}

impl<W: Write> OpenWriter<W> {
    /// Close the sink, returning the destination
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> Write for OpenWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(cipher) = &self.cipher else {
            self.out.write_all(buf)?;
            return Ok(buf.len());
        };

        if buf.len() < NONCE_LEN + TAG_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "sealed frame shorter than nonce and tag",
            ));
        }
        let (nonce, sealed) = buf.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "AES-GCM tag mismatch"))?;

        self.out.write_all(&plaintext)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Derive a 256-bit key from a passphrase with PBKDF2-HMAC-SHA256 at
/// [`DEFAULT_KDF_ROUNDS`] iterations
pub fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    derive_key_with_rounds(passphrase, salt, DEFAULT_KDF_ROUNDS)
}

/// [`derive_key`] with an explicit iteration count
pub fn derive_key_with_rounds(passphrase: &str, salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, rounds, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        [0x42; 32]
    }

    #[test]
    fn test_null_forwards_unchanged() {
        let enc = Encryption::None;
        assert_eq!(enc.seal(b"plain").unwrap(), b"plain");
        assert_eq!(enc.open(b"plain", "/p").unwrap(), b"plain");
    }

    #[test]
    fn test_seal_framing() {
        let enc = Encryption::aes_gcm(&test_key()).unwrap();
        let sealed = enc.seal(b"secret").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 6 + TAG_LEN);
        assert_eq!(enc.open(&sealed, "/s").unwrap(), b"secret");
    }

    #[test]
    fn test_nonce_is_fresh_per_write() {
        let enc = Encryption::aes_gcm(&test_key()).unwrap();
        let a = enc.seal(b"same").unwrap();
        let b = enc.seal(b"same").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn test_split_writes_change_framing() {
        let enc = Encryption::aes_gcm(&test_key()).unwrap();
        let mut sink = enc.encryptor(Vec::new());
        sink.write_all(b"abc").unwrap();
        sink.write_all(b"def").unwrap();
        let two_frames = sink.finish().unwrap();
        assert_eq!(two_frames.len(), 2 * (NONCE_LEN + TAG_LEN) + 6);

        // Opening both frames as one unit must fail authentication
        assert!(enc.open(&two_frames, "/split").is_err());
    }

    #[test]
    fn test_tamper_detected() {
        let enc = Encryption::aes_gcm(&test_key()).unwrap();
        let mut sealed = enc.seal(b"do not touch").unwrap();
        sealed[NONCE_LEN + 2] ^= 0x01;
        let err = enc.open(&sealed, "/t").unwrap_err();
        assert!(matches!(err, JpkgError::DecryptionFailed { .. }));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = Encryption::aes_gcm(&test_key()).unwrap().seal(b"x").unwrap();
        let other = Encryption::aes_gcm(&[0x99; 32]).unwrap();
        assert!(other.open(&sealed, "/w").is_err());
    }

    #[test]
    fn test_short_frame_rejected() {
        let enc = Encryption::aes_gcm(&test_key()).unwrap();
        assert!(enc.open(&[0u8; NONCE_LEN + TAG_LEN - 1], "/short").is_err());
    }

    #[test]
    fn test_key_length_checked() {
        assert!(matches!(
            Encryption::aes_gcm(&[0u8; 16]),
            Err(JpkgError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn test_from_flag() {
        assert!(matches!(Encryption::from_flag(0, None, 9), Ok(Encryption::None)));
        assert!(matches!(Encryption::from_flag(1, None, 9), Err(JpkgError::MissingKey)));
        assert!(matches!(
            Encryption::from_flag(7, None, 9),
            Err(JpkgError::UnknownFlag { flag: 7, offset: 9, .. })
        ));
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let a = derive_key_with_rounds("hunter2", b"pkg", 10);
        let b = derive_key_with_rounds("hunter2", b"pkg", 10);
        let c = derive_key_with_rounds("hunter2", b"other", 10);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_debug_redacts_key() {
        let enc = Encryption::aes_gcm(&test_key()).unwrap();
        assert!(!format!("{:?}", enc).contains("66"));
    }
}
