//! Encryption security tests
//!
//! AES-256-GCM sealing, key handling and tamper detection.

use jpkg_rs::plugins::{DEFAULT_KDF_ROUNDS, NONCE_LEN, TAG_LEN};
use jpkg_rs::{
    derive_key, derive_key_with_rounds, read_package, Compression, Encoder, Encryption, ErrorClass,
    JpkgError,
};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

/// Helper: Generate test key
fn test_key() -> [u8; 32] {
    [0x42; 32]
}

/// Helper: Generate different key
fn different_key() -> [u8; 32] {
    [0x99; 32]
}

/// Helper: Create an encrypted package on disk
fn create_encrypted_package(compression: Compression) -> NamedTempFile {
    let temp_file = NamedTempFile::new().unwrap();
    let mut encoder = Encoder::new(File::create(temp_file.path()).unwrap())
        .with_compression(compression)
        .with_encryption(Encryption::aes_gcm(&test_key()).unwrap());
    encoder
        .add_bytes("secret.txt", b"Secret data".to_vec(), &())
        .unwrap();
    encoder
        .add_bytes("data.bin", vec![0xAB; 1024], &())
        .unwrap();
    encoder.encode().unwrap();
    temp_file
}

fn flip_byte_at(path: &std::path::Path, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.read_exact(&mut byte).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[byte[0] ^ 0x01]).unwrap();
}

#[test]
fn test_encrypted_roundtrip() {
    for compression in [Compression::None, Compression::Lzw, Compression::Zstd] {
        let temp_file = create_encrypted_package(compression);
        let mut package =
            read_package(File::open(temp_file.path()).unwrap(), Some(&test_key())).unwrap();

        assert_eq!(package.header().encryption_flag, 1);
        assert_eq!(package.read_file("secret.txt").unwrap(), b"Secret data");
        assert_eq!(package.read_file("data.bin").unwrap(), vec![0xAB; 1024]);
    }
}

#[test]
fn test_plaintext_not_visible_on_disk() {
    let temp_file = create_encrypted_package(Compression::None);
    let raw = std::fs::read(temp_file.path()).unwrap();
    assert!(!raw.windows(11).any(|w| w == b"Secret data"));
}

#[test]
fn test_sealed_payload_framing() {
    let temp_file = create_encrypted_package(Compression::None);
    let package = read_package(File::open(temp_file.path()).unwrap(), Some(&test_key())).unwrap();

    let record = &package.records()[0];
    assert_eq!(
        record.compressed_size,
        record.uncompressed_size + (NONCE_LEN + TAG_LEN) as u64
    );
}

#[test]
fn test_missing_key_rejected() {
    let temp_file = create_encrypted_package(Compression::None);
    let err = read_package(File::open(temp_file.path()).unwrap(), None).unwrap_err();
    assert!(matches!(err, JpkgError::MissingKey));
    assert_eq!(err.class(), ErrorClass::Codec);
}

#[test]
fn test_wrong_key_fails_open() {
    let temp_file = create_encrypted_package(Compression::None);
    // The index is plaintext, so scanning succeeds; only payloads are sealed
    let mut package =
        read_package(File::open(temp_file.path()).unwrap(), Some(&different_key())).unwrap();
    let err = package.read_file("secret.txt").unwrap_err();
    assert!(matches!(err, JpkgError::DecryptionFailed { ref path } if path == "/secret.txt"));
}

#[test]
fn test_invalid_key_length() {
    let temp_file = create_encrypted_package(Compression::None);
    let err = read_package(File::open(temp_file.path()).unwrap(), Some(&[1u8; 16])).unwrap_err();
    assert!(matches!(err, JpkgError::InvalidKeyLength(16)));
}

#[test]
fn test_tampered_payload_detected() {
    let temp_file = create_encrypted_package(Compression::Zstd);
    let offset = {
        let package =
            read_package(File::open(temp_file.path()).unwrap(), Some(&test_key())).unwrap();
        let record = &package.records()[0];
        record.payload_offset + record.compressed_size / 2
    };
    flip_byte_at(temp_file.path(), offset);

    let mut package =
        read_package(File::open(temp_file.path()).unwrap(), Some(&test_key())).unwrap();
    let err = package.read_file("secret.txt").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Codec);

    // The neighbouring record is untouched
    assert_eq!(package.read_file("data.bin").unwrap(), vec![0xAB; 1024]);
}

#[test]
fn test_tamper_surfaces_through_read() {
    let temp_file = create_encrypted_package(Compression::None);
    let offset = {
        let package =
            read_package(File::open(temp_file.path()).unwrap(), Some(&test_key())).unwrap();
        package.records()[1].payload_offset
    };
    flip_byte_at(temp_file.path(), offset);

    let mut package =
        read_package(File::open(temp_file.path()).unwrap(), Some(&test_key())).unwrap();
    let mut file = package.open("data.bin").unwrap().into_file().unwrap();
    let mut buf = Vec::new();
    let err = file.read_to_end(&mut buf).unwrap_err();
    assert!(buf.is_empty());

    let inner = err.into_inner().unwrap().downcast::<JpkgError>().unwrap();
    assert_eq!(inner.class(), ErrorClass::Codec);
}

#[test]
fn test_derived_key_roundtrip() {
    let key = derive_key("correct horse battery staple", b"jpkg-salt");

    let mut encoder = Encoder::new(Vec::new()).with_encryption(Encryption::aes_gcm(&key).unwrap());
    encoder.add_bytes("/k", b"derived".to_vec(), &()).unwrap();
    let bytes = encoder.encode().unwrap();

    let again = derive_key_with_rounds("correct horse battery staple", b"jpkg-salt", DEFAULT_KDF_ROUNDS);
    assert_eq!(again, key);
    let mut package = read_package(std::io::Cursor::new(bytes), Some(&again)).unwrap();
    assert_eq!(package.read_file("/k").unwrap(), b"derived");
}
