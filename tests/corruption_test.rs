//! Corruption detection suite
//!
//! Damaged headers, manifests and records must fail the decode with a
//! located error and never panic.

use jpkg_rs::archive::codec::{write_cells, write_record};
use jpkg_rs::archive::{RecordHeader, FLAGS_OFFSET};
use jpkg_rs::{read_package, Encoder, ErrorClass, JpkgError};
use std::fs::{File, OpenOptions};
use std::io::{Cursor, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

/// Helper: Create a valid test package
fn create_test_package() -> NamedTempFile {
    let temp_file = NamedTempFile::new().unwrap();
    let mut encoder = Encoder::new(File::create(temp_file.path()).unwrap()).with_name("corrupt");
    encoder
        .add_bytes("test.txt", b"Hello, World!".to_vec(), &())
        .unwrap();
    encoder
        .add_bytes("data.bin", vec![0xAB; 1024], &())
        .unwrap();
    encoder.encode().unwrap();
    temp_file
}

/// Helper: Corrupt bytes at specific offset
fn corrupt_byte_at(path: &std::path::Path, offset: u64, new_value: u8) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[new_value]).unwrap();
}

/// Helper: Truncate file at specific offset
fn truncate_at(path: &std::path::Path, new_length: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(new_length).unwrap();
}

fn open(path: &std::path::Path) -> jpkg_rs::Result<jpkg_rs::Package<File>> {
    read_package(File::open(path).unwrap(), None)
}

#[test]
fn test_corrupted_magic_number() {
    let temp_file = create_test_package();
    corrupt_byte_at(temp_file.path(), 0, b'J');

    let err = open(temp_file.path()).unwrap_err();
    assert!(matches!(err, JpkgError::InvalidMagic { found } if &found == b"Jpkg"));
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn test_unsupported_version() {
    let temp_file = create_test_package();
    corrupt_byte_at(temp_file.path(), 11, 2);

    let err = open(temp_file.path()).unwrap_err();
    assert!(matches!(err, JpkgError::UnsupportedVersion(2)));
}

#[test]
fn test_unknown_flags_report_offset() {
    for (axis_index, axis) in ["compression", "encryption", "hash", "signature"]
        .into_iter()
        .enumerate()
    {
        let temp_file = create_test_package();
        let offset = FLAGS_OFFSET + axis_index as u64;
        corrupt_byte_at(temp_file.path(), offset, 0x7F);

        match open(temp_file.path()).unwrap_err() {
            JpkgError::UnknownFlag {
                axis: found,
                flag,
                offset: at,
            } => {
                assert_eq!(found, axis);
                assert_eq!(flag, 0x7F);
                assert_eq!(at, offset);
            }
            other => panic!("expected UnknownFlag for {axis}, got {other:?}"),
        }
    }
}

#[test]
fn test_truncated_header() {
    let temp_file = create_test_package();
    truncate_at(temp_file.path(), 10);

    let err = open(temp_file.path()).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn test_truncated_inside_manifest() {
    let temp_file = create_test_package();
    truncate_at(temp_file.path(), 30);

    let err = open(temp_file.path()).unwrap_err();
    assert!(matches!(err, JpkgError::InvalidFormat { offset: 16, .. }));
}

#[test]
fn test_truncated_payload() {
    let temp_file = create_test_package();
    let len = std::fs::metadata(temp_file.path()).unwrap().len();
    truncate_at(temp_file.path(), len - 1);

    let err = open(temp_file.path()).unwrap_err();
    assert!(matches!(err, JpkgError::InvalidFormat { .. }));
}

#[test]
fn test_empty_file() {
    let temp_file = NamedTempFile::new().unwrap();
    assert!(open(temp_file.path()).is_err());
}

#[test]
fn test_padding_contents_ignored() {
    // A manifest whose text is not 16-aligned carries filler; decoders skip it unread
    let mut encoder = Encoder::new(Vec::new()).with_name("abc");
    encoder.add_bytes("/a", b"a".to_vec(), &()).unwrap();
    let mut bytes = encoder.encode().unwrap();

    // header(16) + fixed manifest(32) + "abc"(12) + "{}"(8) = 68 → 12 filler bytes
    assert_eq!(&bytes[68..72], &[0xDE, 0xAD, 0xBE, 0xEF]);
    for b in &mut bytes[68..80] {
        *b = 0;
    }

    let mut package = read_package(Cursor::new(bytes), None).unwrap();
    assert_eq!(package.read_file("/a").unwrap(), b"a");
}

/// Helper: a package whose records are written by hand
fn handmade_package(paths: &[&str]) -> Vec<u8> {
    let mut bytes = Encoder::new(Vec::new()).encode().unwrap();
    // file_count lives right after packaged_at in the manifest
    bytes[24..32].copy_from_slice(&(paths.len() as u64).to_be_bytes());

    for (i, path) in paths.iter().enumerate() {
        let header = RecordHeader {
            identifier_len: 0,
            path_len: path.chars().count() as u64,
            uuid: [i as u8; 16],
            metadata_len: 2,
            compressed_size: 1,
            uncompressed_size: 1,
        };
        write_record(&mut bytes, &header).unwrap();
        write_cells(&mut bytes, path).unwrap();
        write_cells(&mut bytes, "{}").unwrap();
        bytes.push(b'x');
    }
    bytes
}

#[test]
fn test_duplicate_path_fails_decode() {
    let bytes = handmade_package(&["/a/b.txt", "a/./b.txt"]);
    let err = read_package(Cursor::new(bytes), None).unwrap_err();
    assert!(matches!(err, JpkgError::DuplicatePath { ref path, index: 1 } if path == "/a/b.txt"));
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn test_tree_conflict_fails_decode() {
    let bytes = handmade_package(&["/a", "/a/b"]);
    let err = read_package(Cursor::new(bytes), None).unwrap_err();
    assert!(matches!(err, JpkgError::TreeConflict { .. }));
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn test_handmade_package_reads() {
    let bytes = handmade_package(&["/one", "/two"]);
    let mut package = read_package(Cursor::new(bytes), None).unwrap();
    assert_eq!(package.read_file("/two").unwrap(), b"x");
}

#[test]
fn test_inflated_file_count() {
    let temp_file = create_test_package();
    // file_count is the second manifest field (offset 24)
    corrupt_byte_at(temp_file.path(), 24, 0xFF);

    let err = open(temp_file.path()).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Format);
}
