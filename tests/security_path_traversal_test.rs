//! Path canonicalization tests
//!
//! Every path is reduced to one absolute form before it is stored or looked
//! up, so traversal segments and separator tricks cannot escape the root or
//! alias two different files.

use jpkg_rs::{canonicalize, read_package, Encoder, JpkgError};
use proptest::prelude::*;
use std::io::Cursor;

fn package_with(paths: &[&str]) -> jpkg_rs::Package<Cursor<Vec<u8>>> {
    let mut encoder = Encoder::new(Vec::new());
    for path in paths {
        encoder
            .add_bytes(path, path.as_bytes().to_vec(), &())
            .unwrap();
    }
    read_package(Cursor::new(encoder.encode().unwrap()), None).unwrap()
}

#[test]
fn test_path_traversal_dot_dot_clamped_at_root() {
    let package = package_with(&["../../etc/passwd"]);
    assert_eq!(package.records()[0].path, "/etc/passwd");
    assert!(package.contains("/etc/passwd"));
}

#[test]
fn test_equivalent_spellings_resolve_to_one_file() {
    let mut package = package_with(&["a/b.txt"]);
    for spelling in ["a/b.txt", "./a/b.txt", "/a/b.txt", "a\\b.txt", "/a//b.txt", "/a/x/../b.txt"] {
        assert_eq!(package.read_file(spelling).unwrap(), b"a/b.txt", "{spelling}");
    }
}

#[test]
fn test_equivalent_spellings_are_duplicates() {
    let mut encoder = Encoder::new(Vec::new());
    encoder.add_bytes("dir\\file", b"1".to_vec(), &()).unwrap();
    let err = encoder
        .add_bytes("./dir/./file", b"2".to_vec(), &())
        .unwrap_err();
    assert!(matches!(err, JpkgError::DuplicatePath { .. }));
}

#[test]
fn test_root_is_not_a_file() {
    let mut encoder = Encoder::new(Vec::new());
    let err = encoder.add_bytes("/", b"root".to_vec(), &()).unwrap_err();
    assert!(matches!(err, JpkgError::TreeConflict { .. }));

    let err = encoder.add_bytes("a/..", b"root".to_vec(), &()).unwrap_err();
    assert!(matches!(err, JpkgError::TreeConflict { .. }));
}

#[test]
fn test_unicode_paths() {
    let mut package = package_with(&["données/résumé.txt", "日本/ファイル"]);
    assert!(package.contains("/données"));
    assert_eq!(package.read_file("日本/ファイル").unwrap(), "日本/ファイル".as_bytes());
}

proptest! {
    #[test]
    fn canonicalize_is_idempotent(path in "[a-z./\\\\]{0,24}") {
        let once = canonicalize(&path);
        prop_assert_eq!(canonicalize(&once), once.clone());
        prop_assert!(once.starts_with('/'));
        prop_assert!(!once.contains("//"));
        prop_assert!(!once.split('/').any(|s| s == "." || s == ".."));
    }

    #[test]
    fn relative_and_absolute_forms_agree(segments in prop::collection::vec("[a-z0-9_]{1,8}", 1..5)) {
        let relative = segments.join("/");
        prop_assert_eq!(canonicalize(&relative), canonicalize(&format!("/{relative}")));
        prop_assert_eq!(canonicalize(&relative), canonicalize(&format!("./{relative}")));
    }
}
