//! Generate seed corpus for fuzzing

use jpkg_rs::{Compression, Encoder, Encryption};
use std::fs::{self, File};

const KEY: [u8; 32] = [0x42; 32];

fn seed(
    dir: &str,
    name: &str,
    compression: Compression,
    encrypt: bool,
    files: &[(&str, Vec<u8>)],
) -> Result<(), Box<dyn std::error::Error>> {
    let path = format!("{}/{}.jpkg", dir, name);
    let mut encoder = Encoder::new(File::create(&path)?)
        .with_name(name)
        .with_compression(compression);
    if encrypt {
        encoder = encoder.with_encryption(Encryption::aes_gcm(&KEY)?);
    }
    for (file, data) in files {
        encoder.add_bytes(file, data.clone(), &serde_json::json!({ "seed": name }))?;
    }
    encoder.encode()?;
    println!("✓ Generated: {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_package_parse";
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    seed(corpus_dir, "seed_empty", Compression::None, false, &[])?;
    seed(
        corpus_dir,
        "seed_single_small",
        Compression::None,
        false,
        &[("test.txt", b"Hello, World!".to_vec())],
    )?;
    seed(
        corpus_dir,
        "seed_tree",
        Compression::Lz4,
        false,
        &[
            ("file1.txt", b"First file".to_vec()),
            ("dir/file2.txt", b"Second file".to_vec()),
            ("dir/sub/file3.txt", b"Third file".to_vec()),
        ],
    )?;
    seed(
        corpus_dir,
        "seed_lzw",
        Compression::Lzw,
        false,
        &[("large.txt", b"This is test data for compression. ".repeat(200))],
    )?;
    seed(
        corpus_dir,
        "seed_zstd_encrypted",
        Compression::Zstd,
        true,
        &[("binary.bin", (0..=255).collect()), ("empty.txt", Vec::new())],
    )?;

    println!("\nGenerated 5 seed files in {}", corpus_dir);
    Ok(())
}
