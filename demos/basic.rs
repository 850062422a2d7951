/// Basic example demonstrating package creation and reading
///
/// Run with: cargo run --example basic
/// Set RUST_LOG=jpkg_rs=trace to watch the encoder and scanner.
use anyhow::Result;
use jpkg_rs::{derive_key, read_package, Compression, Encoder, Encryption, Handle};
use std::fs::File;

const PACKAGE: &str = "example_basic.jpkg";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== jpkg-rs Basic Example ===\n");

    let key = derive_key("example passphrase", b"example-salt");

    println!("1. Creating package...");
    create_package(&key)?;

    println!("\n2. Reading from package...");
    read_back(&key)?;

    std::fs::remove_file(PACKAGE)?;
    println!("\n✓ Example complete!");
    Ok(())
}

fn create_package(key: &[u8]) -> Result<()> {
    let mut encoder = Encoder::new(File::create(PACKAGE)?)
        .with_name("basic-example")
        .with_compression(Compression::Zstd)
        .with_encryption(Encryption::aes_gcm(key)?)
        .with_metadata(&serde_json::json!({ "version": "1.0.0" }))?;

    encoder.add_bytes(
        "readme.txt",
        b"This is a readme file for the basic example.".to_vec(),
        &(),
    )?;
    encoder.add_bytes(
        "data/config.json",
        br#"{"name": "Basic Example"}"#.to_vec(),
        &serde_json::json!({ "mime": "application/json" }),
    )?;
    encoder.add_bytes("data/zeros.bin", vec![0u8; 1000], &())?;

    encoder.encode()?;
    println!("   ✓ Package created: {}", PACKAGE);
    Ok(())
}

fn read_back(key: &[u8]) -> Result<()> {
    let mut package = read_package(File::open(PACKAGE)?, Some(key))?;
    println!("   Package: {} ({} files)", package.name(), package.file_count());

    println!("   Tree:");
    walk(&mut package, "/", 1)?;

    println!("\n   Reading readme.txt:");
    let readme = package.read_file("readme.txt")?;
    println!("     {}", String::from_utf8_lossy(&readme));

    let info = package.stat("data/zeros.bin")?;
    println!("\n   data/zeros.bin is {} bytes", info.size.unwrap_or(0));
    Ok(())
}

fn walk(package: &mut jpkg_rs::Package<File>, path: &str, depth: usize) -> Result<()> {
    let children = match package.open(path)? {
        Handle::Directory(mut dir) => dir.read_dir_all(),
        Handle::File(_) => return Ok(()),
    };
    for child in children {
        let indent = "  ".repeat(depth + 2);
        if child.is_dir() {
            println!("{}{}/", indent, child.name);
            walk(package, &child.path, depth + 1)?;
        } else {
            println!("{}{} ({} bytes)", indent, child.name, child.size.unwrap_or(0));
        }
    }
    Ok(())
}
