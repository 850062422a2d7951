/// Query example: identifier patterns, UUIDs and metadata predicates
///
/// Run with: cargo run --example query
use anyhow::Result;
use jpkg_rs::{read_package, Compression, Encoder, FileToEncode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Sprite {
    width: u32,
    height: u32,
    animated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Release {
    channel: String,
    build: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== jpkg-rs Query Example ===\n");

    let hero_id = Uuid::new_v4();
    let sprites = [
        ("sprites/hero.png", "sprite.hero", 64, 64, true),
        ("sprites/hero_idle.png", "sprite.hero.idle", 64, 64, false),
        ("sprites/tree.png", "sprite.tree", 32, 96, false),
        ("tiles/grass.png", "tile.grass", 16, 16, false),
    ];

    let mut encoder = Encoder::new(Vec::new())
        .with_name("sprites")
        .with_compression(Compression::Lzw)
        .with_metadata(&Release {
            channel: "nightly".into(),
            build: 1042,
        })?;

    for (path, identifier, width, height, animated) in sprites {
        let source = Cursor::new(format!("<{identifier}>").into_bytes());
        let mut entry = FileToEncode::new(path, source)
            .with_identifier(identifier)
            .with_metadata(&Sprite {
                width,
                height,
                animated,
            })?;
        if identifier == "sprite.hero" {
            entry = entry.with_uuid(hero_id);
        }
        encoder.add_entry(entry)?;
    }
    let bytes = encoder.encode()?;

    let mut package = read_package(Cursor::new(bytes), None)?;
    let release: Release = package.package_metadata()?;
    println!("Package {} / {} build {}", package.name(), release.channel, release.build);

    println!("\n1. Identifiers matching ^sprite\\.hero");
    for handle in package.get_by_identifier(&Regex::new(r"^sprite\.hero")?)? {
        println!("   - {} ({})", handle.path(), handle.identifier());
    }

    println!("\n2. Lookup by UUID {}", hero_id);
    let mut hero = package.get_by_uuid(&hero_id)?;
    let mut contents = String::new();
    hero.read_to_string(&mut contents)?;
    println!("   {} -> {}", hero.path(), contents);

    println!("\n3. Sprites taller than wide");
    for handle in package.get_by_metadata_query(|s: &Sprite| s.height > s.width)? {
        let sprite: Sprite = handle.metadata()?;
        println!("   - {} {}x{}", handle.path(), sprite.width, sprite.height);
    }

    println!("\n✓ Example complete!");
    Ok(())
}
