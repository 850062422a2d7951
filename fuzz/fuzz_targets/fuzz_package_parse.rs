#![no_main]

use jpkg_rs::read_package;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

const KEY: [u8; 32] = [0x42; 32];

fuzz_target!(|data: &[u8]| {
    // Scanning arbitrary bytes must never panic
    let mut package = match read_package(Cursor::new(data), Some(&KEY)) {
        Ok(p) => p,
        Err(_) => return,
    };

    let paths: Vec<String> = package.records().iter().map(|r| r.path.clone()).collect();

    // Decoding each payload may fail, but must never panic
    for path in &paths {
        let _ = package.read_file(path);
    }

    let _ = package.read_dir("/");
    let _ = package.stat("");
    let _ = package.contains("../../../etc/passwd");
    let _ = package.package_metadata::<serde_json::Value>();
});
