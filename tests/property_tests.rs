use std::fs;
use std::sync::atomic::AtomicBool;

use proptest::prelude::*;
use tempfile::TempDir;

use dupescan::scanner::hasher::{format_digest, read_digest};
use dupescan::scanner::priority_for_size;

fn key_for(content: &[u8]) -> String {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("f.bin");
    fs::write(&path, content).unwrap();
    let stop = AtomicBool::new(false);
    let hasher = read_digest(&path, &stop, |_| {}).unwrap().unwrap();
    format_digest(hasher.finalize().as_bytes())
}

proptest! {
    #[test]
    fn test_priority_in_range(size in any::<u64>()) {
        let p = priority_for_size(size);
        prop_assert!((1..=10).contains(&p));
    }

    #[test]
    fn test_priority_never_increases(a in any::<u64>(), b in any::<u64>()) {
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(priority_for_size(small) >= priority_for_size(large));
    }

    #[test]
    fn test_identical_content_identical_key(content in prop::collection::vec(any::<u8>(), 0..10_000)) {
        prop_assert_eq!(key_for(&content), key_for(&content));
    }

    #[test]
    fn test_key_format_shape(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let key = format_digest(&bytes);

        // Stripping dashes yields the uppercase hex of the input
        let hex: String = key.chars().filter(|c| *c != '-').collect();
        prop_assert_eq!(hex.len(), bytes.len() * 2);
        let expected: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        prop_assert_eq!(hex, expected);

        // Dashes sit after every fourth hex character, never at the ends
        for (i, c) in key.chars().enumerate() {
            if i % 5 == 4 {
                prop_assert_eq!(c, '-');
            } else {
                prop_assert!(c.is_ascii_hexdigit() && !c.is_ascii_lowercase());
            }
        }
        prop_assert!(!key.ends_with('-'));
    }

    #[test]
    fn test_hash_determinism_across_reads(content in "\\PC{0,2000}") {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.bin");
        fs::write(&path, content.as_bytes()).unwrap();

        let stop = AtomicBool::new(false);
        let first = read_digest(&path, &stop, |_| {}).unwrap().unwrap().finalize();
        let second = read_digest(&path, &stop, |_| {}).unwrap().unwrap().finalize();
        prop_assert_eq!(first, second);
    }
}
