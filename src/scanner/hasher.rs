//! Streaming BLAKE3 digest with chunked progress and cooperative stop.
//!
//! Files are read in fixed-size chunks so that byte-offset progress can be
//! reported and a stop flag observed between chunks. A stopped read yields
//! no digest at all, never a partial one. Digest finalization and key
//! formatting are left to the caller ([`scheduler`](crate::scanner::scheduler))
//! so each maps onto its own job phase.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read chunk size. Small enough for responsive cancellation and progress,
/// large enough to keep syscall overhead negligible.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Stream the file at `path` into a BLAKE3 hasher.
///
/// `on_progress` is invoked with the running byte offset after each chunk.
/// `stop` is checked between chunks; a raised flag aborts the read and
/// returns `Ok(None)`.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be opened or read;
/// the caller treats this as a contained "no hash" outcome.
pub fn read_digest(
    path: &Path,
    stop: &AtomicBool,
    mut on_progress: impl FnMut(u64),
) -> io::Result<Option<blake3::Hasher>> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;

    loop {
        if stop.load(Ordering::SeqCst) {
            log::debug!("hash read aborted at offset {offset}: {}", path.display());
            return Ok(None);
        }
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(Some(hasher));
        }
        hasher.update(&buf[..n]);
        offset += n as u64;
        on_progress(offset);
    }
}

/// Format a finalized digest as the engine's key string: uppercase hex with
/// a dash between every four characters.
///
/// # Example
///
/// ```
/// use dupescan::scanner::format_digest;
///
/// let digest = blake3::hash(b"hello");
/// let key = format_digest(digest.as_bytes());
/// assert_eq!(key.len(), 64 + 15); // 64 hex chars + 15 dashes
/// assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_lowercase() || c == '-'));
/// ```
#[must_use]
pub fn format_digest(digest: &[u8]) -> String {
    let hex: String = digest.iter().map(|b| format!("{b:02X}")).collect();
    let mut out = String::with_capacity(hex.len() + hex.len() / 4);
    for (i, ch) in hex.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            out.push('-');
        }
        out.push(ch);
    }
    out
}
