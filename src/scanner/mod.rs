//! Scanner module: discovery, filtering, hashing, and scheduling.
//!
//! The pipeline stages live in submodules:
//! - [`filter`]: compiled skip predicates for directories and files
//! - [`walker`]: depth-first enumeration with cooperative cancellation
//! - [`hasher`]: streaming BLAKE3 digest with chunked progress reporting
//! - [`scheduler`]: bounded priority worker pool running hash jobs

pub mod filter;
pub mod hasher;
pub mod scheduler;
pub mod walker;

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

pub use filter::PathFilter;
pub use hasher::format_digest;
pub use scheduler::{priority_for_size, HashScheduler};
pub use walker::Walker;

/// Immutable metadata snapshot of a discovered file.
///
/// Taken once at discovery time. Because the engine does not lock the files
/// it reads, a record can go stale if the file changes mid-scan; callers that
/// act on records (e.g. a deletion caller) should check [`FileRecord::is_stale`]
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Last metadata-change time (ctime on Unix; modification time elsewhere)
    pub meta_changed: SystemTime,
}

impl FileRecord {
    /// Build a record from a path and its already-fetched metadata.
    #[must_use]
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Self {
            path,
            size: metadata.len(),
            modified,
            meta_changed: meta_change_time(metadata).unwrap_or(modified),
        }
    }

    /// Take a fresh snapshot of `path`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying metadata error (file vanished, permission).
    pub fn capture(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::from_metadata(path.to_path_buf(), &metadata))
    }

    /// Whether the file on disk no longer matches this snapshot.
    ///
    /// A vanished file counts as stale.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        match std::fs::metadata(&self.path) {
            Ok(meta) => {
                meta.len() != self.size
                    || meta.modified().unwrap_or(SystemTime::UNIX_EPOCH) != self.modified
            }
            Err(_) => true,
        }
    }

    /// The file name as UTF-8, lossily converted.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Metadata-change time where the platform exposes one.
#[cfg(unix)]
fn meta_change_time(metadata: &Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    let secs = metadata.ctime();
    let nanos = metadata.ctime_nsec() as u32;
    if secs >= 0 {
        SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs as u64, nanos))
    } else {
        SystemTime::UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))
    }
}

#[cfg(not(unix))]
fn meta_change_time(_metadata: &Metadata) -> Option<SystemTime> {
    None
}
