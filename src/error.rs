//! Error types for the scan engine.
//!
//! The engine distinguishes two kinds of failure:
//!
//! - **Configuration errors** ([`StartError`]) are raised synchronously from
//!   [`ScanSession::start`](crate::session::ScanSession::start). A scan that
//!   cannot begin (missing root, malformed ignore pattern) fails fast.
//! - **Per-file errors** ([`FileErrorKind`]) are contained: they surface as
//!   [`ScanEvent::FileError`](crate::events::ScanEvent::FileError) events and
//!   counters, and never abort the rest of the tree.

use std::io;
use std::path::PathBuf;

use serde::Serialize;

/// Errors that prevent a scan from starting.
#[derive(thiserror::Error, Debug)]
pub enum StartError {
    /// The scan root does not exist.
    #[error("root path not found: {0}")]
    RootNotFound(PathBuf),

    /// The scan root exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An ignore pattern could not be compiled.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern as configured
        pattern: String,
        /// The underlying regex compilation error
        #[source]
        source: regex::Error,
    },

    /// The root could not be inspected at all.
    #[error("cannot inspect root {path}: {source}")]
    RootInaccessible {
        /// The configured root
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Classification of a contained per-file failure.
///
/// Carried by [`ScanEvent::FileError`](crate::events::ScanEvent::FileError);
/// the affected file simply yields no hash.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileErrorKind {
    /// The file vanished between discovery and processing.
    #[error("file vanished before processing")]
    NotFound,

    /// The file could not be opened for reading.
    #[error("permission denied")]
    PermissionDenied,

    /// Any other I/O failure while reading.
    #[error("I/O error: {0}")]
    Io(String),
}

impl FileErrorKind {
    /// Classify an I/O error into the event-level taxonomy.
    #[must_use]
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_classification() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(FileErrorKind::from_io(&err), FileErrorKind::NotFound);

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(FileErrorKind::from_io(&err), FileErrorKind::PermissionDenied);

        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert!(matches!(FileErrorKind::from_io(&err), FileErrorKind::Io(_)));
    }

    #[test]
    fn test_start_error_display() {
        let err = StartError::RootNotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "root path not found: /missing");

        let err = StartError::NotADirectory(PathBuf::from("/etc/hosts"));
        assert_eq!(err.to_string(), "not a directory: /etc/hosts");
    }
}
