//! dupescan - content-based duplicate file finder.
//!
//! A library and CLI for finding duplicate files by content hash (BLAKE3).
//! A scan walks a directory tree, hashes accepted files on a prioritized
//! worker pool, groups files with identical content, and reports everything
//! it does as a typed event stream. A deletion planner recommends which
//! group members are redundant copies; acting on the plan is the caller's
//! choice.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod events;
pub mod logging;
pub mod scanner;
pub mod session;

pub use config::{FilterConfig, KeyMode, ScanOptions};
pub use duplicates::{DeletionPlan, DuplicateGroup, DuplicateIndex};
pub use error::{FileErrorKind, StartError};
pub use events::{EventReceiver, JobId, JobPhase, ScanEvent};
pub use scanner::FileRecord;
pub use session::{CancelHandle, RunningScan, ScanReport, ScanSession, ScanSummary};
