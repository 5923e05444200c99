//! Typed event stream between the scan engine and its consumers.
//!
//! The engine never calls back into a UI. Every observable state change is
//! published as a [`ScanEvent`] on a crossbeam channel; the CLI, a GUI, or a
//! test harness subscribes through an [`EventReceiver`]. Sends never fail: if
//! the receiver is dropped, events are silently discarded and the scan keeps
//! running without reporting.
//!
//! Ordering guarantees (all events funnel through the session's single
//! aggregator thread):
//!
//! - file-found and dir-finished events preserve the walker's depth-first
//!   visitation order;
//! - hash-finished events have no ordering relative to each other; key off
//!   the job id or path, not arrival order;
//! - duplicate-found events for one key are ordered (second occurrence after
//!   first), unordered across keys;
//! - [`ScanEvent::ScanFinished`] is always the final event.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use crate::error::FileErrorKind;
use crate::session::ScanSummary;

/// Stable identifier of a hash job, assigned at submission.
pub type JobId = u64;

/// Lifecycle phase of a hash job.
///
/// Phases form a strict lifecycle: `Queued → Reading → Computing →
/// Formatting → Finished`, with `Canceled` reachable from any non-terminal
/// phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobPhase {
    /// Accepted and waiting in the priority queue.
    Queued,
    /// Streaming file bytes through the digest.
    Reading,
    /// Finalizing the digest.
    Computing,
    /// Building the formatted key string.
    Formatting,
    /// Done; a key (or none, for unreadable files) has been reported.
    Finished,
    /// Stopped cooperatively before finishing. No key is ever reported.
    Canceled,
}

/// Everything a scan reports while it runs.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Counting pre-pass progress: files seen so far.
    CountProgress {
        /// Accepted files counted so far
        files_seen: u64,
    },
    /// Counting pre-pass finished; `total_files` sizes the progress range.
    CountFinished {
        /// Total accepted files under the root
        total_files: u64,
    },
    /// An accepted (non-filtered) file was discovered.
    FileFound {
        /// Absolute path of the file
        path: PathBuf,
        /// Running total of files found
        files_found: u64,
    },
    /// A directory and all of its children have been fully processed.
    DirFinished {
        /// The finished directory
        path: PathBuf,
    },
    /// The walker finished (or unwound after cancellation).
    WalkFinished {
        /// Total files found by the walk
        files_found: u64,
    },
    /// A hash job left the queue and began reading.
    HashStarted {
        /// Job identifier
        job: JobId,
        /// File being hashed
        path: PathBuf,
        /// Transition timestamp
        at: DateTime<Utc>,
    },
    /// Byte-offset update during the Reading phase.
    HashProgress {
        /// Job identifier
        job: JobId,
        /// File being hashed
        path: PathBuf,
        /// Bytes streamed so far
        bytes_read: u64,
        /// Update timestamp
        at: DateTime<Utc>,
    },
    /// A job moved to a new lifecycle phase.
    PhaseChanged {
        /// Job identifier
        job: JobId,
        /// File being hashed
        path: PathBuf,
        /// The phase entered
        phase: JobPhase,
        /// Transition timestamp
        at: DateTime<Utc>,
    },
    /// A job completed. `key` is `None` for unreadable files ("no hash").
    HashFinished {
        /// Job identifier
        job: JobId,
        /// File that was hashed
        path: PathBuf,
        /// Formatted content key, if one was computed
        key: Option<String>,
        /// Completion timestamp
        at: DateTime<Utc>,
    },
    /// A contained per-file failure.
    FileError {
        /// Affected file
        path: PathBuf,
        /// Failure classification
        kind: FileErrorKind,
    },
    /// A file joined a group that now has two or more members.
    DuplicateFound {
        /// Grouping key shared by the members
        key: String,
        /// Member count after this addition
        member_count: usize,
        /// Extra bytes held by this group (size × (members − 1))
        group_extra_bytes: u64,
        /// Extra bytes across all groups in the session
        total_extra_bytes: u64,
    },
    /// The scan is complete: walker finished and the worker pool drained.
    /// Always the last event.
    ScanFinished {
        /// Final counters for the session
        summary: ScanSummary,
    },
}

/// Cloneable sending half of the event stream.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<ScanEvent>,
}

impl EventSender {
    /// Publish an event. A dropped receiver is not an error; the event is
    /// discarded so an engine without subscribers keeps working.
    pub fn send(&self, event: ScanEvent) {
        let _ = self.inner.send(event);
    }
}

/// Receiving half of the event stream, held by the consumer.
pub struct EventReceiver {
    inner: Receiver<ScanEvent>,
}

impl EventReceiver {
    /// Block until the next event, or `None` once the scan has shut down.
    pub fn recv(&self) -> Option<ScanEvent> {
        self.inner.recv().ok()
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<ScanEvent> {
        self.inner.try_recv().ok()
    }

    /// Iterate over events until all senders are gone.
    pub fn iter(&self) -> impl Iterator<Item = ScanEvent> + '_ {
        self.inner.iter()
    }
}

/// Create a connected event channel pair.
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = unbounded();
    (EventSender { inner: tx }, EventReceiver { inner: rx })
}
