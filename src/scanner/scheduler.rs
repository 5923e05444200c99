//! Bounded worker pool executing hash jobs in priority order.
//!
//! Smaller files hash faster, so they get higher priority: a scan surfaces
//! most of its results early instead of stalling behind a handful of large
//! files. Within a priority band jobs run in submission order.
//!
//! The scheduler owns no duplicate state. Workers report everything they do
//! as [`PipelineMessage`]s on the session's internal channel; a single
//! aggregator thread downstream is the only mutator of scan results, which
//! keeps the observable event order coherent without locking the index.
//!
//! At most one job per path is in flight at a time. [`HashScheduler::submit`]
//! refuses a path that is already queued or running.

use std::collections::{BinaryHeap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Sender;

use crate::config::KeyMode;
use crate::error::FileErrorKind;
use crate::events::{JobId, JobPhase};
use crate::session::PipelineMessage;

use super::{hasher, FileRecord};

const DRAIN_POLL: Duration = Duration::from_millis(25);
/// Consecutive idle polls required before `drain` trusts the pool is done.
const DRAIN_SETTLE_CHECKS: u32 = 3;

/// Map a file size in bytes to a scheduling priority in `1..=10`.
///
/// The bands are decimal: under 1 KB is priority 10, under 10 KB is 9, and
/// so on down to a floor of 1. Priority never increases with size.
#[must_use]
pub fn priority_for_size(size: u64) -> u8 {
    let mut priority = 10u8;
    let mut limit = 1000u64;
    while priority > 1 {
        if size < limit {
            return priority;
        }
        limit = limit.saturating_mul(10);
        priority -= 1;
    }
    1
}

/// A job waiting in the priority queue.
struct QueuedJob {
    priority: u8,
    id: JobId,
    record: FileRecord,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.id == other.id
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority first, then FIFO within a band.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    /// Paths queued or currently running. Drives both the one-in-flight rule
    /// and drain detection.
    pending: HashSet<PathBuf>,
}

struct Inner {
    queue: Mutex<QueueState>,
    available: Condvar,
    stop: AtomicBool,
    shutdown: AtomicBool,
    active: AtomicUsize,
    next_id: AtomicU64,
    tx: Sender<PipelineMessage>,
    key_mode: KeyMode,
}

/// Priority worker pool for hash jobs.
pub struct HashScheduler {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl HashScheduler {
    /// Spawn `workers` hashing threads reporting on `tx`.
    #[must_use]
    pub(crate) fn new(workers: usize, key_mode: KeyMode, tx: Sender<PipelineMessage>) -> Self {
        let inner = Arc::new(Inner {
            queue: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                pending: HashSet::new(),
            }),
            available: Condvar::new(),
            stop: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            tx,
            key_mode,
        });

        let workers = (0..workers.max(1))
            .map(|n| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("hash-worker-{n}"))
                    .spawn(move || worker_loop(&inner))
                    .expect("failed to spawn hash worker")
            })
            .collect();

        Self {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Queue a hash job for `record`.
    ///
    /// Returns the assigned job id, or `None` if the scheduler has been
    /// canceled or a job for the same path is already in flight.
    pub fn submit(&self, record: FileRecord) -> Option<JobId> {
        if self.inner.stop.load(Ordering::SeqCst) || self.inner.shutdown.load(Ordering::SeqCst) {
            return None;
        }
        let priority = priority_for_size(record.size);
        let mut state = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
        if !state.pending.insert(record.path.clone()) {
            log::debug!("job already in flight for {}", record.path.display());
            return None;
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.send(PipelineMessage::JobQueued {
            job: id,
            path: record.path.clone(),
            at: Utc::now(),
        });
        state.heap.push(QueuedJob {
            priority,
            id,
            record,
        });
        drop(state);
        self.inner.available.notify_one();
        Some(id)
    }

    /// Cancel everything: running jobs observe the stop flag at their next
    /// chunk boundary, queued jobs are discarded with a canceled phase
    /// notification. Idempotent.
    pub fn cancel_all(&self) {
        if self.inner.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
        let dropped: Vec<QueuedJob> = state.heap.drain().collect();
        for job in &dropped {
            state.pending.remove(&job.record.path);
        }
        drop(state);
        for job in dropped {
            self.send(PipelineMessage::JobPhase {
                job: job.id,
                path: job.record.path,
                phase: JobPhase::Canceled,
                at: Utc::now(),
            });
        }
        self.inner.available.notify_all();
    }

    /// Block until no job is queued or running.
    ///
    /// Completion is level-triggered, so the check is debounced: the pool
    /// must look idle on several consecutive polls before this returns.
    pub fn drain(&self) {
        let mut idle_polls = 0u32;
        loop {
            let pending_empty = {
                let state = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
                state.pending.is_empty()
            };
            if pending_empty && self.inner.active.load(Ordering::SeqCst) == 0 {
                idle_polls += 1;
                if idle_polls >= DRAIN_SETTLE_CHECKS {
                    return;
                }
            } else {
                idle_polls = 0;
            }
            thread::sleep(DRAIN_POLL);
        }
    }

    /// Stop accepting work and join the worker threads. Idempotent; callable
    /// through a shared handle.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.available.notify_all();
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            workers.drain(..).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                log::error!("hash worker panicked");
            }
        }
    }

    fn send(&self, message: PipelineMessage) {
        // Receiver gone means the session is being torn down.
        let _ = self.inner.tx.send(message);
    }
}

fn worker_loop(inner: &Inner) {
    loop {
        let job = {
            let mut state = inner.queue.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                if let Some(job) = state.heap.pop() {
                    // Claimed under the lock so drain never sees the gap
                    // between "queue empty" and "worker busy".
                    inner.active.fetch_add(1, Ordering::SeqCst);
                    break Some(job);
                }
                if inner.shutdown.load(Ordering::SeqCst) {
                    break None;
                }
                state = inner
                    .available
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
        };
        let Some(job) = job else {
            return;
        };

        run_job(inner, &job);

        let mut state = inner.queue.lock().unwrap_or_else(|e| e.into_inner());
        state.pending.remove(&job.record.path);
        drop(state);
        inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_job(inner: &Inner, job: &QueuedJob) {
    let send = |message: PipelineMessage| {
        let _ = inner.tx.send(message);
    };
    let id = job.id;
    let path = &job.record.path;

    if inner.stop.load(Ordering::SeqCst) {
        send(PipelineMessage::JobPhase {
            job: id,
            path: path.clone(),
            phase: JobPhase::Canceled,
            at: Utc::now(),
        });
        return;
    }

    send(PipelineMessage::JobStarted {
        job: id,
        path: path.clone(),
        at: Utc::now(),
    });

    let key = match inner.key_mode {
        KeyMode::NameOnly => {
            send(PipelineMessage::JobPhase {
                job: id,
                path: path.clone(),
                phase: JobPhase::Formatting,
                at: Utc::now(),
            });
            Some(job.record.file_name().to_lowercase())
        }
        KeyMode::Content => {
            let outcome = hasher::read_digest(path, &inner.stop, |offset| {
                send(PipelineMessage::JobProgress {
                    job: id,
                    path: path.clone(),
                    bytes_read: offset,
                    at: Utc::now(),
                });
            });
            match outcome {
                Ok(Some(hasher)) => {
                    send(PipelineMessage::JobPhase {
                        job: id,
                        path: path.clone(),
                        phase: JobPhase::Computing,
                        at: Utc::now(),
                    });
                    let digest = hasher.finalize();
                    send(PipelineMessage::JobPhase {
                        job: id,
                        path: path.clone(),
                        phase: JobPhase::Formatting,
                        at: Utc::now(),
                    });
                    Some(hasher::format_digest(digest.as_bytes()))
                }
                Ok(None) => {
                    send(PipelineMessage::JobPhase {
                        job: id,
                        path: path.clone(),
                        phase: JobPhase::Canceled,
                        at: Utc::now(),
                    });
                    return;
                }
                Err(err) => {
                    log::warn!("failed to hash {}: {err}", path.display());
                    send(PipelineMessage::JobFailed {
                        path: path.clone(),
                        kind: FileErrorKind::from_io(&err),
                    });
                    None
                }
            }
        }
    };

    send(PipelineMessage::JobDone {
        job: id,
        record: job.record.clone(),
        key,
        at: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};
    use std::path::Path;
    use tempfile::TempDir;

    fn record_for(path: &Path) -> FileRecord {
        FileRecord::capture(path).unwrap()
    }

    fn collect_done(rx: &Receiver<PipelineMessage>) -> Vec<(PathBuf, Option<String>)> {
        rx.try_iter()
            .filter_map(|m| match m {
                PipelineMessage::JobDone { record, key, .. } => Some((record.path, key)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_priority_bands() {
        assert_eq!(priority_for_size(0), 10);
        assert_eq!(priority_for_size(500), 10);
        assert_eq!(priority_for_size(999), 10);
        assert_eq!(priority_for_size(1000), 9);
        assert_eq!(priority_for_size(5_000), 9);
        assert_eq!(priority_for_size(50_000), 8);
        assert_eq!(priority_for_size(500_000), 7);
        assert_eq!(priority_for_size(5_000_000), 6);
        assert_eq!(priority_for_size(u64::MAX), 1);
    }

    #[test]
    fn test_priority_never_increases_with_size() {
        let sizes = [0u64, 1, 999, 1000, 9_999, 10_000, 1 << 20, 1 << 30, 1 << 40];
        for pair in sizes.windows(2) {
            assert!(priority_for_size(pair[0]) >= priority_for_size(pair[1]));
        }
    }

    #[test]
    fn test_queue_orders_by_priority_then_fifo() {
        let small = QueuedJob {
            priority: 10,
            id: 3,
            record: fake_record("small"),
        };
        let big = QueuedJob {
            priority: 4,
            id: 1,
            record: fake_record("big"),
        };
        let small_later = QueuedJob {
            priority: 10,
            id: 7,
            record: fake_record("small2"),
        };
        let mut heap = BinaryHeap::from([big, small_later, small]);
        assert_eq!(heap.pop().unwrap().id, 3);
        assert_eq!(heap.pop().unwrap().id, 7);
        assert_eq!(heap.pop().unwrap().id, 1);
    }

    fn fake_record(name: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(format!("/fake/{name}")),
            size: 0,
            modified: std::time::SystemTime::UNIX_EPOCH,
            meta_changed: std::time::SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_jobs_complete_with_keys() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let (tx, rx) = unbounded();
        let scheduler = HashScheduler::new(2, KeyMode::Content, tx);
        assert!(scheduler.submit(record_for(&a)).is_some());
        assert!(scheduler.submit(record_for(&b)).is_some());
        scheduler.drain();
        scheduler.shutdown();

        let done = collect_done(&rx);
        assert_eq!(done.len(), 2);
        let key_a = done.iter().find(|(p, _)| p == &a).unwrap().1.clone();
        let key_b = done.iter().find(|(p, _)| p == &b).unwrap().1.clone();
        assert!(key_a.is_some());
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_message_order_per_job() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, vec![7u8; 1000]).unwrap();

        let (tx, rx) = unbounded();
        let scheduler = HashScheduler::new(1, KeyMode::Content, tx);
        scheduler.submit(record_for(&path)).unwrap();
        scheduler.drain();
        scheduler.shutdown();

        let kinds: Vec<&str> = rx
            .try_iter()
            .map(|m| match m {
                PipelineMessage::JobQueued { .. } => "queued",
                PipelineMessage::JobStarted { .. } => "started",
                PipelineMessage::JobProgress { .. } => "progress",
                PipelineMessage::JobPhase { .. } => "phase",
                PipelineMessage::JobDone { .. } => "done",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds.first(), Some(&"queued"));
        assert_eq!(kinds.get(1), Some(&"started"));
        assert_eq!(kinds.last(), Some(&"done"));
        assert!(kinds.contains(&"progress"));
    }

    #[test]
    fn test_duplicate_path_refused_while_pending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"x").unwrap();

        let (tx, rx) = unbounded();
        let scheduler = HashScheduler::new(1, KeyMode::Content, tx);
        // Submit twice without yielding; the second lands while the first is
        // still pending at least until a worker picks it up. The scheduler
        // must never run both: either the second submit is refused, or (if
        // the first already completed) it is accepted as a fresh job.
        let first = scheduler.submit(record_for(&path));
        let second = scheduler.submit(record_for(&path));
        assert!(first.is_some());
        scheduler.drain();
        scheduler.shutdown();

        let done = collect_done(&rx);
        if second.is_none() {
            assert_eq!(done.len(), 1);
        } else {
            assert_eq!(done.len(), 2);
        }
    }

    #[test]
    fn test_failed_job_reports_error_and_completes() {
        let (tx, rx) = unbounded();
        let scheduler = HashScheduler::new(1, KeyMode::Content, tx);
        scheduler.submit(fake_record("missing.bin")).unwrap();
        scheduler.drain();
        scheduler.shutdown();

        let messages: Vec<_> = rx.try_iter().collect();
        assert!(messages
            .iter()
            .any(|m| matches!(m, PipelineMessage::JobFailed { .. })));
        assert!(messages
            .iter()
            .any(|m| matches!(m, PipelineMessage::JobDone { key: None, .. })));
    }

    #[test]
    fn test_name_only_mode_never_reads_content() {
        let (tx, rx) = unbounded();
        let scheduler = HashScheduler::new(1, KeyMode::NameOnly, tx);
        // The path does not exist; name-only keys must not care.
        scheduler.submit(fake_record("Report.PDF")).unwrap();
        scheduler.drain();
        scheduler.shutdown();

        let done = collect_done(&rx);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].1.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_cancel_discards_queued_jobs() {
        let dir = TempDir::new().unwrap();
        for n in 0..20 {
            std::fs::write(dir.path().join(format!("f{n}.bin")), vec![1u8; 100]).unwrap();
        }

        let (tx, rx) = unbounded();
        let scheduler = HashScheduler::new(1, KeyMode::Content, tx);
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let record = record_for(&entry.unwrap().path());
            scheduler.submit(record);
        }
        scheduler.cancel_all();
        scheduler.cancel_all(); // idempotent
        scheduler.drain();
        scheduler.shutdown();

        // Canceled after submit: everything either completed before the
        // cancel or was dropped with a canceled phase; nothing is lost.
        let messages: Vec<_> = rx.try_iter().collect();
        let done = messages
            .iter()
            .filter(|m| matches!(m, PipelineMessage::JobDone { .. }))
            .count();
        let canceled = messages
            .iter()
            .filter(|m| {
                matches!(
                    m,
                    PipelineMessage::JobPhase {
                        phase: JobPhase::Canceled,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(done + canceled, 20);
    }

    #[test]
    fn test_submit_after_cancel_is_refused() {
        let (tx, _rx) = unbounded();
        let scheduler = HashScheduler::new(1, KeyMode::Content, tx);
        scheduler.cancel_all();
        assert!(scheduler.submit(fake_record("late.bin")).is_none());
        scheduler.shutdown();
    }
}
