//! Scan session orchestration.
//!
//! [`ScanSession::start`] validates the configuration, then wires up three
//! kinds of threads:
//!
//! - a **control** thread that runs the counting pre-pass (if enabled), walks
//!   the tree submitting hash jobs, drains the worker pool, and finally
//!   signals completion;
//! - the scheduler's **worker** threads, which hash files;
//! - a single **aggregator** thread, the only mutator of the duplicate index
//!   and counters. Everything the walker and workers do arrives here as a
//!   [`PipelineMessage`]; the aggregator translates each into public
//!   [`ScanEvent`]s, so consumers observe one coherent order.
//!
//! The caller gets a [`RunningScan`]: an event stream to watch, a cancel
//! handle safe to trigger from a signal handler, and a blocking
//! [`RunningScan::join`] that returns the final [`ScanReport`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use crate::config::ScanOptions;
use crate::duplicates::{DeletionPlan, DuplicateGroup, DuplicateIndex, GroupUpdate};
use crate::error::{FileErrorKind, StartError};
use crate::events::{self, EventReceiver, EventSender, JobId, JobPhase, ScanEvent};
use crate::scanner::{FileRecord, HashScheduler, Walker};

/// Worker count used when hardware parallelism cannot be determined.
const FALLBACK_WORKERS: usize = 4;

/// Internal pipeline traffic from the control and worker threads to the
/// aggregator. Never crosses the crate boundary.
pub(crate) enum PipelineMessage {
    CountProgress(u64),
    CountDone(u64),
    Found(FileRecord),
    DirDone(PathBuf),
    WalkDone(u64),
    JobQueued {
        job: JobId,
        path: PathBuf,
        at: DateTime<Utc>,
    },
    JobStarted {
        job: JobId,
        path: PathBuf,
        at: DateTime<Utc>,
    },
    JobProgress {
        job: JobId,
        path: PathBuf,
        bytes_read: u64,
        at: DateTime<Utc>,
    },
    JobPhase {
        job: JobId,
        path: PathBuf,
        phase: JobPhase,
        at: DateTime<Utc>,
    },
    JobFailed {
        path: PathBuf,
        kind: FileErrorKind,
    },
    JobDone {
        job: JobId,
        record: FileRecord,
        key: Option<String>,
        at: DateTime<Utc>,
    },
    /// Walker finished and the pool is drained; nothing else will arrive.
    Drained,
}

/// Final counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Files accepted by the walk
    pub files_found: u64,
    /// Jobs that completed with a key
    pub files_hashed: u64,
    /// Contained per-file failures
    pub failed_files: u64,
    /// Redundant copies (members beyond the first per duplicate group)
    pub duplicate_files: u64,
    /// Groups with two or more members
    pub duplicate_groups: u64,
    /// Bytes held by redundant copies across all groups
    pub extra_bytes: u64,
    /// Whether the scan was canceled before completing
    pub interrupted: bool,
    /// Wall-clock duration of the session
    pub duration_ms: u64,
}

/// Entry point for running scans.
pub struct ScanSession;

impl ScanSession {
    /// Validate `options` and start a scan.
    ///
    /// # Errors
    ///
    /// Fails fast with a [`StartError`] when the root is missing, not a
    /// directory, or uninspectable, or when an ignore pattern does not
    /// compile. Once this returns `Ok`, all further failures are contained
    /// per-file events.
    pub fn start(options: ScanOptions) -> Result<RunningScan, StartError> {
        let root_meta = match std::fs::metadata(&options.root) {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StartError::RootNotFound(options.root));
            }
            Err(source) => {
                return Err(StartError::RootInaccessible {
                    path: options.root,
                    source,
                });
            }
        };
        if !root_meta.is_dir() {
            return Err(StartError::NotADirectory(options.root));
        }
        let filter = options.filter.compile()?;

        let workers = options.workers.unwrap_or_else(|| {
            thread::available_parallelism().map_or(FALLBACK_WORKERS, std::num::NonZeroUsize::get)
        });
        log::info!(
            "starting scan of {} with {workers} workers",
            options.root.display()
        );

        let (event_tx, event_rx) = events::channel();
        let (pipe_tx, pipe_rx) = unbounded::<PipelineMessage>();
        let cancel = Arc::new(AtomicBool::new(false));
        let scheduler = Arc::new(HashScheduler::new(
            workers,
            options.key_mode,
            pipe_tx.clone(),
        ));

        let control = spawn_control(
            options.root.clone(),
            filter,
            options.count_first,
            Arc::clone(&cancel),
            Arc::clone(&scheduler),
            pipe_tx,
        );
        let aggregator = spawn_aggregator(pipe_rx, event_tx, Arc::clone(&cancel));

        Ok(RunningScan {
            receiver: event_rx,
            cancel,
            scheduler,
            control,
            aggregator,
        })
    }
}

/// A scan in flight.
pub struct RunningScan {
    receiver: EventReceiver,
    cancel: Arc<AtomicBool>,
    scheduler: Arc<HashScheduler>,
    control: JoinHandle<()>,
    aggregator: JoinHandle<(ScanSummary, DuplicateIndex)>,
}

impl RunningScan {
    /// The event stream for this scan.
    #[must_use]
    pub fn events(&self) -> &EventReceiver {
        &self.receiver
    }

    /// Request cancellation: the walker stops at its next entry, running hash
    /// jobs stop at their next chunk, queued jobs are discarded. Idempotent.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// A cheap cloneable handle for canceling from elsewhere (e.g. a signal
    /// handler).
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancel: Arc::clone(&self.cancel),
            scheduler: Arc::clone(&self.scheduler),
        }
    }

    /// Block until the scan completes (or finishes unwinding after a cancel)
    /// and return the final report.
    #[must_use]
    pub fn join(self) -> ScanReport {
        if self.control.join().is_err() {
            log::error!("scan control thread panicked");
        }
        let (summary, index) = match self.aggregator.join() {
            Ok(result) => result,
            Err(_) => {
                log::error!("scan aggregator thread panicked");
                (
                    ScanSummary {
                        interrupted: true,
                        ..ScanSummary::default()
                    },
                    DuplicateIndex::new(),
                )
            }
        };
        ScanReport { summary, index }
    }
}

/// Cancellation trigger detached from the [`RunningScan`]'s lifetime.
#[derive(Clone)]
pub struct CancelHandle {
    cancel: Arc<AtomicBool>,
    scheduler: Arc<HashScheduler>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent and safe from any thread.
    pub fn cancel(&self) {
        if !self.cancel.swap(true, Ordering::SeqCst) {
            log::info!("scan cancellation requested");
        }
        self.scheduler.cancel_all();
    }
}

/// Everything a finished scan produced.
pub struct ScanReport {
    /// Final counters
    pub summary: ScanSummary,
    index: DuplicateIndex,
}

impl ScanReport {
    /// All groups, placeholders included.
    pub fn groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.index.groups()
    }

    /// Groups with two or more members, sorted by key for stable output.
    #[must_use]
    pub fn duplicate_groups(&self) -> Vec<&DuplicateGroup> {
        let mut groups: Vec<_> = self.index.duplicate_groups().collect();
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        groups
    }

    /// Deletion plan for the group holding `key`, if any.
    #[must_use]
    pub fn deletion_plan(&self, key: &str) -> Option<DeletionPlan> {
        self.index.group(key).map(DeletionPlan::plan)
    }

    /// Deletion plans for every duplicate group, sorted by key.
    #[must_use]
    pub fn deletion_plans(&self) -> Vec<DeletionPlan> {
        self.duplicate_groups()
            .into_iter()
            .map(DeletionPlan::plan)
            .collect()
    }
}

fn spawn_control(
    root: PathBuf,
    filter: crate::scanner::PathFilter,
    count_first: bool,
    cancel: Arc<AtomicBool>,
    scheduler: Arc<HashScheduler>,
    tx: Sender<PipelineMessage>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("scan-control".into())
        .spawn(move || {
            let walker = Walker::new(&root, filter, Arc::clone(&cancel));

            if count_first && !cancel.load(Ordering::SeqCst) {
                let total = walker.count(|seen| {
                    let _ = tx.send(PipelineMessage::CountProgress(seen));
                });
                let _ = tx.send(PipelineMessage::CountDone(total));
            }

            let found = walker.walk(
                |record| {
                    let _ = tx.send(PipelineMessage::Found(record.clone()));
                    scheduler.submit(record);
                },
                |dir| {
                    let _ = tx.send(PipelineMessage::DirDone(dir.to_path_buf()));
                },
            );
            let _ = tx.send(PipelineMessage::WalkDone(found));

            scheduler.drain();
            scheduler.shutdown();
            let _ = tx.send(PipelineMessage::Drained);
        })
        .expect("failed to spawn scan control thread")
}

fn spawn_aggregator(
    rx: Receiver<PipelineMessage>,
    events: EventSender,
    cancel: Arc<AtomicBool>,
) -> JoinHandle<(ScanSummary, DuplicateIndex)> {
    thread::Builder::new()
        .name("scan-aggregate".into())
        .spawn(move || aggregate(&rx, &events, &cancel))
        .expect("failed to spawn scan aggregator thread")
}

/// The single mutator of scan state. Runs until the control thread signals
/// `Drained`, then emits the terminal event and returns the results.
fn aggregate(
    rx: &Receiver<PipelineMessage>,
    events: &EventSender,
    cancel: &AtomicBool,
) -> (ScanSummary, DuplicateIndex) {
    let started = Instant::now();
    let mut index = DuplicateIndex::new();
    let mut files_found = 0u64;
    let mut files_hashed = 0u64;
    let mut failed_files = 0u64;

    for message in rx.iter() {
        match message {
            PipelineMessage::CountProgress(files_seen) => {
                events.send(ScanEvent::CountProgress { files_seen });
            }
            PipelineMessage::CountDone(total_files) => {
                events.send(ScanEvent::CountFinished { total_files });
            }
            PipelineMessage::Found(record) => {
                files_found += 1;
                events.send(ScanEvent::FileFound {
                    path: record.path,
                    files_found,
                });
            }
            PipelineMessage::DirDone(path) => {
                events.send(ScanEvent::DirFinished { path });
            }
            PipelineMessage::WalkDone(found) => {
                events.send(ScanEvent::WalkFinished { files_found: found });
            }
            PipelineMessage::JobQueued { job, path, at } => {
                events.send(ScanEvent::PhaseChanged {
                    job,
                    path,
                    phase: JobPhase::Queued,
                    at,
                });
            }
            PipelineMessage::JobStarted { job, path, at } => {
                events.send(ScanEvent::HashStarted {
                    job,
                    path: path.clone(),
                    at,
                });
                events.send(ScanEvent::PhaseChanged {
                    job,
                    path,
                    phase: JobPhase::Reading,
                    at,
                });
            }
            PipelineMessage::JobProgress {
                job,
                path,
                bytes_read,
                at,
            } => {
                events.send(ScanEvent::HashProgress {
                    job,
                    path,
                    bytes_read,
                    at,
                });
            }
            PipelineMessage::JobPhase {
                job,
                path,
                phase,
                at,
            } => {
                events.send(ScanEvent::PhaseChanged {
                    job,
                    path,
                    phase,
                    at,
                });
            }
            PipelineMessage::JobFailed { path, kind } => {
                failed_files += 1;
                events.send(ScanEvent::FileError { path, kind });
            }
            PipelineMessage::JobDone {
                job,
                record,
                key,
                at,
            } => {
                events.send(ScanEvent::PhaseChanged {
                    job,
                    path: record.path.clone(),
                    phase: JobPhase::Finished,
                    at,
                });
                events.send(ScanEvent::HashFinished {
                    job,
                    path: record.path.clone(),
                    key: key.clone(),
                    at,
                });
                if let Some(key) = key {
                    files_hashed += 1;
                    if let GroupUpdate::Duplicate {
                        member_count,
                        group_extra_bytes,
                    } = index.record(record, key.clone())
                    {
                        events.send(ScanEvent::DuplicateFound {
                            key,
                            member_count,
                            group_extra_bytes,
                            total_extra_bytes: index.total_extra_bytes(),
                        });
                    }
                }
            }
            PipelineMessage::Drained => break,
        }
    }

    let summary = ScanSummary {
        files_found,
        files_hashed,
        failed_files,
        duplicate_files: index.duplicate_file_count() as u64,
        duplicate_groups: index.duplicate_group_count() as u64,
        extra_bytes: index.total_extra_bytes(),
        interrupted: cancel.load(Ordering::SeqCst),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    log::info!(
        "scan finished: {} files, {} duplicate groups, {} extra bytes{}",
        summary.files_found,
        summary.duplicate_groups,
        summary.extra_bytes,
        if summary.interrupted {
            " (interrupted)"
        } else {
            ""
        }
    );
    events.send(ScanEvent::ScanFinished {
        summary: summary.clone(),
    });
    (summary, index)
}
