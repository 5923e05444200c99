//! Depth-first directory enumeration with cooperative cancellation.
//!
//! The walker recurses explicitly rather than through an iterator crate
//! because its contract is stated in terms the iterator walkers cannot
//! express: every directory is reported finished only after all of its
//! children (including nested subdirectories) have been processed, and the
//! cancellation flag is polled between directory-entry iterations: a
//! canceled walk stops producing file-found callbacks but still reports
//! dir-finished for the frames it unwinds through.
//!
//! A non-existent or unreadable root is an empty scan, not an error: the
//! walk returns zero results. Entries that vanish mid-walk are skipped
//! silently. Symlinks are never followed.
//!
//! The walker performs no hashing; it only discovers [`FileRecord`]s and
//! hands them to the caller.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{FileRecord, PathFilter};

/// Recursive directory walker.
pub struct Walker {
    root: PathBuf,
    filter: PathFilter,
    cancel: Arc<AtomicBool>,
}

impl Walker {
    /// Create a walker over `root` using the given compiled filter.
    #[must_use]
    pub fn new(root: &Path, filter: PathFilter, cancel: Arc<AtomicBool>) -> Self {
        Self {
            root: root.to_path_buf(),
            filter,
            cancel,
        }
    }

    fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Walk the tree depth-first.
    ///
    /// `on_file` receives each accepted file's record; `on_dir_finished`
    /// receives each visited directory after all of its children, in
    /// post-order. Returns the number of accepted files.
    pub fn walk(
        &self,
        mut on_file: impl FnMut(FileRecord),
        mut on_dir_finished: impl FnMut(&Path),
    ) -> u64 {
        let mut found = 0u64;
        self.process_dir(&self.root, &mut found, &mut on_file, &mut on_dir_finished);
        found
    }

    /// Counting pre-pass: same traversal and filtering as [`Walker::walk`],
    /// but no records are materialized. `on_progress` receives the running
    /// total after each directory, so callers can animate a count while it
    /// runs. Returns the total number of files a subsequent walk would find.
    pub fn count(&self, mut on_progress: impl FnMut(u64)) -> u64 {
        let mut seen = 0u64;
        self.count_dir(&self.root, &mut seen, &mut on_progress);
        seen
    }

    fn process_dir(
        &self,
        dir: &Path,
        found: &mut u64,
        on_file: &mut impl FnMut(FileRecord),
        on_dir_finished: &mut impl FnMut(&Path),
    ) {
        for entry in read_dir_sorted(dir) {
            if self.is_canceled() {
                break;
            }
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                log::trace!("skipping symlink: {}", path.display());
                continue;
            }
            if file_type.is_dir() {
                if self.filter.should_skip_dir(&path) {
                    log::debug!("skipping ignored directory: {}", path.display());
                    continue;
                }
                self.process_dir(&path, found, on_file, on_dir_finished);
            } else if file_type.is_file() {
                // Vanished mid-walk: skip silently
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if self.filter.should_skip_file(&path, metadata.len()) {
                    log::trace!("skipping filtered file: {}", path.display());
                    continue;
                }
                *found += 1;
                on_file(FileRecord::from_metadata(path, &metadata));
            }
        }
        // Emitted even when unwinding after cancellation.
        on_dir_finished(dir);
    }

    fn count_dir(&self, dir: &Path, seen: &mut u64, on_progress: &mut impl FnMut(u64)) {
        for entry in read_dir_sorted(dir) {
            if self.is_canceled() {
                break;
            }
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                if !self.filter.should_skip_dir(&path) {
                    self.count_dir(&path, seen, on_progress);
                }
            } else if file_type.is_file() {
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if !self.filter.should_skip_file(&path, metadata.len()) {
                    *seen += 1;
                }
            }
        }
        on_progress(*seen);
    }
}

/// Read a directory's entries sorted by name for a deterministic visitation
/// order. A missing or unreadable directory yields no entries.
fn read_dir_sorted(dir: &Path) -> Vec<std::fs::DirEntry> {
    let Ok(reader) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut entries: Vec<_> = reader.filter_map(Result::ok).collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    fn walker(root: &Path, config: FilterConfig) -> Walker {
        Walker::new(
            root,
            config.compile().unwrap(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    /// root/
    ///   a.txt  b.txt
    ///   sub/ c.txt  deeper/ d.txt
    fn build_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"aaa").unwrap();
        fs::write(dir.path().join("b.txt"), b"bbb").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("c.txt"), b"ccc").unwrap();
        let deeper = sub.join("deeper");
        fs::create_dir(&deeper).unwrap();
        fs::write(deeper.join("d.txt"), b"ddd").unwrap();
        dir
    }

    #[test]
    fn test_walk_finds_all_files() {
        let dir = build_tree();
        let w = walker(dir.path(), FilterConfig::default());

        let mut files = Vec::new();
        let total = w.walk(|rec| files.push(rec), |_| {});

        assert_eq!(total, 4);
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_dir_finished_is_post_order() {
        let dir = build_tree();
        let w = walker(dir.path(), FilterConfig::default());

        let mut finished = Vec::new();
        w.walk(|_| {}, |d| finished.push(d.to_path_buf()));

        // deeper before sub before root
        let deeper_pos = finished
            .iter()
            .position(|p| p.ends_with("deeper"))
            .unwrap();
        let sub_pos = finished.iter().position(|p| p.ends_with("sub")).unwrap();
        assert!(deeper_pos < sub_pos);
        assert_eq!(finished.last().unwrap(), dir.path());
    }

    #[test]
    fn test_files_before_parent_dir_finished() {
        let dir = build_tree();
        let w = walker(dir.path(), FilterConfig::default());

        // Both callbacks feed one sink, so it sits behind a RefCell
        let log: RefCell<Vec<String>> = RefCell::new(Vec::new());
        w.walk(
            |rec| log.borrow_mut().push(format!("file:{}", rec.file_name())),
            |d| log.borrow_mut().push(format!("dir:{}", d.display())),
        );
        let log = log.into_inner();

        let c_pos = log.iter().position(|e| e == "file:c.txt").unwrap();
        let sub_done = log
            .iter()
            .position(|e| e.starts_with("dir:") && e.ends_with("sub"))
            .unwrap();
        assert!(c_pos < sub_done);
    }

    #[test]
    fn test_nonexistent_root_is_empty_scan() {
        let w = walker(Path::new("/no/such/dir/anywhere"), FilterConfig::default());
        let total = w.walk(|_| panic!("no files expected"), |_| {});
        assert_eq!(total, 0);
    }

    #[test]
    fn test_ignored_dir_blocks_recursion() {
        let dir = build_tree();
        let w = walker(dir.path(), FilterConfig::default().with_ignored_dir("sub"));

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        w.walk(
            |rec| files.push(rec.file_name()),
            |d| dirs.push(d.to_path_buf()),
        );

        assert_eq!(files, vec!["a.txt", "b.txt"]);
        assert!(!dirs.iter().any(|p| p.ends_with("deeper")));
    }

    #[test]
    fn test_ignored_name_does_not_block_recursion() {
        let dir = build_tree();
        let w = walker(
            dir.path(),
            FilterConfig::default().with_ignored_name("c.txt"),
        );

        let mut files = Vec::new();
        w.walk(|rec| files.push(rec.file_name()), |_| {});

        assert!(!files.contains(&"c.txt".to_string()));
        // deeper/d.txt still reached even though its sibling was filtered
        assert!(files.contains(&"d.txt".to_string()));
    }

    #[test]
    fn test_count_matches_walk() {
        let dir = build_tree();
        let config = FilterConfig::default().with_ignored_name("b.txt");

        let w = walker(dir.path(), config.clone());
        let counted = w.count(|_| {});

        let w = walker(dir.path(), config);
        let walked = w.walk(|_| {}, |_| {});

        assert_eq!(counted, walked);
        assert_eq!(counted, 3);
    }

    #[test]
    fn test_count_progress_is_monotonic() {
        let dir = build_tree();
        let w = walker(dir.path(), FilterConfig::default());

        let mut reports = Vec::new();
        w.count(|n| reports.push(n));

        assert!(!reports.is_empty());
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reports.last().copied(), Some(4));
    }

    #[test]
    fn test_cancel_stops_file_discovery() {
        let dir = build_tree();
        let cancel = Arc::new(AtomicBool::new(false));
        let w = Walker::new(
            dir.path(),
            FilterConfig::default().compile().unwrap(),
            Arc::clone(&cancel),
        );

        let cancel_inner = Arc::clone(&cancel);
        let mut files = 0u64;
        let mut dirs_finished = 0u64;
        w.walk(
            |_| {
                files += 1;
                // Cancel after the first file
                cancel_inner.store(true, Ordering::SeqCst);
            },
            |_| dirs_finished += 1,
        );

        assert_eq!(files, 1);
        // The in-progress directory still reports finished while unwinding
        assert!(dirs_finished >= 1);
    }
}
