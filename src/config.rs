//! Scan configuration: filters, key mode, and session options.
//!
//! [`FilterConfig`] is the declarative form the caller builds (typically from
//! CLI flags); [`FilterConfig::compile`] turns it into the predicate form the
//! walker consumes, surfacing bad wildcard syntax as a
//! [`StartError::InvalidPattern`] before the scan starts.

use std::path::PathBuf;

use crate::error::StartError;
use crate::scanner::PathFilter;

/// How the grouping key for a file is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Key is the formatted BLAKE3 digest of the file's full content.
    #[default]
    Content,
    /// Key is the lower-cased file name. No content is read; files "match"
    /// when their names compare equal case-insensitively. This is a distinct
    /// notion of duplicate from content equality and is never a fallback.
    NameOnly,
}

/// Declarative filter settings for a scan.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use dupescan::config::FilterConfig;
///
/// let config = FilterConfig::default()
///     .with_ignore_hidden(true)
///     .with_ignored_dir("node_modules")
///     .with_ignored_name("*.tmp")
///     .with_size_ceiling_mib(512);
/// let filter = config.compile().unwrap();
/// assert!(filter.should_skip_file(Path::new("photo.tmp"), 10));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Skip entries whose name starts with `.`, plus entries carrying the
    /// hidden file attribute on Windows.
    pub ignore_hidden: bool,
    /// Directories never recursed into. Each entry is matched
    /// case-insensitively against both the directory name and its full path.
    pub ignored_dirs: Vec<String>,
    /// File names excluded from hashing. Entries containing `*` or `?` are
    /// wildcard patterns; anything else is an exact case-insensitive literal.
    pub ignored_names: Vec<String>,
    /// Files at or above this many MiB are skipped entirely.
    pub size_ceiling_mib: Option<u64>,
}

impl FilterConfig {
    /// Enable or disable hidden-entry skipping.
    #[must_use]
    pub fn with_ignore_hidden(mut self, ignore: bool) -> Self {
        self.ignore_hidden = ignore;
        self
    }

    /// Add a directory to the ignored set.
    #[must_use]
    pub fn with_ignored_dir(mut self, dir: impl Into<String>) -> Self {
        self.ignored_dirs.push(dir.into());
        self
    }

    /// Add a file name literal or wildcard pattern to the ignored set.
    #[must_use]
    pub fn with_ignored_name(mut self, name: impl Into<String>) -> Self {
        self.ignored_names.push(name.into());
        self
    }

    /// Skip files at or above `mib` MiB.
    #[must_use]
    pub fn with_size_ceiling_mib(mut self, mib: u64) -> Self {
        self.size_ceiling_mib = Some(mib);
        self
    }

    /// Compile into the predicate form used by the walker.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::InvalidPattern`] if a wildcard pattern does not
    /// compile.
    pub fn compile(&self) -> Result<PathFilter, StartError> {
        PathFilter::compile(self)
    }
}

/// Options for starting a scan session.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Root directory to scan.
    pub root: PathBuf,
    /// Filter settings.
    pub filter: FilterConfig,
    /// Grouping key derivation.
    pub key_mode: KeyMode,
    /// Worker pool size. `None` uses available hardware parallelism.
    pub workers: Option<usize>,
    /// Run a counting pre-pass before hashing so consumers can size their
    /// progress range up front.
    pub count_first: bool,
}

impl ScanOptions {
    /// Create options for scanning `root` with default settings.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: FilterConfig::default(),
            key_mode: KeyMode::default(),
            workers: None,
            count_first: true,
        }
    }

    /// Set the filter configuration.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Set the key derivation mode.
    #[must_use]
    pub fn with_key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Enable or disable the counting pre-pass.
    #[must_use]
    pub fn with_count_first(mut self, count_first: bool) -> Self {
        self.count_first = count_first;
        self
    }
}
