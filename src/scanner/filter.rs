//! Compiled skip predicates for directories and files.
//!
//! A [`PathFilter`] is the executable form of a
//! [`FilterConfig`](crate::config::FilterConfig): pure predicates with no
//! side effects, evaluated once per candidate entry during the walk.
//!
//! Filename patterns containing `*` or `?` are translated to anchored,
//! case-insensitive regexes (`^pattern$`); `[...]` character classes pass
//! through with their usual glob meaning. Everything else is matched as an
//! exact case-insensitive literal.

use std::collections::HashSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};

use crate::config::FilterConfig;
use crate::error::StartError;

const MIB: u64 = 1024 * 1024;

/// A compiled filename matcher.
#[derive(Debug)]
enum NameMatcher {
    /// Exact case-insensitive literal (stored lower-cased).
    Literal(String),
    /// Anchored case-insensitive wildcard pattern.
    Wildcard(Regex),
}

impl NameMatcher {
    fn matches(&self, name_lower: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == name_lower,
            Self::Wildcard(re) => re.is_match(name_lower),
        }
    }
}

/// Pure skip predicates applied during directory walking.
#[derive(Debug)]
pub struct PathFilter {
    ignore_hidden: bool,
    ignored_dirs: HashSet<String>,
    ignored_names: Vec<NameMatcher>,
    size_ceiling: Option<u64>,
}

impl PathFilter {
    /// Compile the declarative configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::InvalidPattern`] when a wildcard pattern does
    /// not translate to a valid regex.
    pub fn compile(config: &FilterConfig) -> Result<Self, StartError> {
        let ignored_dirs = config
            .ignored_dirs
            .iter()
            .map(|d| d.to_lowercase())
            .collect();

        let mut ignored_names = Vec::with_capacity(config.ignored_names.len());
        for pattern in &config.ignored_names {
            if pattern.contains('*') || pattern.contains('?') {
                let re = RegexBuilder::new(&wildcard_to_regex(pattern))
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| StartError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })?;
                ignored_names.push(NameMatcher::Wildcard(re));
            } else {
                ignored_names.push(NameMatcher::Literal(pattern.to_lowercase()));
            }
        }

        Ok(Self {
            ignore_hidden: config.ignore_hidden,
            ignored_dirs,
            ignored_names,
            size_ceiling: config.size_ceiling_mib.map(|mib| mib * MIB),
        })
    }

    /// An always-accept filter.
    #[must_use]
    pub fn accept_all() -> Self {
        Self {
            ignore_hidden: false,
            ignored_dirs: HashSet::new(),
            ignored_names: Vec::new(),
            size_ceiling: None,
        }
    }

    /// Whether recursion into `path` should be skipped entirely.
    ///
    /// Matches the ignored-directory set case-insensitively against both the
    /// directory's name and its full path.
    #[must_use]
    pub fn should_skip_dir(&self, path: &Path) -> bool {
        let name = entry_name(path);
        if self.ignore_hidden && is_hidden(path, &name) {
            return true;
        }
        if self.ignored_dirs.is_empty() {
            return false;
        }
        let name_lower = name.to_lowercase();
        if self.ignored_dirs.contains(&name_lower) {
            return true;
        }
        let path_lower = path.to_string_lossy().to_lowercase();
        self.ignored_dirs.contains(&path_lower)
    }

    /// Whether `path` (a regular file of `size` bytes) should be excluded
    /// from hashing. Skipping a file never blocks recursion elsewhere.
    #[must_use]
    pub fn should_skip_file(&self, path: &Path, size: u64) -> bool {
        let name = entry_name(path);
        if self.ignore_hidden && is_hidden(path, &name) {
            return true;
        }
        if let Some(ceiling) = self.size_ceiling {
            if size >= ceiling {
                return true;
            }
        }
        if self.ignored_names.is_empty() {
            return false;
        }
        let name_lower = name.to_lowercase();
        self.ignored_names.iter().any(|m| m.matches(&name_lower))
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Hidden means a dot-prefixed name anywhere, plus the hidden file
/// attribute on Windows.
fn is_hidden(path: &Path, name: &str) -> bool {
    name.starts_with('.') || has_hidden_attribute(path)
}

#[cfg(windows)]
fn has_hidden_attribute(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_attribute(_path: &Path) -> bool {
    false
}

/// Translate a glob-style pattern to an anchored regex.
///
/// `*` matches any run of characters, `?` any single character; `[`/`]`
/// retain their character-class meaning. Other regex metacharacters are
/// escaped.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' | ']' => out.push(ch),
            c if "\\.+()|{}^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}
