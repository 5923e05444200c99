//! Deletion planning for duplicate groups.
//!
//! Given a group of files with identical content, the planner proposes which
//! members are redundant copies. It never touches the filesystem: the output
//! is a pure recommendation, and acting on it is the caller's job.
//!
//! A member is classified as a copy when its extension-stripped name matches
//! one of the well-known copy shapes:
//!
//! - `name (N).ext` (numbered copy)
//! - `name - Copy.ext` (Explorer-style copy)
//! - `Copy of name.ext` (older Explorer-style copy)
//!
//! Members that are not copies register as base files under their own path.
//! Copies are then resolved in path order: one whose referent is already a
//! known base is deleted outright; otherwise the copy registers as the
//! presumed base *under its computed name*, so every later copy resolving to
//! that name is deleted unconditionally. When several base files remain, the
//! one with the oldest metadata-change time is kept; a timestamp tie is
//! broken by lexicographic path order so the plan is deterministic across
//! runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::scanner::FileRecord;

use super::DuplicateGroup;

/// Matched against the extension-stripped stem, in precedence order.
static NUMBERED_COPY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.*)\s+\(\s*\d+\s*\)$").expect("static pattern"));
static DASH_COPY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.*)\s+-\s+Copy$").expect("static pattern"));
static COPY_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Copy of (?P<base>.*)$").expect("static pattern"));

/// Recommended disposition for one duplicate group.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionPlan {
    /// The group's key.
    pub key: String,
    /// Members to retain, sorted by path.
    pub keep: Vec<FileRecord>,
    /// Members recommended for deletion, sorted by path.
    pub delete: Vec<FileRecord>,
}

impl DeletionPlan {
    /// Propose a plan for `group`.
    ///
    /// A placeholder group (fewer than two members) yields a plan that keeps
    /// everything.
    #[must_use]
    pub fn plan(group: &DuplicateGroup) -> Self {
        if !group.is_duplicate() {
            return Self {
                key: group.key.clone(),
                keep: sorted(group.members.clone()),
                delete: Vec::new(),
            };
        }

        let mut members: Vec<&FileRecord> = group.members.iter().collect();
        members.sort_by(|a, b| a.path.cmp(&b.path));

        // First pass: non-copies are base files under their literal path.
        let mut bases: HashMap<PathBuf, &FileRecord> = HashMap::new();
        let mut copies: Vec<(&FileRecord, PathBuf)> = Vec::new();
        for member in members {
            match copy_referent(&member.path) {
                Some(referent) => copies.push((member, referent)),
                None => {
                    bases.insert(member.path.clone(), member);
                }
            }
        }

        // Second pass, in path order: a copy whose referent is already a
        // known base is deleted; otherwise it registers as the presumed
        // base under its computed name.
        let mut delete: Vec<FileRecord> = Vec::new();
        for (copy, referent) in copies {
            if bases.contains_key(&referent) {
                delete.push(copy.clone());
            } else {
                bases.insert(referent, copy);
            }
        }

        let keeper_path = bases
            .values()
            .min_by(|a, b| {
                a.meta_changed
                    .cmp(&b.meta_changed)
                    .then_with(|| a.path.cmp(&b.path))
            })
            .map(|r| r.path.clone());

        let mut keep = Vec::new();
        for base in bases.into_values() {
            if Some(&base.path) == keeper_path.as_ref() {
                keep.push(base.clone());
            } else {
                delete.push(base.clone());
            }
        }

        Self {
            key: group.key.clone(),
            keep: sorted(keep),
            delete: sorted(delete),
        }
    }

    /// Bytes freed if the plan is carried out.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.delete.iter().map(|r| r.size).sum()
    }
}

/// The path a copy-shaped name refers back to, or `None` when the name does
/// not look like a copy.
fn copy_referent(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let base = [&*NUMBERED_COPY, &*DASH_COPY, &*COPY_OF]
        .iter()
        .find_map(|re| re.captures(stem))
        .map(|caps| caps["base"].to_string())?;

    let referent_name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    };
    Some(path.with_file_name(referent_name))
}

fn sorted(mut records: Vec<FileRecord>) -> Vec<FileRecord> {
    records.sort_by(|a, b| a.path.cmp(&b.path));
    records
}
