//! Key-to-group duplicate index.
//!
//! The index maps each grouping key (formatted content digest, or lower-cased
//! name in name-only mode) to the set of files that produced it. Groups only
//! ever grow: a single-member group is kept as a placeholder so a later match
//! upgrades it to a duplicate group in O(1).
//!
//! Zero-byte files are never indexed. Every empty file trivially hashes to
//! the same digest, and an empty "duplicate" wastes no space.

use std::collections::HashMap;

use serde::Serialize;

use crate::scanner::FileRecord;

/// Files sharing one grouping key.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// The shared grouping key.
    pub key: String,
    /// Size in bytes of each member.
    pub size: u64,
    /// Member records in insertion order.
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Whether the group holds actual duplicates (two or more members).
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.members.len() >= 2
    }

    /// Bytes that exist beyond the one necessary copy.
    ///
    /// Zero for placeholder groups.
    #[must_use]
    pub fn extra_bytes(&self) -> u64 {
        let extras = self.members.len().saturating_sub(1) as u64;
        extras * self.size
    }
}

/// Result of recording one completed file against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupUpdate {
    /// Zero-byte file; not indexed.
    Ignored,
    /// First file seen for this key; a placeholder group was created.
    FirstSeen,
    /// The key already had members; the file joined a duplicate group.
    Duplicate {
        /// Member count after insertion.
        member_count: usize,
        /// The group's extra bytes after insertion.
        group_extra_bytes: u64,
    },
}

/// Accumulates completed hash results into groups.
///
/// Owned and mutated by exactly one thread (the session's aggregator);
/// consequently it needs no interior synchronization.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    groups: HashMap<String, DuplicateGroup>,
    total_extra_bytes: u64,
}

impl DuplicateIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed file under `key`.
    pub fn record(&mut self, record: FileRecord, key: String) -> GroupUpdate {
        if record.size == 0 {
            log::trace!("ignoring zero-byte file: {}", record.path.display());
            return GroupUpdate::Ignored;
        }
        let size = record.size;
        let group = self
            .groups
            .entry(key.clone())
            .or_insert_with(|| DuplicateGroup {
                key,
                size,
                members: Vec::with_capacity(1),
            });
        group.members.push(record);
        if group.members.len() == 1 {
            GroupUpdate::FirstSeen
        } else {
            self.total_extra_bytes += group.size;
            GroupUpdate::Duplicate {
                member_count: group.members.len(),
                group_extra_bytes: group.extra_bytes(),
            }
        }
    }

    /// Extra bytes across all groups.
    #[must_use]
    pub fn total_extra_bytes(&self) -> u64 {
        self.total_extra_bytes
    }

    /// Number of groups with two or more members.
    #[must_use]
    pub fn duplicate_group_count(&self) -> usize {
        self.groups.values().filter(|g| g.is_duplicate()).count()
    }

    /// Number of files that are redundant copies (members beyond the first
    /// in each duplicate group).
    #[must_use]
    pub fn duplicate_file_count(&self) -> usize {
        self.groups
            .values()
            .filter(|g| g.is_duplicate())
            .map(|g| g.members.len() - 1)
            .sum()
    }

    /// Look up the group for `key`.
    #[must_use]
    pub fn group(&self, key: &str) -> Option<&DuplicateGroup> {
        self.groups.get(key)
    }

    /// All groups, placeholders included, in no particular order.
    pub fn groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values()
    }

    /// Groups with two or more members, in no particular order.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values().filter(|g| g.is_duplicate())
    }
}
