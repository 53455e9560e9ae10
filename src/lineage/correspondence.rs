//! Child-to-parent line correspondence for one commit pair
//!
//! Each file's mapping is re-derived from its [`DiffHunk`] with two cursors
//! (old, new) starting at 1. A pending pure deletion consumes an old line
//! without emitting anything; a pure insertion maps its new line to `None`; a
//! modified line maps to `None` and consumes its paired old line; every other
//! line maps to the current old line. Nothing is shifted in place: the walk is
//! repeated from line 1 for every file and every commit pair.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::hunk::DiffHunk;

/// Outcome of translating one child line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Line descends from this parent line
    Parent(u32),
    /// Line was inserted and has no ancestor
    Inserted,
    /// Line lies outside the known extent of the child file
    OutOfDomain,
    /// File is not part of the map (renamed, added, deleted, undiffable)
    UnknownFile,
}

/// `child_line -> parent_line | None` for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCorrespondence {
    /// Index 0 is child line 1
    explicit: Vec<Option<u32>>,
    /// Past the explicit prefix, `parent = child - tail_offset`
    tail_offset: i64,
    /// Child line count when known; the domain is then closed
    child_line_count: Option<u32>,
}

impl FileCorrespondence {
    /// Walk one file's line sets.
    ///
    /// Returns `None` when known file sizes disagree with the line sets.
    pub fn build(hunk: &DiffHunk) -> Option<Self> {
        let inserted: HashSet<u32> = hunk.inserted_lines.iter().copied().collect();
        let deleted: HashSet<u32> = hunk.deleted_lines.iter().copied().collect();
        let modified: HashSet<u32> = hunk.modified_lines.iter().copied().collect();

        let last_new = inserted.iter().chain(modified.iter()).copied().max().unwrap_or(0);
        let last_old = deleted.iter().copied().max().unwrap_or(0);

        if let Some(count) = hunk.child_line_count {
            if last_new > count {
                return None;
            }
        }

        let mut explicit = Vec::new();
        let mut old: u32 = 1;
        let mut new: u32 = 1;

        loop {
            let more = match hunk.child_line_count {
                Some(count) => new <= count,
                None => new <= last_new || old <= last_old,
            };
            if !more {
                break;
            }
            while deleted.contains(&old) {
                old += 1;
            }
            if inserted.contains(&new) {
                explicit.push(None);
            } else if modified.contains(&new) {
                explicit.push(None);
                old += 1;
            } else {
                explicit.push(Some(old));
                old += 1;
            }
            new += 1;
        }
        while deleted.contains(&old) {
            old += 1;
        }

        if let Some(parent_count) = hunk.parent_line_count {
            if hunk.child_line_count.is_some() && old - 1 != parent_count {
                return None;
            }
        }

        Some(Self {
            explicit,
            tail_offset: i64::from(new) - i64::from(old),
            child_line_count: hunk.child_line_count,
        })
    }

    /// Translate one child line to its parent line.
    pub fn resolve(&self, child_line: u32) -> Resolution {
        if child_line == 0 {
            return Resolution::OutOfDomain;
        }
        if let Some(count) = self.child_line_count {
            if child_line > count {
                return Resolution::OutOfDomain;
            }
        }
        match self.explicit.get(child_line as usize - 1) {
            Some(Some(parent)) => Resolution::Parent(*parent),
            Some(None) => Resolution::Inserted,
            None => {
                let parent = i64::from(child_line) - self.tail_offset;
                match u32::try_from(parent) {
                    Ok(p) if p > 0 => Resolution::Parent(p),
                    _ => Resolution::OutOfDomain,
                }
            }
        }
    }

    /// The mapping as an ordered map.
    ///
    /// Covers the whole file when its size is known, otherwise only the prefix
    /// up to the last change.
    pub fn to_map(&self) -> BTreeMap<u32, Option<u32>> {
        self.explicit
            .iter()
            .enumerate()
            .map(|(i, parent)| (i as u32 + 1, *parent))
            .collect()
    }
}

/// Counters from one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub files_mapped: usize,
    pub files_renamed: usize,
    pub files_inconsistent: usize,
}

/// Per-file line correspondence for one (parent, child) commit pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCorrespondenceMap {
    files: BTreeMap<String, FileCorrespondence>,
}

impl LineCorrespondenceMap {
    /// Build the map from the pair's moving-lines records.
    ///
    /// Records whose child and parent paths differ are left out. Several
    /// records for the same path are merged before the walk, so independent
    /// hunks of one file accumulate into a single mapping.
    pub fn build(hunks: &[DiffHunk]) -> (Self, BuildStats) {
        let mut stats = BuildStats::default();
        let mut merged: BTreeMap<&str, DiffHunk> = BTreeMap::new();

        for hunk in hunks {
            if !hunk.is_same_path() {
                debug!(
                    "Not corresponding renamed file {} -> {}",
                    hunk.parent_path, hunk.child_path
                );
                stats.files_renamed += 1;
                continue;
            }
            match merged.get_mut(hunk.child_path.as_str()) {
                Some(existing) => existing.merge(hunk),
                None => {
                    merged.insert(hunk.child_path.as_str(), hunk.clone());
                }
            }
        }

        let mut files = BTreeMap::new();
        for (path, hunk) in merged {
            match FileCorrespondence::build(&hunk) {
                Some(corr) => {
                    files.insert(path.to_string(), corr);
                    stats.files_mapped += 1;
                }
                None => {
                    debug!(
                        "Dropping {}: line sets disagree with file sizes ({:?} -> {:?})",
                        path, hunk.parent_line_count, hunk.child_line_count
                    );
                    stats.files_inconsistent += 1;
                }
            }
        }

        (Self { files }, stats)
    }

    pub fn resolve(&self, path: &str, child_line: u32) -> Resolution {
        match self.files.get(path) {
            Some(file) => file.resolve(child_line),
            None => Resolution::UnknownFile,
        }
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
