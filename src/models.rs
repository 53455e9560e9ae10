//! Core data models for clonetrail
//!
//! These models are shared by the lineage tracker and the metrics
//! aggregator: clone snapshots as produced by the external detector,
//! fragment identities, modification events and enriched fragment rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Clone set identifier as assigned by the clone detector.
///
/// Only unique within one snapshot. Comparing raw ids across commits is
/// meaningless; use [`VersionedCloneId`] or go through fragment correspondence.
pub type CloneId = u64;

/// Position of a fragment inside one snapshot: `(clone_id, fragment_index)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct FragmentKey {
    pub clone_id: CloneId,
    pub index: usize,
}

impl FragmentKey {
    pub fn new(clone_id: CloneId, index: usize) -> Self {
        Self { clone_id, index }
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.clone_id, self.index)
    }
}

/// A clone id qualified by the commit whose snapshot assigned it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionedCloneId {
    pub commit: String,
    pub clone_id: CloneId,
}

impl fmt::Display for VersionedCloneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.commit.get(..12).unwrap_or(&self.commit);
        write!(f, "{}:{}", short, self.clone_id)
    }
}

/// One contiguous span belonging to a clone set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloneFragment {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub start_col: u32,
    #[serde(default)]
    pub end_col: u32,
}

impl CloneFragment {
    pub fn new(file_path: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            file_path: file_path.into(),
            start_line,
            end_line,
            start_col: 0,
            end_col: 0,
        }
    }

    /// Number of lines spanned (inclusive on both ends).
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// A group of mutually similar fragments within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneSet {
    pub clone_id: CloneId,
    pub fragments: Vec<CloneFragment>,
}

/// All clone sets detected in one commit for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneSnapshot {
    pub commit: String,
    pub clone_sets: Vec<CloneSet>,
}

impl CloneSnapshot {
    pub fn new(commit: impl Into<String>, clone_sets: Vec<CloneSet>) -> Self {
        Self {
            commit: commit.into(),
            clone_sets,
        }
    }

    /// Every fragment with its in-snapshot key, in clone set order.
    pub fn fragments(&self) -> impl Iterator<Item = (FragmentKey, &CloneFragment)> {
        self.clone_sets.iter().flat_map(|set| {
            set.fragments
                .iter()
                .enumerate()
                .map(move |(i, frag)| (FragmentKey::new(set.clone_id, i), frag))
        })
    }

    pub fn fragment(&self, key: FragmentKey) -> Option<&CloneFragment> {
        self.clone_sets
            .iter()
            .find(|s| s.clone_id == key.clone_id)
            .and_then(|s| s.fragments.get(key.index))
    }

    pub fn clone_set(&self, clone_id: CloneId) -> Option<&CloneSet> {
        self.clone_sets.iter().find(|s| s.clone_id == clone_id)
    }

    /// Distinct file paths that hold at least one fragment.
    pub fn file_paths(&self) -> BTreeSet<String> {
        self.fragments()
            .map(|(_, f)| f.file_path.clone())
            .collect()
    }

    pub fn fragment_count(&self) -> usize {
        self.clone_sets.iter().map(|s| s.fragments.len()).sum()
    }

    pub fn versioned(&self, clone_id: CloneId) -> VersionedCloneId {
        VersionedCloneId {
            commit: self.commit.clone(),
            clone_id,
        }
    }
}

/// Kind of change a traced fragment went through at one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Added,
    Modified,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Added => write!(f, "added"),
            EventKind::Modified => write!(f, "modified"),
        }
    }
}

/// One entry of a fragment's modification timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModificationEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub commit: String,
}

/// Role of the file a fragment lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Logic,
    Data,
    Test,
    Config,
}

impl FileType {
    pub fn all() -> &'static [FileType] {
        &[
            FileType::Logic,
            FileType::Data,
            FileType::Test,
            FileType::Config,
        ]
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Logic => write!(f, "logic"),
            FileType::Data => write!(f, "data"),
            FileType::Test => write!(f, "test"),
            FileType::Config => write!(f, "config"),
        }
    }
}

impl FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logic" => Ok(FileType::Logic),
            "data" => Ok(FileType::Data),
            "test" => Ok(FileType::Test),
            "config" => Ok(FileType::Config),
            _ => Err(anyhow::anyhow!(
                "Unknown file type '{}'. Valid types: logic, data, test, config",
                s
            )),
        }
    }
}

/// A head-commit fragment joined with its owner service, file role and
/// modification history. Sole input row of the metrics aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedFragment {
    pub clone_id: CloneId,
    pub index: usize,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Owning microservice, `""` when unresolved
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default)]
    pub modified_commits: Vec<String>,
}

impl EnrichedFragment {
    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(self.clone_id, self.index)
    }

    pub fn line_count(&self) -> usize {
        (self.end_line.saturating_sub(self.start_line) + 1) as usize
    }

    pub fn has_service(&self) -> bool {
        !self.service.is_empty()
    }
}
