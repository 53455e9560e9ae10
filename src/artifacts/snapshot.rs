//! Clone snapshot file format
//!
//! Detector output names files through a `file_data` table and refers to them
//! by `file_id` from each fragment.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::{ArtifactError, ArtifactResult};
use crate::models::{CloneFragment, CloneId, CloneSet, CloneSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_id: u64,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentEntry {
    pub file_id: u64,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub start_col: u32,
    #[serde(default)]
    pub end_col: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneSetEntry {
    pub clone_id: CloneId,
    pub fragments: Vec<FragmentEntry>,
}

/// On-disk shape of one clone snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub file_data: Vec<FileEntry>,
    #[serde(default)]
    pub clone_sets: Vec<CloneSetEntry>,
}

impl SnapshotFile {
    /// Resolve file ids and validate. `path` is only used in errors.
    pub fn into_snapshot(self, commit: &str, path: &Path) -> ArtifactResult<CloneSnapshot> {
        let invalid = |reason: String| ArtifactError::InvalidSnapshot {
            path: path.to_path_buf(),
            reason,
        };

        let mut files: BTreeMap<u64, String> = BTreeMap::new();
        for entry in self.file_data {
            if files.insert(entry.file_id, entry.file_path).is_some() {
                return Err(invalid(format!("duplicate file_id {}", entry.file_id)));
            }
        }

        let mut seen: HashSet<CloneId> = HashSet::new();
        let mut clone_sets = Vec::with_capacity(self.clone_sets.len());
        for set in self.clone_sets {
            if !seen.insert(set.clone_id) {
                return Err(invalid(format!("duplicate clone_id {}", set.clone_id)));
            }
            let mut fragments = Vec::with_capacity(set.fragments.len());
            for frag in set.fragments {
                let file_path = files.get(&frag.file_id).ok_or_else(|| {
                    invalid(format!(
                        "clone set {} refers to unknown file_id {}",
                        set.clone_id, frag.file_id
                    ))
                })?;
                if frag.end_line < frag.start_line {
                    return Err(invalid(format!(
                        "clone set {} has fragment ending before it starts ({}-{})",
                        set.clone_id, frag.start_line, frag.end_line
                    )));
                }
                fragments.push(CloneFragment {
                    file_path: file_path.clone(),
                    start_line: frag.start_line,
                    end_line: frag.end_line,
                    start_col: frag.start_col,
                    end_col: frag.end_col,
                });
            }
            clone_sets.push(CloneSet {
                clone_id: set.clone_id,
                fragments,
            });
        }

        Ok(CloneSnapshot::new(commit, clone_sets))
    }

    /// Inverse of [`into_snapshot`](Self::into_snapshot). File ids are
    /// assigned in path order starting at 0.
    pub fn from_snapshot(snapshot: &CloneSnapshot) -> Self {
        let ids: BTreeMap<String, u64> = snapshot
            .file_paths()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, i as u64))
            .collect();

        let clone_sets = snapshot
            .clone_sets
            .iter()
            .map(|set| CloneSetEntry {
                clone_id: set.clone_id,
                fragments: set
                    .fragments
                    .iter()
                    .map(|f| FragmentEntry {
                        file_id: ids.get(&f.file_path).copied().unwrap_or_default(),
                        start_line: f.start_line,
                        end_line: f.end_line,
                        start_col: f.start_col,
                        end_col: f.end_col,
                    })
                    .collect(),
            })
            .collect();

        Self {
            file_data: ids
                .into_iter()
                .map(|(file_path, file_id)| FileEntry { file_id, file_path })
                .collect(),
            clone_sets,
        }
    }
}
