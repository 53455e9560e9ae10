//! Per-file patches between two commits

use anyhow::{Context, Result};
use git2::{Delta, DiffFindOptions, DiffOptions, Patch, Tree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::history::GitHistory;

/// What happened to one file between the parent and the child commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Modified,
    Unchanged,
    Added,
    Deleted,
    Renamed,
    Binary,
}

/// Diff of one file of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub child_path: String,
    pub parent_path: String,
    pub status: FileStatus,
    /// Unified patch text, `None` unless the file is `Modified`
    pub patch: Option<String>,
    pub parent_line_count: Option<u32>,
    pub child_line_count: Option<u32>,
}

impl GitHistory {
    /// Diff `parent` against `child`, restricted to `paths`.
    ///
    /// Paths that exist in both trees without a delta come back as
    /// `Unchanged`. Paths missing from both trees are left out.
    pub fn file_diffs(&self, parent: &str, child: &str, paths: &[String]) -> Result<Vec<FileDiff>> {
        let parent_tree = self.find_commit(parent)?.tree()?;
        let child_tree = self.find_commit(child)?.tree()?;

        let mut out: BTreeMap<String, FileDiff> = BTreeMap::new();
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let mut opts = DiffOptions::new();
        for path in paths {
            opts.pathspec(path);
        }
        opts.disable_pathspec_match(true);

        let mut diff = self
            .repo
            .diff_tree_to_tree(Some(&parent_tree), Some(&child_tree), Some(&mut opts))
            .with_context(|| format!("Failed to diff {}..{}", parent, child))?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

        for idx in 0..diff.deltas().len() {
            let Some(delta) = diff.get_delta(idx) else {
                continue;
            };
            let new_path = delta.new_file().path().map(path_string);
            let old_path = delta.old_file().path().map(path_string);
            let (Some(child_path), Some(parent_path)) = (
                new_path.clone().or_else(|| old_path.clone()),
                old_path.or(new_path),
            ) else {
                continue;
            };

            let parent_line_count = self.line_count(&parent_tree, &parent_path);
            let child_line_count = self.line_count(&child_tree, &child_path);

            let mut status = match delta.status() {
                Delta::Added | Delta::Copied | Delta::Untracked => FileStatus::Added,
                Delta::Deleted => FileStatus::Deleted,
                Delta::Renamed => FileStatus::Renamed,
                Delta::Unmodified => FileStatus::Unchanged,
                _ => FileStatus::Modified,
            };

            let mut patch_text = None;
            if status == FileStatus::Modified {
                let patch = Patch::from_diff(&diff, idx)?;
                let binary = delta.flags().is_binary();
                match patch {
                    Some(mut patch) if !binary => {
                        let buf = patch.to_buf()?;
                        match buf.as_str() {
                            Some(text) => patch_text = Some(text.to_string()),
                            None => {
                                debug!("Patch for {} is not valid UTF-8", child_path);
                                status = FileStatus::Binary;
                            }
                        }
                    }
                    _ => status = FileStatus::Binary,
                }
            }

            out.insert(
                child_path.clone(),
                FileDiff {
                    child_path,
                    parent_path,
                    status,
                    patch: patch_text,
                    parent_line_count,
                    child_line_count,
                },
            );
        }

        for path in paths {
            if out.contains_key(path) {
                continue;
            }
            let parent_count = self.line_count(&parent_tree, path);
            let child_count = self.line_count(&child_tree, path);
            if parent_count.is_none() && child_count.is_none() {
                continue;
            }
            out.insert(
                path.clone(),
                FileDiff {
                    child_path: path.clone(),
                    parent_path: path.clone(),
                    status: FileStatus::Unchanged,
                    patch: None,
                    parent_line_count: parent_count,
                    child_line_count: child_count,
                },
            );
        }

        debug!(
            "Diffed {}..{}: {} of {} files of interest changed",
            parent,
            child,
            out.values()
                .filter(|d| d.status != FileStatus::Unchanged)
                .count(),
            paths.len()
        );
        Ok(out.into_values().collect())
    }

    /// Number of lines of a blob in `tree`, `None` when absent or not a blob.
    fn line_count(&self, tree: &Tree, path: &str) -> Option<u32> {
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = entry.to_object(&self.repo).ok()?.peel_to_blob().ok()?;
        if blob.is_binary() {
            return None;
        }
        Some(count_lines(blob.content()))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn count_lines(content: &[u8]) -> u32 {
    let newlines = content.iter().filter(|b| **b == b'\n').count() as u32;
    match content.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::history::tests::{commit_files, create_test_repo};

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"a\nb\n"), 2);
        assert_eq!(count_lines(b"a\nb"), 2);
    }

    #[test]
    fn test_file_diffs_statuses() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let parent = commit_files(
            &repo,
            &[("a.py", "1\n2\n3\n4\n5\n"), ("b.py", "x\ny\n")],
            "parent",
        )?;
        let child = commit_files(
            &repo,
            &[("a.py", "1\n2\nnew\n3\n4\n5\n"), ("c.py", "z\n")],
            "child",
        )?;

        let history = GitHistory::open(dir.path())?;
        let paths: Vec<String> = ["a.py", "b.py", "c.py", "missing.py"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let diffs = history.file_diffs(&parent, &child, &paths)?;

        assert_eq!(diffs.len(), 3);
        let a = &diffs[0];
        assert_eq!(a.child_path, "a.py");
        assert_eq!(a.status, FileStatus::Modified);
        assert_eq!(a.parent_line_count, Some(5));
        assert_eq!(a.child_line_count, Some(6));
        assert!(a.patch.as_deref().is_some_and(|p| p.contains("+new")));

        assert_eq!(diffs[1].child_path, "b.py");
        assert_eq!(diffs[1].status, FileStatus::Unchanged);
        assert_eq!(diffs[1].child_line_count, Some(2));

        assert_eq!(diffs[2].child_path, "c.py");
        assert_eq!(diffs[2].status, FileStatus::Added);
        Ok(())
    }
}
