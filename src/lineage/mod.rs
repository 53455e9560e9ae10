//! Clone fragment lineage
//!
//! Reconstructs line correspondence between commit pairs from unified diffs,
//! matches clone fragments across snapshots, and threads the head commit's
//! fragments back through the analyzed-commit sequence.
//!
//! # Pipeline
//!
//! ```text
//! FileDiff ──► DiffHunk ──► LineCorrespondenceMap ──► FragmentCorrespondence ──► ThreadTable
//!  (git)      (hunk.rs)      (correspondence.rs)          (matcher.rs)           (thread.rs)
//! ```

pub mod classify;
pub mod correspondence;
pub mod hunk;
pub mod matcher;
pub mod thread;

pub use classify::{
    classify_step, step_touches, FragmentRef, ModificationSignal, ModifiedCloneGroup, ModifiedFragment,
};
pub use correspondence::{BuildStats, LineCorrespondenceMap, Resolution};
pub use hunk::{parse_hunk, parse_patch, DiffHunk};
pub use matcher::{CorrespondenceKind, FragmentCorrespondence, FragmentCorrespondenceMatcher, StepCorrespondence};
pub use thread::{
    LineageEntry, LineageResult, LineageThreader, StepArtifacts, StepSource, StepState, ThreadRow,
    ThreadStats, ThreadTable,
};

use tracing::{debug, warn};

use crate::git::{FileDiff, FileStatus};

/// Turn one step's file diffs into moving-lines records.
///
/// Only same-path modified or unchanged files produce a record. A file with
/// an invalid hunk header produces none, so it stays out of the
/// correspondence map. Returns the records and the number of hunks skipped.
pub fn moving_lines(diffs: &[FileDiff]) -> (Vec<DiffHunk>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for diff in diffs {
        match diff.status {
            FileStatus::Unchanged => records.push(
                DiffHunk::unchanged(diff.child_path.clone(), None)
                    .with_line_counts(diff.parent_line_count, diff.child_line_count),
            ),
            FileStatus::Modified if diff.child_path == diff.parent_path => {
                let Some(patch) = diff.patch.as_deref() else {
                    warn!("Modified file {} has no patch text", diff.child_path);
                    continue;
                };
                let (hunk, bad) =
                    DiffHunk::from_patch(diff.child_path.clone(), diff.parent_path.clone(), patch);
                if bad > 0 {
                    warn!(
                        "Dropping {}: {} hunk(s) with an invalid header",
                        diff.child_path, bad
                    );
                    skipped += bad;
                    continue;
                }
                records.push(hunk.with_line_counts(diff.parent_line_count, diff.child_line_count));
            }
            status => {
                debug!(
                    "Skipping {} ({:?}): no same-path correspondence",
                    diff.child_path, status
                );
            }
        }
    }

    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_diff(path: &str, status: FileStatus, patch: Option<&str>) -> FileDiff {
        FileDiff {
            child_path: path.to_string(),
            parent_path: path.to_string(),
            status,
            patch: patch.map(str::to_string),
            parent_line_count: Some(5),
            child_line_count: Some(6),
        }
    }

    #[test]
    fn test_moving_lines_keeps_modified_and_unchanged() {
        let patch = "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n@@ -2,2 +2,3 @@\n 2\n+new\n 3\n";
        let diffs = vec![
            file_diff("a.py", FileStatus::Modified, Some(patch)),
            file_diff("b.py", FileStatus::Unchanged, None),
            file_diff("c.py", FileStatus::Added, None),
            file_diff("d.bin", FileStatus::Binary, None),
        ];

        let (records, skipped) = moving_lines(&diffs);
        assert_eq!(skipped, 0);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].inserted_lines, vec![3]);
        assert_eq!(records[0].child_line_count, Some(6));
        assert!(records[1].is_unchanged());
    }

    #[test]
    fn test_moving_lines_feed_correspondence() {
        let patch = "@@ -2,2 +2,3 @@\n 2\n+new\n 3\n";
        let (records, _) = moving_lines(&[file_diff("a.py", FileStatus::Modified, Some(patch))]);
        let (map, stats) = LineCorrespondenceMap::build(&records);
        assert_eq!(stats.files_mapped, 1);
        assert_eq!(map.resolve("a.py", 3), Resolution::Inserted);
        assert_eq!(map.resolve("a.py", 6), Resolution::Parent(5));
        assert_eq!(map.resolve("a.py", 7), Resolution::OutOfDomain);
    }

    #[test]
    fn test_invalid_hunk_header_drops_the_file() {
        let mut diff = file_diff("a.py", FileStatus::Modified, Some("@@ -x +y @@\n a\n-b\n+B\n c\n"));
        diff.parent_line_count = Some(3);
        diff.child_line_count = Some(3);

        let (records, skipped) = moving_lines(&[diff, file_diff("b.py", FileStatus::Unchanged, None)]);
        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].child_path, "b.py");

        let (map, _) = LineCorrespondenceMap::build(&records);
        assert_eq!(map.resolve("a.py", 2), Resolution::UnknownFile);
    }
}
