//! File-backed artifact store for one (repository, language) unit

use serde::Serialize;
use tracing::debug;

use super::lineage_csv::{read_lineage_csv, write_lineage_csv, LineageRow};
use super::snapshot::SnapshotFile;
use super::{read_json, write_json, ArtifactError, ArtifactResult};
use crate::cache::ArtifactLayout;
use crate::lineage::{DiffHunk, ModifiedCloneGroup, StepArtifacts, StepSource};
use crate::models::CloneSnapshot;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
}

impl ArtifactStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn has_snapshot(&self, commit: &str) -> bool {
        self.layout.clone_snapshot(commit).is_file()
    }

    pub fn has_moving_lines(&self, child: &str, parent: &str) -> bool {
        self.layout.moving_lines(child, parent).is_file()
    }

    pub fn has_modified_clones(&self, child: &str, parent: &str) -> bool {
        self.layout.modified_clones(child, parent).is_file()
    }

    pub fn load_snapshot(&self, commit: &str) -> ArtifactResult<CloneSnapshot> {
        let path = self.layout.clone_snapshot(commit);
        let file: SnapshotFile = read_json(&path, "clone snapshot")?;
        file.into_snapshot(commit, &path)
    }

    pub fn save_snapshot(&self, snapshot: &CloneSnapshot) -> ArtifactResult<()> {
        let path = self.layout.clone_snapshot(&snapshot.commit);
        write_json(&path, &SnapshotFile::from_snapshot(snapshot), false)
    }

    /// `None` when the artifact was never written.
    pub fn load_moving_lines(&self, child: &str, parent: &str) -> ArtifactResult<Option<Vec<DiffHunk>>> {
        optional(read_json(
            &self.layout.moving_lines(child, parent),
            "moving-lines artifact",
        ))
    }

    pub fn save_moving_lines(&self, child: &str, parent: &str, hunks: &[DiffHunk]) -> ArtifactResult<()> {
        write_json(&self.layout.moving_lines(child, parent), hunks, false)
    }

    /// `None` when the artifact was never written.
    pub fn load_modified_clones(
        &self,
        child: &str,
        parent: &str,
    ) -> ArtifactResult<Option<Vec<ModifiedCloneGroup>>> {
        optional(read_json(
            &self.layout.modified_clones(child, parent),
            "modified-clones artifact",
        ))
    }

    pub fn save_modified_clones(
        &self,
        child: &str,
        parent: &str,
        groups: &[ModifiedCloneGroup],
    ) -> ArtifactResult<()> {
        write_json(&self.layout.modified_clones(child, parent), groups, false)
    }

    pub fn save_lineage(&self, rows: &[LineageRow]) -> ArtifactResult<()> {
        write_lineage_csv(&self.layout.lineage_csv(), rows)
    }

    pub fn load_lineage(&self) -> ArtifactResult<Vec<LineageRow>> {
        read_lineage_csv(&self.layout.lineage_csv())
    }

    pub fn save_metrics<T: Serialize>(&self, report: &T) -> ArtifactResult<()> {
        write_json(&self.layout.metrics_json(), report, true)
    }
}

fn optional<T>(result: ArtifactResult<T>) -> ArtifactResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ArtifactError::Missing { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

impl StepSource for ArtifactStore {
    fn snapshot(&self, commit: &str) -> ArtifactResult<CloneSnapshot> {
        self.load_snapshot(commit)
    }

    /// Modified-clones decides whether the step was recorded; once it is,
    /// the moving-lines artifact of the same pair is required.
    fn step(&self, child: &str, parent: &str) -> ArtifactResult<Option<StepArtifacts>> {
        let Some(modified_clones) = self.load_modified_clones(child, parent)? else {
            debug!("No modified-clones artifact for {}-{}", child, parent);
            return Ok(None);
        };
        let moving_lines = self
            .load_moving_lines(child, parent)?
            .ok_or_else(|| ArtifactError::Missing {
                kind: "moving-lines artifact",
                path: self.layout.moving_lines(child, parent),
            })?;
        Ok(Some(StepArtifacts {
            moving_lines,
            modified_clones,
        }))
    }
}
