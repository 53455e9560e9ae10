//! Lineage threading
//!
//! Walks the analyzed-commit sequence from the head backward and keeps, for
//! every commit reached, which head fragment each of its fragments descends
//! into. Events are attached to the head fragment's timeline as edges tagged
//! `added` or `modified` are crossed.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::classify::{ModificationSignal, ModifiedCloneGroup};
use super::correspondence::LineCorrespondenceMap;
use super::hunk::DiffHunk;
use super::matcher::FragmentCorrespondenceMatcher;
use crate::artifacts::{ArtifactError, ArtifactResult};
use crate::models::{CloneSnapshot, EventKind, FragmentKey, ModificationEvent};

/// Step artifacts for one (child, parent) pair.
#[derive(Debug, Clone, Default)]
pub struct StepArtifacts {
    pub moving_lines: Vec<DiffHunk>,
    pub modified_clones: Vec<ModifiedCloneGroup>,
}

/// Where the threader reads snapshots and step artifacts from.
pub trait StepSource {
    /// Clone snapshot of a commit. Absence is fatal for the unit.
    fn snapshot(&self, commit: &str) -> ArtifactResult<CloneSnapshot>;

    /// Artifacts of one step, `None` when no change was recorded for it.
    fn step(&self, child: &str, parent: &str) -> ArtifactResult<Option<StepArtifacts>>;
}

/// How a row of the thread table came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    /// Derived through fragment correspondence (or the head itself)
    Traced,
    /// Copied from the newer row because the step had no artifact
    Unchanged,
}

/// `fragment -> head fragment | untraceable` for one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRow {
    pub commit: String,
    pub state: StepState,
    pub identities: BTreeMap<FragmentKey, Option<FragmentKey>>,
}

impl ThreadRow {
    pub fn head_of(&self, key: FragmentKey) -> Option<FragmentKey> {
        self.identities.get(&key).copied().flatten()
    }

    pub fn traceable(&self) -> usize {
        self.identities.values().filter(|v| v.is_some()).count()
    }
}

/// Rows in analyzed order, head first.
#[derive(Debug, Clone, Default)]
pub struct ThreadTable {
    rows: Vec<ThreadRow>,
}

impl ThreadTable {
    pub fn get(&self, commit: &str) -> Option<&ThreadRow> {
        self.rows.iter().find(|r| r.commit == commit)
    }

    pub fn rows(&self) -> &[ThreadRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn last(&self) -> Option<&ThreadRow> {
        self.rows.last()
    }
}

/// Modification timeline of one head fragment, newest event first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineageEntry {
    pub events: Vec<ModificationEvent>,
}

impl LineageEntry {
    pub fn commits(&self) -> Vec<String> {
        self.events.iter().map(|e| e.commit.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThreadStats {
    pub steps: usize,
    pub traced_steps: usize,
    pub unchanged_steps: usize,
    pub events: usize,
    /// Child fragments that could not be translated, summed over steps
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LineageResult {
    pub head: CloneSnapshot,
    pub table: ThreadTable,
    pub lineages: BTreeMap<FragmentKey, LineageEntry>,
    pub stats: ThreadStats,
}

/// Threads head fragments back through at most `depth` steps.
#[derive(Debug, Clone, Copy)]
pub struct LineageThreader {
    depth: usize,
}

impl LineageThreader {
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }

    pub fn thread(
        &self,
        commits: &[String],
        source: &dyn StepSource,
    ) -> ArtifactResult<LineageResult> {
        self.thread_observed(commits, source, &mut |_| {})
    }

    /// Like [`thread`](Self::thread), calling `on_step` with the parent commit
    /// after each step.
    pub fn thread_observed(
        &self,
        commits: &[String],
        source: &dyn StepSource,
        on_step: &mut dyn FnMut(&str),
    ) -> ArtifactResult<LineageResult> {
        let Some(head_commit) = commits.first() else {
            return Ok(LineageResult::default());
        };

        let head = source.snapshot(head_commit)?;
        let mut lineages: BTreeMap<FragmentKey, LineageEntry> = head
            .fragments()
            .map(|(key, _)| (key, LineageEntry::default()))
            .collect();
        let mut table = ThreadTable {
            rows: vec![ThreadRow {
                commit: head_commit.clone(),
                state: StepState::Traced,
                identities: head.fragments().map(|(key, _)| (key, Some(key))).collect(),
            }],
        };
        let mut stats = ThreadStats::default();

        // snapshot of the current child, loaded on first traced step that needs it
        let mut child_snapshot: Option<CloneSnapshot> = Some(head.clone());

        let steps = self.depth.min(commits.len().saturating_sub(1));
        for pair in commits.windows(2).take(steps) {
            let (child, parent) = (&pair[0], &pair[1]);
            stats.steps += 1;

            let current = match table.last() {
                Some(row) => row,
                None => break,
            };

            let Some(artifacts) = source.step(child, parent)? else {
                debug!("No change recorded for {}..{}, carrying forward", parent, child);
                let copied = ThreadRow {
                    commit: parent.clone(),
                    state: StepState::Unchanged,
                    identities: current.identities.clone(),
                };
                table.rows.push(copied);
                stats.unchanged_steps += 1;
                // the parent's snapshot is only needed if a later step is traced
                child_snapshot = None;
                on_step(parent);
                continue;
            };

            let child_snap = match child_snapshot.take() {
                Some(snap) => snap,
                None => source.snapshot(child)?,
            };
            let parent_snap = source.snapshot(parent)?;
            if parent_snap.commit != *parent && !parent_snap.commit.is_empty() {
                return Err(ArtifactError::InvalidSnapshot {
                    path: parent.into(),
                    reason: format!("snapshot belongs to commit {}", parent_snap.commit),
                });
            }

            let (map, _) = LineCorrespondenceMap::build(&artifacts.moving_lines);
            let signal = ModificationSignal::from_groups(&artifacts.modified_clones);
            let step = FragmentCorrespondenceMatcher::new(&parent_snap, &child_snap, &map)
                .with_signal(&signal)
                .run();
            stats.unresolved += step.unresolved.len();

            let mut identities: BTreeMap<FragmentKey, Option<FragmentKey>> = BTreeMap::new();
            let mut step_events: BTreeMap<FragmentKey, EventKind> = BTreeMap::new();

            for edge in &step.edges {
                let head_identity = current.head_of(edge.child);

                // the first child in key order with a known head keeps the parent
                if let Some(parent_key) = edge.parent {
                    let slot = identities.entry(parent_key).or_insert(head_identity);
                    match (*slot, head_identity) {
                        (None, _) => *slot = head_identity,
                        (Some(kept), Some(other)) if kept != other => debug!(
                            "Parent fragment {}#{} continues heads {} and {}, keeping {}",
                            parent_snap.versioned(parent_key.clone_id),
                            parent_key.index,
                            kept,
                            other,
                            kept
                        ),
                        _ => {}
                    }
                }

                if let (Some(kind), Some(head_key)) = (edge.kind.event(), head_identity) {
                    let recorded = step_events.entry(head_key).or_insert(kind);
                    *recorded = (*recorded).max(kind);
                }
            }

            for (head_key, kind) in step_events {
                if let Some(entry) = lineages.get_mut(&head_key) {
                    entry.events.push(ModificationEvent {
                        kind,
                        commit: parent.clone(),
                    });
                    stats.events += 1;
                }
            }

            let row = ThreadRow {
                commit: parent.clone(),
                state: StepState::Traced,
                identities,
            };
            debug!(
                "Step {}..{}: {} edges, {} of {} parent fragments traceable",
                parent,
                child,
                step.edges.len(),
                row.traceable(),
                parent_snap.fragment_count()
            );
            table.rows.push(row);
            stats.traced_steps += 1;
            child_snapshot = Some(parent_snap);
            on_step(parent);
        }

        info!(
            "Threaded {} fragments over {} steps ({} traced, {} unchanged), {} events",
            lineages.len(),
            stats.steps,
            stats.traced_steps,
            stats.unchanged_steps,
            stats.events
        );

        Ok(LineageResult {
            head,
            table,
            lineages,
            stats,
        })
    }
}
