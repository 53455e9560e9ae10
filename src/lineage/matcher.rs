//! Fragment correspondence between two clone snapshots
//!
//! Child fragments are translated through the pair's line correspondence and
//! matched against parent fragments with exactly the same file and line span.
//! Whether a match is a content change is not decided here: the `added` /
//! `modified` tags come from the modified-clones signal of the step.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use super::classify::ModificationSignal;
use super::correspondence::{LineCorrespondenceMap, Resolution};
use crate::models::{CloneFragment, CloneId, CloneSnapshot, EventKind, FragmentKey};

/// Classification of one correspondence edge, from the child's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrespondenceKind {
    Stable,
    Added,
    Modified,
    Removed,
}

impl CorrespondenceKind {
    /// The timeline event this kind produces, if any.
    pub fn event(self) -> Option<EventKind> {
        match self {
            CorrespondenceKind::Added => Some(EventKind::Added),
            CorrespondenceKind::Modified => Some(EventKind::Modified),
            CorrespondenceKind::Stable | CorrespondenceKind::Removed => None,
        }
    }
}

/// Directed edge from a child fragment to the parent fragment it evolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentCorrespondence {
    pub child: FragmentKey,
    /// `None` when the child fragment has no ancestor
    pub parent: Option<FragmentKey>,
    pub kind: CorrespondenceKind,
}

/// All correspondence produced for one (parent, child) step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepCorrespondence {
    /// One edge per classified child fragment, ordered by child key
    pub edges: Vec<FragmentCorrespondence>,
    /// Parent fragments no child descends from
    pub removed: Vec<FragmentKey>,
    /// Child fragments that could not be translated and got no classification
    pub unresolved: Vec<FragmentKey>,
}

impl StepCorrespondence {
    pub fn edge(&self, child: FragmentKey) -> Option<&FragmentCorrespondence> {
        self.edges
            .binary_search_by_key(&child, |e| e.child)
            .ok()
            .map(|i| &self.edges[i])
    }

    pub fn count(&self, kind: CorrespondenceKind) -> usize {
        match kind {
            CorrespondenceKind::Removed => self.removed.len(),
            _ => self.edges.iter().filter(|e| e.kind == kind).count(),
        }
    }
}

/// Matches child fragments to parent fragments for one step.
pub struct FragmentCorrespondenceMatcher<'a> {
    parent: &'a CloneSnapshot,
    child: &'a CloneSnapshot,
    map: &'a LineCorrespondenceMap,
    signal: Option<&'a ModificationSignal>,
}

type GeometryIndex<'s> = FxHashMap<(&'s str, u32, u32), Vec<FragmentKey>>;

impl<'a> FragmentCorrespondenceMatcher<'a> {
    pub fn new(
        parent: &'a CloneSnapshot,
        child: &'a CloneSnapshot,
        map: &'a LineCorrespondenceMap,
    ) -> Self {
        Self {
            parent,
            child,
            map,
            signal: None,
        }
    }

    /// Use an upstream modified-clones signal for `added`/`modified` tagging.
    pub fn with_signal(mut self, signal: &'a ModificationSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn run(&self) -> StepCorrespondence {
        let index = self.parent_index();

        // None = unresolved, Some(candidates) = translated (possibly no match)
        let mut children: Vec<(FragmentKey, Option<Vec<FragmentKey>>)> = self
            .child
            .fragments()
            .map(|(key, frag)| {
                let candidates = self.translate(frag).map(|(start, end)| {
                    index
                        .get(&(frag.file_path.as_str(), start, end))
                        .cloned()
                        .unwrap_or_default()
                });
                (key, candidates)
            })
            .collect();
        children.sort_by_key(|(key, _)| *key);

        let affinity = Self::affinity(&children);

        let mut result = StepCorrespondence::default();
        for (key, candidates) in &children {
            let geometric = candidates
                .as_deref()
                .and_then(|c| Self::pick(key.clone_id, c, &affinity));
            if let (Some(picked), Some([lowest, _, ..])) = (geometric, candidates.as_deref()) {
                if picked != *lowest {
                    // affinity only counts this step's fragments
                    debug!(
                        "Fragment {}#{} continues {}#{} over {}#{} by step affinity",
                        self.child.versioned(key.clone_id),
                        key.index,
                        self.parent.versioned(picked.clone_id),
                        picked.index,
                        self.parent.versioned(lowest.clone_id),
                        lowest.index
                    );
                }
            }
            let signal = self.signal.and_then(|s| s.get(*key));

            let edge = match (signal, candidates) {
                (Some((EventKind::Added, _)), _) => Some((None, CorrespondenceKind::Added)),
                (Some((EventKind::Modified, signal_parent)), _) => {
                    match geometric.or(signal_parent) {
                        Some(parent) => Some((Some(parent), CorrespondenceKind::Modified)),
                        None => {
                            debug!("Modified fragment {} has no ancestor, tagging added", key);
                            Some((None, CorrespondenceKind::Added))
                        }
                    }
                }
                (None, Some(_)) => match geometric {
                    Some(parent) => Some((Some(parent), CorrespondenceKind::Stable)),
                    None => Some((None, CorrespondenceKind::Added)),
                },
                (None, None) => None,
            };

            match edge {
                Some((parent, kind)) => result.edges.push(FragmentCorrespondence {
                    child: *key,
                    parent,
                    kind,
                }),
                None => result.unresolved.push(*key),
            }
        }

        let matched: HashSet<FragmentKey> = result.edges.iter().filter_map(|e| e.parent).collect();
        result.removed = self
            .parent
            .fragments()
            .map(|(key, _)| key)
            .filter(|key| !matched.contains(key))
            .collect();
        result.removed.sort();

        debug!(
            "Matched {} -> {}: {} stable, {} modified, {} added, {} removed, {} unresolved",
            self.child.commit,
            self.parent.commit,
            result.count(CorrespondenceKind::Stable),
            result.count(CorrespondenceKind::Modified),
            result.count(CorrespondenceKind::Added),
            result.removed.len(),
            result.unresolved.len()
        );
        result
    }

    fn parent_index(&self) -> GeometryIndex<'a> {
        let mut index: GeometryIndex<'a> = FxHashMap::default();
        for (key, frag) in self.parent.fragments() {
            index
                .entry((frag.file_path.as_str(), frag.start_line, frag.end_line))
                .or_default()
                .push(key);
        }
        for keys in index.values_mut() {
            keys.sort();
        }
        index
    }

    /// Translate a child fragment's bounds into parent line numbers.
    fn translate(&self, frag: &CloneFragment) -> Option<(u32, u32)> {
        let start = match self.map.resolve(&frag.file_path, frag.start_line) {
            Resolution::Parent(line) => line,
            _ => return None,
        };
        let end = match self.map.resolve(&frag.file_path, frag.end_line) {
            Resolution::Parent(line) => line,
            _ => return None,
        };
        (start <= end).then_some((start, end))
    }

    /// For each (child set, parent set) pair, the number of child fragments of
    /// the child set that have a geometric candidate in the parent set.
    fn affinity(
        children: &[(FragmentKey, Option<Vec<FragmentKey>>)],
    ) -> FxHashMap<(CloneId, CloneId), usize> {
        let mut affinity = FxHashMap::default();
        for (key, candidates) in children {
            let Some(candidates) = candidates else {
                continue;
            };
            let parent_sets: BTreeSet<CloneId> = candidates.iter().map(|c| c.clone_id).collect();
            for parent_set in parent_sets {
                *affinity.entry((key.clone_id, parent_set)).or_insert(0) += 1;
            }
        }
        affinity
    }

    /// Most structurally complete continuation first, then lowest clone id.
    fn pick(
        child_set: CloneId,
        candidates: &[FragmentKey],
        affinity: &FxHashMap<(CloneId, CloneId), usize>,
    ) -> Option<FragmentKey> {
        candidates.iter().copied().min_by_key(|c| {
            let score = affinity.get(&(child_set, c.clone_id)).copied().unwrap_or(0);
            (Reverse(score), c.clone_id, c.index)
        })
    }
}
