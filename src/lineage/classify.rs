//! Modified-clones artifact
//!
//! For one (parent, child) step, tags every child fragment that was touched
//! by the diff as `modified` (with its ancestor) or `added` (no ancestor).
//! The threader consumes these tags through [`ModificationSignal`].

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::correspondence::LineCorrespondenceMap;
use super::hunk::DiffHunk;
use super::matcher::{CorrespondenceKind, FragmentCorrespondenceMatcher};
use crate::models::{CloneFragment, CloneId, CloneSnapshot, EventKind, FragmentKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FragmentRef {
    pub clone_id: CloneId,
    pub index: usize,
}

impl From<FragmentKey> for FragmentRef {
    fn from(key: FragmentKey) -> Self {
        Self {
            clone_id: key.clone_id,
            index: key.index,
        }
    }
}

impl From<FragmentRef> for FragmentKey {
    fn from(r: FragmentRef) -> Self {
        FragmentKey::new(r.clone_id, r.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedFragment {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub child: FragmentRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<FragmentRef>,
}

/// Tagged fragments of one child clone set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedCloneGroup {
    pub fragments: Vec<ModifiedFragment>,
}

/// Lookup view over a modified-clones artifact.
#[derive(Debug, Clone, Default)]
pub struct ModificationSignal {
    entries: BTreeMap<FragmentKey, (EventKind, Option<FragmentKey>)>,
}

impl ModificationSignal {
    pub fn from_groups(groups: &[ModifiedCloneGroup]) -> Self {
        let mut entries = BTreeMap::new();
        for frag in groups.iter().flat_map(|g| g.fragments.iter()) {
            let key = FragmentKey::from(frag.child);
            let value = (frag.kind, frag.parent.map(FragmentKey::from));
            match entries.get(&key) {
                // a modified tag with an ancestor is more informative than added
                Some((EventKind::Modified, _)) => {
                    debug!("Duplicate modified-clones entry for {}, keeping first", key);
                }
                _ => {
                    entries.insert(key, value);
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: FragmentKey) -> Option<(EventKind, Option<FragmentKey>)> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
struct TouchedLines {
    /// New-side inserted or modified lines
    new: FxHashSet<u32>,
    /// Old-side deleted lines
    old: FxHashSet<u32>,
}

impl TouchedLines {
    fn touches_child(&self, frag: &CloneFragment) -> bool {
        self.new.iter().any(|l| frag.contains_line(*l))
    }

    fn touches_parent(&self, frag: &CloneFragment) -> bool {
        self.old.iter().any(|l| frag.contains_line(*l))
    }
}

/// Whether the step changed any of the given files.
pub fn step_touches(hunks: &[DiffHunk], paths: &[&str]) -> bool {
    hunks
        .iter()
        .any(|h| !h.is_unchanged() && paths.contains(&h.child_path.as_str()))
}

/// Classify the child fragments of one step.
///
/// Fragments untouched by the diff get no entry. Groups come out in clone id
/// order, fragments in index order.
pub fn classify_step(
    parent: &CloneSnapshot,
    child: &CloneSnapshot,
    hunks: &[DiffHunk],
    map: &LineCorrespondenceMap,
) -> Vec<ModifiedCloneGroup> {
    let mut touched: FxHashMap<&str, TouchedLines> = FxHashMap::default();
    for hunk in hunks.iter().filter(|h| h.is_same_path()) {
        let lines = touched.entry(hunk.child_path.as_str()).or_default();
        lines.new.extend(hunk.inserted_lines.iter().copied());
        lines.new.extend(hunk.modified_lines.iter().copied());
        lines.old.extend(hunk.deleted_lines.iter().copied());
    }

    let step = FragmentCorrespondenceMatcher::new(parent, child, map).run();
    let mut groups: BTreeMap<CloneId, Vec<ModifiedFragment>> = BTreeMap::new();

    for edge in &step.edges {
        let tagged = match (edge.kind, edge.parent) {
            (CorrespondenceKind::Added, _) => Some(ModifiedFragment {
                kind: EventKind::Added,
                child: edge.child.into(),
                parent: None,
            }),
            (_, Some(parent_key)) => {
                let child_frag = child.fragment(edge.child);
                let parent_frag = parent.fragment(parent_key);
                let changed = match (child_frag, parent_frag) {
                    (Some(c), Some(p)) => touched
                        .get(c.file_path.as_str())
                        .is_some_and(|t| t.touches_child(c) || t.touches_parent(p)),
                    _ => false,
                };
                changed.then(|| ModifiedFragment {
                    kind: EventKind::Modified,
                    child: edge.child.into(),
                    parent: Some(parent_key.into()),
                })
            }
            _ => None,
        };
        if let Some(tagged) = tagged {
            groups.entry(edge.child.clone_id).or_default().push(tagged);
        }
    }

    // A bound that maps to no parent line inside a diffed file is fresh text
    for key in &step.unresolved {
        let Some(frag) = child.fragment(*key) else {
            continue;
        };
        if map.contains_file(&frag.file_path) {
            groups.entry(key.clone_id).or_default().push(ModifiedFragment {
                kind: EventKind::Added,
                child: (*key).into(),
                parent: None,
            });
        }
    }

    groups
        .into_values()
        .map(|mut fragments| {
            fragments.sort_by_key(|f| f.child);
            ModifiedCloneGroup { fragments }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CloneSet;

    fn set(clone_id: CloneId, frags: &[(&str, u32, u32)]) -> CloneSet {
        CloneSet {
            clone_id,
            fragments: frags
                .iter()
                .map(|(p, s, e)| CloneFragment::new(*p, *s, *e))
                .collect(),
        }
    }

    fn classify(
        parent: &CloneSnapshot,
        child: &CloneSnapshot,
        hunks: &[DiffHunk],
    ) -> Vec<ModifiedCloneGroup> {
        let (map, _) = LineCorrespondenceMap::build(hunks);
        classify_step(parent, child, hunks, &map)
    }

    #[test]
    fn test_untouched_step_yields_no_groups() {
        let parent = CloneSnapshot::new("p", vec![set(1, &[("a.py", 1, 5), ("b.py", 1, 5)])]);
        let child = CloneSnapshot::new("c", vec![set(1, &[("a.py", 1, 5), ("b.py", 1, 5)])]);
        let hunks = vec![DiffHunk::unchanged("a.py", None), DiffHunk::unchanged("b.py", None)];
        assert!(classify(&parent, &child, &hunks).is_empty());
    }

    #[test]
    fn test_edit_inside_span_is_modified() {
        let parent = CloneSnapshot::new("p", vec![set(2, &[("a.py", 10, 20), ("b.py", 1, 5)])]);
        let child = CloneSnapshot::new("c", vec![set(4, &[("a.py", 10, 20), ("b.py", 1, 5)])]);
        let hunks = vec![
            DiffHunk {
                child_path: "a.py".into(),
                parent_path: "a.py".into(),
                modified_lines: vec![12, 13],
                ..Default::default()
            },
            DiffHunk::unchanged("b.py", None),
        ];

        let groups = classify(&parent, &child, &hunks);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].fragments,
            vec![ModifiedFragment {
                kind: EventKind::Modified,
                child: FragmentRef { clone_id: 4, index: 0 },
                parent: Some(FragmentRef { clone_id: 2, index: 0 }),
            }]
        );
    }

    #[test]
    fn test_deletion_inside_parent_span_is_modified() {
        // parent lines 12 and 13 removed: child 10-18 descends from parent 10-20
        let parent = CloneSnapshot::new("p", vec![set(1, &[("a.py", 10, 20), ("b.py", 1, 5)])]);
        let child = CloneSnapshot::new("c", vec![set(1, &[("a.py", 10, 18), ("b.py", 1, 5)])]);
        let hunks = vec![
            DiffHunk {
                child_path: "a.py".into(),
                parent_path: "a.py".into(),
                deleted_lines: vec![12, 13],
                ..Default::default()
            },
            DiffHunk::unchanged("b.py", None),
        ];

        let groups = classify(&parent, &child, &hunks);
        let kinds: Vec<(EventKind, usize)> = groups[0]
            .fragments
            .iter()
            .map(|f| (f.kind, f.child.index))
            .collect();
        assert_eq!(kinds, vec![(EventKind::Modified, 0)]);
    }

    #[test]
    fn test_new_clone_in_diffed_file_is_added() {
        let parent = CloneSnapshot::new("p", vec![]);
        let child = CloneSnapshot::new("c", vec![set(3, &[("a.py", 1, 4), ("a.py", 6, 9)])]);
        let hunks = vec![DiffHunk {
            child_path: "a.py".into(),
            parent_path: "a.py".into(),
            inserted_lines: (1..=9).collect(),
            ..Default::default()
        }];

        let groups = classify(&parent, &child, &hunks);
        assert_eq!(groups.len(), 1);
        assert!(groups[0]
            .fragments
            .iter()
            .all(|f| f.kind == EventKind::Added && f.parent.is_none()));
        assert_eq!(groups[0].fragments.len(), 2);
    }

    #[test]
    fn test_signal_round_trip_through_json() -> anyhow::Result<()> {
        let groups = vec![ModifiedCloneGroup {
            fragments: vec![ModifiedFragment {
                kind: EventKind::Added,
                child: FragmentRef { clone_id: 7, index: 1 },
                parent: None,
            }],
        }];
        let json = serde_json::to_string(&groups)?;
        assert_eq!(
            json,
            r#"[{"fragments":[{"type":"added","child":{"clone_id":7,"index":1}}]}]"#
        );
        let back: Vec<ModifiedCloneGroup> = serde_json::from_str(&json)?;
        let signal = ModificationSignal::from_groups(&back);
        assert_eq!(signal.get(FragmentKey::new(7, 1)), Some((EventKind::Added, None)));
        Ok(())
    }

    #[test]
    fn test_step_touches_ignores_unchanged_files() {
        let hunks = vec![
            DiffHunk::unchanged("a.py", Some(3)),
            DiffHunk {
                child_path: "b.py".into(),
                parent_path: "b.py".into(),
                inserted_lines: vec![1],
                ..Default::default()
            },
        ];
        assert!(!step_touches(&hunks, &["a.py"]));
        assert!(step_touches(&hunks, &["a.py", "b.py"]));
    }
}
