//! Co-modification detection
//!
//! A commit is a co-modification event of a clone set when it touches at
//! least two distinct fragments of that set.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{CloneId, EnrichedFragment};

/// Co-modification events of one clone set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneSetComod {
    /// commit -> fragment indices it touched (only commits touching two or more)
    pub events: BTreeMap<String, BTreeSet<usize>>,
}

impl CloneSetComod {
    pub fn comod_count(&self) -> usize {
        self.events.len()
    }

    /// Fragment indices involved in any event.
    pub fn comod_fragments(&self) -> BTreeSet<usize> {
        self.events.values().flatten().copied().collect()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Detect co-modification events for every clone set in `fragments`.
///
/// Every clone set present in the input gets an entry, possibly empty.
pub fn detect<'a, I>(fragments: I) -> BTreeMap<CloneId, CloneSetComod>
where
    I: IntoIterator<Item = &'a EnrichedFragment>,
{
    let mut touched: BTreeMap<CloneId, BTreeMap<&'a str, BTreeSet<usize>>> = BTreeMap::new();
    for frag in fragments {
        let per_commit = touched.entry(frag.clone_id).or_default();
        for commit in &frag.modified_commits {
            per_commit
                .entry(commit.as_str())
                .or_default()
                .insert(frag.index);
        }
    }

    touched
        .into_iter()
        .map(|(clone_id, per_commit)| {
            let events = per_commit
                .into_iter()
                .filter(|(_, indices)| indices.len() >= 2)
                .map(|(commit, indices)| (commit.to_string(), indices))
                .collect();
            (clone_id, CloneSetComod { events })
        })
        .collect()
}
