//! Clone metrics aggregation
//!
//! Computes duplication-risk statistics at three granularities from enriched
//! head-commit fragments:
//!
//! - per service: clone volume, ratio of clone lines (ROC), co-modification
//! - per clone set: how far it spreads across services, co-modified fragments
//! - per file: how many other services share its clones
//!
//! Fragments whose service is unresolved (`""`) count toward clone set and
//! file totals but never form a service of their own.

pub mod comod;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::models::{CloneId, EnrichedFragment, FileType};
use comod::CloneSetComod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub service: String,
    pub clone_set_count: usize,
    pub fragment_count: usize,
    pub total_clone_line_count: usize,
    pub clone_avg_line_count: f64,
    pub clone_file_count: usize,
    pub total_loc: u64,
    pub roc: f64,
    pub comod_count: usize,
    pub comod_other_service_count: usize,
    pub line_count_by_file_type: BTreeMap<FileType, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneSetMetrics {
    pub clone_id: CloneId,
    pub fragment_count: usize,
    pub file_count: usize,
    pub service_count: usize,
    pub total_line_count: usize,
    pub cross_service_fragment_count: usize,
    pub cross_service_fragment_ratio: f64,
    pub cross_service_line_count: usize,
    pub cross_service_scale: usize,
    pub comod_count: usize,
    pub comod_fragment_count: usize,
    pub comod_fragment_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub file_path: String,
    pub service: String,
    pub file_type: FileType,
    pub fragment_count: usize,
    pub clone_line_count: usize,
    pub clone_set_count: usize,
    pub sharing_service_count: usize,
    pub cross_service_clone_set_count: usize,
    pub cross_service_clone_set_ratio: f64,
    pub cross_service_comod_count: usize,
}

/// The three metric tables of one (repository, language) unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub service: Vec<ServiceMetrics>,
    pub clone_set: Vec<CloneSetMetrics>,
    pub file: Vec<FileMetrics>,
}

impl MetricsReport {
    pub fn is_empty(&self) -> bool {
        self.service.is_empty() && self.clone_set.is_empty() && self.file.is_empty()
    }
}

/// `num / den`, `0.0` when `den` is zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Aggregates enriched fragments into a [`MetricsReport`].
pub struct CloneMetricsAggregator<'a> {
    fragments: Vec<&'a EnrichedFragment>,
    service_loc: &'a BTreeMap<String, u64>,
    comod: BTreeMap<CloneId, CloneSetComod>,
    /// clone_id -> fragments, in index order
    sets: BTreeMap<CloneId, Vec<&'a EnrichedFragment>>,
}

impl<'a> CloneMetricsAggregator<'a> {
    pub fn new(fragments: &'a [EnrichedFragment], service_loc: &'a BTreeMap<String, u64>) -> Self {
        let mut sorted: Vec<&EnrichedFragment> = fragments.iter().collect();
        sorted.sort_by_key(|f| (f.clone_id, f.index));

        let mut sets: BTreeMap<CloneId, Vec<&EnrichedFragment>> = BTreeMap::new();
        for frag in &sorted {
            sets.entry(frag.clone_id).or_default().push(*frag);
        }

        Self {
            comod: comod::detect(sorted.iter().copied()),
            fragments: sorted,
            service_loc,
            sets,
        }
    }

    pub fn aggregate(&self) -> MetricsReport {
        let report = MetricsReport {
            service: self.service_metrics(),
            clone_set: self.clone_set_metrics(),
            file: self.file_metrics(),
        };
        debug!(
            "Aggregated {} fragments into {} services, {} clone sets, {} files",
            self.fragments.len(),
            report.service.len(),
            report.clone_set.len(),
            report.file.len()
        );
        report
    }

    fn comod_count(&self, clone_id: CloneId) -> usize {
        self.comod.get(&clone_id).map_or(0, |c| c.comod_count())
    }

    /// Resolved services of a clone set.
    fn set_services(&self, clone_id: CloneId) -> BTreeSet<&'a str> {
        self.sets
            .get(&clone_id)
            .into_iter()
            .flatten()
            .filter(|f| f.has_service())
            .map(|f| f.service.as_str())
            .collect()
    }

    pub fn service_metrics(&self) -> Vec<ServiceMetrics> {
        let mut by_service: BTreeMap<&str, Vec<&EnrichedFragment>> = BTreeMap::new();
        for frag in self.fragments.iter().copied().filter(|f| f.has_service()) {
            by_service.entry(frag.service.as_str()).or_default().push(frag);
        }

        by_service
            .into_iter()
            .map(|(service, frags)| {
                let clone_ids: BTreeSet<CloneId> = frags.iter().map(|f| f.clone_id).collect();
                let files: BTreeSet<&str> = frags.iter().map(|f| f.file_path.as_str()).collect();
                let total_lines: usize = frags.iter().map(|f| f.line_count()).sum();

                let mut by_type: BTreeMap<FileType, usize> =
                    FileType::all().iter().map(|t| (*t, 0)).collect();
                for frag in &frags {
                    *by_type.entry(frag.file_type).or_insert(0) += frag.line_count();
                }

                let comod_count = clone_ids.iter().map(|id| self.comod_count(*id)).sum();
                let other_services: BTreeSet<&str> = clone_ids
                    .iter()
                    .filter(|id| self.comod.get(*id).is_some_and(|c| c.has_events()))
                    .flat_map(|id| self.set_services(*id))
                    .filter(|s| *s != service)
                    .collect();

                let total_loc = self.service_loc.get(service).copied().unwrap_or(0);

                ServiceMetrics {
                    service: service.to_string(),
                    clone_set_count: clone_ids.len(),
                    fragment_count: frags.len(),
                    total_clone_line_count: total_lines,
                    clone_avg_line_count: ratio(total_lines as f64, frags.len() as f64),
                    clone_file_count: files.len(),
                    total_loc,
                    roc: ratio(total_lines as f64, total_loc as f64),
                    comod_count,
                    comod_other_service_count: other_services.len(),
                    line_count_by_file_type: by_type,
                }
            })
            .collect()
    }

    pub fn clone_set_metrics(&self) -> Vec<CloneSetMetrics> {
        self.sets
            .iter()
            .map(|(clone_id, frags)| {
                let service_count = self.set_services(*clone_id).len();
                let files: BTreeSet<&str> = frags.iter().map(|f| f.file_path.as_str()).collect();
                let total_lines: usize = frags.iter().map(|f| f.line_count()).sum();

                let (cross_count, cross_lines) = if service_count >= 2 {
                    frags
                        .iter()
                        .filter(|f| f.has_service())
                        .fold((0, 0), |(n, lines), f| (n + 1, lines + f.line_count()))
                } else {
                    (0, 0)
                };

                let comod = self.comod.get(clone_id);
                let comod_fragments = comod.map_or(0, |c| c.comod_fragments().len());

                CloneSetMetrics {
                    clone_id: *clone_id,
                    fragment_count: frags.len(),
                    file_count: files.len(),
                    service_count,
                    total_line_count: total_lines,
                    cross_service_fragment_count: cross_count,
                    cross_service_fragment_ratio: ratio(cross_count as f64, frags.len() as f64),
                    cross_service_line_count: cross_lines,
                    cross_service_scale: cross_count * cross_lines,
                    comod_count: comod.map_or(0, |c| c.comod_count()),
                    comod_fragment_count: comod_fragments,
                    comod_fragment_ratio: ratio(comod_fragments as f64, frags.len() as f64),
                }
            })
            .collect()
    }

    pub fn file_metrics(&self) -> Vec<FileMetrics> {
        let mut by_file: BTreeMap<&str, Vec<&EnrichedFragment>> = BTreeMap::new();
        for frag in self.fragments.iter().copied() {
            by_file.entry(frag.file_path.as_str()).or_default().push(frag);
        }

        by_file
            .into_iter()
            .map(|(path, frags)| {
                let service = majority(frags.iter().filter(|f| f.has_service()).map(|f| f.service.as_str()))
                    .unwrap_or("");
                let file_type = majority(frags.iter().map(|f| f.file_type)).unwrap_or_default();
                let clone_ids: BTreeSet<CloneId> = frags.iter().map(|f| f.clone_id).collect();

                let mut sharing: BTreeSet<&str> = BTreeSet::new();
                let mut cross_sets = 0;
                let mut cross_comod = 0;
                for clone_id in &clone_ids {
                    let others: Vec<&str> = self
                        .set_services(*clone_id)
                        .into_iter()
                        .filter(|s| *s != service)
                        .collect();
                    if !others.is_empty() {
                        cross_sets += 1;
                        cross_comod += self.comod_count(*clone_id);
                    }
                    sharing.extend(others);
                }

                FileMetrics {
                    file_path: path.to_string(),
                    service: service.to_string(),
                    file_type,
                    fragment_count: frags.len(),
                    clone_line_count: frags.iter().map(|f| f.line_count()).sum(),
                    clone_set_count: clone_ids.len(),
                    sharing_service_count: sharing.len(),
                    cross_service_clone_set_count: cross_sets,
                    cross_service_clone_set_ratio: ratio(cross_sets as f64, clone_ids.len() as f64),
                    cross_service_comod_count: cross_comod,
                }
            })
            .collect()
    }
}

/// Most frequent value; ties go to the value seen first.
fn majority<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (value, n) in counts {
        match best {
            Some((_, best_n)) if n <= best_n => {}
            _ => best = Some((value, n)),
        }
    }
    best.map(|(value, _)| value)
}

/// Aggregate `fragments` with per-service LOC.
pub fn aggregate(fragments: &[EnrichedFragment], service_loc: &BTreeMap<String, u64>) -> MetricsReport {
    CloneMetricsAggregator::new(fragments, service_loc).aggregate()
}
