//! Moving-lines command - produce the step artifacts of one commit pair

use anyhow::{Context, Result};
use console::style;
use tracing::{debug, info, warn};

use super::Workspace;
use crate::artifacts::ArtifactStore;
use crate::git::{FileStatus, GitHistory};
use crate::lineage::{classify_step, moving_lines, step_touches, LineCorrespondenceMap};

/// What producing one step wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StepOutcome {
    /// Moving-lines records written
    pub records: usize,
    /// Hunks skipped for an invalid header
    pub skipped_hunks: usize,
    /// Whether the diff changed a file of interest
    pub touched: bool,
    /// Clone groups written to the modified-clones artifact, if it was written
    pub groups: Option<usize>,
}

/// Diff `parent..child` over the files holding a fragment in either snapshot
/// and persist the moving-lines artifact. The modified-clones artifact is
/// written only when one of those files changed and the parent snapshot
/// exists.
pub(crate) fn produce_step(
    history: &GitHistory,
    store: &ArtifactStore,
    child: &str,
    parent: &str,
) -> Result<StepOutcome> {
    let child_snapshot = store.load_snapshot(child)?;
    let parent_snapshot = if store.has_snapshot(parent) {
        Some(store.load_snapshot(parent)?)
    } else {
        None
    };

    let mut paths = child_snapshot.file_paths();
    if let Some(parent_snapshot) = &parent_snapshot {
        paths.extend(parent_snapshot.file_paths());
    }
    let paths: Vec<String> = paths.into_iter().collect();

    let diffs = history.file_diffs(parent, child, &paths)?;
    let (hunks, skipped_hunks) = moving_lines(&diffs);
    store.save_moving_lines(child, parent, &hunks)?;

    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let touched = diffs.iter().any(|d| d.status != FileStatus::Unchanged)
        || step_touches(&hunks, &path_refs);
    let mut outcome = StepOutcome {
        records: hunks.len(),
        skipped_hunks,
        touched,
        groups: None,
    };

    if !touched {
        debug!("{}-{}: no file of interest changed", child, parent);
        return Ok(outcome);
    }
    let Some(parent_snapshot) = parent_snapshot else {
        warn!(
            "{}-{}: files changed but parent has no clone snapshot, step left unclassified",
            child, parent
        );
        return Ok(outcome);
    };

    let (map, stats) = LineCorrespondenceMap::build(&hunks);
    if stats.files_inconsistent > 0 {
        warn!(
            "{}-{}: {} file(s) dropped from the correspondence map",
            child, parent, stats.files_inconsistent
        );
    }
    let groups = classify_step(&parent_snapshot, &child_snapshot, &hunks, &map);
    store.save_modified_clones(child, parent, &groups)?;
    outcome.groups = Some(groups.len());

    Ok(outcome)
}

/// Run the moving-lines command
pub fn run(ws: &Workspace, child: &str, parent: &str, language: &str) -> Result<()> {
    let history = GitHistory::open(ws.repo_path())?;
    let child = history.resolve(child)?;
    let parent = history.resolve(parent)?;

    let store = ws.store(language);
    store
        .layout()
        .ensure()
        .with_context(|| format!("Failed to create {}", store.layout().language_dir().display()))?;

    let outcome = produce_step(&history, &store, &child, &parent)
        .with_context(|| format!("Failed to produce step {}-{}", short(&child), short(&parent)))?;
    info!(
        "{}-{}: {} records, {} hunks skipped",
        child, parent, outcome.records, outcome.skipped_hunks
    );

    println!(
        "\n{} {}..{} ({})\n",
        style("Step").bold(),
        style(short(&parent)).yellow(),
        style(short(&child)).yellow(),
        language
    );
    println!(
        "  {} moving-lines: {} file(s) -> {}",
        style("✓").green(),
        outcome.records,
        style(store.layout().moving_lines(&child, &parent).display()).dim()
    );
    if outcome.skipped_hunks > 0 {
        println!(
            "  {} {} hunk(s) skipped (invalid header)",
            style("!").yellow(),
            outcome.skipped_hunks
        );
    }
    match outcome.groups {
        Some(groups) => println!(
            "  {} modified-clones: {} clone set(s) -> {}",
            style("✓").green(),
            groups,
            style(store.layout().modified_clones(&child, &parent).display()).dim()
        ),
        None if outcome.touched => println!(
            "  {} modified-clones: parent snapshot missing, not written",
            style("!").yellow()
        ),
        None => println!(
            "  {} modified-clones: no clone file changed, not written",
            style("-").dim()
        ),
    }
    println!();

    Ok(())
}

pub(crate) fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
