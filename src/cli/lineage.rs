//! Lineage command - produce step artifacts, thread lineage, write lineage.csv
//!
//! Every language is an independent unit. Units run on a rayon pool; a unit
//! that fails is reported and the others still complete.

use anyhow::{Context, Result};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use super::moving_lines::{produce_step, short};
use super::Workspace;
use crate::artifacts::LineageRow;
use crate::git::GitHistory;
use crate::lineage::{LineageThreader, ThreadStats};

#[derive(Debug, Clone)]
pub(crate) struct LineageOptions {
    pub languages: Vec<String>,
    pub depth: usize,
    pub rev: String,
    pub max_commits: usize,
    pub sample_interval: usize,
    pub no_diff: bool,
    pub workers: usize,
}

/// Result of one (repository, language) unit.
#[derive(Debug, Clone)]
pub(crate) struct UnitSummary {
    pub steps_produced: usize,
    pub rows: usize,
    pub traced_fragments: usize,
    pub stats: ThreadStats,
    pub csv: PathBuf,
}

fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

/// Run one unit: fill in missing step artifacts, then thread.
pub(crate) fn run_unit(
    ws: &Workspace,
    language: &str,
    commits: &[String],
    options: &LineageOptions,
    bar: &ProgressBar,
) -> Result<UnitSummary> {
    let store = ws.store(language);
    store
        .layout()
        .ensure()
        .with_context(|| format!("Failed to create {}", store.layout().language_dir().display()))?;

    let steps = options.depth.min(commits.len().saturating_sub(1));
    let mut steps_produced = 0;

    if !options.no_diff && steps > 0 {
        let history = GitHistory::open(ws.repo_path())?;
        bar.set_length(steps as u64);
        bar.set_message(format!("{}: diffing", language));
        for pair in commits.windows(2).take(steps) {
            let (child, parent) = (&pair[0], &pair[1]);
            if !store.has_moving_lines(child, parent) {
                produce_step(&history, &store, child, parent).with_context(|| {
                    format!("Failed to produce step {}-{}", short(child), short(parent))
                })?;
                steps_produced += 1;
            }
            bar.inc(1);
        }
    }

    bar.set_position(0);
    bar.set_length(steps as u64);
    bar.set_message(format!("{}: threading", language));
    let result = LineageThreader::new(options.depth).thread_observed(
        commits,
        &store,
        &mut |_parent: &str| bar.inc(1),
    )?;

    let rows = LineageRow::from_result(&result);
    store.save_lineage(&rows)?;
    bar.finish_and_clear();

    let traced_fragments = result
        .lineages
        .values()
        .filter(|entry| !entry.events.is_empty())
        .count();
    info!(
        "{}: {} steps ({} traced, {} unchanged), {} events on {} of {} fragments",
        language,
        result.stats.steps,
        result.stats.traced_steps,
        result.stats.unchanged_steps,
        result.stats.events,
        traced_fragments,
        rows.len()
    );

    Ok(UnitSummary {
        steps_produced,
        rows: rows.len(),
        traced_fragments,
        stats: result.stats,
        csv: store.layout().lineage_csv(),
    })
}

/// Run the lineage command
pub fn run(ws: &Workspace, options: &LineageOptions) -> Result<()> {
    let start = Instant::now();

    let history = GitHistory::open(ws.repo_path())?;
    let commits = history.analyzed_commits(&options.rev, options.max_commits, options.sample_interval)?;
    drop(history);
    if commits.is_empty() {
        anyhow::bail!("No commits reachable from '{}'", options.rev);
    }
    let hashes: Vec<String> = commits.iter().map(|c| c.hash.clone()).collect();

    println!(
        "\n{} {} analyzed commit(s) from {} ({}), depth {}\n",
        style("Lineage").bold(),
        hashes.len(),
        style(&options.rev).cyan(),
        short(&hashes[0]),
        options.depth
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()?;
    let multi = MultiProgress::new();
    let bar_style = create_bar_style();
    let units: Vec<(&String, ProgressBar)> = options
        .languages
        .iter()
        .map(|language| {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(bar_style.clone());
            (language, bar)
        })
        .collect();

    let results: Vec<(String, Result<UnitSummary>)> = pool.install(|| {
        units
            .par_iter()
            .map(|(language, bar)| {
                let result = run_unit(ws, language, &hashes, options, bar);
                if result.is_err() {
                    bar.abandon();
                }
                (language.to_string(), result)
            })
            .collect()
    });

    let mut failed = 0;
    for (language, result) in &results {
        match result {
            Ok(summary) => {
                println!(
                    "  {} {:<12} {} fragment(s), {} with events, {} step(s) diffed",
                    style("✓").green(),
                    language,
                    summary.rows,
                    summary.traced_fragments,
                    summary.steps_produced
                );
                println!(
                    "    {} traced, {} unchanged, {} unresolved -> {}",
                    summary.stats.traced_steps,
                    summary.stats.unchanged_steps,
                    summary.stats.unresolved,
                    style(summary.csv.display()).dim()
                );
            }
            Err(e) => {
                failed += 1;
                warn!("Unit {} failed: {:#}", language, e);
                println!("  {} {:<12} {:#}", style("✗").red(), language, e);
            }
        }
    }

    println!(
        "\n{} in {:.2}s\n",
        if failed == 0 { "Done" } else { "Finished with errors" },
        start.elapsed().as_secs_f64()
    );

    if failed == results.len() {
        anyhow::bail!("All {} unit(s) failed", failed);
    }
    Ok(())
}
