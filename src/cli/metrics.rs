//! Metrics command - enrich lineage.csv, aggregate, render

use anyhow::{Context, Result};
use console::style;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::Workspace;
use crate::artifacts::{load_service_loc, load_service_map, ArtifactError};
use crate::enrich::{enrich_rows, FileTypeClassifier, ServiceResolver};
use crate::metrics::{aggregate, MetricsReport};
use crate::reporters;

/// Enrich and aggregate the lineage of one language, writing `metrics.json`.
pub(crate) fn build_report(
    ws: &Workspace,
    language: &str,
    services: Option<&Path>,
    loc: Option<&Path>,
) -> Result<MetricsReport> {
    let store = ws.store(language);
    let rows = match store.load_lineage() {
        Ok(rows) => rows,
        Err(ArtifactError::Missing { path, .. }) => anyhow::bail!(
            "No lineage at {}. Run 'clonetrail lineage --language {}' first.",
            path.display(),
            language
        ),
        Err(e) => return Err(e.into()),
    };

    let config = ws.config();
    let services_path = services
        .map(Path::to_path_buf)
        .or_else(|| config.boundary_map_path(ws.repo_path()));
    let service_map = match &services_path {
        Some(path) => load_service_map(path)?,
        None => {
            warn!("No service boundary map configured, every fragment is unresolved");
            BTreeMap::new()
        }
    };

    let loc_path: Option<PathBuf> = loc
        .map(Path::to_path_buf)
        .or_else(|| config.loc_path(ws.repo_path()));
    let service_loc = match &loc_path {
        Some(path) => load_service_loc(path)?,
        None => BTreeMap::new(),
    };

    let resolver = ServiceResolver::new(&service_map);
    let classifier = FileTypeClassifier::with_overrides(&config.file_types)
        .context("Invalid [file_types] override")?;
    let fragments = enrich_rows(&rows, &resolver, &classifier);

    let report = aggregate(&fragments, &service_loc);
    store.save_metrics(&report)?;
    info!(
        "{}: {} fragments -> {} services, {} clone sets, {} files",
        language,
        fragments.len(),
        report.service.len(),
        report.clone_set.len(),
        report.file.len()
    );

    Ok(report)
}

/// Run the metrics command
pub fn run(
    ws: &Workspace,
    language: &str,
    services: Option<&Path>,
    loc: Option<&Path>,
    format: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let report = build_report(ws, language, services, loc)?;

    let format = format
        .or(ws.config().output.format.as_deref())
        .unwrap_or("text");
    let rendered = reporters::report(&report, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Report written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
