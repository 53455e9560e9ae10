//! Markdown reporter for GitHub-flavored Markdown output
//!
//! Generates reports suitable for:
//! - Pull request comments
//! - Architecture review documents

use crate::metrics::{FileMetrics, MetricsReport};
use anyhow::Result;
use chrono::Local;

/// Maximum rows per table
const MAX_ROWS: usize = 20;

/// Render report as GitHub-flavored Markdown
pub fn render(report: &MetricsReport) -> Result<String> {
    let mut md = String::new();

    md.push_str("# Clone Coupling Report\n\n");
    md.push_str(&render_summary(report));
    md.push('\n');
    md.push_str(&render_services(report));
    md.push('\n');
    md.push_str(&render_clone_sets(report));
    md.push('\n');
    md.push_str(&render_files(report));
    md.push('\n');
    md.push_str(&render_footer());

    Ok(md)
}

fn render_summary(report: &MetricsReport) -> String {
    let cross = report
        .clone_set
        .iter()
        .filter(|c| c.service_count >= 2)
        .count();
    let comod = report.clone_set.iter().filter(|c| c.comod_count > 0).count();
    format!(
        "## Summary\n\n| Metric | Value |\n|--------|-------|\n\
         | Services | {} |\n| Clone sets | {} |\n| Cross-service clone sets | {} |\n\
         | Co-modified clone sets | {} |\n| Files with clones | {} |\n",
        report.service.len(),
        report.clone_set.len(),
        cross,
        comod,
        report.file.len()
    )
}

fn render_services(report: &MetricsReport) -> String {
    let mut md = String::from("## Services\n\n");
    if report.service.is_empty() {
        md.push_str("_No fragment resolved to a service._\n");
        return md;
    }
    md.push_str("| Service | Clone sets | Clone lines | Avg lines | Files | ROC | Co-mod | Other services |\n");
    md.push_str("|---------|-----------:|------------:|----------:|------:|----:|-------:|---------------:|\n");
    for s in &report.service {
        md.push_str(&format!(
            "| `{}` | {} | {} | {:.1} | {} | {:.2}% | {} | {} |\n",
            s.service,
            s.clone_set_count,
            s.total_clone_line_count,
            s.clone_avg_line_count,
            s.clone_file_count,
            s.roc * 100.0,
            s.comod_count,
            s.comod_other_service_count
        ));
    }
    md
}

fn render_clone_sets(report: &MetricsReport) -> String {
    let mut md = String::from("## Cross-Service Clone Sets\n\n");
    let mut sets: Vec<_> = report
        .clone_set
        .iter()
        .filter(|c| c.service_count >= 2)
        .collect();
    if sets.is_empty() {
        md.push_str("_No clone set spans more than one service._\n");
        return md;
    }
    sets.sort_by(|a, b| {
        b.cross_service_scale
            .cmp(&a.cross_service_scale)
            .then(a.clone_id.cmp(&b.clone_id))
    });
    md.push_str("| Clone set | Services | Fragments | Cross lines | Scale | Co-mod | Co-mod ratio |\n");
    md.push_str("|----------:|---------:|----------:|------------:|------:|-------:|-------------:|\n");
    for c in sets.iter().take(MAX_ROWS) {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {:.0}% |\n",
            c.clone_id,
            c.service_count,
            c.fragment_count,
            c.cross_service_line_count,
            c.cross_service_scale,
            c.comod_count,
            c.comod_fragment_ratio * 100.0
        ));
    }
    if sets.len() > MAX_ROWS {
        md.push_str(&format!("\n_...and {} more._\n", sets.len() - MAX_ROWS));
    }
    md
}

fn render_files(report: &MetricsReport) -> String {
    let mut md = String::from("## Files Sharing Clones Across Services\n\n");
    let mut files: Vec<&FileMetrics> = report
        .file
        .iter()
        .filter(|f| f.cross_service_clone_set_count > 0)
        .collect();
    if files.is_empty() {
        md.push_str("_None._\n");
        return md;
    }
    files.sort_by(|a, b| {
        b.cross_service_comod_count
            .cmp(&a.cross_service_comod_count)
            .then(a.file_path.cmp(&b.file_path))
    });
    md.push_str("| File | Service | Type | Shared with | Cross sets | Co-mod |\n");
    md.push_str("|------|---------|------|------------:|-----------:|-------:|\n");
    for f in files.iter().take(MAX_ROWS) {
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {}/{} | {} |\n",
            f.file_path,
            if f.service.is_empty() { "-" } else { f.service.as_str() },
            f.file_type,
            f.sharing_service_count,
            f.cross_service_clone_set_count,
            f.clone_set_count,
            f.cross_service_comod_count
        ));
    }
    md
}

fn render_footer() -> String {
    format!(
        "---\n\n_Generated by clonetrail {} on {}_\n",
        env!("CARGO_PKG_VERSION"),
        Local::now().format("%Y-%m-%d %H:%M")
    )
}
