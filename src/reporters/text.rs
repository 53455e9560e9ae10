//! Text (terminal) reporter with colors and formatting

use crate::metrics::{CloneSetMetrics, FileMetrics, MetricsReport};
use anyhow::Result;

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Rows shown per table
const TOP_ROWS: usize = 10;

/// ROC colors: share of a service's code that is cloned
fn roc_color(roc: f64) -> &'static str {
    if roc >= 0.2 {
        "\x1b[31m" // Red
    } else if roc >= 0.05 {
        "\x1b[33m" // Yellow
    } else {
        "\x1b[32m" // Green
    }
}

/// Render report as formatted terminal output
pub fn render(report: &MetricsReport) -> Result<String> {
    let mut out = String::new();

    let cross_sets = report
        .clone_set
        .iter()
        .filter(|c| c.service_count >= 2)
        .count();
    let comod_sets = report.clone_set.iter().filter(|c| c.comod_count > 0).count();

    out.push_str(&format!("\n{BOLD}Clone Metrics{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Services: {}  Clone sets: {} ({} cross-service, {} co-modified)  Files: {}\n\n",
        report.service.len(),
        report.clone_set.len(),
        cross_sets,
        comod_sets,
        report.file.len()
    ));

    if !report.service.is_empty() {
        out.push_str(&format!("{BOLD}SERVICES{RESET}\n"));
        out.push_str(&format!(
            "{DIM}  SERVICE                 SETS  LINES     ROC   COMOD  OTHER{RESET}\n"
        ));
        for s in &report.service {
            let roc_c = roc_color(s.roc);
            out.push_str(&format!(
                "  {:<22} {:>5} {:>6}  {roc_c}{:>6.1}%{RESET} {:>6} {:>6}\n",
                truncate(&s.service, 22),
                s.clone_set_count,
                s.total_clone_line_count,
                s.roc * 100.0,
                s.comod_count,
                s.comod_other_service_count
            ));
        }
        out.push('\n');
    }

    let mut sets: Vec<&CloneSetMetrics> = report
        .clone_set
        .iter()
        .filter(|c| c.cross_service_scale > 0)
        .collect();
    sets.sort_by(|a, b| {
        b.cross_service_scale
            .cmp(&a.cross_service_scale)
            .then(a.clone_id.cmp(&b.clone_id))
    });
    if !sets.is_empty() {
        out.push_str(&format!("{BOLD}CROSS-SERVICE CLONE SETS{RESET} (by scale)\n"));
        for c in sets.iter().take(TOP_ROWS) {
            out.push_str(&format!(
                "  #{:<6} {} services  {} fragments  {} lines  scale {}  comod {}\n",
                c.clone_id,
                c.service_count,
                c.cross_service_fragment_count,
                c.cross_service_line_count,
                c.cross_service_scale,
                c.comod_count
            ));
        }
        remaining(&mut out, sets.len());
        out.push('\n');
    }

    let mut files: Vec<&FileMetrics> = report
        .file
        .iter()
        .filter(|f| f.cross_service_clone_set_count > 0)
        .collect();
    files.sort_by(|a, b| {
        b.cross_service_comod_count
            .cmp(&a.cross_service_comod_count)
            .then(b.sharing_service_count.cmp(&a.sharing_service_count))
            .then(a.file_path.cmp(&b.file_path))
    });
    if !files.is_empty() {
        out.push_str(&format!("{BOLD}SHARED FILES{RESET}\n"));
        for f in files.iter().take(TOP_ROWS) {
            out.push_str(&format!(
                "  {:<40} {DIM}{}{RESET}  shared with {}  comod {}\n",
                truncate(&f.file_path, 40),
                if f.service.is_empty() { "-" } else { f.service.as_str() },
                f.sharing_service_count,
                f.cross_service_comod_count
            ));
        }
        remaining(&mut out, files.len());
        out.push('\n');
    }

    if report.is_empty() {
        out.push_str(&format!("{DIM}No clone fragments found.{RESET}\n"));
    }

    Ok(out)
}

fn remaining(out: &mut String, total: usize) {
    let rest = total.saturating_sub(TOP_ROWS);
    if rest > 0 {
        out.push_str(&format!("  {DIM}...and {} more (use --format json){RESET}\n", rest));
    }
}

/// Keep the tail of long paths, use chars() to stay on UTF-8 boundaries
fn truncate(s: &str, width: usize) -> String {
    let count = s.chars().count();
    if count <= width {
        return s.to_string();
    }
    let skip = count - (width - 3);
    format!("...{}", s.chars().skip(skip).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_text_render_sections() {
        let out = render(&test_report()).expect("render text");
        assert!(out.contains("Clone Metrics"));
        assert!(out.contains("SERVICES"));
        assert!(out.contains("CROSS-SERVICE CLONE SETS"));
        assert!(out.contains("billing/api.py"));
    }

    #[test]
    fn test_text_render_empty() {
        let out = render(&MetricsReport::default()).expect("render text");
        assert!(out.contains("No clone fragments found."));
    }

    #[test]
    fn test_truncate_keeps_tail() {
        assert_eq!(truncate("short", 10), "short");
        let t = truncate("services/orders/very/long/path.py", 12);
        assert_eq!(t.chars().count(), 12);
        assert!(t.ends_with("path.py"));
    }
}
