//! JSON reporter
//!
//! Outputs the `{"service", "clone_set", "file"}` metrics document.

use crate::metrics::MetricsReport;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &MetricsReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
