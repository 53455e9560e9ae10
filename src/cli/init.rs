//! Init command - write an example clonetrail.toml

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::config::CONFIG_FILE;

const DEFAULT_CONFIG: &str = r#"# clonetrail configuration

[lineage]
# Maximum threading steps back from the start revision
lookback_depth = 20

# Commits enumerated from the start revision (0 = whole first-parent chain)
max_commits = 200

# Keep every Nth first-parent commit
sample_interval = 1

[file_types]
# Path regexes that force a file type before the built-in heuristics
# test = ["^e2e/"]
# config = []
# data = []

[services]
# {context_path: [service]} JSON file, relative to the repository root
# boundary_map = "contexts.json"

# {service: loc} JSON file used as the ROC denominator
# loc = "service_loc.json"

[output]
# Artifact root (default: user cache dir)
# cache_dir = "/tmp/clonetrail"

# Default report format (text, json, markdown)
format = "text"

[defaults]
# Languages processed when --language is not given
# languages = ["python", "java"]
"#;

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    if !repo_path.is_dir() {
        anyhow::bail!("Path is not a directory: {}", repo_path.display());
    }

    println!("\n{} Initializing clonetrail\n", style("▸").bold());

    let config_path = repo_path.join(CONFIG_FILE);
    if config_path.exists() {
        println!(
            "{} Already initialized at {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    } else {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to create {}", config_path.display()))?;
        println!(
            "{} Created {}",
            style("✓").green(),
            style(CONFIG_FILE).cyan()
        );
    }

    println!("\nNext steps:");
    println!(
        "  {} Place clone snapshots under the cache dir (see {})",
        style("1.").dim(),
        style("clonetrail status").cyan()
    );
    println!(
        "  {} Trace lineage",
        style("clonetrail lineage --language <lang>").cyan()
    );
    println!(
        "  {} Aggregate metrics",
        style("clonetrail metrics --language <lang>").cyan()
    );

    Ok(())
}
