//! Project-level configuration support
//!
//! Loads per-project configuration from `clonetrail.toml` or
//! `.clonetrailrc.json` in the repository root.
//!
//! # Configuration Format
//!
//! ```toml
//! # clonetrail.toml
//!
//! [lineage]
//! lookback_depth = 20
//! max_commits = 200
//! sample_interval = 1
//!
//! [file_types]
//! test = ["^e2e/"]
//!
//! [services]
//! boundary_map = "contexts.json"
//! loc = "service_loc.json"
//!
//! [output]
//! cache_dir = "/tmp/clonetrail"
//! format = "text"
//!
//! [defaults]
//! languages = ["python", "java"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "clonetrail.toml";
pub const JSON_CONFIG_FILE: &str = ".clonetrailrc.json";

/// Project-level configuration loaded from clonetrail.toml or similar
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub lineage: LineageConfig,

    /// Regex overrides for file type classification
    #[serde(default)]
    pub file_types: FileTypesConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Default CLI flags
    #[serde(default)]
    pub defaults: CliDefaults,
}

/// Bounds of the history walk
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LineageConfig {
    /// Maximum number of threading steps
    #[serde(default = "default_lookback_depth")]
    pub lookback_depth: usize,

    /// Commits enumerated from the start revision (0 = whole first-parent chain)
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,

    /// Keep every Nth first-parent commit
    #[serde(default = "default_sample_interval")]
    pub sample_interval: usize,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            lookback_depth: default_lookback_depth(),
            max_commits: default_max_commits(),
            sample_interval: default_sample_interval(),
        }
    }
}

fn default_lookback_depth() -> usize {
    20
}

fn default_max_commits() -> usize {
    200
}

fn default_sample_interval() -> usize {
    1
}

/// Path regexes that force a file type, checked before the built-in heuristics
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FileTypesConfig {
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default)]
    pub config: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
}

/// Inputs of service resolution, relative to the repository root
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ServicesConfig {
    /// `{context_path: [service]}` JSON file
    #[serde(default)]
    pub boundary_map: Option<PathBuf>,

    /// `{service: loc}` JSON file
    #[serde(default)]
    pub loc: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Artifact root (default: user cache dir)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Default report format (text, json, markdown)
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct CliDefaults {
    /// Languages analyzed when none are given on the command line
    #[serde(default)]
    pub languages: Vec<String>,

    /// Default number of workers
    #[serde(default)]
    pub workers: Option<usize>,
}

impl ProjectConfig {
    /// Resolve a config path against the repository root.
    pub fn resolve_path(repo_path: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            repo_path.join(path)
        }
    }

    pub fn boundary_map_path(&self, repo_path: &Path) -> Option<PathBuf> {
        self.services
            .boundary_map
            .as_deref()
            .map(|p| Self::resolve_path(repo_path, p))
    }

    pub fn loc_path(&self, repo_path: &Path) -> Option<PathBuf> {
        self.services
            .loc
            .as_deref()
            .map(|p| Self::resolve_path(repo_path, p))
    }
}

/// Load project configuration from the repository root.
///
/// Searches for configuration files in this order:
/// 1. `clonetrail.toml`
/// 2. `.clonetrailrc.json`
///
/// Returns default configuration if no usable config file is found.
pub fn load_project_config(repo_path: &Path) -> ProjectConfig {
    // Try TOML first (preferred format)
    let toml_path = repo_path.join(CONFIG_FILE);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = repo_path.join(JSON_CONFIG_FILE);
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests;
