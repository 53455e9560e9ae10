//! Fragment enrichment
//!
//! Joins lineage rows with the owning service (longest build-context prefix)
//! and the role of the file they live in.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

use crate::artifacts::LineageRow;
use crate::config::FileTypesConfig;
use crate::models::{EnrichedFragment, FileType};

/// Resolves file paths to services through the build-context map.
#[derive(Debug, Clone, Default)]
pub struct ServiceResolver {
    /// (normalized context, service), longest context first
    contexts: Vec<(String, String)>,
}

impl ServiceResolver {
    /// Build from `{context_path: [service_name]}`. Contexts with no service
    /// are ignored; of several services, the first listed one wins.
    pub fn new(map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut contexts: Vec<(String, String)> = Vec::new();
        for (context, services) in map {
            let Some(service) = services.first() else {
                debug!("Context {} lists no service", context);
                continue;
            };
            let normalized = normalize(context);
            if contexts.iter().any(|(c, _)| *c == normalized) {
                continue;
            }
            contexts.push((normalized, service.clone()));
        }
        // stable sort keeps map order among equal lengths
        contexts.sort_by_key(|(c, _)| std::cmp::Reverse(component_count(c)));
        Self { contexts }
    }

    /// Owning service of `path`, `""` when no context covers it.
    pub fn resolve(&self, path: &str) -> &str {
        let path = normalize(path);
        self.contexts
            .iter()
            .find(|(context, _)| is_component_prefix(context, &path))
            .map(|(_, service)| service.as_str())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut path = path.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    let path = path.trim_matches('/');
    if path == "." {
        String::new()
    } else {
        path.to_string()
    }
}

fn component_count(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

fn is_component_prefix(context: &str, path: &str) -> bool {
    context.is_empty()
        || path == context
        || (path.starts_with(context) && path.as_bytes().get(context.len()) == Some(&b'/'))
}

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec"];
const CONFIG_DIRS: &[&str] = &["config"];
const CONFIG_EXTENSIONS: &[&str] = &[
    "json",
    "yaml",
    "yml",
    "toml",
    "ini",
    "xml",
    "properties",
    "conf",
    "env",
];
const DATA_DIRS: &[&str] = &[
    "model",
    "models",
    "entity",
    "entities",
    "dto",
    "schema",
    "migrations",
];
const DATA_EXTENSIONS: &[&str] = &["sql", "proto", "graphql", "avsc"];

/// Assigns a [`FileType`] to a path.
#[derive(Debug, Clone, Default)]
pub struct FileTypeClassifier {
    overrides: Vec<(FileType, Regex)>,
}

impl FileTypeClassifier {
    /// Built-in heuristics only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Heuristics plus regex overrides, which are checked first in the order
    /// test, config, data.
    pub fn with_overrides(config: &FileTypesConfig) -> Result<Self> {
        let mut overrides = Vec::new();
        for (file_type, patterns) in [
            (FileType::Test, &config.test),
            (FileType::Config, &config.config),
            (FileType::Data, &config.data),
        ] {
            for pattern in patterns {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Invalid {} file type pattern '{}'", file_type, pattern))?;
                overrides.push((file_type, regex));
            }
        }
        Ok(Self { overrides })
    }

    pub fn classify(&self, path: &str) -> FileType {
        let path = normalize(path);
        if let Some((file_type, _)) = self.overrides.iter().find(|(_, re)| re.is_match(&path)) {
            return *file_type;
        }

        let (dirs, file_name) = match path.rsplit_once('/') {
            Some((dirs, name)) => (dirs, name),
            None => ("", path.as_str()),
        };
        let dirs: Vec<String> = dirs
            .split('/')
            .filter(|d| !d.is_empty())
            .map(str::to_lowercase)
            .collect();
        let lower_name = file_name.to_lowercase();
        let extension = lower_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        let stem = lower_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&lower_name);
        let in_dir = |names: &[&str]| dirs.iter().any(|d| names.contains(&d.as_str()));

        if in_dir(TEST_DIRS)
            || lower_name.starts_with("test_")
            || stem.ends_with("_test")
            || lower_name.contains(".test.")
            || lower_name.contains(".spec.")
            || file_name.ends_with("Test.java")
        {
            return FileType::Test;
        }

        if in_dir(CONFIG_DIRS)
            || lower_name.contains("settings")
            || CONFIG_EXTENSIONS.contains(&extension)
            || lower_name == ".env"
            || file_name.starts_with("Dockerfile")
        {
            return FileType::Config;
        }

        if in_dir(DATA_DIRS) || DATA_EXTENSIONS.contains(&extension) {
            return FileType::Data;
        }

        FileType::Logic
    }
}

/// Attach service and file type to every lineage row.
pub fn enrich_rows(
    rows: &[LineageRow],
    resolver: &ServiceResolver,
    classifier: &FileTypeClassifier,
) -> Vec<EnrichedFragment> {
    rows.iter()
        .map(|row| EnrichedFragment {
            clone_id: row.clone_id,
            index: row.index,
            file_path: row.file_path.clone(),
            start_line: row.start_line,
            end_line: row.end_line,
            service: resolver.resolve(&row.file_path).to_string(),
            file_type: classifier.classify(&row.file_path),
            modified_commits: row.modification.iter().map(|e| e.commit.clone()).collect(),
        })
        .collect()
}
