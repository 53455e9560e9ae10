//! Persisted artifacts
//!
//! JSON clone snapshots, moving-lines and modified-clones step artifacts, the
//! lineage CSV, and the inputs of enrichment (service boundary map, per-service
//! LOC). Every file of one (repository, language) unit is addressed through
//! [`ArtifactLayout`](crate::cache::ArtifactLayout).

pub mod lineage_csv;
pub mod snapshot;
pub mod store;

pub use lineage_csv::{read_lineage_csv, write_lineage_csv, LineageRow};
pub use snapshot::SnapshotFile;
pub use store::ArtifactStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Missing {kind}: {}", path.display())]
    Missing { kind: &'static str, path: PathBuf },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid clone snapshot {}: {reason}", path.display())]
    InvalidSnapshot { path: PathBuf, reason: String },

    #[error("Malformed lineage CSV {} at line {line}: {reason}", path.display())]
    Csv {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Read a JSON artifact, mapping a missing file to [`ArtifactError::Missing`].
pub fn read_json<T: DeserializeOwned>(path: &Path, kind: &'static str) -> ArtifactResult<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::Missing {
                kind,
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a JSON artifact, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> ArtifactResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Service boundary map: `{context_path: [service_name]}`.
pub fn load_service_map(path: &Path) -> ArtifactResult<BTreeMap<String, Vec<String>>> {
    read_json(path, "service boundary map")
}

/// Total lines of code per service: `{service: loc}`.
pub fn load_service_loc(path: &Path) -> ArtifactResult<BTreeMap<String, u64>> {
    read_json(path, "service LOC file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_is_missing() {
        let err = read_json::<Vec<u32>>(Path::new("/nonexistent/x.json"), "thing").unwrap_err();
        assert!(matches!(err, ArtifactError::Missing { kind: "thing", .. }));
        assert!(err.to_string().contains("Missing thing"));
    }

    #[test]
    fn test_read_garbage_is_parse_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json")?;
        let err = read_json::<Vec<u32>>(&path, "thing").unwrap_err();
        assert!(matches!(err, ArtifactError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn test_service_inputs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let map_path = dir.path().join("contexts.json");
        let loc_path = dir.path().join("loc.json");
        std::fs::write(&map_path, r#"{"services/orders": ["orders"], ".": ["monolith"]}"#)?;
        std::fs::write(&loc_path, r#"{"orders": 1200}"#)?;

        let map = load_service_map(&map_path)?;
        assert_eq!(map["services/orders"], vec!["orders".to_string()]);
        let loc = load_service_loc(&loc_path)?;
        assert_eq!(loc.get("orders"), Some(&1200));
        Ok(())
    }
}
