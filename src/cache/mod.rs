//! Artifact directory layout
//!
//! ```text
//! <root>/<language>/clones/<commit>.json
//! <root>/<language>/moving_lines/<child>-<parent>.json
//! <root>/<language>/modified_clones/<child>-<parent>.json
//! <root>/<language>/lineage.csv
//! <root>/<language>/metrics.json
//! ```

pub mod paths;

pub use paths::get_cache_dir;

use std::path::{Path, PathBuf};

/// Paths of every artifact of one (repository, language) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    language: String,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            language: language.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn language_dir(&self) -> PathBuf {
        self.root.join(&self.language)
    }

    pub fn clones_dir(&self) -> PathBuf {
        self.language_dir().join("clones")
    }

    pub fn moving_lines_dir(&self) -> PathBuf {
        self.language_dir().join("moving_lines")
    }

    pub fn modified_clones_dir(&self) -> PathBuf {
        self.language_dir().join("modified_clones")
    }

    pub fn clone_snapshot(&self, commit: &str) -> PathBuf {
        self.clones_dir().join(format!("{}.json", commit))
    }

    pub fn moving_lines(&self, child: &str, parent: &str) -> PathBuf {
        self.moving_lines_dir().join(pair_file(child, parent))
    }

    pub fn modified_clones(&self, child: &str, parent: &str) -> PathBuf {
        self.modified_clones_dir().join(pair_file(child, parent))
    }

    pub fn lineage_csv(&self) -> PathBuf {
        self.language_dir().join("lineage.csv")
    }

    pub fn metrics_json(&self) -> PathBuf {
        self.language_dir().join("metrics.json")
    }

    /// Create every directory of the layout.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [
            self.clones_dir(),
            self.moving_lines_dir(),
            self.modified_clones_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn pair_file(child: &str, parent: &str) -> String {
    format!("{}-{}.json", child, parent)
}
