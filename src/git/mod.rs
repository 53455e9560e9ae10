//! Git history access
//!
//! Enumerates the analyzed-commit sequence and extracts per-file patches
//! between commit pairs using the git2 crate.
//!
//! # Example
//!
//! ```no_run
//! use clonetrail::git::GitHistory;
//! use std::path::Path;
//!
//! let history = GitHistory::open(Path::new("/path/to/repo")).unwrap();
//! let commits = history.analyzed_commits("HEAD", 50, 1).unwrap();
//! if let [child, parent, ..] = commits.as_slice() {
//!     let diffs = history
//!         .file_diffs(&parent.hash, &child.hash, &["src/app.py".to_string()])
//!         .unwrap();
//! }
//! ```

pub mod diff;
pub mod history;

pub use diff::{FileDiff, FileStatus};
pub use history::{CommitInfo, GitHistory};
