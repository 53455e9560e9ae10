//! Commit enumeration using libgit2
//!
//! Produces the analyzed-commit sequence: a sampled first-parent walk from a
//! revision, newest first.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use git2::{Commit, Repository, Sort};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Information about a git commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// Full commit hash
    pub hash: String,
    /// Short hash (12 characters)
    pub short_hash: String,
    /// Parent hashes, first parent first
    pub parents: Vec<String>,
    /// Author name
    pub author: String,
    /// Commit timestamp (ISO 8601)
    pub timestamp: String,
    /// Commit message (first line)
    pub message: String,
}

/// Git history reader using libgit2.
pub struct GitHistory {
    pub(super) repo: Repository,
}

impl GitHistory {
    /// Open a git repository.
    ///
    /// # Arguments
    /// * `path` - Path to the repository (or any subdirectory)
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to open git repository at {:?}", path))?;
        debug!("Opened git repository at {:?}", repo.path());
        Ok(Self { repo })
    }

    /// Check if a path is inside a git repository.
    pub fn is_git_repo(path: &Path) -> bool {
        Repository::discover(path).is_ok()
    }

    /// Resolve a revision (hash, short hash, branch, `HEAD~2`...) to a commit.
    pub(super) fn find_commit(&self, rev: &str) -> Result<Commit<'_>> {
        self.repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .with_context(|| format!("Unknown revision '{}'", rev))
    }

    /// Full hash of a revision.
    pub fn resolve(&self, rev: &str) -> Result<String> {
        Ok(self.find_commit(rev)?.id().to_string())
    }

    /// Enumerate the analyzed-commit sequence.
    ///
    /// Walks first parents from `rev`, keeps every `sample_interval`-th commit
    /// (the start commit is always kept) and stops after `max_commits` kept
    /// commits. `max_commits == 0` walks the whole first-parent chain.
    pub fn analyzed_commits(
        &self,
        rev: &str,
        max_commits: usize,
        sample_interval: usize,
    ) -> Result<Vec<CommitInfo>> {
        let start = self.find_commit(rev)?;
        let interval = sample_interval.max(1);

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL)?;
        revwalk.simplify_first_parent()?;
        revwalk.push(start.id())?;

        let mut commits = Vec::new();
        for (position, oid_result) in revwalk.enumerate() {
            if max_commits > 0 && commits.len() >= max_commits {
                break;
            }
            if position % interval != 0 {
                continue;
            }
            let commit = self.repo.find_commit(oid_result?)?;
            commits.push(commit_info(&commit));
        }

        debug!(
            "Enumerated {} analyzed commits from {} (interval {})",
            commits.len(),
            rev,
            interval
        );
        Ok(commits)
    }
}

fn commit_info(commit: &Commit) -> CommitInfo {
    let hash = commit.id().to_string();
    let message = commit
        .message()
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("")
        .to_string();

    CommitInfo {
        short_hash: hash.chars().take(12).collect(),
        hash,
        parents: commit.parent_ids().map(|id| id.to_string()).collect(),
        author: commit.author().name().unwrap_or("Unknown").to_string(),
        timestamp: format_git_time(&commit.time()),
        message,
    }
}

/// Format a git timestamp as ISO 8601.
fn format_git_time(time: &git2::Time) -> String {
    match Utc.timestamp_opt(time.seconds(), 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => "1970-01-01T00:00:00Z".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Commit `files` (path, content) on top of HEAD.
    pub(crate) fn commit_files(
        repo: &Repository,
        files: &[(&str, &str)],
        message: &str,
    ) -> Result<String> {
        let workdir = repo.workdir().context("bare repo")?;
        let mut index = repo.index()?;
        for (path, content) in files {
            let full = workdir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full, content)?;
            index.add_path(Path::new(path))?;
        }
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = repo.signature()?;
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(oid.to_string())
    }

    pub(crate) fn create_test_repo() -> Result<(tempfile::TempDir, Repository)> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;

        // Configure user for commits
        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        commit_files(&repo, &[("test.txt", "hello\n")], "Initial commit")?;
        Ok((dir, repo))
    }

    #[test]
    fn test_open_repo() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let history = GitHistory::open(dir.path())?;
        assert_eq!(history.resolve("HEAD")?.len(), 40);
        Ok(())
    }

    #[test]
    fn test_is_git_repo() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        assert!(GitHistory::is_git_repo(dir.path()));

        let non_repo = tempdir()?;
        assert!(!GitHistory::is_git_repo(non_repo.path()));
        Ok(())
    }

    #[test]
    fn test_analyzed_commits_newest_first() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let second = commit_files(&repo, &[("test.txt", "hello\nworld\n")], "Second")?;
        let third = commit_files(&repo, &[("other.txt", "x\n")], "Third\n\nbody")?;

        let history = GitHistory::open(dir.path())?;
        let commits = history.analyzed_commits("HEAD", 0, 1)?;
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].hash, third);
        assert_eq!(commits[0].message, "Third");
        assert_eq!(commits[0].parents, vec![second.clone()]);
        assert_eq!(commits[1].hash, second);
        assert_eq!(commits[2].message, "Initial commit");
        assert!(commits[2].parents.is_empty());
        assert_eq!(commits[0].short_hash.len(), 12);
        Ok(())
    }

    #[test]
    fn test_analyzed_commits_sampling_and_limit() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        for i in 0..5 {
            commit_files(&repo, &[("test.txt", format!("v{}\n", i).as_str())], &format!("c{}", i))?;
        }
        let history = GitHistory::open(dir.path())?;

        let sampled = history.analyzed_commits("HEAD", 0, 2)?;
        let messages: Vec<&str> = sampled.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["c4", "c2", "c0"]);

        let limited = history.analyzed_commits("HEAD", 2, 1)?;
        assert_eq!(limited.len(), 2);
        Ok(())
    }

    #[test]
    fn test_unknown_revision_errors() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let history = GitHistory::open(dir.path())?;
        assert!(history.analyzed_commits("no-such-branch", 0, 1).is_err());
        Ok(())
    }
}
