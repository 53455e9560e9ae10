//! Status command - show artifact availability per analyzed commit

use anyhow::Result;
use console::style;

use super::moving_lines::short;
use super::Workspace;
use crate::artifacts::ArtifactStore;
use crate::git::{CommitInfo, GitHistory};

/// Commits listed per language
const MAX_LISTED: usize = 15;

/// Artifact coverage of one language over the analyzed window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Coverage {
    pub commits: usize,
    pub snapshots: usize,
    pub steps: usize,
    pub moving_lines: usize,
    pub modified_clones: usize,
}

pub(crate) fn coverage(store: &ArtifactStore, commits: &[CommitInfo], depth: usize) -> Coverage {
    let window = &commits[..commits.len().min(depth + 1)];
    let mut cov = Coverage {
        commits: window.len(),
        ..Default::default()
    };
    cov.snapshots = window.iter().filter(|c| store.has_snapshot(&c.hash)).count();
    for pair in window.windows(2) {
        let (child, parent) = (&pair[0].hash, &pair[1].hash);
        cov.steps += 1;
        if store.has_moving_lines(child, parent) {
            cov.moving_lines += 1;
        }
        if store.has_modified_clones(child, parent) {
            cov.modified_clones += 1;
        }
    }
    cov
}

fn mark(present: bool) -> String {
    if present {
        style("●").green().to_string()
    } else {
        style("·").dim().to_string()
    }
}

/// Run the status command
pub fn run(ws: &Workspace, languages: Vec<String>) -> Result<()> {
    println!("\nclonetrail Status\n");
    println!("  Repository: {}", style(ws.repo_path().display()).cyan());
    println!("  Cache: {}", style(ws.cache_root().display()).dim());

    let languages = if languages.is_empty() {
        let mut found = ws.config().defaults.languages.clone();
        for cached in ws.cached_languages() {
            if !found.contains(&cached) {
                found.push(cached);
            }
        }
        found
    } else {
        languages
    };

    let lineage_cfg = &ws.config().lineage;
    let commits = if GitHistory::is_git_repo(ws.repo_path()) {
        GitHistory::open(ws.repo_path())?.analyzed_commits(
            "HEAD",
            lineage_cfg.max_commits,
            lineage_cfg.sample_interval,
        )?
    } else {
        println!("  {} Not a git repository", style("[--]").dim());
        Vec::new()
    };
    println!(
        "  Window: {} analyzed commit(s), depth {}",
        commits.len(),
        lineage_cfg.lookback_depth
    );
    println!();

    if languages.is_empty() {
        println!(
            "  {} No languages configured or cached. Add clone snapshots and run {}",
            style("[--]").dim(),
            style("clonetrail lineage --language <lang>").cyan()
        );
        println!();
        return Ok(());
    }

    for language in &languages {
        let store = ws.store(language);
        let cov = coverage(&store, &commits, lineage_cfg.lookback_depth);

        println!("  {}", style(language).bold());
        println!(
            "    snapshots {}/{}  moving-lines {}/{}  modified-clones {}/{}",
            cov.snapshots, cov.commits, cov.moving_lines, cov.steps, cov.modified_clones, cov.steps
        );
        for (label, path) in [
            ("lineage.csv", store.layout().lineage_csv()),
            ("metrics.json", store.layout().metrics_json()),
        ] {
            if path.is_file() {
                println!("    {} {}", style("[OK]").green(), label);
            } else {
                println!("    {} {}", style("[--]").dim(), label);
            }
        }

        let listed = cov.commits.min(MAX_LISTED);
        if listed > 0 {
            println!("    {}", style("S M C  commit        message").dim());
        }
        for (i, commit) in commits.iter().take(listed).enumerate() {
            let step = commits.get(i + 1).filter(|_| i + 1 < cov.commits);
            let (ml, mc) = match step {
                Some(parent) => (
                    store.has_moving_lines(&commit.hash, &parent.hash),
                    store.has_modified_clones(&commit.hash, &parent.hash),
                ),
                None => (false, false),
            };
            println!(
                "    {} {} {}  {}  {}",
                mark(store.has_snapshot(&commit.hash)),
                mark(ml),
                mark(mc),
                style(short(&commit.hash)).yellow(),
                commit.message
            );
        }
        if cov.commits > listed {
            println!("    {}", style(format!("...and {} more", cov.commits - listed)).dim());
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactLayout;
    use crate::lineage::DiffHunk;
    use crate::models::CloneSnapshot;

    fn commit(hash: &str) -> CommitInfo {
        CommitInfo {
            hash: hash.into(),
            short_hash: hash.into(),
            parents: Vec::new(),
            author: "a".into(),
            timestamp: String::new(),
            message: String::new(),
        }
    }

    #[test]
    fn test_coverage_counts_window_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(ArtifactLayout::new(dir.path(), "java"));
        let commits: Vec<CommitInfo> = ["c3", "c2", "c1", "c0"].into_iter().map(commit).collect();

        for c in ["c3", "c2", "c0"] {
            store.save_snapshot(&CloneSnapshot::new(c, Vec::new()))?;
        }
        store.save_moving_lines("c3", "c2", &[DiffHunk::unchanged("a.java", None)])?;
        store.save_moving_lines("c1", "c0", &[])?;
        store.save_modified_clones("c3", "c2", &[])?;

        let cov = coverage(&store, &commits, 2);
        assert_eq!(
            cov,
            Coverage {
                commits: 3,
                snapshots: 2,
                steps: 2,
                moving_lines: 1,
                modified_clones: 1,
            }
        );

        let all = coverage(&store, &commits, 10);
        assert_eq!(all.snapshots, 3);
        assert_eq!(all.moving_lines, 2);
        Ok(())
    }

    #[test]
    fn test_status_runs_outside_git() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ws = Workspace::open(dir.path(), Some(&dir.path().join("cache")))?;
        run(&ws, vec!["python".into()])?;
        run(&ws, Vec::new())
    }
}
