//! CLI contract tests
//!
//! Runs the built binary against a throwaway git repository with its own
//! artifact root, so tests never touch the user cache directory.

use std::path::Path;
use std::process::{Command, Output};

use clonetrail::artifacts::ArtifactStore;
use clonetrail::cache::ArtifactLayout;
use clonetrail::models::{CloneFragment, CloneSet, CloneSnapshot, EventKind};

fn clonetrail_bin() -> &'static str {
    env!("CARGO_BIN_EXE_clonetrail")
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(clonetrail_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("CLONETRAIL_CACHE_DIR")
        .output()
        .expect("failed to run clonetrail")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .expect("failed to run git");
    assert!(status.status.success(), "git {:?} failed", args);
}

fn head(dir: &Path) -> String {
    let out = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn snapshot(commit: &str) -> CloneSnapshot {
    CloneSnapshot::new(
        commit,
        vec![CloneSet {
            clone_id: 4,
            fragments: vec![
                CloneFragment::new("orders/pricing.py", 1, 4),
                CloneFragment::new("billing/pricing.py", 1, 4),
            ],
        }],
    )
}

/// Two commits; the second edits both clone fragments.
fn setup_repo() -> (tempfile::TempDir, tempfile::TempDir) {
    let repo = tempfile::tempdir().expect("temp repo");
    let cache = tempfile::tempdir().expect("temp cache");
    let dir = repo.path();

    git(dir, &["init", "-q"]);
    for service in ["orders", "billing"] {
        std::fs::create_dir_all(dir.join(service)).expect("mkdir");
        std::fs::write(dir.join(service).join("pricing.py"), "a\nb\nc\nd\n").expect("write");
    }
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", "base"]);
    let base = head(dir);

    for service in ["orders", "billing"] {
        std::fs::write(dir.join(service).join("pricing.py"), "a\nB\nc\nd\n").expect("write");
    }
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", "edit both"]);
    let edit = head(dir);

    let store = ArtifactStore::new(ArtifactLayout::new(cache.path(), "python"));
    store.save_snapshot(&snapshot(&base)).expect("base snapshot");
    store.save_snapshot(&snapshot(&edit)).expect("edit snapshot");

    std::fs::write(
        dir.join("contexts.json"),
        r#"{"orders": ["orders"], "billing": ["billing"]}"#,
    )
    .expect("write contexts");

    (repo, cache)
}

#[test]
fn test_version() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(dir.path(), &["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("clonetrail "));
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(dir.path(), &["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["init", "moving-lines", "lineage", "metrics", "status"] {
        assert!(text.contains(command), "help lacks {}", command);
    }
}

#[test]
fn test_unknown_command_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(dir.path(), &["frobnicate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("frobnicate"));
}

#[test]
fn test_init_writes_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(dir.path(), &["init"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let config = std::fs::read_to_string(dir.path().join("clonetrail.toml")).expect("config");
    assert!(config.contains("[lineage]"));
}

#[test]
fn test_lineage_then_metrics_json() {
    let (repo, cache) = setup_repo();
    let cache_dir = cache.path().to_str().expect("utf-8 path");

    let output = run(
        repo.path(),
        &["lineage", "--language", "python", "--cache-dir", cache_dir],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let csv = std::fs::read_to_string(cache.path().join("python").join("lineage.csv")).expect("csv");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("clone_id;index;file_path;start_line;end_line;start_column;end_column;modification")
    );
    assert_eq!(csv.lines().count(), 3);
    let rows = clonetrail::artifacts::read_lineage_csv(&cache.path().join("python").join("lineage.csv"))
        .expect("lineage rows");
    assert!(rows
        .iter()
        .any(|r| r.modification.iter().any(|e| e.kind == EventKind::Modified)));

    let output = run(
        repo.path(),
        &[
            "metrics",
            "-l",
            "python",
            "--services",
            "contexts.json",
            "-f",
            "json",
            "--cache-dir",
            cache_dir,
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("metrics JSON");
    assert_eq!(report["clone_set"][0]["clone_id"], 4);
    assert_eq!(report["clone_set"][0]["comod_count"], 1);
    assert_eq!(report["clone_set"][0]["service_count"], 2);
    assert_eq!(report["service"].as_array().expect("services").len(), 2);
    assert!(cache.path().join("python").join("metrics.json").is_file());
}

#[test]
fn test_moving_lines_command() {
    let (repo, cache) = setup_repo();
    let cache_dir = cache.path().to_str().expect("utf-8 path");

    let output = run(
        repo.path(),
        &["moving-lines", "HEAD", "HEAD~1", "-l", "python", "--cache-dir", cache_dir],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("modified-clones: 1 clone set(s)"));

    let entries = std::fs::read_dir(cache.path().join("python").join("moving_lines"))
        .expect("moving_lines dir")
        .count();
    assert_eq!(entries, 1);
}

#[test]
fn test_lineage_without_snapshots_fails() {
    let (repo, _cache) = setup_repo();
    let empty = tempfile::tempdir().expect("temp cache");
    let output = run(
        repo.path(),
        &[
            "lineage",
            "-l",
            "python",
            "--cache-dir",
            empty.path().to_str().expect("utf-8 path"),
        ],
    );
    assert!(!output.status.success());
}

#[test]
fn test_metrics_requires_lineage() {
    let (repo, cache) = setup_repo();
    let output = run(
        repo.path(),
        &[
            "metrics",
            "-l",
            "python",
            "--cache-dir",
            cache.path().to_str().expect("utf-8 path"),
        ],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("clonetrail lineage --language python"));
}
