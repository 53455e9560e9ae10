//! CLI command definitions and handlers

mod init;
mod lineage;
mod metrics;
mod moving_lines;
mod status;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::artifacts::ArtifactStore;
use crate::cache::{get_cache_dir, ArtifactLayout};
use crate::config::{load_project_config, ProjectConfig};

/// Workers used when neither the flag nor the config sets a count
const DEFAULT_WORKERS: usize = 4;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// clonetrail - cross-service clone lineage and co-modification metrics
#[derive(Parser, Debug)]
#[command(name = "clonetrail")]
#[command(
    version,
    about = "Trace code clones through git history and measure co-modification coupling between services",
    long_about = "clonetrail threads the clone fragments of a head commit back through a sampled \
first-parent history, records every commit in which each fragment was added or modified, \
and aggregates co-modification metrics per service, clone set and file.\n\n\
Clone snapshots are produced by an external clone detector and placed under \
<cache-dir>/<language>/clones/<commit>.json.",
    after_help = "\
Examples:
  clonetrail init                                  Write an example clonetrail.toml
  clonetrail lineage --language python             Diff, thread and write lineage.csv
  clonetrail lineage -l java -l python --depth 50  Two languages, 50 steps back
  clonetrail metrics -l python -f markdown         Aggregate and render metrics
  clonetrail status                                Artifact coverage per commit"
)]
pub struct Cli {
    /// Path to repository (default: current directory), given before the command
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace), overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Artifact root (default: user cache dir, or [output] cache_dir)
    #[arg(long, global = true, env = "CLONETRAIL_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a clonetrail.toml config file with example settings
    Init,

    /// Diff one commit pair and store its moving-lines artifact
    ///
    /// Also classifies the child's fragments into the modified-clones artifact
    /// when both commits have clone snapshots and the diff touched a file of interest.
    #[command(after_help = "\
Examples:
  clonetrail moving-lines HEAD HEAD~1 --language python
  clonetrail moving-lines 3f2c1ab 9e8d7c6 -l java")]
    MovingLines {
        /// Child (newer) commit
        child: String,

        /// Parent (older) commit
        parent: String,

        /// Language of the clone snapshots
        #[arg(long, short = 'l')]
        language: String,
    },

    /// Thread head fragments back through history and write lineage.csv
    #[command(after_help = "\
Examples:
  clonetrail lineage -l python                 Use [lineage] settings from clonetrail.toml
  clonetrail lineage -l python --depth 5       Only look five analyzed commits back
  clonetrail lineage -l python --rev v2.0      Start from a tag instead of HEAD
  clonetrail lineage -l python --no-diff       Thread existing artifacts only")]
    Lineage {
        /// Languages to process, one unit each (default: [defaults] languages)
        #[arg(long, short = 'l')]
        language: Vec<String>,

        /// Maximum threading steps (default: [lineage] lookback_depth)
        #[arg(long)]
        depth: Option<usize>,

        /// Revision the walk starts from
        #[arg(long, default_value = "HEAD")]
        rev: String,

        /// Commits enumerated from the start revision, 0 = all (default: [lineage] max_commits)
        #[arg(long)]
        max_commits: Option<usize>,

        /// Keep every Nth first-parent commit (default: [lineage] sample_interval)
        #[arg(long)]
        sample_interval: Option<usize>,

        /// Do not run git diffs, thread the artifacts already on disk
        #[arg(long)]
        no_diff: bool,
    },

    /// Aggregate clone metrics from lineage.csv
    #[command(after_help = "\
Examples:
  clonetrail metrics -l python                                  Text report
  clonetrail metrics -l python --services contexts.json --loc loc.json
  clonetrail metrics -l java -f json -o metrics-java.json       JSON to a file")]
    Metrics {
        /// Language to aggregate (default: first of [defaults] languages)
        #[arg(long, short = 'l')]
        language: Option<String>,

        /// Service boundary map {context_path: [service]} (default: [services] boundary_map)
        #[arg(long)]
        services: Option<PathBuf>,

        /// Per-service total LOC {service: loc} (default: [services] loc)
        #[arg(long)]
        loc: Option<PathBuf>,

        /// Output format: text, json, markdown (or md)
        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show artifact availability per analyzed commit
    Status {
        /// Languages to inspect (default: configured or cached languages)
        #[arg(long, short = 'l')]
        language: Vec<String>,
    },

    /// Show version information
    Version,
}

/// Repository path, project config and artifact root shared by the handlers.
pub(crate) struct Workspace {
    repo_path: PathBuf,
    config: ProjectConfig,
    cache_root: PathBuf,
}

impl Workspace {
    pub(crate) fn open(path: &Path, cache_dir: Option<&Path>) -> Result<Self> {
        let repo_path = path
            .canonicalize()
            .with_context(|| format!("Path does not exist: {}", path.display()))?;
        let config = load_project_config(&repo_path);

        let cache_root = match (cache_dir, config.output.cache_dir.as_deref()) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => ProjectConfig::resolve_path(&repo_path, dir),
            (None, None) => get_cache_dir(&repo_path),
        };

        Ok(Self {
            repo_path,
            config,
            cache_root,
        })
    }

    pub(crate) fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub(crate) fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub(crate) fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub(crate) fn store(&self, language: &str) -> ArtifactStore {
        ArtifactStore::new(ArtifactLayout::new(&self.cache_root, language))
    }

    /// Languages from the command line, else from `[defaults] languages`.
    pub(crate) fn languages(&self, given: Vec<String>) -> Result<Vec<String>> {
        let languages = if given.is_empty() {
            self.config.defaults.languages.clone()
        } else {
            given
        };
        if languages.is_empty() {
            anyhow::bail!(
                "No language given. Pass --language or set [defaults] languages in {}",
                crate::config::CONFIG_FILE
            );
        }
        Ok(languages)
    }

    /// Languages with an artifact directory under the cache root.
    pub(crate) fn cached_languages(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.cache_root) else {
            return Vec::new();
        };
        let mut languages: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().join("clones").is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        languages.sort();
        languages
    }

    fn workers(&self, flag: Option<usize>) -> usize {
        flag.or(self.config.defaults.workers)
            .unwrap_or(DEFAULT_WORKERS)
            .clamp(1, 64)
    }
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Init) => init::run(&cli.path),

        Some(Commands::MovingLines {
            child,
            parent,
            language,
        }) => {
            let ws = Workspace::open(&cli.path, cli.cache_dir.as_deref())?;
            moving_lines::run(&ws, &child, &parent, &language)
        }

        Some(Commands::Lineage {
            language,
            depth,
            rev,
            max_commits,
            sample_interval,
            no_diff,
        }) => {
            let ws = Workspace::open(&cli.path, cli.cache_dir.as_deref())?;
            let lineage_cfg = &ws.config().lineage;
            let options = lineage::LineageOptions {
                languages: ws.languages(language)?,
                depth: depth.unwrap_or(lineage_cfg.lookback_depth),
                rev,
                max_commits: max_commits.unwrap_or(lineage_cfg.max_commits),
                sample_interval: sample_interval.unwrap_or(lineage_cfg.sample_interval),
                no_diff,
                workers: ws.workers(cli.workers),
            };
            lineage::run(&ws, &options)
        }

        Some(Commands::Metrics {
            language,
            services,
            loc,
            format,
            output,
        }) => {
            let ws = Workspace::open(&cli.path, cli.cache_dir.as_deref())?;
            let language = match language {
                Some(l) => l,
                None => ws
                    .languages(Vec::new())?
                    .into_iter()
                    .next()
                    .context("No language configured")?,
            };
            metrics::run(
                &ws,
                &language,
                services.as_deref(),
                loc.as_deref(),
                format.as_deref(),
                output.as_deref(),
            )
        }

        Some(Commands::Status { language }) => {
            let ws = Workspace::open(&cli.path, cli.cache_dir.as_deref())?;
            status::run(&ws, language)
        }

        Some(Commands::Version) => {
            println!("clonetrail {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }

        None => {
            // Check if the path looks like an unknown subcommand
            check_unknown_subcommand(&cli.path)?;
            let ws = Workspace::open(&cli.path, cli.cache_dir.as_deref())?;
            status::run(&ws, Vec::new())
        }
    }
}

fn check_unknown_subcommand(path: &Path) -> Result<()> {
    let path_str = path.to_string_lossy();
    let looks_like_command = !path.exists()
        && !path_str.contains('/')
        && !path_str.contains('\\')
        && !path_str.starts_with('.');
    if !looks_like_command {
        return Ok(());
    }
    let known_commands = [
        "init",
        "moving-lines",
        "lineage",
        "metrics",
        "status",
        "version",
    ];
    if !known_commands.contains(&path_str.as_ref()) {
        anyhow::bail!(
            "Unknown command '{}'. Run 'clonetrail --help' for available commands.\n\nDid you mean one of: {}?",
            path_str,
            known_commands.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers_bounds() {
        assert_eq!(parse_workers("8"), Ok(8));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_lineage_flags_parse() {
        let cli = Cli::parse_from([
            "clonetrail",
            "lineage",
            "-l",
            "java",
            "-l",
            "python",
            "--depth",
            "5",
            "--no-diff",
        ]);
        match cli.command {
            Some(Commands::Lineage {
                language,
                depth,
                rev,
                no_diff,
                ..
            }) => {
                assert_eq!(language, vec!["java", "python"]);
                assert_eq!(depth, Some(5));
                assert_eq!(rev, "HEAD");
                assert!(no_diff);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.path, PathBuf::from("."));
    }

    #[test]
    fn test_unknown_subcommand_detected() {
        assert!(check_unknown_subcommand(Path::new("frobnicate")).is_err());
        assert!(check_unknown_subcommand(Path::new("./some/dir")).is_ok());
    }

    #[test]
    fn test_workspace_cache_dir_precedence() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join(crate::config::CONFIG_FILE),
            "[output]\ncache_dir = \"artifacts\"\n\n[defaults]\nlanguages = [\"go\"]\n",
        )?;

        let ws = Workspace::open(dir.path(), None)?;
        assert_eq!(ws.cache_root(), ws.repo_path().join("artifacts"));
        assert_eq!(ws.languages(Vec::new())?, vec!["go"]);
        assert_eq!(ws.languages(vec!["rust".into()])?, vec!["rust"]);

        let explicit = dir.path().join("elsewhere");
        let ws = Workspace::open(dir.path(), Some(&explicit))?;
        assert_eq!(ws.cache_root(), explicit.as_path());
        Ok(())
    }

    #[test]
    fn test_languages_required() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ws = Workspace::open(dir.path(), Some(dir.path()))?;
        assert!(ws.languages(Vec::new()).is_err());
        assert!(ws.cached_languages().is_empty());
        Ok(())
    }
}
