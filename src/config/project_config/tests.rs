use super::*;

#[test]
fn test_default_config() {
    let config = ProjectConfig::default();
    assert_eq!(config.lineage.lookback_depth, 20);
    assert_eq!(config.lineage.max_commits, 200);
    assert_eq!(config.lineage.sample_interval, 1);
    assert!(config.file_types.test.is_empty());
    assert!(config.services.boundary_map.is_none());
    assert!(config.defaults.languages.is_empty());
}

#[test]
fn test_parse_toml_config() {
    let toml_content = r#"
[lineage]
lookback_depth = 5

[file_types]
test = ["^e2e/", "_it\\.py$"]

[services]
boundary_map = "contexts.json"
loc = "/abs/loc.json"

[output]
format = "json"

[defaults]
languages = ["python", "java"]
workers = 4
"#;

    let config: ProjectConfig = toml::from_str(toml_content).expect("parse project config");
    assert_eq!(config.lineage.lookback_depth, 5);
    // unspecified fields keep their defaults
    assert_eq!(config.lineage.max_commits, 200);
    assert_eq!(config.file_types.test.len(), 2);
    assert_eq!(config.output.format.as_deref(), Some("json"));
    assert_eq!(config.defaults.languages, vec!["python", "java"]);
    assert_eq!(config.defaults.workers, Some(4));

    let repo = Path::new("/repo");
    assert_eq!(
        config.boundary_map_path(repo),
        Some(PathBuf::from("/repo/contexts.json"))
    );
    assert_eq!(config.loc_path(repo), Some(PathBuf::from("/abs/loc.json")));
}

#[test]
fn test_load_prefers_toml() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join(CONFIG_FILE), "[lineage]\nlookback_depth = 3\n")?;
    std::fs::write(
        dir.path().join(JSON_CONFIG_FILE),
        r#"{"lineage": {"lookback_depth": 9}}"#,
    )?;
    assert_eq!(load_project_config(dir.path()).lineage.lookback_depth, 3);
    Ok(())
}

#[test]
fn test_invalid_toml_falls_back_to_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join(CONFIG_FILE), "[lineage\nbroken")?;
    std::fs::write(
        dir.path().join(JSON_CONFIG_FILE),
        r#"{"lineage": {"lookback_depth": 9}}"#,
    )?;
    assert_eq!(load_project_config(dir.path()).lineage.lookback_depth, 9);
    Ok(())
}

#[test]
fn test_missing_config_uses_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    assert_eq!(load_project_config(dir.path()), ProjectConfig::default());
    Ok(())
}
