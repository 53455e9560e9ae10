//! Configuration module for clonetrail
//!
//! This module handles:
//! - Project-level configuration (clonetrail.toml)
//! - History walk bounds
//! - File type overrides and service inputs
//! - CLI defaults

mod project_config;

pub use project_config::{
    load_project_config, CliDefaults, FileTypesConfig, LineageConfig, OutputConfig,
    ProjectConfig, ServicesConfig, CONFIG_FILE, JSON_CONFIG_FILE,
};
