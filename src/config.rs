//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.opcache-scripts.toml` files.

use crate::cli::OutputFormat;
use crate::models::SortKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".opcache-scripts.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Snapshot source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Output settings.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where and how snapshots are fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient HTTP failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Cluster to select from a multi-cluster document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            cluster: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

/// How the script listing is rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Column to order rows by.
    #[serde(default)]
    pub sort: SortKey,

    /// Largest values first.
    #[serde(default = "default_true")]
    pub descending: bool,

    /// Include the creation time column.
    #[serde(default)]
    pub show_created: bool,

    /// Render timestamps in UTC instead of local time.
    #[serde(default)]
    pub utc: bool,

    /// Maximum rows to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            sort: SortKey::default(),
            descending: true,
            show_created: false,
            utc: false,
            limit: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.source.retries = retries;
        }
        if let Some(ref cluster) = args.cluster {
            self.source.cluster = Some(cluster.clone());
        }

        if let Some(format) = args.format {
            self.display.format = format;
        }
        if let Some(sort) = args.sort {
            self.display.sort = sort;
        }
        if let Some(limit) = args.limit {
            self.display.limit = Some(limit);
        }

        // Flags always override
        if args.ascending {
            self.display.descending = false;
        }
        if args.show_created {
            self.display.show_created = true;
        }
        if args.utc {
            self.display.utc = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
