//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::SortKey;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// opcache-scripts - cluster-wide OPcache script statistics
///
/// Reads a snapshot of per-host OPcache status for every group of a cluster,
/// merges the per-host script entries into one row per script and prints
/// the result as a table, Markdown or JSON.
///
/// Examples:
///   opcache-scripts --input status.json
///   opcache-scripts --input http://collector:8080/status --cluster prod
///   curl -s http://collector/status | opcache-scripts --input - --format json
///   opcache-scripts --input status.json --sort memory --limit 20
///   opcache-scripts --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Snapshot to read: a file path, an http(s) URL, or `-` for stdin
    #[arg(short, long, value_name = "PATH|URL|-", required_unless_present = "init_config")]
    pub input: Option<String>,

    /// Cluster to select when the document is keyed by cluster name
    ///
    /// Without this flag the document is read as a single cluster
    /// (groups at the top level).
    #[arg(long, value_name = "NAME", env = "OPCACHE_SCRIPTS_CLUSTER")]
    pub cluster: Option<String>,

    /// Output format (table, markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Column to order rows by
    #[arg(long, value_name = "KEY")]
    pub sort: Option<SortKey>,

    /// Order rows ascending instead of descending
    #[arg(long)]
    pub ascending: bool,

    /// Show at most this many rows
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Include the creation time column
    #[arg(long)]
    pub show_created: bool,

    /// Render timestamps in UTC instead of local time
    #[arg(long)]
    pub utc: bool,

    /// Write the output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries for transient HTTP failures
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .opcache-scripts.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress spinner)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .opcache-scripts.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the script listing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned plain-text table (default)
    #[default]
    Table,
    /// Markdown document with a summary section
    Markdown,
    /// JSON array of script records
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the input argument, empty if not set (should be validated first).
    pub fn input(&self) -> &str {
        self.input.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.input().trim().is_empty() {
            return Err("Input must be a file path, an http(s) URL or '-'".to_string());
        }

        if let Some(ref cluster) = self.cluster {
            if cluster.trim().is_empty() {
                return Err("Cluster name must not be empty".to_string());
            }
        }

        if self.limit == Some(0) {
            return Err("Limit must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
