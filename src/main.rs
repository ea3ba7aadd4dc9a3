//! opcache-scripts - cluster-wide OPcache script statistics
//!
//! A CLI tool that reads per-host OPcache status for a cluster and prints one
//! aggregated row per cached script.
//!
//! Exit codes:
//!   0 - Success (including an empty listing)
//!   1 - Any error (unreadable snapshot, malformed entry, bad config, etc.)

use anyhow::{Context, Result};
use chrono::Utc;
use opcache_scripts::analysis::{self, aggregate, snapshot_stats};
use opcache_scripts::cli::Args;
use opcache_scripts::config::{Config, CONFIG_FILE_NAME};
use opcache_scripts::models::ScriptSummary;
use opcache_scripts::report::{self, RenderOptions, ReportMetadata, ScriptReport};
use opcache_scripts::source::{self, SnapshotSource, SourceOptions};
use std::io::Write;
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    debug!("opcache-scripts v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .opcache-scripts.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` wins when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load, aggregate and render one snapshot.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let source = SnapshotSource::parse(args.input());
    let mut source_options = SourceOptions::from(&config.source);
    source_options.show_progress = !args.quiet;

    info!("Loading snapshot from {}", source);
    let snapshot = source::load_snapshot(&source, &source_options, config.source.cluster.as_deref())
        .await
        .with_context(|| format!("Failed to load snapshot from {}", source))?;

    let stats = snapshot_stats(&snapshot);
    info!(
        "Snapshot has {} groups, {} hosts ({} with cached scripts)",
        stats.groups, stats.hosts, stats.hosts_with_scripts
    );

    let mut statuses = aggregate(&snapshot).context("Failed to aggregate snapshot")?;
    let summary = ScriptSummary::from_statuses(&statuses);
    info!(
        "Aggregated {} scripts with {} hits in total",
        summary.scripts, summary.total_hits
    );

    analysis::sort_statuses(&mut statuses, config.display.sort, config.display.descending);
    if let Some(limit) = config.display.limit {
        statuses.truncate(limit);
    }

    let report = ScriptReport {
        metadata: ReportMetadata {
            source: source.to_string(),
            cluster: config.source.cluster.clone(),
            generated_at: Utc::now(),
            snapshot: stats,
        },
        summary,
        scripts: statuses,
    };

    let output = report::render(&report, &RenderOptions::from(&config.display))?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Output saved to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.as_bytes())
                .context("Failed to write output")?;
            if !output.ends_with('\n') {
                writeln!(stdout).context("Failed to write output")?;
            }
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
