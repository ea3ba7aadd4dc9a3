//! Script listing generation.
//!
//! This module renders aggregated script statuses as a plain-text table,
//! a Markdown report or JSON.

use super::format::{format_bytes, format_timestamp, TimeZoneMode};
use crate::cli::OutputFormat;
use crate::models::{AggregatedScriptStatus, ScriptSummary, SnapshotStats};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Shown instead of a table when nothing is cached anywhere.
pub const EMPTY_MESSAGE: &str = "No scripts found";

/// Rendering options shared by all formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Output format.
    pub format: OutputFormat,
    /// Include the creation time column.
    pub show_created: bool,
    /// Time zone for timestamps.
    pub time_zone: TimeZoneMode,
}

impl From<&crate::config::DisplayConfig> for RenderOptions {
    fn from(config: &crate::config::DisplayConfig) -> Self {
        Self {
            format: config.format,
            show_created: config.show_created,
            time_zone: if config.utc {
                TimeZoneMode::Utc
            } else {
                TimeZoneMode::Local
            },
        }
    }
}

/// Metadata about where the listing came from.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Snapshot source as given on the command line.
    pub source: String,
    /// Selected cluster, if the document was multi-cluster.
    pub cluster: Option<String>,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Shape of the snapshot.
    pub snapshot: SnapshotStats,
}

/// Everything needed to render a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    /// Metadata about the report.
    pub metadata: ReportMetadata,
    /// Totals over all aggregated scripts, before any row limit.
    pub summary: ScriptSummary,
    /// Rows to render, already ordered.
    pub scripts: Vec<AggregatedScriptStatus>,
}

/// Render a report in the configured format.
pub fn render(report: &ScriptReport, options: &RenderOptions) -> Result<String> {
    match options.format {
        OutputFormat::Table => Ok(generate_table(&report.scripts, options)),
        OutputFormat::Markdown => Ok(generate_markdown_report(report, options)),
        OutputFormat::Json => generate_json_report(&report.scripts),
    }
}

/// Column headers and cell values for each row.
fn table_rows(
    scripts: &[AggregatedScriptStatus],
    options: &RenderOptions,
) -> (Vec<&'static str>, Vec<Vec<String>>) {
    let mut headers = vec!["Script", "Hits", "Size", "Last used"];
    if options.show_created {
        headers.push("Created");
    }

    let rows = scripts
        .iter()
        .map(|s| {
            let mut row = vec![
                s.script_path.clone(),
                s.hits.to_string(),
                format_bytes(s.memory_bytes),
                format_timestamp(s.last_used_timestamp, options.time_zone),
            ];
            if options.show_created {
                row.push(format_timestamp(s.create_timestamp, options.time_zone));
            }
            row
        })
        .collect();

    (headers, rows)
}

/// Generate an aligned plain-text table.
pub fn generate_table(scripts: &[AggregatedScriptStatus], options: &RenderOptions) -> String {
    if scripts.is_empty() {
        return format!("{}\n", EMPTY_MESSAGE);
    }

    let (headers, rows) = table_rows(scripts, options);

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    output.push_str(&format_table_line(&header_cells, &widths));

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&format_table_line(&rule, &widths));

    for row in &rows {
        output.push_str(&format_table_line(row, &widths));
    }

    output
}

/// Script path left-aligned, everything else right-aligned.
fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            if i == 0 {
                format!("{:<width$}", cell, width = *width)
            } else {
                format!("{:>width$}", cell, width = *width)
            }
        })
        .collect();

    format!("{}\n", line.join("  ").trim_end())
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &ScriptReport, options: &RenderOptions) -> String {
    let mut output = String::new();

    output.push_str("# OPcache Scripts\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary, options));
    output.push_str(&generate_scripts_section(&report.scripts, options));

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    if let Some(ref cluster) = metadata.cluster {
        section.push_str(&format!("- **Cluster:** {}\n", cluster));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Groups:** {}\n", metadata.snapshot.groups));
    section.push_str(&format!(
        "- **Hosts:** {} ({} with cached scripts)\n",
        metadata.snapshot.hosts, metadata.snapshot.hosts_with_scripts
    ));
    section.push('\n');

    section
}

fn generate_summary_section(summary: &ScriptSummary, options: &RenderOptions) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Scripts | Total hits | Total size | Oldest entry | Latest use |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");

    let time_or_dash = |t: Option<i64>| {
        t.map(|t| format_timestamp(t, options.time_zone))
            .unwrap_or_else(|| "-".to_string())
    };

    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        summary.scripts,
        summary.total_hits,
        format_bytes(summary.total_memory_bytes),
        time_or_dash(summary.oldest_create_timestamp),
        time_or_dash(summary.latest_used_timestamp),
    ));

    section
}

fn generate_scripts_section(scripts: &[AggregatedScriptStatus], options: &RenderOptions) -> String {
    let mut section = String::new();

    section.push_str("## Scripts\n\n");

    if scripts.is_empty() {
        section.push_str(&format!("{}.\n", EMPTY_MESSAGE));
        return section;
    }

    let (headers, rows) = table_rows(scripts, options);

    section.push_str(&format!("| {} |\n", headers.join(" | ")));
    let align: Vec<&str> = headers
        .iter()
        .enumerate()
        .map(|(i, _)| if i == 0 { ":---" } else { "---:" })
        .collect();
    section.push_str(&format!("| {} |\n", align.join(" | ")));

    for mut row in rows {
        row[0] = format!("`{}`", row[0].replace('|', "\\|"));
        section.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    section.push('\n');

    section
}

/// Generate a JSON array of script records.
pub fn generate_json_report(scripts: &[AggregatedScriptStatus]) -> Result<String> {
    serde_json::to_string_pretty(scripts).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts() -> Vec<AggregatedScriptStatus> {
        vec![
            AggregatedScriptStatus {
                id: 0,
                script_path: "/srv/app/index.php".to_string(),
                create_timestamp: 90,
                last_used_timestamp: 1_700_000_000,
                hits: 8,
                memory_bytes: 1536,
            },
            AggregatedScriptStatus {
                id: 1,
                script_path: "/srv/app/lib.php".to_string(),
                create_timestamp: 0,
                last_used_timestamp: 0,
                hits: 12_345,
                memory_bytes: 964,
            },
        ]
    }

    fn utc_options(format: OutputFormat) -> RenderOptions {
        RenderOptions {
            format,
            show_created: false,
            time_zone: TimeZoneMode::Utc,
        }
    }

    fn create_test_report(scripts: Vec<AggregatedScriptStatus>) -> ScriptReport {
        ScriptReport {
            metadata: ReportMetadata {
                source: "status.json".to_string(),
                cluster: Some("prod".to_string()),
                generated_at: Utc::now(),
                snapshot: SnapshotStats {
                    groups: 1,
                    hosts: 3,
                    hosts_with_scripts: 2,
                },
            },
            summary: ScriptSummary::from_statuses(&scripts),
            scripts,
        }
    }

    #[test]
    fn test_generate_table() {
        let table = generate_table(&scripts(), &utc_options(OutputFormat::Table));
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Script"));
        assert!(lines[0].ends_with("Last used"));
        assert!(lines[1].starts_with("------"));
        assert!(lines[2].starts_with("/srv/app/index.php"));
        assert!(lines[2].contains("1.54 kB"));
        assert!(lines[2].ends_with("2023-11-14 22:13:20"));
        assert!(lines[3].contains("12345"));
        assert!(lines[3].contains("964 B"));
        assert!(!table.contains("Created"));
    }

    #[test]
    fn test_generate_table_columns_align() {
        let table = generate_table(&scripts(), &utc_options(OutputFormat::Table));
        let lengths: Vec<usize> = table.lines().map(|l| l.chars().count()).collect();
        assert!(lengths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_generate_table_with_created() {
        let mut options = utc_options(OutputFormat::Table);
        options.show_created = true;

        let table = generate_table(&scripts(), &options);
        assert!(table.lines().next().unwrap().ends_with("Created"));
        assert!(table.contains("1970-01-01 00:01:30"));
    }

    #[test]
    fn test_generate_table_empty() {
        let table = generate_table(&[], &utc_options(OutputFormat::Table));
        assert_eq!(table, "No scripts found\n");
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report(scripts());
        let markdown = generate_markdown_report(&report, &utc_options(OutputFormat::Markdown));

        assert!(markdown.contains("# OPcache Scripts"));
        assert!(markdown.contains("- **Cluster:** prod"));
        assert!(markdown.contains("- **Hosts:** 3 (2 with cached scripts)"));
        assert!(markdown.contains("| 2 | 12353 | 2.5 kB | 1970-01-01 00:00:00 | 2023-11-14 22:13:20 |"));
        assert!(markdown.contains("| `/srv/app/index.php` | 8 | 1.54 kB | 2023-11-14 22:13:20 |"));
    }

    #[test]
    fn test_generate_markdown_report_empty() {
        let report = create_test_report(vec![]);
        let markdown = generate_markdown_report(&report, &utc_options(OutputFormat::Markdown));

        assert!(markdown.contains("No scripts found."));
        assert!(markdown.contains("| 0 | 0 | 0 B | - | - |"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&scripts()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["script"], "/srv/app/index.php");
        assert_eq!(value[0]["memory"], 1536);
        assert_eq!(value[1]["lastUsedTimestamp"], 0);
        assert_eq!(value[1]["id"], 1);
    }

    #[test]
    fn test_render_dispatches_on_format() {
        let report = create_test_report(scripts());

        let json = render(&report, &utc_options(OutputFormat::Json)).unwrap();
        assert!(json.trim_start().starts_with('['));

        let table = render(&report, &utc_options(OutputFormat::Table)).unwrap();
        assert!(table.starts_with("Script"));
    }
}
