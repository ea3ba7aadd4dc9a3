//! Snapshot loading.
//!
//! This module reads a cluster snapshot document from a file, stdin or a
//! collector's HTTP status endpoint, and selects a cluster from
//! multi-cluster documents.

use crate::models::{ClusterSnapshot, MultiClusterDocument};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Where a snapshot document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// A JSON file on disk.
    File(PathBuf),
    /// JSON piped on standard input.
    Stdin,
    /// A collector status endpoint.
    Http(String),
}

impl SnapshotSource {
    /// Interpret a command-line input argument.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input == "-" {
            Self::Stdin
        } else if input.starts_with("http://") || input.starts_with("https://") {
            Self::Http(input.to_string())
        } else {
            Self::File(PathBuf::from(input))
        }
    }
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::File(path) => write!(f, "{}", path.display()),
            SnapshotSource::Stdin => write!(f, "<stdin>"),
            SnapshotSource::Http(url) => write!(f, "{}", url),
        }
    }
}

/// Options for fetching a snapshot.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Retries for transient HTTP failures.
    pub retries: u32,
    /// Whether to show a spinner while fetching.
    pub show_progress: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retries: 2,
            show_progress: false,
        }
    }
}

impl From<&crate::config::SourceConfig> for SourceOptions {
    fn from(config: &crate::config::SourceConfig) -> Self {
        Self {
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
            show_progress: false,
        }
    }
}

/// Why a snapshot could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read snapshot file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read snapshot from stdin")]
    Stdin(#[source] std::io::Error),

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("snapshot is not a valid status document")]
    Json(#[from] serde_json::Error),

    #[error("cluster `{name}` not found in snapshot (available: {})", .available.join(", "))]
    UnknownCluster { name: String, available: Vec<String> },
}

/// Read the raw snapshot document.
pub async fn load_document(
    source: &SnapshotSource,
    options: &SourceOptions,
) -> Result<String, SourceError> {
    match source {
        SnapshotSource::File(path) => {
            debug!("Reading snapshot file: {}", path.display());
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })
        }
        SnapshotSource::Stdin => {
            debug!("Reading snapshot from stdin");
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .map_err(SourceError::Stdin)?;
            Ok(content)
        }
        SnapshotSource::Http(url) => fetch_document(url, options).await,
    }
}

async fn fetch_document(url: &str, options: &SourceOptions) -> Result<String, SourceError> {
    let http_error = |source: reqwest::Error| SourceError::Http {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(options.timeout_seconds))
        .build()
        .map_err(http_error)?;

    let spinner = options.show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Fetching {}", url));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let mut attempt = 0;
    let result = loop {
        match fetch_once(&client, url).await {
            Err(e) if attempt < options.retries && is_transient(&e) => {
                attempt += 1;
                warn!("Fetching {} failed ({}), retry {}/{}", url, e, attempt, options.retries);
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
            other => break other,
        }
    };

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let body = result?;
    info!("Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<String, SourceError> {
    let http_error = |source: reqwest::Error| SourceError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(http_error)
}

fn is_transient(error: &SourceError) -> bool {
    match error {
        SourceError::Http { source, .. } => source.is_timeout() || source.is_connect(),
        SourceError::HttpStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Parse a snapshot document.
///
/// With `cluster` set the document is keyed by cluster name and the named
/// cluster is returned; otherwise the document is a single cluster.
pub fn parse_snapshot(json: &str, cluster: Option<&str>) -> Result<ClusterSnapshot, SourceError> {
    let Some(name) = cluster else {
        return Ok(serde_json::from_str(json)?);
    };

    let mut document: MultiClusterDocument = serde_json::from_str(json)?;
    document
        .remove(name)
        .ok_or_else(|| SourceError::UnknownCluster {
            name: name.to_string(),
            available: document.keys().cloned().collect(),
        })
}

/// Load and parse a snapshot in one step.
pub async fn load_snapshot(
    source: &SnapshotSource,
    options: &SourceOptions,
    cluster: Option<&str>,
) -> Result<ClusterSnapshot, SourceError> {
    let document = load_document(source, options).await?;
    let snapshot = parse_snapshot(&document, cluster)?;
    debug!("Snapshot from {} has {} groups", source, snapshot.len());
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawScriptEntry;

    const SINGLE: &str = r#"{
        "web": {
            "web-1": {"Scripts": {"/srv/index.php": {"CreateTimestamp": 100, "LastUsedTimestamp": 200, "Hits": 5, "Memory": 1000}}},
            "web-2": {"Scripts": []}
        }
    }"#;

    const MULTI: &str = r#"{
        "prod": {"web": {"web-1": {"Scripts": {}}}},
        "staging": {"web": {"web-9": {}}}
    }"#;

    #[test]
    fn test_source_parse() {
        assert_eq!(SnapshotSource::parse("-"), SnapshotSource::Stdin);
        assert_eq!(
            SnapshotSource::parse("https://collector/status"),
            SnapshotSource::Http("https://collector/status".to_string())
        );
        assert_eq!(
            SnapshotSource::parse("./status.json"),
            SnapshotSource::File(PathBuf::from("./status.json"))
        );
    }

    #[test]
    fn test_parse_single_cluster() {
        let snapshot = parse_snapshot(SINGLE, None).unwrap();
        let web = &snapshot["web"];
        assert_eq!(web.len(), 2);
        assert_eq!(
            web["web-1"].scripts.as_ref().unwrap()["/srv/index.php"],
            RawScriptEntry::new(100, 200, 5, 1000)
        );
        assert!(!web["web-2"].has_scripts());
    }

    #[test]
    fn test_parse_selects_cluster() {
        let snapshot = parse_snapshot(MULTI, Some("staging")).unwrap();
        assert!(snapshot["web"].contains_key("web-9"));
    }

    #[test]
    fn test_parse_unknown_cluster() {
        let err = parse_snapshot(MULTI, Some("dev")).unwrap_err();
        assert!(matches!(err, SourceError::UnknownCluster { .. }));
        assert_eq!(
            err.to_string(),
            "cluster `dev` not found in snapshot (available: prod, staging)"
        );
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_snapshot("{not json", None),
            Err(SourceError::Json(_))
        ));
        assert!(matches!(
            parse_snapshot(r#"{"web": ["web-1"]}"#, None),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn test_load_snapshot_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, SINGLE).unwrap();

        let snapshot = tokio_test::block_on(load_snapshot(
            &SnapshotSource::File(path),
            &SourceOptions::default(),
            None,
        ))
        .unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = tokio_test::block_on(load_document(
            &SnapshotSource::File(PathBuf::from("/nonexistent/status.json")),
            &SourceOptions::default(),
        ));
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(MULTI)
            .create_async()
            .await;

        let source = SnapshotSource::Http(format!("{}/status", server.url()));
        let snapshot = load_snapshot(&source, &SourceOptions::default(), Some("prod"))
            .await
            .unwrap();

        assert!(snapshot["web"].contains_key("web-1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let source = SnapshotSource::Http(format!("{}/status", server.url()));
        let options = SourceOptions {
            retries: 2,
            ..SourceOptions::default()
        };
        let err = load_document(&source, &options).await.unwrap_err();

        assert!(matches!(err, SourceError::HttpStatus { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_client_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let source = SnapshotSource::Http(format!("{}/status", server.url()));
        let err = load_document(&source, &SourceOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::HttpStatus { status: 404, .. }));
        mock.assert_async().await;
    }

    #[test]
    fn test_demo_snapshot_aggregates() {
        let snapshot = parse_snapshot(include_str!("../../demos/status.json"), None).unwrap();
        let statuses = crate::analysis::aggregate(&snapshot).unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].id, 0);
        assert_eq!(statuses[0].script_path, "/srv/app/public/index.php");
        assert_eq!(statuses[0].create_timestamp, 1_700_000_040);
        assert_eq!(statuses[0].last_used_timestamp, 1_700_003_720);
        assert_eq!(statuses[0].hits, 9990);
        assert_eq!(statuses[0].memory_bytes, 18432);
        assert_eq!(statuses[1].script_path, "/srv/app/src/Kernel.php");

        let stats = crate::analysis::snapshot_stats(&snapshot);
        assert_eq!((stats.groups, stats.hosts, stats.hosts_with_scripts), (2, 4, 2));
    }
}
