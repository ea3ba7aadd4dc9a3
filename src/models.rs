//! Data models for cluster OPcache snapshots.
//!
//! This module contains the input shape reported by the status collector
//! (groups of hosts, each with its cached scripts) and the cluster-wide
//! per-script records produced by the aggregator.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Host statuses keyed by group name, then by host identifier.
pub type ClusterSnapshot = BTreeMap<String, BTreeMap<String, HostCacheStatus>>;

/// Collector state for several clusters, keyed by cluster name.
pub type MultiClusterDocument = BTreeMap<String, ClusterSnapshot>;

/// Wire names of the four required script entry fields.
pub const FIELD_CREATE_TIMESTAMP: &str = "CreateTimestamp";
pub const FIELD_LAST_USED_TIMESTAMP: &str = "LastUsedTimestamp";
pub const FIELD_HITS: &str = "Hits";
pub const FIELD_MEMORY: &str = "Memory";

/// One host's OPcache status.
///
/// Only the script listing is read; any other status fields the collector
/// reports are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostCacheStatus {
    /// Cached scripts keyed by script path. `None` when the host reported no listing.
    #[serde(
        rename = "Scripts",
        default,
        deserialize_with = "deserialize_scripts",
        skip_serializing_if = "Option::is_none"
    )]
    pub scripts: Option<BTreeMap<String, RawScriptEntry>>,
}

impl HostCacheStatus {
    /// A host status carrying the given scripts.
    pub fn with_scripts<I, K>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (K, RawScriptEntry)>,
        K: Into<String>,
    {
        Self {
            scripts: Some(scripts.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Returns true if the host contributes at least one script.
    pub fn has_scripts(&self) -> bool {
        self.scripts.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// PHP encodes an empty associative array as `[]`, so an empty list is
/// accepted as an empty listing.
fn deserialize_scripts<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, RawScriptEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScriptsRepr {
        Map(BTreeMap<String, RawScriptEntry>),
        List(Vec<Value>),
    }

    match Option::<ScriptsRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ScriptsRepr::Map(map)) => Ok(Some(map)),
        Some(ScriptsRepr::List(list)) if list.is_empty() => Ok(Some(BTreeMap::new())),
        Some(ScriptsRepr::List(_)) => Err(D::Error::custom(
            "Scripts must be an object keyed by script path",
        )),
    }
}

/// A script entry exactly as reported, before validation.
///
/// Fields stay as raw JSON values so that a missing or non-numeric field is
/// reported with its location instead of failing the whole document parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct RawScriptEntry {
    #[serde(rename = "CreateTimestamp", skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<Value>,
    #[serde(rename = "LastUsedTimestamp", skip_serializing_if = "Option::is_none")]
    pub last_used_timestamp: Option<Value>,
    #[serde(rename = "Hits", skip_serializing_if = "Option::is_none")]
    pub hits: Option<Value>,
    #[serde(rename = "Memory", skip_serializing_if = "Option::is_none")]
    pub memory: Option<Value>,
    /// Set when the entry was not a JSON object at all.
    #[serde(skip)]
    pub not_an_object: bool,
}

impl From<Value> for RawScriptEntry {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => {
                let mut take = |name: &str| fields.remove(name).filter(|v| !v.is_null());
                Self {
                    create_timestamp: take(FIELD_CREATE_TIMESTAMP),
                    last_used_timestamp: take(FIELD_LAST_USED_TIMESTAMP),
                    hits: take(FIELD_HITS),
                    memory: take(FIELD_MEMORY),
                    not_an_object: false,
                }
            }
            _ => Self {
                not_an_object: true,
                ..Self::default()
            },
        }
    }
}

impl RawScriptEntry {
    /// Creates a well-formed entry.
    pub fn new(create_timestamp: i64, last_used_timestamp: i64, hits: u64, memory: u64) -> Self {
        Self {
            create_timestamp: Some(create_timestamp.into()),
            last_used_timestamp: Some(last_used_timestamp.into()),
            hits: Some(hits.into()),
            memory: Some(memory.into()),
            not_an_object: false,
        }
    }

    /// Checks that all four fields are present integers in range.
    pub fn validate(&self) -> Result<ScriptCacheEntry, EntryProblem> {
        if self.not_an_object {
            return Err(EntryProblem::NotAnObject);
        }

        Ok(ScriptCacheEntry {
            create_timestamp: signed_field(&self.create_timestamp, FIELD_CREATE_TIMESTAMP)?,
            last_used_timestamp: signed_field(
                &self.last_used_timestamp,
                FIELD_LAST_USED_TIMESTAMP,
            )?,
            hits: unsigned_field(&self.hits, FIELD_HITS)?,
            memory_bytes: unsigned_field(&self.memory, FIELD_MEMORY)?,
        })
    }
}

fn number_field<'a>(
    value: &'a Option<Value>,
    field: &'static str,
) -> Result<&'a serde_json::Number, EntryProblem> {
    match value {
        None => Err(EntryProblem::MissingField { field }),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n),
        Some(other) => Err(EntryProblem::NotAnInteger {
            field,
            value: other.to_string(),
        }),
    }
}

fn signed_field(value: &Option<Value>, field: &'static str) -> Result<i64, EntryProblem> {
    let n = number_field(value, field)?;
    n.as_i64().ok_or_else(|| EntryProblem::OutOfRange {
        field,
        value: n.to_string(),
    })
}

fn unsigned_field(value: &Option<Value>, field: &'static str) -> Result<u64, EntryProblem> {
    let n = number_field(value, field)?;
    n.as_u64().ok_or_else(|| EntryProblem::OutOfRange {
        field,
        value: n.to_string(),
    })
}

/// What is wrong with a script entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryProblem {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },
    #[error("field `{field}` is not an integer: {value}")]
    NotAnInteger { field: &'static str, value: String },
    #[error("field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// One host's validated view of one cached script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptCacheEntry {
    /// When the script was compiled into the cache (epoch seconds).
    pub create_timestamp: i64,
    /// When the cached script was last used (epoch seconds).
    pub last_used_timestamp: i64,
    /// Cache hits on this host.
    pub hits: u64,
    /// Bytecode size in bytes.
    pub memory_bytes: u64,
}

/// Cluster-wide status of one script, merged over every host that caches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedScriptStatus {
    /// Row key, scoped to one aggregation call.
    pub id: u64,
    /// Script path, unique within a result.
    #[serde(rename = "script")]
    pub script_path: String,
    /// Earliest creation time on any host.
    pub create_timestamp: i64,
    /// Most recent use on any host.
    pub last_used_timestamp: i64,
    /// Total hits across the cluster.
    pub hits: u64,
    /// Representative bytecode size (not summed across hosts).
    #[serde(rename = "memory")]
    pub memory_bytes: u64,
}

/// Column a result can be ordered by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Script path
    Script,
    /// Total hits (default)
    #[default]
    Hits,
    /// Bytecode size
    Memory,
    /// Most recent use
    LastUsed,
    /// Earliest creation
    Created,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Script => write!(f, "script"),
            SortKey::Hits => write!(f, "hits"),
            SortKey::Memory => write!(f, "memory"),
            SortKey::LastUsed => write!(f, "last-used"),
            SortKey::Created => write!(f, "created"),
        }
    }
}

/// Totals shown above the script table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSummary {
    /// Number of distinct scripts.
    pub scripts: usize,
    /// Sum of hits over all scripts (saturating).
    pub total_hits: u64,
    /// Sum of representative sizes over all scripts (saturating).
    pub total_memory_bytes: u64,
    /// Earliest creation time of any script.
    pub oldest_create_timestamp: Option<i64>,
    /// Most recent use of any script.
    pub latest_used_timestamp: Option<i64>,
}

impl ScriptSummary {
    /// Creates a summary from aggregated statuses.
    pub fn from_statuses(statuses: &[AggregatedScriptStatus]) -> Self {
        let mut summary = Self {
            scripts: statuses.len(),
            ..Self::default()
        };

        for status in statuses {
            summary.total_hits = summary.total_hits.saturating_add(status.hits);
            summary.total_memory_bytes =
                summary.total_memory_bytes.saturating_add(status.memory_bytes);
            summary.oldest_create_timestamp = Some(
                summary
                    .oldest_create_timestamp
                    .map_or(status.create_timestamp, |t| t.min(status.create_timestamp)),
            );
            summary.latest_used_timestamp = Some(
                summary
                    .latest_used_timestamp
                    .map_or(status.last_used_timestamp, |t| {
                        t.max(status.last_used_timestamp)
                    }),
            );
        }

        summary
    }
}

/// Shape of a snapshot, independent of its script contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    /// Number of groups.
    pub groups: usize,
    /// Number of hosts across all groups.
    pub hosts: usize,
    /// Hosts that reported at least one cached script.
    pub hosts_with_scripts: usize,
}
