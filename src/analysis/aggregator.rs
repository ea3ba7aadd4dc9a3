//! Script status aggregation and statistics.
//!
//! This module merges per-host script cache entries into one cluster-wide
//! record per script path and provides the ordering and counting helpers
//! used by the report generator.

use crate::models::{
    AggregatedScriptStatus, ClusterSnapshot, EntryProblem, ScriptCacheEntry, SnapshotStats,
    SortKey,
};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Why an aggregation call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    /// A script entry is missing a field or carries a non-integer value.
    #[error("malformed entry for script `{script}` on host `{host}` in group `{group}`: {problem}")]
    MalformedEntry {
        group: String,
        host: String,
        script: String,
        problem: EntryProblem,
    },

    /// Summing hits for a script exceeded the counter range.
    #[error("hit count for script `{script}` overflows")]
    HitCountOverflow { script: String },
}

/// Running merge of every entry seen for one script path.
#[derive(Debug, Clone, Copy)]
struct ScriptAccumulator {
    create_timestamp: i64,
    last_used_timestamp: i64,
    hits: u64,
    memory_bytes: u64,
}

impl ScriptAccumulator {
    fn seed(entry: &ScriptCacheEntry) -> Self {
        Self {
            create_timestamp: entry.create_timestamp,
            last_used_timestamp: entry.last_used_timestamp,
            hits: entry.hits,
            memory_bytes: entry.memory_bytes,
        }
    }

    /// Folds another host's entry in. Returns `None` on hit overflow, leaving
    /// the accumulator untouched.
    fn merge(&mut self, entry: &ScriptCacheEntry) -> Option<()> {
        let hits = self.hits.checked_add(entry.hits)?;

        self.create_timestamp = self.create_timestamp.min(entry.create_timestamp);
        self.last_used_timestamp = self.last_used_timestamp.max(entry.last_used_timestamp);
        self.hits = hits;
        // memory_bytes keeps the first value seen

        Some(())
    }

    fn into_status(self, id: u64, script_path: String) -> AggregatedScriptStatus {
        AggregatedScriptStatus {
            id,
            script_path,
            create_timestamp: self.create_timestamp,
            last_used_timestamp: self.last_used_timestamp,
            hits: self.hits,
            memory_bytes: self.memory_bytes,
        }
    }
}

/// Merge every host's scripts into one record per script path.
///
/// Records come back ordered by script path with `id`s assigned from 0 in
/// that order. Groups, hosts and scripts are walked in ascending key order,
/// so the representative `memory_bytes` (first seen) does not depend on how
/// the input document was ordered either.
///
/// Fails on the first malformed entry; no partial result is returned.
pub fn aggregate(snapshot: &ClusterSnapshot) -> Result<Vec<AggregatedScriptStatus>, AggregateError> {
    let mut accumulators: BTreeMap<&str, ScriptAccumulator> = BTreeMap::new();

    for (group, hosts) in snapshot {
        for (host, status) in hosts {
            let scripts = match status.scripts.as_ref() {
                Some(scripts) if !scripts.is_empty() => scripts,
                _ => {
                    trace!("Host {}/{} has no cached scripts", group, host);
                    continue;
                }
            };

            for (script, raw) in scripts {
                let entry = raw.validate().map_err(|problem| AggregateError::MalformedEntry {
                    group: group.clone(),
                    host: host.clone(),
                    script: script.clone(),
                    problem,
                })?;

                match accumulators.entry(script.as_str()) {
                    Entry::Vacant(slot) => {
                        slot.insert(ScriptAccumulator::seed(&entry));
                    }
                    Entry::Occupied(mut slot) => {
                        slot.get_mut().merge(&entry).ok_or_else(|| {
                            AggregateError::HitCountOverflow {
                                script: script.clone(),
                            }
                        })?;
                    }
                }

                trace!("Merged {} from {}/{}", script, group, host);
            }
        }
    }

    debug!("Aggregated {} distinct scripts", accumulators.len());

    Ok(accumulators
        .into_iter()
        .zip(0u64..)
        .map(|((script, acc), id)| acc.into_status(id, script.to_string()))
        .collect())
}

/// Count groups, hosts, and hosts that reported scripts.
pub fn snapshot_stats(snapshot: &ClusterSnapshot) -> SnapshotStats {
    let mut stats = SnapshotStats {
        groups: snapshot.len(),
        ..SnapshotStats::default()
    };

    for hosts in snapshot.values() {
        stats.hosts += hosts.len();
        stats.hosts_with_scripts += hosts.values().filter(|h| h.has_scripts()).count();
    }

    stats
}

fn compare_by(key: SortKey, a: &AggregatedScriptStatus, b: &AggregatedScriptStatus) -> Ordering {
    match key {
        SortKey::Script => Ordering::Equal,
        SortKey::Hits => a.hits.cmp(&b.hits),
        SortKey::Memory => a.memory_bytes.cmp(&b.memory_bytes),
        SortKey::LastUsed => a.last_used_timestamp.cmp(&b.last_used_timestamp),
        SortKey::Created => a.create_timestamp.cmp(&b.create_timestamp),
    }
}

/// Sort statuses by a column. Ties fall back to ascending script path.
///
/// Only the order changes; `id`s stay as assigned by [`aggregate`].
pub fn sort_statuses(statuses: &mut [AggregatedScriptStatus], key: SortKey, descending: bool) {
    statuses.sort_by(|a, b| {
        let primary = if key == SortKey::Script {
            a.script_path.cmp(&b.script_path)
        } else {
            compare_by(key, a, b)
        };
        let primary = if descending { primary.reverse() } else { primary };
        primary.then_with(|| a.script_path.cmp(&b.script_path))
    });
}

/// Get the top N statuses by a column, largest first.
pub fn top_scripts(
    statuses: &[AggregatedScriptStatus],
    key: SortKey,
    n: usize,
) -> Vec<AggregatedScriptStatus> {
    let mut sorted = statuses.to_vec();
    sort_statuses(&mut sorted, key, true);
    sorted.truncate(n);
    sorted
}
