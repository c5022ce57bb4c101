//! Consistent point-in-time snapshots for external readers
//!
//! A snapshot composes the rolling windows, the health classifier, and the
//! log store into one immutable aggregate. Every purge and eviction decision
//! inside one snapshot uses a single logical "now", so no stream is evaluated
//! against a different clock than its neighbors.

use crate::classifier::{system_health, AlertClassifier};
use crate::logstore::LogStore;
use crate::stats::Statistics;
use crate::types::{DebugLogEntry, HealthStatus};
use crate::window::RollingWindowStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-metric entry of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub classification: HealthStatus,
}

/// Immutable point-in-time aggregate of metrics, health, and recent logs
///
/// Constructed on demand, never mutated afterwards; the caller owns it
/// outright and later pushes cannot affect it. Field names follow the
/// exported JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot time, epoch milliseconds
    pub timestamp: i64,
    /// Per-stream statistics and classification, sorted by name
    pub metrics: BTreeMap<String, MetricReport>,
    /// Fraction of classified metrics that are not critical, in [0,1]
    pub system_health: f64,
    /// Most recent log entries, oldest-first
    pub logs: Vec<DebugLogEntry>,
}

/// Builds snapshots from the live stores
pub struct SnapshotBuilder {
    windows: Arc<RollingWindowStore>,
    classifier: Arc<AlertClassifier>,
    log_store: Arc<LogStore>,
    log_limit: usize,
}

impl SnapshotBuilder {
    pub fn new(
        windows: Arc<RollingWindowStore>,
        classifier: Arc<AlertClassifier>,
        log_store: Arc<LogStore>,
        log_limit: usize,
    ) -> Self {
        Self {
            windows,
            classifier,
            log_store,
            log_limit,
        }
    }

    /// Build a snapshot as of now
    ///
    /// Order of operations: copy each stream's window, compute statistics and
    /// classification per stream (feeding the edge-triggered classifier),
    /// derive aggregate health, then take the most recent log entries. All
    /// window purges use the same timestamp. Streams whose live window is
    /// empty carry no data and are omitted: they are not classified and do
    /// not count toward system health.
    pub fn build(&self) -> Snapshot {
        let now = Utc::now();

        let mut metrics = BTreeMap::new();
        let mut statuses = Vec::new();
        for name in self.windows.stream_names() {
            let Some(samples) = self.windows.snapshot_at(&name, now) else {
                continue;
            };
            let Some(stats) = Statistics::compute(&samples) else {
                continue;
            };
            let config = self.windows.stream_config(&name).unwrap_or_default();
            let classification =
                self.classifier
                    .observe(&name, stats.mean, &config, &self.log_store);
            statuses.push(classification);
            metrics.insert(
                name,
                MetricReport {
                    mean: stats.mean,
                    variance: stats.variance,
                    min: stats.min,
                    max: stats.max,
                    classification,
                },
            );
        }

        let system_health = system_health(&statuses);
        // Logs come last so alert transitions raised above are included
        let logs = self.log_store.recent(self.log_limit);

        Snapshot {
            timestamp: now.timestamp_millis(),
            metrics,
            system_health,
            logs,
        }
    }
}
