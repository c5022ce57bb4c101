//! Threshold-based health classification with edge-triggered transition logs
//!
//! A stream's current mean is compared against its configured thresholds to
//! produce a per-metric health status, and the statuses roll up into one
//! aggregate system-health score. Classification transitions are logged
//! exactly once per edge; re-evaluating at the same level stays silent.

use crate::config::StreamConfig;
use crate::logstore::LogStore;
use crate::types::{DebugLogEntry, HealthStatus};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

/// Classify a value against a stream's thresholds
///
/// `value > error_threshold` is critical, `value > warning_threshold` is
/// warning, anything else is healthy. A stream with no thresholds configured
/// is always healthy.
pub fn classify_value(value: f64, config: &StreamConfig) -> HealthStatus {
    if let Some(error) = config.error_threshold {
        if value > error {
            return HealthStatus::Critical;
        }
    }
    if let Some(warning) = config.warning_threshold {
        if value > warning {
            return HealthStatus::Warning;
        }
    }
    HealthStatus::Healthy
}

/// Aggregate system health: the fraction of classified metrics that are not
/// critical, clamped to [0,1]
///
/// An empty metric set yields `1.0` — no evidence of problems.
pub fn system_health<'a, I>(statuses: I) -> f64
where
    I: IntoIterator<Item = &'a HealthStatus>,
{
    let mut total = 0usize;
    let mut non_critical = 0usize;
    for status in statuses {
        total += 1;
        if *status != HealthStatus::Critical {
            non_critical += 1;
        }
    }
    if total == 0 {
        return 1.0;
    }
    (non_critical as f64 / total as f64).clamp(0.0, 1.0)
}

/// Tracks per-metric classification state and logs transitions
///
/// The classifier remembers the last status of every metric it has observed.
/// Each transition emits exactly one debug log entry: `warn` when entering
/// warning, `error` when entering critical, `info` when recovering to
/// healthy. Repeated observations at the same level emit nothing.
pub struct AlertClassifier {
    last_status: Mutex<HashMap<String, HealthStatus>>,
}

impl Default for AlertClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertClassifier {
    pub fn new() -> Self {
        Self {
            last_status: Mutex::new(HashMap::new()),
        }
    }

    /// Classify a stream's current mean and log the transition, if any
    ///
    /// Returns the new status. The very first observation of a metric counts
    /// as a transition only when it lands outside healthy; starting healthy
    /// is the assumed baseline and stays silent.
    pub fn observe(
        &self,
        metric: &str,
        mean: f64,
        config: &StreamConfig,
        log_store: &LogStore,
    ) -> HealthStatus {
        let status = classify_value(mean, config);

        let mut last = self.last_status.lock().unwrap();
        let previous = last.insert(metric.to_string(), status);
        let baseline = previous.unwrap_or(HealthStatus::Healthy);
        if baseline == status {
            return status;
        }

        let payload = json!({
            "metric": metric,
            "mean": mean,
            "from": baseline,
            "to": status,
        });
        let entry = match status {
            HealthStatus::Critical => DebugLogEntry::error(
                "alerts",
                format!("{} entered critical (mean {:.3})", metric, mean),
            ),
            HealthStatus::Warning => DebugLogEntry::warn(
                "alerts",
                format!("{} entered warning (mean {:.3})", metric, mean),
            ),
            HealthStatus::Healthy => DebugLogEntry::info(
                "alerts",
                format!("{} recovered to healthy (mean {:.3})", metric, mean),
            ),
        };
        log_store.append(entry.with_data(payload));

        status
    }

    /// Forget all remembered classifications
    ///
    /// The next observation of every metric is treated as a first one.
    pub fn reset(&self) {
        self.last_status.lock().unwrap().clear();
    }
}
