//! Configuration management for the telemetry engine
//!
//! Configuration is loaded from a TOML file into serde-derived structs and
//! validated once at startup. Validation failures are fatal at initialization;
//! after the service starts, configuration is immutable until an explicit
//! reconfiguration through a new service instance.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default polling cadence of the collector, in milliseconds
pub const DEFAULT_COLLECTION_INTERVAL_MS: u64 = 5000;

/// Default per-producer poll budget, in milliseconds
pub const DEFAULT_PRODUCER_TIMEOUT_MS: u64 = 2000;

/// Window size applied to streams that were never explicitly registered
pub const DEFAULT_WINDOW_COUNT: usize = 100;

/// Default number of log entries carried by a snapshot
pub const DEFAULT_SNAPSHOT_LOG_LIMIT: usize = 100;

/// Per-stream configuration: declared range, thresholds, and window bounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Unit of the metric, informational only (e.g. "percent", "bytes")
    pub unit: Option<String>,
    /// Lower bound of the declared value range, inclusive
    pub min_value: Option<f64>,
    /// Upper bound of the declared value range, inclusive
    pub max_value: Option<f64>,
    /// Mean above this value classifies the stream as warning
    pub warning_threshold: Option<f64>,
    /// Mean above this value classifies the stream as critical
    pub error_threshold: Option<f64>,
    /// Maximum number of samples kept in the rolling window
    pub max_window_count: Option<usize>,
    /// Maximum age of a sample before it is purged, in milliseconds
    pub max_window_age_ms: Option<u64>,
}

impl StreamConfig {
    /// The window configuration applied to streams first seen on push
    ///
    /// Unregistered streams get a 100-sample window with no age bound, no
    /// declared range, and no thresholds. Explicit registration always wins.
    pub fn default_for_unregistered() -> Self {
        Self {
            max_window_count: Some(DEFAULT_WINDOW_COUNT),
            ..Self::default()
        }
    }

    /// Effective window size, falling back to the unregistered default
    pub fn window_count(&self) -> usize {
        self.max_window_count.unwrap_or(DEFAULT_WINDOW_COUNT)
    }

    /// Declared value range as an inclusive (min, max) pair, if any bound is set
    pub fn declared_range(&self) -> Option<(f64, f64)> {
        match (self.min_value, self.max_value) {
            (None, None) => None,
            (min, max) => Some((
                min.unwrap_or(f64::NEG_INFINITY),
                max.unwrap_or(f64::INFINITY),
            )),
        }
    }
}

/// Retention bounds applied to the debug log store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionPolicy {
    /// Maximum number of entries retained
    pub max_entries: usize,
    /// Maximum age of an entry before eviction, in milliseconds
    pub max_age_ms: Option<u64>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        // Default: 1000 entries, 1 hour
        Self {
            max_entries: 1000,
            max_age_ms: Some(3_600_000),
        }
    }
}

/// Bounded-retry policy for producer polls within a collector tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts per tick, including the first
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 100,
        }
    }
}

/// Output format of the export service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Top-level configuration of the telemetry engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Collector polling cadence, in milliseconds
    pub collection_interval_ms: u64,
    /// Budget for a single producer poll, in milliseconds
    pub producer_timeout_ms: u64,
    /// Retry policy for failed producer polls
    pub producer_retry: RetryPolicy,
    /// Pre-registered metric streams with tuned thresholds and windows
    pub streams: HashMap<String, StreamConfig>,
    /// Retention bounds of the debug log store
    pub log_retention: RetentionPolicy,
    /// Number of recent log entries included in a snapshot
    pub snapshot_log_limit: usize,
    /// Formats the export service should offer
    pub export_formats: Vec<ExportFormat>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            collection_interval_ms: DEFAULT_COLLECTION_INTERVAL_MS,
            producer_timeout_ms: DEFAULT_PRODUCER_TIMEOUT_MS,
            producer_retry: RetryPolicy::default(),
            streams: HashMap::new(),
            log_retention: RetentionPolicy::default(),
            snapshot_log_limit: DEFAULT_SNAPSHOT_LOG_LIMIT,
            export_formats: vec![ExportFormat::Json, ExportFormat::Csv],
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from a TOML file and validate it
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` on malformed TOML, and
    /// `ConfigError::ValidationError` for inconsistent values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ReadError(format!("{}: {}", path.display(), e))
        })?;
        let config: TelemetryConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field consistency
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "collection_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.producer_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "producer_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.producer_retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "producer_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.log_retention.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "log_retention.max_entries must be greater than zero".to_string(),
            ));
        }
        if self.snapshot_log_limit == 0 {
            return Err(ConfigError::ValidationError(
                "snapshot_log_limit must be greater than zero".to_string(),
            ));
        }

        for (name, stream) in &self.streams {
            if let Some(count) = stream.max_window_count {
                if count == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "stream '{}': max_window_count must be greater than zero",
                        name
                    )));
                }
            }
            if let Some(age) = stream.max_window_age_ms {
                if age == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "stream '{}': max_window_age_ms must be greater than zero",
                        name
                    )));
                }
            }
            if let (Some(min), Some(max)) = (stream.min_value, stream.max_value) {
                if min > max {
                    return Err(ConfigError::ValidationError(format!(
                        "stream '{}': min_value {} exceeds max_value {}",
                        name, min, max
                    )));
                }
            }
            if let (Some(warn), Some(err)) = (stream.warning_threshold, stream.error_threshold) {
                if warn >= err {
                    return Err(ConfigError::ValidationError(format!(
                        "stream '{}': warning_threshold {} must be below error_threshold {}",
                        name, warn, err
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = TelemetryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collection_interval_ms, 5000);
        assert_eq!(config.export_formats, vec![ExportFormat::Json, ExportFormat::Csv]);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
collection_interval_ms = 1000
snapshot_log_limit = 50

[log_retention]
max_entries = 500
max_age_ms = 60000

[streams.cpu_usage_percent]
unit = "percent"
min_value = 0.0
max_value = 100.0
warning_threshold = 70.0
error_threshold = 90.0
max_window_count = 60

[streams.api_latency_ms]
unit = "milliseconds"
warning_threshold = 250.0
error_threshold = 1000.0
max_window_count = 120
max_window_age_ms = 300000
"#
        )
        .unwrap();

        let config = TelemetryConfig::load(file.path()).unwrap();
        assert_eq!(config.collection_interval_ms, 1000);
        assert_eq!(config.log_retention.max_entries, 500);
        assert_eq!(config.streams.len(), 2);

        let cpu = &config.streams["cpu_usage_percent"];
        assert_eq!(cpu.declared_range(), Some((0.0, 100.0)));
        assert_eq!(cpu.warning_threshold, Some(70.0));
        assert_eq!(cpu.window_count(), 60);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = TelemetryConfig::load(Path::new("/nonexistent/pulse.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = TelemetryConfig {
            collection_interval_ms: 0,
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = TelemetryConfig::default();
        config.streams.insert(
            "latency_ms".to_string(),
            StreamConfig {
                warning_threshold: Some(0.9),
                error_threshold: Some(0.7),
                ..StreamConfig::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("latency_ms"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = TelemetryConfig::default();
        config.streams.insert(
            "balance".to_string(),
            StreamConfig {
                min_value: Some(10.0),
                max_value: Some(1.0),
                ..StreamConfig::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_window_count_rejected() {
        let mut config = TelemetryConfig::default();
        config.streams.insert(
            "volume".to_string(),
            StreamConfig {
                max_window_count: Some(0),
                ..StreamConfig::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_half_open_range() {
        let stream = StreamConfig {
            min_value: Some(0.0),
            ..StreamConfig::default()
        };
        let (min, max) = stream.declared_range().unwrap();
        assert_eq!(min, 0.0);
        assert!(max.is_infinite());
    }

    #[test]
    fn test_unregistered_defaults() {
        let config = StreamConfig::default_for_unregistered();
        assert_eq!(config.window_count(), DEFAULT_WINDOW_COUNT);
        assert!(config.max_window_age_ms.is_none());
        assert!(config.declared_range().is_none());
        assert!(config.warning_threshold.is_none());
    }
}
