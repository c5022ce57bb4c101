//! Explicitly-owned telemetry service with an init/shutdown lifecycle
//!
//! The service wires the stores, collector, classifier, and snapshot builder
//! together behind one handle. There is no ambient global registry: whoever
//! constructs the service owns it, and dropping it (after `shutdown`)
//! releases everything. Snapshots already handed out remain valid.

use crate::classifier::AlertClassifier;
use crate::collector::{Collector, Producer};
use crate::config::{ExportFormat, TelemetryConfig};
use crate::error::{ConfigError, ExportError};
use crate::export;
use crate::logstore::{LogFilter, LogStore, SubscriptionId};
use crate::snapshot::{Snapshot, SnapshotBuilder};
use crate::stats;
use crate::types::{DebugLogEntry, RawSample, Sample};
use crate::window::RollingWindowStore;
use log::info;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// One fully wired instance of the telemetry engine
pub struct TelemetryService {
    config: TelemetryConfig,
    windows: Arc<RollingWindowStore>,
    log_store: Arc<LogStore>,
    collector: Collector,
    snapshots: SnapshotBuilder,
}

impl TelemetryService {
    /// Validate the configuration and build the service
    ///
    /// Pre-registers every configured stream so tuned thresholds and window
    /// bounds are in place before the first sample arrives.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for inconsistent configuration.
    /// This is the only point where configuration can fail; steady-state
    /// operation never does.
    pub fn init(config: TelemetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Initializing telemetry service ({} pre-registered streams, interval {}ms)",
            config.streams.len(),
            config.collection_interval_ms
        );

        let windows = Arc::new(RollingWindowStore::with_streams(&config.streams));
        let log_store = Arc::new(LogStore::new(config.log_retention.clone()));
        let classifier = Arc::new(AlertClassifier::new());
        let collector = Collector::new(&config, Arc::clone(&windows), Arc::clone(&log_store));
        let snapshots = SnapshotBuilder::new(
            Arc::clone(&windows),
            classifier,
            Arc::clone(&log_store),
            config.snapshot_log_limit,
        );

        Ok(Self {
            config,
            windows,
            log_store,
            collector,
            snapshots,
        })
    }

    /// The configuration the service was built with
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Register a producer to be polled every tick; call before `start`
    pub fn register_producer(&self, producer: Arc<dyn Producer>) {
        self.collector.register_producer(producer);
    }

    /// Start periodic collection
    pub fn start(&self) {
        self.collector.start();
    }

    /// Run one collection pass immediately, outside the periodic cadence
    pub async fn tick(&self) {
        self.collector.tick().await;
    }

    /// Push-style ingestion of a single raw sample
    pub fn record(&self, raw: RawSample) {
        self.collector.record(raw);
    }

    /// Append a debug event to the log store
    pub fn log(&self, entry: DebugLogEntry) {
        self.log_store.append(entry);
    }

    /// Build a consistent point-in-time snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.build()
    }

    /// Export a fresh snapshot in the requested format
    ///
    /// Always serializes a newly built snapshot, never live stores, so the
    /// output cannot reflect a torn read.
    ///
    /// # Errors
    ///
    /// Returns `ExportError` on serialization failure; no partial output.
    pub fn export(&self, format: ExportFormat) -> Result<String, ExportError> {
        export::export(&self.snapshot(), format)
    }

    /// Query retained debug log entries
    pub fn logs(&self, filter: &LogFilter) -> Vec<DebugLogEntry> {
        self.log_store.query(filter)
    }

    /// Subscribe to debug log entries appended from now on
    pub fn subscribe_logs(&self, capacity: usize) -> (SubscriptionId, Receiver<DebugLogEntry>) {
        self.log_store.subscribe(capacity)
    }

    /// Cancel a log subscription
    pub fn unsubscribe_logs(&self, id: SubscriptionId) {
        self.log_store.unsubscribe(id);
    }

    /// Pearson correlation between two streams' live windows
    ///
    /// Aligned by position from the latest sample; `0.0` when either stream
    /// is missing, shorter than two samples, or has zero variance.
    pub fn correlation(&self, stream_a: &str, stream_b: &str) -> f64 {
        let now = chrono::Utc::now();
        let a: Vec<Sample> = self.windows.snapshot_at(stream_a, now).unwrap_or_default();
        let b: Vec<Sample> = self.windows.snapshot_at(stream_b, now).unwrap_or_default();
        stats::correlation(&a, &b)
    }

    /// Stop the collector and release subscriber registrations
    ///
    /// Idempotent. Snapshots already handed out stay valid and immutable.
    pub async fn shutdown(&self) {
        info!("Shutting down telemetry service");
        self.collector.shutdown().await;
        self.log_store.clear_subscribers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryPolicy, StreamConfig};
    use crate::probes::FnProducer;
    use crate::types::LogLevel;

    fn test_config() -> TelemetryConfig {
        let mut config = TelemetryConfig {
            collection_interval_ms: 10,
            producer_timeout_ms: 200,
            producer_retry: RetryPolicy::default(),
            snapshot_log_limit: 10,
            ..TelemetryConfig::default()
        };
        config.streams.insert(
            "cpu_usage_percent".to_string(),
            StreamConfig {
                unit: Some("percent".to_string()),
                min_value: Some(0.0),
                max_value: Some(100.0),
                warning_threshold: Some(70.0),
                error_threshold: Some(90.0),
                max_window_count: Some(10),
                ..StreamConfig::default()
            },
        );
        config
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let config = TelemetryConfig {
            collection_interval_ms: 0,
            ..TelemetryConfig::default()
        };
        assert!(TelemetryService::init(config).is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_poll_classify_snapshot() {
        let service = TelemetryService::init(test_config()).unwrap();
        service.register_producer(Arc::new(FnProducer::new("probe", || {
            Ok(vec![RawSample::new("cpu_usage_percent", 95.0)])
        })));

        service.tick().await;
        let snapshot = service.snapshot();

        let report = &snapshot.metrics["cpu_usage_percent"];
        assert_eq!(report.mean, 95.0);
        assert_eq!(
            report.classification,
            crate::types::HealthStatus::Critical
        );
        assert_eq!(snapshot.system_health, 0.0);

        // The critical transition shows up in the snapshot's log tail
        assert!(snapshot
            .logs
            .iter()
            .any(|e| e.category == "alerts" && e.level == LogLevel::Error));
    }

    #[tokio::test]
    async fn test_recovery_logs_info_once() {
        let service = TelemetryService::init(test_config()).unwrap();

        service.record(RawSample::new("cpu_usage_percent", 95.0));
        service.snapshot(); // classifies critical

        // Push enough healthy samples to drag the mean below the thresholds
        for _ in 0..9 {
            service.record(RawSample::new("cpu_usage_percent", 1.0));
        }
        service.snapshot(); // classifies healthy, logs recovery
        service.snapshot(); // still healthy, must stay silent

        let alerts = service.logs(&LogFilter {
            category: Some("alerts".to_string()),
            ..LogFilter::default()
        });
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].level, LogLevel::Error);
        assert_eq!(alerts[1].level, LogLevel::Info);
    }

    #[tokio::test]
    async fn test_export_round_trip_through_service() {
        let service = TelemetryService::init(test_config()).unwrap();
        service.record(RawSample::new("cpu_usage_percent", 50.0));
        service.record(RawSample::new("balance", 12.5));

        let json = service.export(ExportFormat::Json).unwrap();
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert!(parsed.metrics.contains_key("cpu_usage_percent"));
        assert!(parsed.metrics.contains_key("balance"));

        let csv = service.export(ExportFormat::Csv).unwrap();
        assert!(csv.contains("balance,12.5,0,12.5,12.5,healthy"));
    }

    #[tokio::test]
    async fn test_correlation_between_streams() {
        let service = TelemetryService::init(test_config()).unwrap();
        for i in 0..5 {
            service.record(RawSample::new("a", i as f64));
            service.record(RawSample::new("b", i as f64 * 2.0));
        }

        assert!((service.correlation("a", "b") - 1.0).abs() < 1e-9);
        assert_eq!(service.correlation("a", "missing"), 0.0);
    }

    #[tokio::test]
    async fn test_shutdown_releases_subscribers_and_keeps_snapshots() {
        let service = TelemetryService::init(test_config()).unwrap();
        service.record(RawSample::new("cpu_usage_percent", 10.0));

        let snapshot = service.snapshot();
        let (_id, receiver) = service.subscribe_logs(4);

        service.start();
        service.shutdown().await;

        // Subscriber registrations are gone: new appends are not delivered
        service.log(DebugLogEntry::info("test", "after shutdown"));
        assert_eq!(receiver.try_iter().count(), 0);

        // The snapshot handed out earlier is still intact
        assert_eq!(snapshot.metrics["cpu_usage_percent"].mean, 10.0);
    }

    #[tokio::test]
    async fn test_validation_failures_are_logged_not_fatal() {
        let service = TelemetryService::init(test_config()).unwrap();
        service.record(RawSample::new("cpu_usage_percent", f64::NAN));
        service.record(RawSample::new("cpu_usage_percent", 400.0));

        let rejections = service.logs(&LogFilter {
            category: Some("validation".to_string()),
            ..LogFilter::default()
        });
        assert_eq!(rejections.len(), 2);
        assert!(service.snapshot().metrics.get("cpu_usage_percent").is_none());
    }
}
