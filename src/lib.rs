/// Error types for the telemetry engine
pub mod error;

/// Core sample and log entry types
pub mod types;

/// Configuration management
pub mod config;

/// Sample validation at the ingestion boundary
pub mod validator;

/// Per-metric rolling windows
pub mod window;

/// Pure statistics over window snapshots
pub mod stats;

/// Threshold-based health classification
pub mod classifier;

/// Retention-bounded debug log store
pub mod logstore;

/// Snapshot construction
pub mod snapshot;

/// Snapshot serialization
pub mod export;

/// Periodic and push-style sample collection
pub mod collector;

/// Built-in producers and collaborator adapters
pub mod probes;

/// Service lifecycle and wiring
pub mod service;

// Re-export commonly used types
pub use config::{ExportFormat, RetentionPolicy, StreamConfig, TelemetryConfig};
pub use error::{CollectorError, ConfigError, ExportError};
pub use service::TelemetryService;
pub use types::{DebugLogEntry, HealthStatus, LogLevel, RawSample, Sample};
