//! Core sample and log entry types for the telemetry engine
//!
//! This module defines the fundamental data structures used throughout the
//! subsystem for representing metric samples, health classifications, and
//! structured debug log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// The current time truncated to millisecond precision
///
/// The exported schema carries epoch milliseconds, so anything that may end
/// up in an export is stamped at millisecond granularity to keep
/// serialization round-trips exact.
pub fn now_ms() -> Timestamp {
    let now = Utc::now();
    now - chrono::Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos() % 1_000_000))
}

/// A raw, unvalidated sample as handed over by a producer
///
/// Producers are not required to stamp their samples; when `timestamp` is
/// `None` the validator assigns the ingestion time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Name of the metric stream this sample belongs to
    pub metric: String,
    /// The measured value
    pub value: f64,
    /// When the value was measured, if the producer knows
    pub timestamp: Option<Timestamp>,
}

impl RawSample {
    /// Create an unstamped raw sample
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
            timestamp: None,
        }
    }

    /// Create a raw sample with an explicit measurement time
    pub fn at(metric: impl Into<String>, value: f64, timestamp: Timestamp) -> Self {
        Self {
            metric: metric.into(),
            value,
            timestamp: Some(timestamp),
        }
    }
}

/// A validated sample stored in a rolling window
///
/// Immutable after insertion; owned by the window of its stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the value was measured or ingested
    pub timestamp: Timestamp,
    /// The measured value, always finite
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Severity level of a structured debug log entry
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail, usually uninteresting
    Debug,
    /// Normal operational event
    Info,
    /// Something suspicious that does not require action yet
    Warn,
    /// A problem requiring attention
    Error,
}

/// Health classification of a metric stream
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Statistic is within configured thresholds (or no thresholds configured)
    Healthy,
    /// Statistic exceeded the warning threshold
    Warning,
    /// Statistic exceeded the error threshold
    Critical,
}

/// A structured debug event retained by the log store
///
/// Append-only; destroyed only by retention-driven eviction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebugLogEntry {
    /// When the event occurred, exported as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    /// Severity of the event
    pub level: LogLevel,
    /// Free-form grouping key, e.g. "validation" or "alerts"
    pub category: String,
    /// Human-readable description
    pub message: String,
    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl DebugLogEntry {
    /// Create an entry stamped with the current time
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: now_ms(),
            level,
            category: category.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Shorthand for a debug-level entry
    pub fn debug(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, category, message)
    }

    /// Shorthand for an info-level entry
    pub fn info(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, category, message)
    }

    /// Shorthand for a warn-level entry
    pub fn warn(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, category, message)
    }

    /// Shorthand for an error-level entry
    pub fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, category, message)
    }

    /// Attach a structured payload to the entry
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Override the timestamp, mainly useful in tests
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}
