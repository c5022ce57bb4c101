//! Sample validation at the ingestion boundary
//!
//! Raw producer output passes through here before it reaches a rolling
//! window. Invalid samples are dropped and logged, never surfaced as errors:
//! bad input data must not be able to fail a caller.

use crate::logstore::LogStore;
use crate::types::{DebugLogEntry, RawSample, Sample, Timestamp};
use serde_json::json;
use std::sync::Arc;

/// Why a raw sample was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Value was NaN or infinite
    NonFinite,
    /// Value fell outside the stream's declared range
    OutOfRange,
}

impl RejectReason {
    fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NonFinite => "non-finite",
            RejectReason::OutOfRange => "out-of-range",
        }
    }
}

/// Normalizes and validates raw samples before they enter the system
pub struct SampleValidator {
    log_store: Arc<LogStore>,
}

impl SampleValidator {
    pub fn new(log_store: Arc<LogStore>) -> Self {
        Self { log_store }
    }

    /// Validate a raw sample against the stream's declared range
    ///
    /// A sample with no timestamp is stamped with `now` (ingestion time).
    /// Rejections emit one `warn` entry in the "validation" category and
    /// return `None`; there is no other side effect and no error path.
    pub fn validate(
        &self,
        raw: &RawSample,
        declared_range: Option<(f64, f64)>,
        now: Timestamp,
    ) -> Option<Sample> {
        if !raw.value.is_finite() {
            self.reject(raw, RejectReason::NonFinite, declared_range);
            return None;
        }
        if let Some((min, max)) = declared_range {
            if raw.value < min || raw.value > max {
                self.reject(raw, RejectReason::OutOfRange, declared_range);
                return None;
            }
        }
        Some(Sample::new(raw.timestamp.unwrap_or(now), raw.value))
    }

    fn reject(
        &self,
        raw: &RawSample,
        reason: RejectReason,
        declared_range: Option<(f64, f64)>,
    ) {
        let payload = json!({
            "metric": raw.metric,
            "value": format!("{}", raw.value),
            "reason": reason.as_str(),
            "declared_range": declared_range.map(|(min, max)| vec![min, max]),
        });
        self.log_store.append(
            DebugLogEntry::warn(
                "validation",
                format!("Rejected {} sample for '{}'", reason.as_str(), raw.metric),
            )
            .with_data(payload),
        );
    }
}
