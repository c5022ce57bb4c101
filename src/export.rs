//! Snapshot serialization to JSON and CSV
//!
//! Export always works on an already-built snapshot, never on a live store,
//! so the output can never reflect a torn read. Exporting the same snapshot
//! twice yields byte-identical output.

use crate::config::ExportFormat;
use crate::error::ExportError;
use crate::snapshot::Snapshot;
use std::fmt::Write;

/// Serialize a snapshot in the requested format
///
/// # Errors
///
/// Returns `ExportError` on serialization failure; no partial output is ever
/// returned.
pub fn export(snapshot: &Snapshot, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => export_json(snapshot),
        ExportFormat::Csv => Ok(export_csv(snapshot)),
    }
}

fn export_json(snapshot: &Snapshot) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Quote a CSV field when it contains a delimiter, quote, or newline
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn export_csv(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    // Metrics section: one row per stream, sorted by the map's ordering
    out.push_str("name,mean,variance,min,max,classification\n");
    for (name, report) in &snapshot.metrics {
        // Unwrap is fine: writing to a String cannot fail
        writeln!(
            out,
            "{},{},{},{},{},{}",
            csv_field(name),
            report.mean,
            report.variance,
            report.min,
            report.max,
            classification_label(report),
        )
        .unwrap();
    }

    // Logs section, separated by a blank line
    out.push('\n');
    out.push_str("timestamp,level,category,message\n");
    for entry in &snapshot.logs {
        writeln!(
            out,
            "{},{},{},{}",
            entry.timestamp.timestamp_millis(),
            level_label(entry),
            csv_field(&entry.category),
            csv_field(&entry.message),
        )
        .unwrap();
    }

    out
}

fn classification_label(report: &crate::snapshot::MetricReport) -> &'static str {
    use crate::types::HealthStatus;
    match report.classification {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Warning => "warning",
        HealthStatus::Critical => "critical",
    }
}

fn level_label(entry: &crate::types::DebugLogEntry) -> &'static str {
    use crate::types::LogLevel;
    match entry.level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}
