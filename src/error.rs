use thiserror::Error;

/// Errors that can occur while collecting samples from producers
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Producer '{0}' failed: {1}")]
    ProducerFailed(String, String),

    #[error("Producer '{0}' timed out")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when serializing a snapshot for export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur during configuration loading
///
/// Configuration problems are fatal at initialization only; a running
/// telemetry service never fails because of bad input data.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
