//! Error types for the perfstream telemetry pipeline

use thiserror::Error;

/// Result type alias for perfstream operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Main error type for the telemetry pipeline
///
/// Hot-path failures (rejected metrics, closed transports, panicking
/// subscribers) are recovered where they occur and never surface through
/// this type; it covers construction-time and transport-level errors only.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
