//! Pipeline configuration
//!
//! One configuration struct covers the collector, the alert engine, and the
//! streaming monitor. Invalid values fail fast at construction time; nothing
//! downstream re-validates.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};

/// Configuration for the telemetry pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Probability in `[0, 1]` that an individual `track_*` call is retained
    pub sample_rate: f64,
    /// Capacity of each per-kind metric ring buffer
    pub buffer_size: usize,
    /// Interval between aggregation broadcasts while streaming (milliseconds)
    pub update_interval_ms: u64,
    /// Base delay for reconnect backoff (milliseconds)
    pub retry_base_delay_ms: u64,
    /// Upper bound on any single reconnect delay (milliseconds)
    pub max_retry_interval_ms: u64,
    /// Consecutive connection failures tolerated before giving up
    pub max_retry_count: u32,
    /// Bound on retained alert history; `None` keeps everything
    pub max_alert_history: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            buffer_size: 1000,
            update_interval_ms: 5000,
            retry_base_delay_ms: 1000,
            max_retry_interval_ms: 30_000,
            max_retry_count: 5,
            max_alert_history: None,
        }
    }
}

impl MonitorConfig {
    /// Validate the configuration, returning a `Config` error on the first
    /// out-of-range field.
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(TelemetryError::Config(format!(
                "sample_rate must be within [0, 1], got {}",
                self.sample_rate
            )));
        }
        if self.buffer_size == 0 {
            return Err(TelemetryError::Config(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.update_interval_ms == 0 {
            return Err(TelemetryError::Config(
                "update_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry_base_delay_ms == 0 {
            return Err(TelemetryError::Config(
                "retry_base_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_retry_interval_ms < self.retry_base_delay_ms {
            return Err(TelemetryError::Config(format!(
                "max_retry_interval_ms ({}) must be at least retry_base_delay_ms ({})",
                self.max_retry_interval_ms, self.retry_base_delay_ms
            )));
        }
        if self.max_retry_count == 0 {
            return Err(TelemetryError::Config(
                "max_retry_count must be greater than zero".to_string(),
            ));
        }
        if self.max_alert_history == Some(0) {
            return Err(TelemetryError::Config(
                "max_alert_history must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }
}
