//! Alerts Module
//!
//! Threshold rules evaluated against aggregated metrics, with an
//! edge-triggered trigger/resolve lifecycle, bounded alert history, and
//! subscriber notification.

pub mod builtin;
mod engine;

pub use engine::{Alert, AlertEngine, AlertEvent, AlertSeverity, AlertThreshold, ThresholdFn};
