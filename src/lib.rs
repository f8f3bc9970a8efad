//! perfstream - Embeddable performance-telemetry pipeline
//!
//! Ingests render, memory, network, and custom metrics from instrumented
//! applications; retains them in bounded FIFO buffers; reduces snapshots to
//! summary statistics; evaluates edge-triggered alert thresholds; and streams
//! live updates over a reconnecting transport.
//!
//! # Modules
//!
//! ## Core pipeline
//! - [`metrics`] - Metric records, bounded buffers, the validating collector,
//!   and the periodic sampler
//! - [`aggregate`] - Pure snapshot-to-summary reduction
//! - [`alerts`] - Threshold registry with trigger/resolve lifecycle and
//!   bounded history
//! - [`streaming`] - Reconnecting duplex metric streaming with backoff
//!
//! ## Infrastructure
//! - [`config`] - Pipeline configuration, validated at construction
//! - [`runtime`] - Clock and timer scheduling, virtual or wall-clock
//! - [`monitor`] - Explicitly constructed facade wiring the pieces together
//!
//! Buffers are volatile and bounded: this crate does no durable storage and
//! no cross-process aggregation, and streamed delivery is at-most-once.

pub mod aggregate;
pub mod alerts;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod runtime;
pub mod streaming;
mod subscription;

pub use error::{Result, TelemetryError};
pub use subscription::Subscription;

/// Re-export of commonly used types
pub mod prelude {
    pub use crate::aggregate::{aggregate, AggregatedMetrics};
    pub use crate::alerts::{Alert, AlertEngine, AlertEvent, AlertSeverity, AlertThreshold};
    pub use crate::config::MonitorConfig;
    pub use crate::error::{Result, TelemetryError};
    pub use crate::metrics::{
        CollectedMetrics, Metric, MetricBuffer, MetricCollector, MetricData, MetricKind,
        PeriodicSampler,
    };
    pub use crate::monitor::PerformanceMonitor;
    pub use crate::runtime::{Clock, Scheduler, SystemClock, ThreadScheduler, VirtualScheduler};
    pub use crate::streaming::{StreamMonitor, StreamState, TcpConnector};
    pub use crate::subscription::Subscription;
}
