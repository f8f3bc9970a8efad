//! Metrics Module
//!
//! Raw metric records, the bounded per-kind ring buffers, the validating
//! collector, and the periodic sampler that drives memory snapshots.

mod buffer;
mod collector;
mod memory;
mod record;
mod sampler;

pub use buffer::{CollectedMetrics, MetricBuffer, MetricStore};
pub use collector::{MetricCollector, RenderTimer};
pub use memory::{MemorySample, MemoryStats, SystemMemory};
pub use record::{Metric, MetricData, MetricKind, WireMessage, MAX_REASONABLE_DURATION_MS};
pub use sampler::PeriodicSampler;
