//! Aggregation Module
//!
//! Pure reduction of a raw metric snapshot into summary statistics. No state,
//! no side effects; safe to run concurrently over independent snapshots.

mod engine;
mod summary;

pub use engine::aggregate;
pub use summary::{
    AggregatedMetrics, ComponentStats, CustomStats, CustomSummary, EndpointTiming, MemorySummary,
    NetworkSummary, RenderSummary,
};
