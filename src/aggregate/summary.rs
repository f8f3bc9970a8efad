//! Aggregated summary types
//!
//! All numeric fields default to zero; an empty snapshot aggregates to the
//! `Default` value of every summary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-component render statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentStats {
    pub count: u64,
    pub average_duration: f64,
}

/// Render summary over one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub count: u64,
    pub average_duration: f64,
    pub max_duration: f64,
    pub min_duration: f64,
    pub component_breakdown: HashMap<String, ComponentStats>,
}

/// Memory summary over one snapshot, byte-denominated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub average_heap_used: f64,
    pub max_heap_used: u64,
    pub min_heap_used: u64,
    pub average_heap_total: f64,
}

/// One endpoint in the slowest-endpoints ranking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointTiming {
    pub url: String,
    pub duration: f64,
}

/// Network summary over one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub count: u64,
    pub average_duration: f64,
    pub max_duration: f64,
    pub min_duration: f64,
    /// Request count per HTTP status code; requests without a status are not
    /// counted here
    pub by_status: HashMap<u16, u64>,
    /// Top five requests by duration, descending; ties keep snapshot order
    pub slowest_endpoints: Vec<EndpointTiming>,
}

/// Per-name statistics for custom metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomStats {
    pub count: u64,
    /// Value of the most recently buffered record
    pub latest: f64,
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

/// Custom-metric summary over one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomSummary {
    pub by_name: HashMap<String, CustomStats>,
}

/// Full aggregate over one `CollectedMetrics` snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub renders: RenderSummary,
    pub memory: MemorySummary,
    pub network: NetworkSummary,
    pub custom: CustomSummary,
}
