//! Metric records
//!
//! A `Metric` is a single timestamped observation. The kind-specific payload
//! is a proper sum type so downstream matches stay exhaustive, while the
//! serialized form keeps the `{id, timestamp, value, type, metadata}` shape
//! expected on the wire.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on a plausible duration-style value: one hour in milliseconds.
/// Anything above this is treated as instrumentation noise and dropped.
pub const MAX_REASONABLE_DURATION_MS: f64 = 3_600_000.0;

/// Discriminant for the four metric kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Render,
    Memory,
    Network,
    Custom,
}

/// Kind-specific metric payload, serialized under a `metadata` key with a
/// sibling `type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "metadata", rename_all = "lowercase")]
pub enum MetricData {
    #[serde(rename_all = "camelCase")]
    Render { component_id: String },
    #[serde(rename_all = "camelCase")]
    Memory { heap_used: u64, heap_total: u64 },
    Network {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
    Custom {
        name: String,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
}

/// A single timestamped observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    pub value: f64,
    #[serde(flatten)]
    pub data: MetricData,
}

impl Metric {
    fn next_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// A render observation; `value` is the render duration in milliseconds
    pub fn render(component_id: impl Into<String>, duration_ms: f64, timestamp_ms: u64) -> Self {
        Self {
            id: Self::next_id(),
            timestamp_ms,
            value: duration_ms,
            data: MetricData::Render {
                component_id: component_id.into(),
            },
        }
    }

    /// A memory observation; `value` carries heap used in megabytes so the
    /// shared validation bounds still apply, raw byte counts live in the
    /// payload
    pub fn memory(heap_used: u64, heap_total: u64, timestamp_ms: u64) -> Self {
        Self {
            id: Self::next_id(),
            timestamp_ms,
            value: heap_used as f64 / (1024.0 * 1024.0),
            data: MetricData::Memory {
                heap_used,
                heap_total,
            },
        }
    }

    /// A network observation; `value` is the request duration in milliseconds
    pub fn network(
        url: impl Into<String>,
        duration_ms: f64,
        status: Option<u16>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: Self::next_id(),
            timestamp_ms,
            value: duration_ms,
            data: MetricData::Network {
                url: url.into(),
                status,
            },
        }
    }

    /// An application-defined observation
    pub fn custom(
        name: impl Into<String>,
        value: f64,
        tags: HashMap<String, String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: Self::next_id(),
            timestamp_ms,
            value,
            data: MetricData::Custom {
                name: name.into(),
                tags,
            },
        }
    }

    /// The kind discriminant of this metric
    pub fn kind(&self) -> MetricKind {
        match self.data {
            MetricData::Render { .. } => MetricKind::Render,
            MetricData::Memory { .. } => MetricKind::Memory,
            MetricData::Network { .. } => MetricKind::Network,
            MetricData::Custom { .. } => MetricKind::Custom,
        }
    }

    /// Logical name used for per-name subscriptions: the kind name, or the
    /// metric's own name for custom metrics
    pub fn logical_name(&self) -> &str {
        match &self.data {
            MetricData::Render { .. } => "render",
            MetricData::Memory { .. } => "memory",
            MetricData::Network { .. } => "network",
            MetricData::Custom { name, .. } => name,
        }
    }

    /// Check the buffering invariants: non-empty id and logical name, finite
    /// non-negative value no larger than `MAX_REASONABLE_DURATION_MS`
    pub fn validate(&self) -> bool {
        if self.id.is_empty() || self.logical_name().is_empty() {
            return false;
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return false;
        }
        self.value <= MAX_REASONABLE_DURATION_MS
    }
}

/// Envelope for one metric on the streaming wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub metric: Metric,
    pub timestamp: u64,
}
