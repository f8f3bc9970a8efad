//! Aggregation pass
//!
//! Single pass per metric kind building per-group accumulators and global
//! extrema together. Empty input yields all-zero summaries; no division by
//! zero anywhere.

use std::collections::HashMap;

use crate::metrics::{CollectedMetrics, Metric, MetricData};

use super::summary::{
    AggregatedMetrics, ComponentStats, CustomStats, CustomSummary, EndpointTiming, MemorySummary,
    NetworkSummary, RenderSummary,
};

const SLOWEST_ENDPOINT_LIMIT: usize = 5;

/// Reduce a snapshot to summary statistics
pub fn aggregate(snapshot: &CollectedMetrics) -> AggregatedMetrics {
    AggregatedMetrics {
        renders: aggregate_renders(&snapshot.renders),
        memory: aggregate_memory(&snapshot.memory),
        network: aggregate_network(&snapshot.network),
        custom: aggregate_custom(&snapshot.custom),
    }
}

fn aggregate_renders(metrics: &[Metric]) -> RenderSummary {
    if metrics.is_empty() {
        return RenderSummary::default();
    }

    let mut count = 0u64;
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut groups: HashMap<String, (u64, f64)> = HashMap::new();

    for metric in metrics {
        let MetricData::Render { component_id } = &metric.data else {
            continue;
        };
        count += 1;
        sum += metric.value;
        max = max.max(metric.value);
        min = min.min(metric.value);
        let entry = groups.entry(component_id.clone()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += metric.value;
    }

    if count == 0 {
        return RenderSummary::default();
    }
    RenderSummary {
        count,
        average_duration: sum / count as f64,
        max_duration: max,
        min_duration: min,
        component_breakdown: groups
            .into_iter()
            .map(|(component, (group_count, group_sum))| {
                (
                    component,
                    ComponentStats {
                        count: group_count,
                        average_duration: group_sum / group_count as f64,
                    },
                )
            })
            .collect(),
    }
}

fn aggregate_memory(metrics: &[Metric]) -> MemorySummary {
    if metrics.is_empty() {
        return MemorySummary::default();
    }

    let mut count = 0u64;
    let mut used_sum = 0.0;
    let mut total_sum = 0.0;
    let mut max_used = 0u64;
    let mut min_used = u64::MAX;

    for metric in metrics {
        let MetricData::Memory {
            heap_used,
            heap_total,
        } = &metric.data
        else {
            continue;
        };
        count += 1;
        used_sum += *heap_used as f64;
        total_sum += *heap_total as f64;
        max_used = max_used.max(*heap_used);
        min_used = min_used.min(*heap_used);
    }

    if count == 0 {
        return MemorySummary::default();
    }
    MemorySummary {
        average_heap_used: used_sum / count as f64,
        max_heap_used: max_used,
        min_heap_used: min_used,
        average_heap_total: total_sum / count as f64,
    }
}

fn aggregate_network(metrics: &[Metric]) -> NetworkSummary {
    if metrics.is_empty() {
        return NetworkSummary::default();
    }

    let mut count = 0u64;
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut by_status: HashMap<u16, u64> = HashMap::new();
    let mut timings: Vec<EndpointTiming> = Vec::with_capacity(metrics.len());

    for metric in metrics {
        let MetricData::Network { url, status } = &metric.data else {
            continue;
        };
        count += 1;
        sum += metric.value;
        max = max.max(metric.value);
        min = min.min(metric.value);
        if let Some(status) = status {
            *by_status.entry(*status).or_insert(0) += 1;
        }
        timings.push(EndpointTiming {
            url: url.clone(),
            duration: metric.value,
        });
    }

    if count == 0 {
        return NetworkSummary::default();
    }

    // stable sort: ties keep snapshot order
    timings.sort_by(|a, b| b.duration.total_cmp(&a.duration));
    timings.truncate(SLOWEST_ENDPOINT_LIMIT);

    NetworkSummary {
        count,
        average_duration: sum / count as f64,
        max_duration: max,
        min_duration: min,
        by_status,
        slowest_endpoints: timings,
    }
}

fn aggregate_custom(metrics: &[Metric]) -> CustomSummary {
    let mut by_name: HashMap<String, CustomStats> = HashMap::new();

    for metric in metrics {
        let MetricData::Custom { name, .. } = &metric.data else {
            continue;
        };
        let stats = by_name.entry(name.clone()).or_insert_with(|| CustomStats {
            count: 0,
            latest: 0.0,
            average: 0.0, // field reused as running sum until the final pass
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
        });
        stats.count += 1;
        stats.latest = metric.value;
        stats.average += metric.value;
        stats.max = stats.max.max(metric.value);
        stats.min = stats.min.min(metric.value);
    }

    for stats in by_name.values_mut() {
        stats.average /= stats.count as f64;
    }

    CustomSummary { by_name }
}
