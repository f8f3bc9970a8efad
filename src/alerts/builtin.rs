//! Built-in threshold factories
//!
//! Default alerting policy over the aggregate summaries. These are plain
//! `AlertThreshold` values; applications can register arbitrary predicates
//! alongside or instead of them.

use super::engine::{AlertSeverity, AlertThreshold};

/// Any render (or one specific component) slower than `threshold_ms`
pub fn slow_render(threshold_ms: f64, component: Option<&str>) -> AlertThreshold {
    match component {
        Some(component) => {
            let id = format!("slow-render-{component}");
            let name = format!("Slow render ({component})");
            let target = component.to_string();
            AlertThreshold::new(
                id,
                name,
                format!("average render duration above {threshold_ms}ms"),
                AlertSeverity::Warning,
                move |agg| {
                    agg.renders
                        .component_breakdown
                        .get(&target)
                        .is_some_and(|stats| stats.average_duration > threshold_ms)
                },
            )
        }
        None => AlertThreshold::new(
            "slow-render",
            "Slow render",
            format!("render duration above {threshold_ms}ms"),
            AlertSeverity::Warning,
            move |agg| agg.renders.max_duration > threshold_ms,
        ),
    }
}

/// Heap usage above `max_heap_mb` megabytes
pub fn high_memory(max_heap_mb: f64) -> AlertThreshold {
    let limit_bytes = max_heap_mb * 1024.0 * 1024.0;
    AlertThreshold::new(
        "high-memory",
        "High memory usage",
        format!("heap used above {max_heap_mb}MB"),
        AlertSeverity::Error,
        move |agg| agg.memory.max_heap_used as f64 > limit_bytes,
    )
}

/// Any network request slower than `threshold_ms`
pub fn slow_network(threshold_ms: f64) -> AlertThreshold {
    AlertThreshold::new(
        "slow-network",
        "Slow network request",
        format!("request duration above {threshold_ms}ms"),
        AlertSeverity::Warning,
        move |agg| agg.network.max_duration > threshold_ms,
    )
}

/// More than `max_errors` network responses with a 4xx/5xx status
pub fn high_error_rate(max_errors: u64) -> AlertThreshold {
    AlertThreshold::new(
        "high-error-rate",
        "High network error rate",
        format!("more than {max_errors} failed requests"),
        AlertSeverity::Critical,
        move |agg| {
            let errors: u64 = agg
                .network
                .by_status
                .iter()
                .filter(|(status, _)| **status >= 400)
                .map(|(_, count)| *count)
                .sum();
            errors > max_errors
        },
    )
}
