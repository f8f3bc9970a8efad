//! Performance monitor facade
//!
//! Explicitly constructed service wiring the collector, the aggregator, and
//! the alert engine together behind one handle. There is no process-wide
//! instance; embedders build as many monitors as they need and inject shared
//! runtime pieces through the builder.

use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregate::{aggregate, AggregatedMetrics};
use crate::alerts::{Alert, AlertEngine, AlertEvent, AlertSeverity, AlertThreshold, ThresholdFn};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::metrics::{
    CollectedMetrics, MemoryStats, MetricCollector, RenderTimer, SystemMemory,
};
use crate::runtime::{Clock, Scheduler, SystemClock, ThreadScheduler};
use crate::subscription::Subscription;

/// Builder for a `PerformanceMonitor`
///
/// Unset pieces fall back to the production defaults: `SystemClock`,
/// a dedicated `ThreadScheduler`, and `sysinfo`-backed memory stats.
pub struct PerformanceMonitorBuilder {
    config: MonitorConfig,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    memory: Option<Arc<dyn MemoryStats>>,
}

impl PerformanceMonitorBuilder {
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn memory_provider(mut self, memory: Arc<dyn MemoryStats>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn build(self) -> Result<PerformanceMonitor> {
        self.config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(ThreadScheduler::new()));
        let memory = self.memory.unwrap_or_else(|| Arc::new(SystemMemory::new()));
        let alerts = AlertEngine::new(self.config.max_alert_history);
        let collector = MetricCollector::new(self.config, clock, scheduler, memory)?;
        Ok(PerformanceMonitor { collector, alerts })
    }
}

/// Collector, aggregator, and alert engine behind one handle
pub struct PerformanceMonitor {
    collector: MetricCollector,
    alerts: AlertEngine,
}

impl PerformanceMonitor {
    pub fn builder() -> PerformanceMonitorBuilder {
        PerformanceMonitorBuilder {
            config: MonitorConfig::default(),
            clock: None,
            scheduler: None,
            memory: None,
        }
    }

    /// Build with the default configuration and production runtime
    pub fn with_defaults() -> Result<Self> {
        Self::builder().build()
    }

    pub fn collector(&self) -> &MetricCollector {
        &self.collector
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    // Instrumentation surface, delegated to the collector

    pub fn track_render(&self, component_id: &str, duration_ms: Option<f64>) -> Option<RenderTimer> {
        self.collector.track_render(component_id, duration_ms)
    }

    pub fn track_memory(&self) {
        self.collector.track_memory();
    }

    pub fn track_network_request(&self, url: &str, duration_ms: f64, status: Option<u16>) {
        self.collector.track_network_request(url, duration_ms, status);
    }

    pub fn track_custom(&self, name: &str, value: f64, tags: HashMap<String, String>) {
        self.collector.track_custom(name, value, tags);
    }

    pub fn subscribe_metric(
        &self,
        name: &str,
        callback: impl Fn(f64) + Send + Sync + 'static,
    ) -> Subscription {
        self.collector.subscribe(name, callback)
    }

    pub fn start_memory_sampling(&self, interval_ms: u64) {
        self.collector.start_memory_sampling(interval_ms);
    }

    pub fn stop_memory_sampling(&self) {
        self.collector.stop_memory_sampling();
    }

    pub fn snapshot(&self) -> CollectedMetrics {
        self.collector.snapshot()
    }

    /// Aggregate the collector's current snapshot
    pub fn aggregate(&self) -> AggregatedMetrics {
        aggregate(&self.collector.snapshot())
    }

    /// Aggregate and run one alert evaluation cycle over the result
    pub fn evaluate_alerts(&self) -> AggregatedMetrics {
        let aggregated = self.aggregate();
        self.alerts.evaluate(&aggregated);
        aggregated
    }

    /// Register a named-metric threshold with trigger/resolve callbacks.
    ///
    /// `metric_name` is `"render"`, `"memory"` (threshold in megabytes),
    /// `"network"`, or a custom metric name (threshold against its latest
    /// value). Dropping the returned subscription removes both the threshold
    /// and the callbacks.
    pub fn configure_alert(
        &self,
        metric_name: &str,
        threshold: f64,
        severity: AlertSeverity,
        on_trigger: impl Fn(&Alert) + Send + Sync + 'static,
        on_resolve: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let condition: ThresholdFn = match metric_name {
            "render" => Arc::new(move |agg: &AggregatedMetrics| {
                agg.renders.max_duration > threshold
            }),
            "memory" => {
                let limit_bytes = threshold * 1024.0 * 1024.0;
                Arc::new(move |agg: &AggregatedMetrics| {
                    agg.memory.max_heap_used as f64 > limit_bytes
                })
            }
            "network" => Arc::new(move |agg: &AggregatedMetrics| {
                agg.network.max_duration > threshold
            }),
            name => {
                let name = name.to_string();
                Arc::new(move |agg: &AggregatedMetrics| {
                    agg.custom
                        .by_name
                        .get(&name)
                        .is_some_and(|stats| stats.latest > threshold)
                })
            }
        };

        let threshold_id = format!("configured-{metric_name}");
        self.alerts.add_threshold(AlertThreshold {
            id: threshold_id.clone(),
            name: format!("{metric_name} threshold"),
            description: format!("{metric_name} above {threshold}"),
            severity,
            condition,
        });

        let watched_id = threshold_id.clone();
        let event_sub = self.alerts.subscribe(move |event| match event {
            AlertEvent::Triggered(alert) if alert.threshold_id == watched_id => {
                on_trigger(alert);
            }
            AlertEvent::Resolved { threshold_id, .. } if *threshold_id == watched_id => {
                on_resolve();
            }
            _ => {}
        });

        let engine = self.alerts.clone();
        Subscription::new(move || {
            engine.remove_threshold(&threshold_id);
            event_sub.unsubscribe();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MemorySample;
    use crate::runtime::VirtualScheduler;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedMemory(u64, u64);

    impl MemoryStats for FixedMemory {
        fn sample(&self) -> MemorySample {
            MemorySample {
                heap_used: self.0,
                heap_total: self.1,
            }
        }
    }

    fn monitor() -> PerformanceMonitor {
        let scheduler = Arc::new(VirtualScheduler::new());
        PerformanceMonitor::builder()
            .clock(scheduler.clock())
            .scheduler(scheduler)
            .memory_provider(Arc::new(FixedMemory(512 * 1024 * 1024, 1024 * 1024 * 1024)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_invalid_config_fails_at_build() {
        let mut config = MonitorConfig::default();
        config.sample_rate = 2.0;
        assert!(PerformanceMonitor::builder().config(config).build().is_err());
    }

    #[test]
    fn test_track_and_aggregate() {
        let monitor = monitor();
        monitor.track_render("Header", Some(10.0));
        monitor.track_render("Header", Some(30.0));
        let aggregated = monitor.aggregate();
        assert_eq!(aggregated.renders.count, 2);
        assert_eq!(aggregated.renders.average_duration, 20.0);
    }

    #[test]
    fn test_configure_alert_trigger_and_resolve() {
        let monitor = monitor();
        let triggers = Arc::new(AtomicUsize::new(0));
        let resolves = Arc::new(AtomicUsize::new(0));
        let trigger_count = Arc::clone(&triggers);
        let resolve_count = Arc::clone(&resolves);
        let _alert = monitor.configure_alert(
            "render",
            100.0,
            AlertSeverity::Warning,
            move |_| {
                trigger_count.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                resolve_count.fetch_add(1, Ordering::SeqCst);
            },
        );

        monitor.track_render("Header", Some(150.0));
        monitor.evaluate_alerts();
        monitor.evaluate_alerts(); // sustained breach stays silent
        assert_eq!(triggers.load(Ordering::SeqCst), 1);

        monitor.collector().clear();
        monitor.track_render("Header", Some(10.0));
        monitor.evaluate_alerts();
        assert_eq!(resolves.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.alerts().history().len(), 1);
    }

    #[test]
    fn test_configure_alert_unsubscribe_removes_threshold() {
        let monitor = monitor();
        let triggers = Arc::new(AtomicUsize::new(0));
        let trigger_count = Arc::clone(&triggers);
        let alert = monitor.configure_alert(
            "render",
            100.0,
            AlertSeverity::Warning,
            move |_| {
                trigger_count.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );
        alert.unsubscribe();

        monitor.track_render("Header", Some(500.0));
        monitor.evaluate_alerts();
        assert_eq!(triggers.load(Ordering::SeqCst), 0);
        assert!(monitor.alerts().threshold_ids().is_empty());
    }

    #[test]
    fn test_configure_alert_custom_metric() {
        let monitor = monitor();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _alert = monitor.configure_alert(
            "queue.depth",
            50.0,
            AlertSeverity::Critical,
            move |alert| {
                sink.lock().push(alert.message.clone());
            },
            || {},
        );

        monitor.track_custom("queue.depth", 80.0, HashMap::new());
        monitor.evaluate_alerts();
        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].contains("queue.depth"));
    }
}
