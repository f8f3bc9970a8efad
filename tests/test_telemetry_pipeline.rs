//! Integration test: full local pipeline (track → buffer → aggregate → alert)

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use perfstream::alerts::builtin;
use perfstream::metrics::{MemorySample, MemoryStats};
use perfstream::prelude::*;
use perfstream::runtime::ManualClock;

struct FixedMemory {
    used: u64,
    total: u64,
}

impl MemoryStats for FixedMemory {
    fn sample(&self) -> MemorySample {
        MemorySample {
            heap_used: self.used,
            heap_total: self.total,
        }
    }
}

struct Pipeline {
    scheduler: Arc<VirtualScheduler>,
    clock: Arc<ManualClock>,
    monitor: PerformanceMonitor,
}

fn pipeline(config: MonitorConfig) -> Pipeline {
    let scheduler = Arc::new(VirtualScheduler::new());
    let clock = scheduler.clock();
    let monitor = PerformanceMonitor::builder()
        .config(config)
        .clock(clock.clone())
        .scheduler(scheduler.clone())
        .memory_provider(Arc::new(FixedMemory {
            used: 200 * 1024 * 1024,
            total: 800 * 1024 * 1024,
        }))
        .build()
        .unwrap();
    Pipeline {
        scheduler,
        clock,
        monitor,
    }
}

#[test]
fn test_track_aggregate_alert_roundtrip() {
    let p = pipeline(MonitorConfig::default());

    p.monitor.track_render("Header", Some(10.0));
    p.monitor.track_render("Header", Some(30.0));
    p.monitor.track_render("Sidebar", Some(5.0));
    p.monitor.track_network_request("/api/users", 80.0, Some(200));
    p.monitor.track_network_request("/api/orders", 450.0, Some(500));
    p.monitor.track_custom("cache.hit_rate", 0.93, HashMap::new());

    let aggregated = p.monitor.aggregate();
    assert_eq!(aggregated.renders.count, 3);
    assert_eq!(aggregated.renders.average_duration, 15.0);
    assert_eq!(aggregated.renders.component_breakdown["Header"].count, 2);
    assert_eq!(aggregated.network.by_status[&500], 1);
    assert_eq!(aggregated.network.slowest_endpoints[0].url, "/api/orders");
    assert_eq!(aggregated.custom.by_name["cache.hit_rate"].latest, 0.93);

    // built-in thresholds fire once and resolve once
    let engine = p.monitor.alerts();
    engine.add_threshold(builtin::slow_network(300.0));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = engine.subscribe(move |event| {
        sink.lock().push(format!("{event:?}"));
    });

    p.monitor.evaluate_alerts();
    p.monitor.evaluate_alerts();
    assert_eq!(events.lock().len(), 1);

    p.monitor.collector().clear();
    p.monitor.evaluate_alerts();
    assert_eq!(events.lock().len(), 2);
    assert_eq!(engine.history().len(), 1);
}

#[test]
fn test_validation_and_eviction_through_public_api() {
    let mut config = MonitorConfig::default();
    config.buffer_size = 4;
    let p = pipeline(config);

    p.monitor.track_render("A", Some(-1.0));
    p.monitor.track_render("A", Some(f64::NAN));
    p.monitor.track_render("A", Some(3_600_001.0));
    for i in 0..8 {
        p.monitor.track_render("A", Some(i as f64));
    }

    let snapshot = p.monitor.snapshot();
    let values: Vec<f64> = snapshot.renders.iter().map(|m| m.value).collect();
    assert_eq!(values, vec![4.0, 5.0, 6.0, 7.0]);
    assert_eq!(p.monitor.collector().dropped_count(), 3);
}

#[test]
fn test_render_timer_and_memory_sampling_on_virtual_clock() {
    let p = pipeline(MonitorConfig::default());

    let timer = p.monitor.track_render("Checkout", None).unwrap();
    p.clock.advance(75);
    timer.stop();
    assert_eq!(p.monitor.snapshot().renders[0].value, 75.0);

    p.monitor.start_memory_sampling(10_000);
    p.scheduler.advance(30_000);
    let aggregated = p.monitor.aggregate();
    assert_eq!(p.monitor.snapshot().memory.len(), 4);
    assert_eq!(aggregated.memory.max_heap_used, 200 * 1024 * 1024);

    p.monitor.stop_memory_sampling();
    p.scheduler.advance(100_000);
    assert_eq!(p.monitor.snapshot().memory.len(), 4);
}

#[test]
fn test_subscriptions_and_configured_alerts() {
    let p = pipeline(MonitorConfig::default());

    let render_values = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&render_values);
    let sub = p.monitor.subscribe_metric("render", move |value| {
        sink.lock().push(value);
    });

    let triggers = Arc::new(AtomicUsize::new(0));
    let resolves = Arc::new(AtomicUsize::new(0));
    let trigger_count = Arc::clone(&triggers);
    let resolve_count = Arc::clone(&resolves);
    let _alert = p.monitor.configure_alert(
        "render",
        100.0,
        AlertSeverity::Error,
        move |_| {
            trigger_count.fetch_add(1, Ordering::SeqCst);
        },
        move || {
            resolve_count.fetch_add(1, Ordering::SeqCst);
        },
    );

    p.monitor.track_render("Header", Some(250.0));
    assert_eq!(render_values.lock().as_slice(), [250.0]);

    p.monitor.evaluate_alerts();
    p.monitor.evaluate_alerts();
    assert_eq!(triggers.load(Ordering::SeqCst), 1);
    assert_eq!(resolves.load(Ordering::SeqCst), 0);

    p.monitor.collector().clear();
    p.monitor.evaluate_alerts();
    assert_eq!(resolves.load(Ordering::SeqCst), 1);

    sub.unsubscribe();
    p.monitor.track_render("Header", Some(10.0));
    assert_eq!(render_values.lock().len(), 1);
}

#[test]
fn test_alert_history_is_bounded() {
    let mut config = MonitorConfig::default();
    config.max_alert_history = Some(2);
    let p = pipeline(config);

    for i in 0..5 {
        p.monitor.alerts().add_threshold(AlertThreshold::new(
            format!("rule-{i}"),
            format!("rule {i}"),
            "always firing",
            AlertSeverity::Warning,
            |_| true,
        ));
    }
    p.monitor.evaluate_alerts();

    let history = p.monitor.alerts().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].threshold_id, "rule-3");
    assert_eq!(history[1].threshold_id, "rule-4");
}
