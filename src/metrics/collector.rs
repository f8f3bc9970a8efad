//! Metric collector
//!
//! Validates, samples, and buffers metrics, and fans each accepted value out
//! to per-name subscribers. All buffer mutation funnels through one internal
//! lock, preserving the single-writer discipline the rings assume.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::Rng;

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::metrics::buffer::{CollectedMetrics, MetricStore};
use crate::metrics::memory::MemoryStats;
use crate::metrics::record::Metric;
use crate::metrics::sampler::PeriodicSampler;
use crate::runtime::{Clock, Scheduler};
use crate::subscription::Subscription;

type MetricCallback = Arc<dyn Fn(f64) + Send + Sync>;

struct CollectorInner {
    config: MonitorConfig,
    enabled: AtomicBool,
    dropped: AtomicU64,
    store: Mutex<MetricStore>,
    subscribers: Mutex<HashMap<String, Vec<(u64, MetricCallback)>>>,
    next_sub_id: AtomicU64,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    memory: Arc<dyn MemoryStats>,
    memory_sampler: Mutex<Option<PeriodicSampler>>,
}

impl CollectorInner {
    fn should_sample(&self) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            return false;
        }
        if self.config.sample_rate >= 1.0 {
            return true;
        }
        if self.config.sample_rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.config.sample_rate
    }

    /// Validate, buffer, and fan out one metric. Rejections are counted and
    /// debug-logged, never surfaced to the call site.
    fn record(&self, metric: Metric) {
        if !metric.validate() {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                name = metric.logical_name(),
                value = metric.value,
                "dropping invalid metric"
            );
            return;
        }
        let name = metric.logical_name().to_string();
        let value = metric.value;
        self.store.lock().push(metric);
        self.notify(&name, value);
    }

    fn notify(&self, name: &str, value: f64) {
        let callbacks: Vec<MetricCallback> = {
            let subscribers = self.subscribers.lock();
            match subscribers.get(name) {
                Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };
        for callback in callbacks {
            // one faulty observer must not disrupt the others
            if panic::catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                tracing::warn!(metric = name, "metric subscriber panicked");
            }
        }
    }

    fn track_memory(&self) {
        if !self.should_sample() {
            return;
        }
        let sample = self.memory.sample();
        self.record(Metric::memory(
            sample.heap_used,
            sample.heap_total,
            self.clock.now_ms(),
        ));
    }
}

/// Validating, sampling metric ingestion front-end
///
/// Explicitly constructed with its clock, scheduler, and memory provider;
/// embedders share one scheduler across components.
pub struct MetricCollector {
    inner: Arc<CollectorInner>,
}

impl MetricCollector {
    pub fn new(
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        memory: Arc<dyn MemoryStats>,
    ) -> Result<Self> {
        config.validate()?;
        let buffer_size = config.buffer_size;
        Ok(Self {
            inner: Arc::new(CollectorInner {
                config,
                enabled: AtomicBool::new(true),
                dropped: AtomicU64::new(0),
                store: Mutex::new(MetricStore::new(buffer_size)),
                subscribers: Mutex::new(HashMap::new()),
                next_sub_id: AtomicU64::new(0),
                clock,
                scheduler,
                memory,
                memory_sampler: Mutex::new(None),
            }),
        })
    }

    /// Record a render observation.
    ///
    /// With an explicit duration the metric is recorded immediately and
    /// `None` is returned. Without one, the returned `RenderTimer` captures
    /// the start timestamp and records on `stop()`. Sampled-out or disabled
    /// calls return `None` and record nothing.
    pub fn track_render(&self, component_id: &str, duration_ms: Option<f64>) -> Option<RenderTimer> {
        if !self.inner.should_sample() {
            return None;
        }
        match duration_ms {
            Some(duration) => {
                self.inner.record(Metric::render(
                    component_id,
                    duration,
                    self.inner.clock.now_ms(),
                ));
                None
            }
            None => Some(RenderTimer {
                inner: Arc::downgrade(&self.inner),
                component_id: component_id.to_string(),
                start_ms: self.inner.clock.now_ms(),
            }),
        }
    }

    /// Record one heap reading from the memory provider
    pub fn track_memory(&self) {
        self.inner.track_memory();
    }

    /// Record a completed network request
    pub fn track_network_request(&self, url: &str, duration_ms: f64, status: Option<u16>) {
        if !self.inner.should_sample() {
            return;
        }
        self.inner.record(Metric::network(
            url,
            duration_ms,
            status,
            self.inner.clock.now_ms(),
        ));
    }

    /// Record an application-defined metric
    pub fn track_custom(&self, name: &str, value: f64, tags: HashMap<String, String>) {
        if !self.inner.should_sample() {
            return;
        }
        self.inner
            .record(Metric::custom(name, value, tags, self.inner.clock.now_ms()));
    }

    /// Invoke `callback` with the value of every accepted metric whose
    /// logical name matches: `"render"`, `"memory"`, `"network"`, or a custom
    /// metric name
    pub fn subscribe(
        &self,
        name: &str,
        callback: impl Fn(f64) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .entry(name.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        let weak = Arc::downgrade(&self.inner);
        let name = name.to_string();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut subscribers = inner.subscribers.lock();
                if let Some(list) = subscribers.get_mut(&name) {
                    list.retain(|(entry_id, _)| *entry_id != id);
                    if list.is_empty() {
                        subscribers.remove(&name);
                    }
                }
            }
        })
    }

    pub fn enable(&self) {
        self.inner.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Metrics rejected by validation since construction
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::SeqCst)
    }

    /// Start periodic memory sampling, replacing any running sampler
    pub fn start_memory_sampling(&self, interval_ms: u64) {
        let weak = Arc::downgrade(&self.inner);
        let sampler = PeriodicSampler::new(
            interval_ms,
            Arc::clone(&self.inner.scheduler),
            Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.track_memory();
                }
            }),
        );
        sampler.start();
        let previous = self.inner.memory_sampler.lock().replace(sampler);
        if let Some(previous) = previous {
            previous.destroy();
        }
    }

    /// Stop memory sampling; no-op when not sampling
    pub fn stop_memory_sampling(&self) {
        if let Some(sampler) = self.inner.memory_sampler.lock().take() {
            sampler.destroy();
        }
    }

    /// Owned copy of the current buffers
    pub fn snapshot(&self) -> CollectedMetrics {
        self.inner.store.lock().snapshot()
    }

    /// Drop all buffered metrics
    pub fn clear(&self) {
        self.inner.store.lock().clear();
    }
}

/// Stop handle returned by `track_render` without an explicit duration
///
/// Records the elapsed render duration when stopped; dropping it without
/// calling `stop` records nothing.
pub struct RenderTimer {
    inner: Weak<CollectorInner>,
    component_id: String,
    start_ms: u64,
}

impl RenderTimer {
    /// Record the render with the elapsed duration since the timer started
    pub fn stop(self) {
        if let Some(inner) = self.inner.upgrade() {
            let elapsed = inner.clock.now_ms().saturating_sub(self.start_ms) as f64;
            inner.record(Metric::render(
                &self.component_id,
                elapsed,
                inner.clock.now_ms(),
            ));
        }
    }
}
