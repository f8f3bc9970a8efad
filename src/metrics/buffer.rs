//! Bounded metric buffers
//!
//! Fixed-capacity FIFO rings, one per metric kind. No internal locking; the
//! owning collector or stream monitor serializes all mutation, and
//! `snapshot()` hands out owned copies so readers never observe mid-iteration
//! mutation.

use std::collections::VecDeque;

use serde::Serialize;

use super::record::{Metric, MetricKind};

/// Bounded FIFO ring of raw metrics
#[derive(Debug, Clone)]
pub struct MetricBuffer {
    capacity: usize,
    items: VecDeque<Metric>,
}

impl MetricBuffer {
    /// Create a buffer with a fixed capacity; capacity is validated by the
    /// owning component's config before construction
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append a metric, evicting the oldest entry when at capacity
    pub fn push(&mut self, metric: Metric) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(metric);
    }

    /// Remove all buffered metrics
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Owned copy of the buffered metrics in insertion order
    pub fn snapshot(&self) -> Vec<Metric> {
        self.items.iter().cloned().collect()
    }
}

/// Four independent rings, one per metric kind, sharing one capacity
#[derive(Debug, Clone)]
pub struct MetricStore {
    renders: MetricBuffer,
    memory: MetricBuffer,
    network: MetricBuffer,
    custom: MetricBuffer,
}

impl MetricStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            renders: MetricBuffer::new(capacity),
            memory: MetricBuffer::new(capacity),
            network: MetricBuffer::new(capacity),
            custom: MetricBuffer::new(capacity),
        }
    }

    /// Route a metric to the ring matching its kind
    pub fn push(&mut self, metric: Metric) {
        match metric.kind() {
            MetricKind::Render => self.renders.push(metric),
            MetricKind::Memory => self.memory.push(metric),
            MetricKind::Network => self.network.push(metric),
            MetricKind::Custom => self.custom.push(metric),
        }
    }

    pub fn clear(&mut self) {
        self.renders.clear();
        self.memory.clear();
        self.network.clear();
        self.custom.clear();
    }

    pub fn len(&self) -> usize {
        self.renders.len() + self.memory.len() + self.network.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owned copies of all four rings
    pub fn snapshot(&self) -> CollectedMetrics {
        CollectedMetrics {
            renders: self.renders.snapshot(),
            memory: self.memory.snapshot(),
            network: self.network.snapshot(),
            custom: self.custom.snapshot(),
        }
    }
}

/// Point-in-time copy of the collected metrics, one ordered sequence per kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectedMetrics {
    pub renders: Vec<Metric>,
    pub memory: Vec<Metric>,
    pub network: Vec<Metric>,
    pub custom: Vec<Metric>,
}

impl CollectedMetrics {
    pub fn is_empty(&self) -> bool {
        self.renders.is_empty()
            && self.memory.is_empty()
            && self.network.is_empty()
            && self.custom.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(component: &str, value: f64) -> Metric {
        Metric::render(component, value, 0)
    }

    #[test]
    fn test_push_within_capacity() {
        let mut buffer = MetricBuffer::new(3);
        buffer.push(render("A", 1.0));
        buffer.push(render("A", 2.0));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.snapshot()[0].value, 1.0);
    }

    #[test]
    fn test_fifo_eviction_keeps_last_capacity_items() {
        let mut buffer = MetricBuffer::new(5);
        for i in 0..12 {
            buffer.push(render("A", i as f64));
        }
        assert_eq!(buffer.len(), 5);
        let values: Vec<f64> = buffer.snapshot().iter().map(|m| m.value).collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let mut buffer = MetricBuffer::new(5);
        buffer.push(render("A", 1.0));
        let snapshot = buffer.snapshot();
        buffer.push(render("A", 2.0));
        buffer.clear();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].value, 1.0);
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut buffer = MetricBuffer::new(2);
        buffer.push(render("A", 1.0));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn test_store_routes_by_kind() {
        let mut store = MetricStore::new(10);
        store.push(Metric::render("A", 1.0, 0));
        store.push(Metric::memory(1024, 2048, 0));
        store.push(Metric::network("/x", 3.0, Some(200), 0));
        store.push(Metric::custom("c", 4.0, Default::default(), 0));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.renders.len(), 1);
        assert_eq!(snapshot.memory.len(), 1);
        assert_eq!(snapshot.network.len(), 1);
        assert_eq!(snapshot.custom.len(), 1);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_store_caps_each_kind_independently() {
        let mut store = MetricStore::new(2);
        for i in 0..5 {
            store.push(Metric::render("A", i as f64, 0));
            store.push(Metric::network("/x", i as f64, Some(200), 0));
        }
        let snapshot = store.snapshot();
        assert_eq!(snapshot.renders.len(), 2);
        assert_eq!(snapshot.network.len(), 2);
        assert_eq!(snapshot.renders[0].value, 3.0);
    }
}
