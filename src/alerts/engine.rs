//! Alert engine
//!
//! Each threshold is a predicate over `AggregatedMetrics`. Transitions are
//! edge-triggered: entering the breached state emits exactly one alert,
//! leaving it emits exactly one resolve, and a sustained breach stays silent
//! in between, so a flapping aggregate cannot create an alert storm.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::aggregate::AggregatedMetrics;
use crate::subscription::Subscription;

/// Severity attached to a threshold and its alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Error,
    Critical,
}

/// Predicate over one aggregation result
pub type ThresholdFn = Arc<dyn Fn(&AggregatedMetrics) -> bool + Send + Sync>;

/// A registered alert rule
#[derive(Clone)]
pub struct AlertThreshold {
    /// Unique id; re-registering the same id replaces the prior rule
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub condition: ThresholdFn,
}

impl AlertThreshold {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        severity: AlertSeverity,
        condition: impl Fn(&AggregatedMetrics) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            severity,
            condition: Arc::new(condition),
        }
    }
}

impl fmt::Debug for AlertThreshold {
    // condition is not Debug; skip it
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertThreshold")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish()
    }
}

/// One emitted alert
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub threshold_id: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
}

/// Notification delivered to alert subscribers
#[derive(Debug, Clone)]
pub enum AlertEvent {
    Triggered(Alert),
    Resolved { threshold_id: String, name: String },
}

type AlertCallback = Arc<dyn Fn(&AlertEvent) + Send + Sync>;

struct ThresholdEntry {
    threshold: AlertThreshold,
    active: bool,
}

struct EngineInner {
    thresholds: Mutex<Vec<ThresholdEntry>>,
    history: Mutex<VecDeque<Alert>>,
    subscribers: Mutex<Vec<(u64, AlertCallback)>>,
    next_sub_id: AtomicU64,
    max_history: Option<usize>,
}

/// Registers thresholds and evaluates them against aggregates
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct AlertEngine {
    inner: Arc<EngineInner>,
}

impl AlertEngine {
    /// `max_history = None` keeps the full alert history
    pub fn new(max_history: Option<usize>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                thresholds: Mutex::new(Vec::new()),
                history: Mutex::new(VecDeque::new()),
                subscribers: Mutex::new(Vec::new()),
                next_sub_id: AtomicU64::new(0),
                max_history,
            }),
        }
    }

    /// Register a threshold; a threshold with the same id replaces the prior
    /// rule and resets its trigger state
    pub fn add_threshold(&self, threshold: AlertThreshold) {
        let mut thresholds = self.inner.thresholds.lock();
        if let Some(entry) = thresholds
            .iter_mut()
            .find(|entry| entry.threshold.id == threshold.id)
        {
            entry.threshold = threshold;
            entry.active = false;
        } else {
            thresholds.push(ThresholdEntry {
                threshold,
                active: false,
            });
        }
    }

    /// Remove a threshold by id; unknown ids are a no-op
    pub fn remove_threshold(&self, id: &str) {
        self.inner
            .thresholds
            .lock()
            .retain(|entry| entry.threshold.id != id);
    }

    /// Ids of currently registered thresholds, in registration order
    pub fn threshold_ids(&self) -> Vec<String> {
        self.inner
            .thresholds
            .lock()
            .iter()
            .map(|entry| entry.threshold.id.clone())
            .collect()
    }

    /// Receive every trigger and resolve notification
    pub fn subscribe(&self, callback: impl Fn(&AlertEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .push((id, Arc::new(callback)));

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .subscribers
                    .lock()
                    .retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Evaluate every threshold against one aggregate, emitting trigger and
    /// resolve events on state transitions only
    pub fn evaluate(&self, aggregated: &AggregatedMetrics) {
        let events: Vec<AlertEvent> = {
            let mut thresholds = self.inner.thresholds.lock();
            let mut events = Vec::new();
            for entry in thresholds.iter_mut() {
                let breached = (entry.threshold.condition)(aggregated);
                match (entry.active, breached) {
                    (false, true) => {
                        entry.active = true;
                        let alert = Alert {
                            threshold_id: entry.threshold.id.clone(),
                            message: format!(
                                "{}: {}",
                                entry.threshold.name, entry.threshold.description
                            ),
                            severity: entry.threshold.severity,
                            timestamp: Utc::now(),
                        };
                        self.push_history(alert.clone());
                        events.push(AlertEvent::Triggered(alert));
                    }
                    (true, false) => {
                        entry.active = false;
                        events.push(AlertEvent::Resolved {
                            threshold_id: entry.threshold.id.clone(),
                            name: entry.threshold.name.clone(),
                        });
                    }
                    _ => {}
                }
            }
            events
        };

        if events.is_empty() {
            return;
        }
        let callbacks: Vec<AlertCallback> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for event in &events {
            for callback in &callbacks {
                if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                    tracing::warn!("alert subscriber panicked");
                }
            }
        }
    }

    fn push_history(&self, alert: Alert) {
        let mut history = self.inner.history.lock();
        if let Some(max) = self.inner.max_history {
            while history.len() >= max {
                history.pop_front();
            }
        }
        history.push_back(alert);
    }

    /// Copy of the retained alert history, oldest first
    pub fn history(&self) -> Vec<Alert> {
        self.inner.history.lock().iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::RenderSummary;

    fn aggregate_with_max_render(max: f64) -> AggregatedMetrics {
        AggregatedMetrics {
            renders: RenderSummary {
                count: 1,
                average_duration: max,
                max_duration: max,
                min_duration: max,
                component_breakdown: Default::default(),
            },
            ..Default::default()
        }
    }

    fn over_100() -> AlertThreshold {
        AlertThreshold::new(
            "slow-render",
            "Slow render",
            "render duration above 100ms",
            AlertSeverity::Warning,
            |agg| agg.renders.max_duration > 100.0,
        )
    }

    #[test]
    fn test_edge_triggered_single_trigger_and_resolve() {
        let engine = AlertEngine::new(None);
        engine.add_threshold(over_100());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = engine.subscribe(move |event| {
            sink.lock().push(event.clone());
        });

        engine.evaluate(&aggregate_with_max_render(150.0));
        engine.evaluate(&aggregate_with_max_render(150.0));
        engine.evaluate(&aggregate_with_max_render(50.0));
        engine.evaluate(&aggregate_with_max_render(50.0));

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], AlertEvent::Triggered(alert)
            if alert.threshold_id == "slow-render"
                && alert.severity == AlertSeverity::Warning));
        assert!(matches!(&events[1], AlertEvent::Resolved { threshold_id, .. }
            if threshold_id == "slow-render"));
    }

    #[test]
    fn test_retrigger_after_resolve() {
        let engine = AlertEngine::new(None);
        engine.add_threshold(over_100());

        engine.evaluate(&aggregate_with_max_render(150.0));
        engine.evaluate(&aggregate_with_max_render(50.0));
        engine.evaluate(&aggregate_with_max_render(150.0));

        assert_eq!(engine.history().len(), 2);
    }

    #[test]
    fn test_same_id_replaces_and_resets_state() {
        let engine = AlertEngine::new(None);
        engine.add_threshold(over_100());
        engine.evaluate(&aggregate_with_max_render(150.0));
        assert_eq!(engine.history().len(), 1);

        // replacement starts Inactive, so a sustained breach re-triggers once
        engine.add_threshold(over_100());
        assert_eq!(engine.threshold_ids(), vec!["slow-render"]);
        engine.evaluate(&aggregate_with_max_render(150.0));
        assert_eq!(engine.history().len(), 2);
    }

    #[test]
    fn test_removed_threshold_stops_evaluating() {
        let engine = AlertEngine::new(None);
        engine.add_threshold(over_100());
        engine.remove_threshold("slow-render");
        engine.evaluate(&aggregate_with_max_render(150.0));
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_history_bounded_fifo() {
        let engine = AlertEngine::new(Some(3));
        for i in 0..6 {
            engine.add_threshold(AlertThreshold::new(
                format!("t{i}"),
                format!("rule {i}"),
                "always on",
                AlertSeverity::Error,
                |_| true,
            ));
        }
        engine.evaluate(&AggregatedMetrics::default());

        let history = engine.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].threshold_id, "t3");
        assert_eq!(history[2].threshold_id, "t5");
    }

    #[test]
    fn test_unsubscribed_callback_not_invoked() {
        let engine = AlertEngine::new(None);
        engine.add_threshold(over_100());
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let sub = engine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();

        engine.evaluate(&aggregate_with_max_render(150.0));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        // the transition itself still happened
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let engine = AlertEngine::new(None);
        engine.add_threshold(over_100());
        let _bad = engine.subscribe(|_| panic!("boom"));
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let _good = engine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.evaluate(&aggregate_with_max_render(150.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
