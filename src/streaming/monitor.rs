//! Stream monitor
//!
//! Owns one reconnecting connection to a remote collector endpoint. Inbound
//! metric events land in local bounded buffers; a broadcast timer aggregates
//! and fans out to local subscribers while the connection is up; outbound
//! track calls serialize wire messages. Reconnects back off exponentially and
//! give up after a configured number of consecutive failures.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::aggregate::{aggregate, AggregatedMetrics};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::metrics::{CollectedMetrics, Metric, MetricStore, WireMessage};
use crate::runtime::{Clock, Scheduler, TimerHandle};
use crate::subscription::Subscription;

use super::transport::{Connection, Connector, TransportEvents};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal until an explicit `start()`
    GivingUp,
}

type StreamCallback = Arc<dyn Fn(&AggregatedMetrics) + Send + Sync>;
type GiveUpCallback = Box<dyn Fn() + Send + Sync>;

/// The connection sits behind its own lock, separate from the state lock, so
/// a slow transport write never blocks state reads or `stop()`
type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

struct ConnState {
    phase: StreamState,
    retry_count: u32,
    /// Bumped on every stop/start; events carrying a stale epoch are ignored
    epoch: u64,
    connection: Option<SharedConnection>,
    store: MetricStore,
    broadcast_timer: Option<TimerHandle>,
    retry_timer: Option<TimerHandle>,
}

struct StreamInner {
    config: MonitorConfig,
    connector: Box<dyn Connector>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    state: Mutex<ConnState>,
    subscribers: Mutex<Vec<(u64, StreamCallback)>>,
    give_up: Mutex<Option<GiveUpCallback>>,
    next_sub_id: AtomicU64,
}

/// Bridges transport callbacks back into the monitor, tagged with the epoch
/// they belong to
struct EventBridge {
    inner: Weak<StreamInner>,
    epoch: u64,
}

impl TransportEvents for EventBridge {
    fn on_open(&self) {
        if let Some(inner) = self.inner.upgrade() {
            StreamInner::handle_open(&inner, self.epoch);
        }
    }

    fn on_message(&self, raw: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_message(self.epoch, raw);
        }
    }

    fn on_close(&self) {
        if let Some(inner) = self.inner.upgrade() {
            StreamInner::handle_disconnect(&inner, self.epoch);
        }
    }
}

impl StreamInner {
    fn attempt_connect(self: &Arc<Self>, epoch: u64) {
        {
            let mut state = self.state.lock();
            if state.epoch != epoch
                || matches!(state.phase, StreamState::Connected | StreamState::Connecting)
            {
                return;
            }
            state.phase = StreamState::Connecting;
            state.retry_timer = None;
        }

        let bridge = Arc::new(EventBridge {
            inner: Arc::downgrade(self),
            epoch,
        });
        // connect outside the state lock: the transport may deliver on_open
        // synchronously
        match self.connector.connect(bridge) {
            Ok(connection) => {
                let mut state = self.state.lock();
                if state.epoch != epoch {
                    drop(state);
                    let mut connection = connection;
                    connection.close();
                    return;
                }
                state.connection = Some(Arc::new(Mutex::new(connection)));
            }
            Err(e) => {
                tracing::warn!(err = %e, "stream connection attempt failed");
                Self::handle_disconnect(self, epoch);
            }
        }
    }

    fn handle_open(self: &Arc<Self>, epoch: u64) {
        let mut state = self.state.lock();
        if state.epoch != epoch
            || !matches!(
                state.phase,
                StreamState::Connecting | StreamState::Reconnecting
            )
        {
            return;
        }
        state.phase = StreamState::Connected;
        state.retry_count = 0;
        if let Some(timer) = state.broadcast_timer.take() {
            timer.cancel();
        }
        let weak = Arc::downgrade(self);
        let handle = self.scheduler.schedule_repeating(
            self.config.update_interval_ms,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.broadcast(epoch);
                }
            }),
        );
        state.broadcast_timer = Some(handle);
        tracing::debug!("stream connected");
    }

    fn handle_message(&self, epoch: u64, raw: &str) {
        let message: WireMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(err = %e, "skipping malformed stream message");
                return;
            }
        };
        if !message.metric.validate() {
            tracing::debug!(
                name = message.metric.logical_name(),
                "dropping invalid streamed metric"
            );
            return;
        }
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return;
        }
        state.store.push(message.metric);
    }

    /// Shared failure path for connect errors and connection loss
    fn handle_disconnect(self: &Arc<Self>, epoch: u64) {
        let gave_up = {
            let mut state = self.state.lock();
            if state.epoch != epoch
                || matches!(state.phase, StreamState::Disconnected | StreamState::GivingUp)
            {
                return;
            }
            state.connection = None;
            if let Some(timer) = state.broadcast_timer.take() {
                timer.cancel();
            }
            let attempt = state.retry_count;
            state.retry_count += 1;
            if state.retry_count >= self.config.max_retry_count {
                state.phase = StreamState::GivingUp;
                true
            } else {
                state.phase = StreamState::Reconnecting;
                let delay = backoff_delay(
                    self.config.retry_base_delay_ms,
                    attempt,
                    self.config.max_retry_interval_ms,
                );
                let weak = Arc::downgrade(self);
                let handle = self.scheduler.schedule_once(
                    delay,
                    Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.attempt_connect(epoch);
                        }
                    }),
                );
                state.retry_timer = Some(handle);
                tracing::debug!(delay_ms = delay, "stream reconnect scheduled");
                false
            }
        };

        if gave_up {
            tracing::error!(
                retries = self.config.max_retry_count,
                "stream monitor giving up after repeated connection failures"
            );
            if let Some(callback) = self.give_up.lock().as_ref() {
                if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                    tracing::warn!("give-up callback panicked");
                }
            }
        }
    }

    fn broadcast(&self, epoch: u64) {
        let snapshot = {
            let state = self.state.lock();
            if state.epoch != epoch || state.phase != StreamState::Connected {
                return;
            }
            state.store.snapshot()
        };
        let aggregated = aggregate(&snapshot);
        let callbacks: Vec<StreamCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&aggregated))).is_err() {
                tracing::warn!("stream subscriber panicked");
            }
        }
    }

    fn send(&self, metric: Metric) {
        // phase check and connection handle under the state lock; the
        // transport write itself runs with only the connection lock held
        let connection = {
            let state = self.state.lock();
            if state.phase != StreamState::Connected {
                tracing::debug!(
                    name = metric.logical_name(),
                    "stream not connected, dropping outbound metric"
                );
                return;
            }
            match state.connection.as_ref() {
                Some(connection) => Arc::clone(connection),
                None => {
                    tracing::debug!("stream connection not ready, dropping outbound metric");
                    return;
                }
            }
        };
        let message = WireMessage {
            kind: metric.kind(),
            metric,
            timestamp: self.clock.now_ms(),
        };
        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(err = %e, "failed to serialize outbound metric");
                return;
            }
        };
        if let Err(e) = connection.lock().send(&frame) {
            tracing::warn!(err = %e, "stream send failed");
        };
    }
}

fn backoff_delay(base_ms: u64, attempt: u32, cap_ms: u64) -> u64 {
    base_ms
        .saturating_mul(1u64 << attempt.min(32))
        .min(cap_ms)
}

/// Reconnecting streaming monitor
pub struct StreamMonitor {
    inner: Arc<StreamInner>,
}

impl StreamMonitor {
    pub fn new(
        config: MonitorConfig,
        connector: Box<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let buffer_size = config.buffer_size;
        Ok(Self {
            inner: Arc::new(StreamInner {
                config,
                connector,
                scheduler,
                clock,
                state: Mutex::new(ConnState {
                    phase: StreamState::Disconnected,
                    retry_count: 0,
                    epoch: 0,
                    connection: None,
                    store: MetricStore::new(buffer_size),
                    broadcast_timer: None,
                    retry_timer: None,
                }),
                subscribers: Mutex::new(Vec::new()),
                give_up: Mutex::new(None),
                next_sub_id: AtomicU64::new(0),
            }),
        })
    }

    /// Begin connecting. No-op while already connecting or connected; after
    /// `GivingUp` this resets the failure counter and tries again.
    pub fn start(&self) {
        let epoch = {
            let mut state = self.inner.state.lock();
            if matches!(
                state.phase,
                StreamState::Connecting | StreamState::Connected | StreamState::Reconnecting
            ) {
                return;
            }
            state.phase = StreamState::Disconnected;
            state.retry_count = 0;
            state.epoch += 1;
            state.epoch
        };
        self.inner.attempt_connect(epoch);
    }

    /// Close the connection, cancel all timers, and clear subscribers.
    /// Idempotent; nothing fires after this returns.
    pub fn stop(&self) {
        let connection = {
            let mut state = self.inner.state.lock();
            state.epoch += 1;
            state.phase = StreamState::Disconnected;
            state.retry_count = 0;
            if let Some(timer) = state.broadcast_timer.take() {
                timer.cancel();
            }
            if let Some(timer) = state.retry_timer.take() {
                timer.cancel();
            }
            state.connection.take()
        };
        if let Some(connection) = connection {
            // never wait behind a stalled outbound write; if the sender holds
            // the connection lock, the close happens when its handle drops
            match connection.try_lock() {
                Some(mut guard) => guard.close(),
                None => tracing::debug!("outbound send in flight, deferring close"),
            }
        }
        self.inner.subscribers.lock().clear();
    }

    pub fn state(&self) -> StreamState {
        self.inner.state.lock().phase
    }

    /// Receive each periodic aggregation while the connection is up
    pub fn subscribe(
        &self,
        callback: impl Fn(&AggregatedMetrics) + Send + Sync + 'static,
    ) -> Subscription {
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

    /// Invoked once when retries are exhausted and the monitor parks in
    /// `GivingUp`
    pub fn on_give_up(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.inner.give_up.lock() = Some(Box::new(callback));
    }

    /// Owned copy of the inbound buffers
    pub fn snapshot(&self) -> CollectedMetrics {
        self.inner.state.lock().store.snapshot()
    }

    /// Send an already-built metric; a logged no-op while not connected
    pub fn send_metric(&self, metric: Metric) {
        self.inner.send(metric);
    }

    pub fn track_render(&self, component_id: &str, duration_ms: f64) {
        self.inner.send(Metric::render(
            component_id,
            duration_ms,
            self.inner.clock.now_ms(),
        ));
    }

    pub fn track_memory(&self, heap_used: u64, heap_total: u64) {
        self.inner.send(Metric::memory(
            heap_used,
            heap_total,
            self.inner.clock.now_ms(),
        ));
    }

    pub fn track_network_request(&self, url: &str, duration_ms: f64, status: Option<u16>) {
        self.inner.send(Metric::network(
            url,
            duration_ms,
            status,
            self.inner.clock.now_ms(),
        ));
    }

    pub fn track_custom(
        &self,
        name: &str,
        value: f64,
        tags: std::collections::HashMap<String, String>,
    ) {
        self.inner
            .send(Metric::custom(name, value, tags, self.inner.clock.now_ms()));
    }
}

impl Drop for StreamMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
