//! Periodic sampler
//!
//! Generic start/stop/destroy wrapper around one repeating timer. Used to
//! drive memory sampling, but accepts any no-arg probe.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::runtime::{Scheduler, TimerHandle};

/// The probe invoked on every sampling tick
pub type SampleFn = Arc<dyn Fn() + Send + Sync>;

/// Owns exactly one repeating timer driving a sample function
///
/// `start` is idempotent: while a timer is live a second call is a no-op.
/// `destroy` removes the probe entirely; after it returns no tick can reach
/// the probe again, even if a timer was still queued.
pub struct PeriodicSampler {
    interval_ms: u64,
    scheduler: Arc<dyn Scheduler>,
    probe: Arc<Mutex<Option<SampleFn>>>,
    timer: Mutex<Option<TimerHandle>>,
}

impl PeriodicSampler {
    pub fn new(interval_ms: u64, scheduler: Arc<dyn Scheduler>, probe: SampleFn) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            scheduler,
            probe: Arc::new(Mutex::new(Some(probe))),
            timer: Mutex::new(None),
        }
    }

    /// Take one sample immediately, then one per interval until stopped.
    /// No-op while already running or after `destroy`.
    pub fn start(&self) {
        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_cancelled()) {
            return;
        }
        let Some(probe) = self.probe.lock().clone() else {
            return; // destroyed
        };
        probe();

        let slot = Arc::clone(&self.probe);
        let handle = self.scheduler.schedule_repeating(
            self.interval_ms,
            Box::new(move || {
                let probe = slot.lock().clone();
                if let Some(probe) = probe {
                    probe();
                }
            }),
        );
        *timer = Some(handle);
    }

    /// Cancel the timer; safe to call repeatedly
    pub fn stop(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.cancel();
        }
    }

    /// Whether a timer is currently live
    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Stop and drop the probe; the sampler cannot be restarted afterwards
    pub fn destroy(&self) {
        self.stop();
        self.probe.lock().take();
    }
}

impl Drop for PeriodicSampler {
    fn drop(&mut self) {
        self.destroy();
    }
}
