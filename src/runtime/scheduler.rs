//! Timer scheduling
//!
//! A `Scheduler` owns cancellable one-shot and repeating timers. Jobs are
//! fired without any scheduler lock held, so a job may freely schedule or
//! cancel other timers on the same scheduler.

use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::clock::{Clock, ManualClock};

/// A scheduled callback
pub type Job = Box<dyn FnMut() + Send>;

/// Handle to a scheduled timer
///
/// Cancellation is idempotent; a cancelled timer never fires afterwards.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the timer; safe to call multiple times
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the timer has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Timer scheduling interface
pub trait Scheduler: Send + Sync {
    /// Run `job` once after `delay_ms`
    fn schedule_once(&self, delay_ms: u64, job: Job) -> TimerHandle;

    /// Run `job` every `interval_ms` until the handle is cancelled
    fn schedule_repeating(&self, interval_ms: u64, job: Job) -> TimerHandle;
}

// ---------------------------------------------------------------------------
// Virtual scheduler
// ---------------------------------------------------------------------------

struct VirtualEntry {
    deadline: u64,
    interval: Option<u64>,
    seq: u64,
    handle: TimerHandle,
    job: Job,
}

/// Deterministic scheduler driven by an explicit `advance` call
///
/// Owns a `ManualClock`; `advance(ms)` fires all timers due within the
/// window in deadline order on the calling thread, moving the clock to each
/// deadline as it goes. Repeating timers that fall due more than once within
/// the window fire once per elapsed interval.
pub struct VirtualScheduler {
    clock: Arc<ManualClock>,
    entries: Mutex<Vec<VirtualEntry>>,
    seq: AtomicU64,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new(0)),
            entries: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// The clock this scheduler advances
    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    /// Number of live (non-cancelled) timers
    pub fn pending(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|e| !e.handle.is_cancelled());
        entries.len()
    }

    /// Advance the virtual clock by `ms`, firing every timer that falls due
    pub fn advance(&self, ms: u64) {
        let target = self.clock.now_ms() + ms;
        loop {
            let due = {
                let mut entries = self.entries.lock();
                entries.retain(|e| !e.handle.is_cancelled());
                let idx = entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.deadline <= target)
                    .min_by_key(|(_, e)| (e.deadline, e.seq))
                    .map(|(i, _)| i);
                idx.map(|i| entries.swap_remove(i))
            };
            let Some(mut entry) = due else { break };
            self.clock.set(entry.deadline);
            (entry.job)();
            if let Some(interval) = entry.interval {
                if !entry.handle.is_cancelled() {
                    entry.deadline += interval.max(1);
                    entry.seq = self.seq.fetch_add(1, Ordering::SeqCst);
                    self.entries.lock().push(entry);
                }
            }
        }
        self.clock.set(target);
    }

    fn push(&self, delay_ms: u64, interval: Option<u64>, job: Job) -> TimerHandle {
        let handle = TimerHandle::new();
        let entry = VirtualEntry {
            deadline: self.clock.now_ms() + delay_ms,
            interval,
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            handle: handle.clone(),
            job,
        };
        self.entries.lock().push(entry);
        handle
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule_once(&self, delay_ms: u64, job: Job) -> TimerHandle {
        self.push(delay_ms, None, job)
    }

    fn schedule_repeating(&self, interval_ms: u64, job: Job) -> TimerHandle {
        self.push(interval_ms, Some(interval_ms), job)
    }
}

// ---------------------------------------------------------------------------
// Thread scheduler
// ---------------------------------------------------------------------------

struct ThreadEntry {
    deadline: Instant,
    seq: u64,
    interval: Option<Duration>,
    handle: TimerHandle,
    job: Job,
}

impl PartialEq for ThreadEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for ThreadEntry {}

impl PartialOrd for ThreadEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ThreadEntry {
    // Reversed so the BinaryHeap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

struct ThreadShared {
    queue: Mutex<BinaryHeap<ThreadEntry>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    seq: AtomicU64,
}

/// Wall-clock scheduler backed by a single worker thread
///
/// All jobs for one scheduler run serially on the worker thread, matching the
/// single-writer discipline the buffers rely on.
pub struct ThreadScheduler {
    shared: Arc<ThreadShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let shared = Arc::new(ThreadShared {
            queue: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("perfstream-timer".to_string())
            .spawn(move || Self::run(worker_shared))
            .ok();
        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    fn run(shared: Arc<ThreadShared>) {
        loop {
            let due = {
                let mut queue = shared.queue.lock();
                if shared.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                let now = Instant::now();
                match queue.peek() {
                    None => {
                        shared.wakeup.wait(&mut queue);
                        None
                    }
                    Some(entry) if entry.deadline > now => {
                        let deadline = entry.deadline;
                        shared.wakeup.wait_until(&mut queue, deadline);
                        None
                    }
                    Some(_) => queue.pop(),
                }
            };
            let Some(mut entry) = due else { continue };
            if entry.handle.is_cancelled() {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.job)()));
            if outcome.is_err() {
                tracing::error!(timer_seq = entry.seq, "scheduled job panicked");
            }
            if let Some(interval) = entry.interval {
                if !entry.handle.is_cancelled() {
                    entry.deadline = Instant::now() + interval;
                    entry.seq = shared.seq.fetch_add(1, Ordering::SeqCst);
                    shared.queue.lock().push(entry);
                    shared.wakeup.notify_one();
                }
            }
        }
    }

    fn push(&self, delay: Duration, interval: Option<Duration>, job: Job) -> TimerHandle {
        let handle = TimerHandle::new();
        let entry = ThreadEntry {
            deadline: Instant::now() + delay,
            seq: self.shared.seq.fetch_add(1, Ordering::SeqCst),
            interval,
            handle: handle.clone(),
            job,
        };
        self.shared.queue.lock().push(entry);
        self.shared.wakeup.notify_one();
        handle
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_once(&self, delay_ms: u64, job: Job) -> TimerHandle {
        self.push(Duration::from_millis(delay_ms), None, job)
    }

    fn schedule_repeating(&self, interval_ms: u64, job: Job) -> TimerHandle {
        let interval = Duration::from_millis(interval_ms);
        self.push(interval, Some(interval), job)
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.wakeup.notify_one();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}
