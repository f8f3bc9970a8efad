//! Runtime Abstractions
//!
//! Clock and timer scheduling used by the sampler, the collector, and the
//! streaming monitor. Production code runs on `SystemClock` plus
//! `ThreadScheduler`; tests drive `ManualClock` plus `VirtualScheduler` so
//! backoff and sampling behavior is reproducible without wall-clock sleeps.

mod clock;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{Job, Scheduler, ThreadScheduler, TimerHandle, VirtualScheduler};
