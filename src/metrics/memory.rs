//! Memory statistics provider
//!
//! The collector samples heap figures through this trait so the core stays
//! testable without a live system probe.

use parking_lot::Mutex;
use sysinfo::System;

/// One heap reading, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub heap_used: u64,
    pub heap_total: u64,
}

/// Source of heap usage figures
pub trait MemoryStats: Send + Sync {
    fn sample(&self) -> MemorySample;
}

/// Process-wide memory figures backed by `sysinfo`
pub struct SystemMemory {
    system: Mutex<System>,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStats for SystemMemory {
    fn sample(&self) -> MemorySample {
        let mut system = self.system.lock();
        system.refresh_memory();
        MemorySample {
            heap_used: system.used_memory(),
            heap_total: system.total_memory(),
        }
    }
}
