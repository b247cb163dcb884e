//! Worker CPU pinning.
//!
//! When a pool is given a cpuset, CPUs are handed to workers round-robin as
//! they are spawned and each worker pins itself before entering its loop.

use crate::error::{LanePoolError, Result};
use core_affinity::CoreId;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Pin the current thread to the specified CPU.
///
/// # Errors
///
/// Returns `LanePoolError::AffinityFailed` if the thread cannot be pinned.
pub fn pin_to_cpu(cpu_id: usize) -> Result<()> {
    if core_affinity::set_for_current(CoreId { id: cpu_id }) {
        debug!(cpu_id, "pinned thread to CPU");
        Ok(())
    } else {
        Err(LanePoolError::AffinityFailed(cpu_id))
    }
}

/// Pin a worker, logging instead of failing.
///
/// A worker that cannot be pinned still serves the pool.
pub(crate) fn pin_worker(worker: usize, cpu_id: usize) {
    if let Err(e) = pin_to_cpu(cpu_id) {
        warn!(%e, worker, cpu_id, "failed to pin worker thread");
    }
}

/// Hands out CPUs from a fixed set in round-robin order.
#[derive(Debug)]
pub struct CpuAllocator {
    cpus: Vec<usize>,
    next: AtomicUsize,
}

impl CpuAllocator {
    /// Create an allocator over `cpus`.
    ///
    /// # Errors
    ///
    /// Returns `LanePoolError::NoCpusAvailable` if `cpus` is empty.
    pub fn new(cpus: Vec<usize>) -> Result<Self> {
        if cpus.is_empty() {
            return Err(LanePoolError::NoCpusAvailable);
        }
        Ok(Self {
            cpus,
            next: AtomicUsize::new(0),
        })
    }

    /// Next CPU, wrapping around once every CPU has been handed out.
    pub fn allocate(&self) -> usize {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.cpus.len();
        self.cpus[index]
    }

    /// The CPUs this allocator distributes.
    pub fn cpus(&self) -> &[usize] {
        &self.cpus
    }
}
