//! State shared between producers, workers and the lifecycle controller.
//!
//! One mutex guards all of it: the three lanes, the fairness counter and the
//! pool state. Every wait goes through one of the condition variables below,
//! so no thread ever sleeps while holding the lock.
//!
//! ```text
//! Shared
//!   ├── core: Mutex<Core { lanes: LaneSet, state: PoolState }>
//!   ├── work_available   producers/stop  → idle workers
//!   ├── drained          workers         → stop_after_drain
//!   └── space[lane]      workers/stop    → blocked submit_blocking callers
//! ```

use parking_lot::{Condvar, Mutex};

use crate::lanes::{LaneSet, Priority};
use crate::metrics::LanePoolMetrics;
use crate::task::TaskHandle;

/// Lifecycle state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting and executing work.
    Running,
    /// A stop was requested; workers are finishing and being joined.
    Stopping,
    /// Every worker has exited.
    Stopped,
}

impl PoolState {
    #[inline]
    pub fn is_running(self) -> bool {
        self == PoolState::Running
    }
}

/// Everything guarded by the pool lock.
#[derive(Debug)]
pub(crate) struct Core {
    pub(crate) lanes: LaneSet,
    pub(crate) state: PoolState,
}

pub(crate) struct Shared {
    pub(crate) core: Mutex<Core>,
    pub(crate) work_available: Condvar,
    pub(crate) drained: Condvar,
    space: [Condvar; 3],
    pub(crate) metrics: LanePoolMetrics,
}

impl Shared {
    pub(crate) fn new(lane_capacity: usize, metrics: LanePoolMetrics) -> Self {
        Self {
            core: Mutex::new(Core {
                lanes: LaneSet::new(lane_capacity),
                state: PoolState::Running,
            }),
            work_available: Condvar::new(),
            drained: Condvar::new(),
            space: [Condvar::new(), Condvar::new(), Condvar::new()],
            metrics,
        }
    }

    /// Condition signalled when a slot frees up in `priority`'s lane.
    #[inline]
    pub(crate) fn space_available(&self, priority: Priority) -> &Condvar {
        &self.space[priority.index()]
    }

    /// Flip `Running` to `Stopping` and empty every lane.
    ///
    /// Must be called with the lock held. Returns `None` if a stop was already
    /// requested; otherwise the discarded handles, which the caller drops after
    /// releasing the lock. Wakes every waiter on every condition.
    pub(crate) fn begin_stop(&self, core: &mut Core) -> Option<Vec<TaskHandle>> {
        if !core.state.is_running() {
            return None;
        }
        core.state = PoolState::Stopping;

        let discarded = core.lanes.take_all();
        if !discarded.is_empty() {
            self.metrics.record_discarded(discarded.len());
        }

        self.work_available.notify_all();
        self.drained.notify_all();
        for cv in &self.space {
            cv.notify_all();
        }
        Some(discarded)
    }
}
