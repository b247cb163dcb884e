//! Priority lanes.
//!
//! Three independent bounded FIFO queues plus the fairness counter the
//! dispatcher uses to balance High against Normal work. Nothing here is
//! synchronized; the whole [`LaneSet`] lives behind the pool's single mutex.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::task::TaskHandle;

/// Default maximum number of queued tasks per lane.
pub const DEFAULT_LANE_CAPACITY: usize = 1024;

/// Priority lane a task is submitted to.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Served only when High and Normal are both empty. May starve.
    Low,
    /// Default lane. Guaranteed a turn after at most three High dispatches.
    #[default]
    Normal,
    /// Preferred lane.
    High,
}

impl Priority {
    /// All lanes, lowest first.
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Normal, Priority::High];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
        }
    }

    /// Lowercase lane name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused handle together with the reason.
pub(crate) type Rejected = (SubmitError, TaskHandle);

/// A bounded FIFO of task handles.
#[derive(Debug)]
pub(crate) struct Lane {
    queue: VecDeque<TaskHandle>,
    capacity: usize,
}

impl Lane {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub(crate) fn pop(&mut self) -> Option<TaskHandle> {
        self.queue.pop_front()
    }
}

/// The three lanes and the fairness counter.
///
/// The counter records High dispatches not yet paid back by Normal
/// dispatches; see [`crate::dispatch`] for how it is spent.
#[derive(Debug)]
pub(crate) struct LaneSet {
    lanes: [Lane; 3],
    fairness: usize,
}

impl LaneSet {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            lanes: [Lane::new(capacity), Lane::new(capacity), Lane::new(capacity)],
            fairness: 0,
        }
    }

    #[inline]
    pub(crate) fn lane(&self, priority: Priority) -> &Lane {
        &self.lanes[priority.index()]
    }

    #[inline]
    pub(crate) fn lane_mut(&mut self, priority: Priority) -> &mut Lane {
        &mut self.lanes[priority.index()]
    }

    #[inline]
    pub(crate) fn len(&self, priority: Priority) -> usize {
        self.lane(priority).len()
    }

    #[inline]
    pub(crate) fn is_full(&self, priority: Priority) -> bool {
        self.lane(priority).is_full()
    }

    /// True when no lane holds work (the drained state).
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.lanes.iter().all(Lane::is_empty)
    }

    pub(crate) fn total_len(&self) -> usize {
        self.lanes.iter().map(Lane::len).sum()
    }

    #[inline]
    pub(crate) fn fairness(&self) -> usize {
        self.fairness
    }

    #[inline]
    pub(crate) fn set_fairness(&mut self, value: usize) {
        self.fairness = value;
    }

    /// Append a handle to the tail of a lane.
    ///
    /// Fails without side effects if the lane is at capacity or its storage
    /// cannot grow; the handle is handed back so the caller decides where it
    /// gets dropped.
    pub(crate) fn push(
        &mut self,
        priority: Priority,
        handle: TaskHandle,
    ) -> Result<(), Rejected> {
        let lane = self.lane_mut(priority);
        if lane.is_full() {
            return Err((SubmitError::LaneFull(priority), handle));
        }
        if lane.queue.try_reserve(1).is_err() {
            return Err((SubmitError::AllocationFailed(priority), handle));
        }
        lane.queue.push_back(handle);
        Ok(())
    }

    /// Remove every queued handle, leaving all lanes empty.
    ///
    /// The handles are returned rather than dropped so the caller can destroy
    /// them after releasing the lock.
    pub(crate) fn take_all(&mut self) -> Vec<TaskHandle> {
        let mut taken = Vec::with_capacity(self.total_len());
        for lane in &mut self.lanes {
            taken.extend(lane.queue.drain(..));
        }
        taken
    }
}
