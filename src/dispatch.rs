//! Lane selection.
//!
//! Runs on a worker while it holds the pool lock and at least one lane has
//! work. Rules are evaluated top-down, first match wins:
//!
//! 1. High and Normal both empty: take the head of Low.
//! 2. High non-empty and (Normal empty or fairness < 3): take the head of
//!    High and add one to the fairness counter.
//! 3. Otherwise take the head of Normal and subtract 3 from the counter,
//!    floored at 0.
//!
//! High is preferred, but while Normal work is waiting at most three High
//! tasks are dispatched in a row. The counter decays by the window size
//! instead of resetting, so a long run of High-only work earns Normal work
//! a matching run of turns once it shows up. Low has no counter and may
//! starve under sustained High/Normal load.

use crate::lanes::{LaneSet, Priority};
use crate::task::TaskHandle;

/// Maximum consecutive High dispatches while Normal work is waiting.
pub const FAIRNESS_WINDOW: usize = 3;

/// Outcome of one selection.
#[derive(Debug)]
pub(crate) struct Dispatch {
    /// Lane the task came from.
    pub(crate) priority: Priority,
    /// The dequeued task.
    pub(crate) task: TaskHandle,
    /// Normal was chosen even though High work was waiting.
    pub(crate) forced: bool,
}

/// Pick the next task according to the fairness policy.
///
/// Returns `None` only when every lane is empty.
pub(crate) fn select(lanes: &mut LaneSet) -> Option<Dispatch> {
    let high_waiting = !lanes.lane(Priority::High).is_empty();
    let normal_waiting = !lanes.lane(Priority::Normal).is_empty();

    let priority = if !high_waiting && !normal_waiting {
        Priority::Low
    } else if high_waiting && (!normal_waiting || lanes.fairness() < FAIRNESS_WINDOW) {
        Priority::High
    } else {
        Priority::Normal
    };

    let task = lanes.lane_mut(priority).pop()?;

    match priority {
        Priority::High => lanes.set_fairness(lanes.fairness().saturating_add(1)),
        Priority::Normal => lanes.set_fairness(lanes.fairness().saturating_sub(FAIRNESS_WINDOW)),
        Priority::Low => {}
    }

    Some(Dispatch {
        priority,
        task,
        forced: priority == Priority::Normal && high_waiting,
    })
}
