//! Worker thread loop.
//!
//! ```text
//! WaitingForWork ──work──▶ Dispatching ──unlock──▶ Executing ──▶ WaitingForWork
//!        │
//!        └──stop──▶ Exited
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::affinity::pin_worker;
use crate::dispatch::{self, Dispatch};
use crate::shared::Shared;

/// Body of a worker thread. Returns once the pool stops.
pub(crate) fn run(shared: Arc<Shared>, index: usize, cpu: Option<usize>) {
    if let Some(cpu_id) = cpu {
        pin_worker(index, cpu_id);
    }
    debug!(worker = index, "worker started");

    while let Some(dispatch) = next_task(&shared) {
        execute(&shared, index, dispatch);
    }

    debug!(worker = index, "worker exiting");
}

/// Wait for work and dequeue one task, or return `None` when the pool stops.
///
/// The lock is held only inside this function.
fn next_task(shared: &Shared) -> Option<Dispatch> {
    let mut core = shared.core.lock();
    while core.lanes.is_empty() && core.state.is_running() {
        shared.work_available.wait(&mut core);
    }
    if !core.state.is_running() {
        return None;
    }

    let Some(dispatch) = dispatch::select(&mut core.lanes) else {
        unreachable!("dispatcher found no task although a lane reported work");
    };

    shared.space_available(dispatch.priority).notify_one();
    if core.lanes.is_empty() {
        shared.drained.notify_all();
    }

    let metrics = &shared.metrics;
    metrics.set_queued(dispatch.priority, core.lanes.len(dispatch.priority));
    if dispatch.forced {
        metrics.forced_normal_dispatches.inc();
    }
    trace!(
        lane = %dispatch.priority,
        fairness = core.lanes.fairness(),
        "dispatched task"
    );
    Some(dispatch)
}

fn execute(shared: &Shared, index: usize, dispatch: Dispatch) {
    let Dispatch { priority, task, .. } = dispatch;
    let metrics = &shared.metrics;

    metrics.busy_workers.inc();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.execute()));
    metrics.busy_workers.dec();
    metrics.executed_tasks.inc();

    if let Err(payload) = outcome {
        metrics.record_panic();
        error!(
            worker = index,
            lane = %priority,
            panic = panic_message(payload.as_ref()),
            "task panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
