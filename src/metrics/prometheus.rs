//! Prometheus metrics for lanepool.
//!
//! Metrics work standalone; registration is only needed for exposition.
//! Every update is a direct field access, never a registry lookup.

use prometheus::core::Collector;
use prometheus::{IntCounter, IntGauge, Opts, Registry};

use crate::lanes::Priority;

/// Prometheus metrics for a [`LanePool`](crate::LanePool).
///
/// Cloning shares the underlying counters.
#[derive(Clone)]
pub struct LanePoolMetrics {
    // === Gauges (current values) ===
    /// Tasks waiting in the Low lane
    pub queued_low: IntGauge,

    /// Tasks waiting in the Normal lane
    pub queued_normal: IntGauge,

    /// Tasks waiting in the High lane
    pub queued_high: IntGauge,

    /// Workers currently executing a task
    pub busy_workers: IntGauge,

    // === Counters (cumulative) ===
    /// Tasks admitted to a lane
    pub submitted_tasks: IntCounter,

    /// Submissions rejected (stopping, lane full or allocation failure)
    pub rejected_tasks: IntCounter,

    /// Tasks executed by a worker, including ones that panicked
    pub executed_tasks: IntCounter,

    /// Queued tasks destroyed without running by an immediate stop
    pub discarded_tasks: IntCounter,

    /// Tasks whose `execute` panicked
    pub panicked_tasks: IntCounter,

    /// Normal dispatches forced by the fairness window while High work waited
    pub forced_normal_dispatches: IntCounter,
}

/// A metric that can hand the registry an owned copy of itself.
trait CollectorClone {
    fn box_clone(&self) -> Box<dyn Collector>;
}

impl<C: Collector + Clone + 'static> CollectorClone for C {
    fn box_clone(&self) -> Box<dyn Collector> {
        Box::new(self.clone())
    }
}

impl Default for LanePoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn int_gauge(prefix: &str, name: &str, help: &str) -> IntGauge {
    IntGauge::with_opts(Opts::new(format!("{prefix}_{name}"), help))
        .expect("metric creation should not fail")
}

fn int_counter(prefix: &str, name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(format!("{prefix}_{name}"), help))
        .expect("metric creation should not fail")
}

/// Make a string usable as a Prometheus metric name prefix.
///
/// Valid chars are `[a-zA-Z_:]` for the first position and `[a-zA-Z0-9_:]`
/// after it; anything else becomes `_`.
fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .enumerate()
        .map(|(i, c)| match c {
            'a'..='z' | 'A'..='Z' | '_' | ':' => c,
            '0'..='9' if i > 0 => c,
            _ => '_',
        })
        .collect()
}

impl LanePoolMetrics {
    /// Create metrics with the default prefix "lanepool".
    pub fn new() -> Self {
        Self::with_prefix("lanepool")
    }

    /// Create metrics named `{prefix}_queued_low`, `{prefix}_submitted_tasks`, ...
    ///
    /// Characters that are not valid in a metric name are replaced with
    /// underscores, so `"my-pool"` yields `my_pool_submitted_tasks`.
    pub fn with_prefix(prefix: &str) -> Self {
        let p = sanitize_prefix(prefix);
        Self {
            queued_low: int_gauge(&p, "queued_low", "Tasks waiting in the low lane"),
            queued_normal: int_gauge(&p, "queued_normal", "Tasks waiting in the normal lane"),
            queued_high: int_gauge(&p, "queued_high", "Tasks waiting in the high lane"),
            busy_workers: int_gauge(&p, "busy_workers", "Workers executing a task"),

            submitted_tasks: int_counter(&p, "submitted_tasks", "Tasks admitted to a lane"),
            rejected_tasks: int_counter(&p, "rejected_tasks", "Submissions rejected"),
            executed_tasks: int_counter(&p, "executed_tasks", "Tasks executed by workers"),
            discarded_tasks: int_counter(
                &p,
                "discarded_tasks",
                "Queued tasks discarded by an immediate stop",
            ),
            panicked_tasks: int_counter(&p, "panicked_tasks", "Tasks that panicked"),
            forced_normal_dispatches: int_counter(
                &p,
                "forced_normal_dispatches",
                "Normal dispatches forced while high work was waiting",
            ),
        }
    }

    /// Register all metrics with a Registry for exposition.
    ///
    /// Registration is all-or-nothing: if any metric is rejected, the ones
    /// registered before it are removed again.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register (e.g., duplicate names).
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        let collectors = self.collectors();
        for (registered, collector) in collectors.iter().enumerate() {
            if let Err(e) = registry.register(collector.box_clone()) {
                for done in &collectors[..registered] {
                    let _ = registry.unregister(done.box_clone());
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn collectors(&self) -> [&dyn CollectorClone; 10] {
        [
            &self.queued_low,
            &self.queued_normal,
            &self.queued_high,
            &self.busy_workers,
            &self.submitted_tasks,
            &self.rejected_tasks,
            &self.executed_tasks,
            &self.discarded_tasks,
            &self.panicked_tasks,
            &self.forced_normal_dispatches,
        ]
    }

    /// Gauge tracking the queue depth of a lane.
    #[inline]
    pub fn queued(&self, priority: Priority) -> &IntGauge {
        match priority {
            Priority::Low => &self.queued_low,
            Priority::Normal => &self.queued_normal,
            Priority::High => &self.queued_high,
        }
    }

    #[inline]
    pub(crate) fn set_queued(&self, priority: Priority, len: usize) {
        self.queued(priority).set(len as i64);
    }

    #[inline]
    pub(crate) fn record_admitted(&self, priority: Priority, len: usize) {
        self.submitted_tasks.inc();
        self.set_queued(priority, len);
    }

    #[inline]
    pub(crate) fn record_rejected(&self) {
        self.rejected_tasks.inc();
    }

    #[inline]
    pub(crate) fn record_discarded(&self, count: usize) {
        self.discarded_tasks.inc_by(count as u64);
        for priority in Priority::ALL {
            self.set_queued(priority, 0);
        }
    }

    #[inline]
    pub(crate) fn record_panic(&self) {
        self.panicked_tasks.inc();
    }
}

impl std::fmt::Debug for LanePoolMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanePoolMetrics")
            .field("submitted_tasks", &self.submitted_tasks.get())
            .field("rejected_tasks", &self.rejected_tasks.get())
            .field("executed_tasks", &self.executed_tasks.get())
            .field("discarded_tasks", &self.discarded_tasks.get())
            .field("busy_workers", &self.busy_workers.get())
            .finish()
    }
}
