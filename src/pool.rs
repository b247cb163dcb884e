//! The worker pool: admission and lifecycle.
//!
//! # Thread Architecture
//!
//! ```text
//! producers ──submit/submit_blocking──┐
//!                                     ▼
//!                  ┌────────────────────────────────────┐
//!                  │ Shared (one mutex)                 │
//!                  │   low ▸ normal ▸ high, fairness    │
//!                  │   state: Running/Stopping/Stopped  │
//!                  └────────────────────────────────────┘
//!                     │ work_available         ▲ space[lane], drained
//!                     ▼                        │
//!          {prefix}-worker-0000 … {prefix}-worker-NNNN
//! ```
//!
//! Tasks run outside the lock. The lifecycle controller (the `stop_*` methods
//! and `Drop`) flips the state, wakes every waiter and joins the workers.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::affinity::CpuAllocator;
use crate::config::LanePoolConfig;
use crate::cpuset::{available_cpus, format_cpuset, parse_and_validate_cpuset};
use crate::error::{LanePoolError, Result, SubmitError};
use crate::lanes::{Priority, Rejected};
use crate::metrics::LanePoolMetrics;
use crate::shared::{Core, PoolState, Shared};
use crate::task::{Task, TaskHandle};
use crate::worker;

/// A fixed-size worker pool with three priority lanes.
///
/// Workers always prefer High work, but while Normal work is waiting no more
/// than three High tasks are dispatched in a row. Low work runs only when
/// both other lanes are empty. Within a lane tasks run in submission order.
///
/// Each lane holds at most `lane_capacity` tasks. [`submit`](Self::submit)
/// fails fast when the lane is full; [`submit_blocking`](Self::submit_blocking)
/// waits for a slot instead.
///
/// Dropping the pool performs [`stop_immediate`](Self::stop_immediate).
///
/// # Examples
///
/// ```
/// use lanepool::{LanePool, Priority};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = LanePool::new(2, 64).unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
///
/// for priority in [Priority::Low, Priority::Normal, Priority::High] {
///     let done = done.clone();
///     pool.submit_to(priority, move || {
///         done.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
/// }
///
/// pool.stop_after_drain();
/// assert_eq!(done.load(Ordering::SeqCst), 3);
/// assert!(pool.submit(|| {}).is_err());
/// ```
pub struct LanePool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: LanePoolConfig,
    worker_threads: usize,
    cpus: Option<Vec<usize>>,
}

impl LanePool {
    /// Start a pool with `worker_threads` workers and room for
    /// `lane_capacity` queued tasks in each lane.
    ///
    /// Use [`LanePool::builder`] for file, environment or CLI configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either argument is 0 or a worker thread cannot be
    /// spawned. In the latter case workers that did start are stopped and
    /// joined first.
    pub fn new(worker_threads: usize, lane_capacity: usize) -> Result<Self> {
        Self::from_config(LanePoolConfig {
            worker_threads: Some(worker_threads),
            lane_capacity,
            ..LanePoolConfig::default()
        })
    }

    /// Create a builder with default configuration.
    pub fn builder() -> crate::LanePoolBuilder {
        crate::LanePoolBuilder::new()
    }

    /// Create a pool from a resolved configuration.
    ///
    /// This is typically called via `LanePoolBuilder::build()`.
    pub(crate) fn from_config(config: LanePoolConfig) -> Result<Self> {
        if config.lane_capacity == 0 {
            return Err(LanePoolError::InvalidLaneCapacity);
        }

        let cpus = match config.cpuset {
            Some(ref cpuset) => Some(parse_and_validate_cpuset(cpuset)?),
            None => None,
        };
        let cpu_count = cpus
            .as_ref()
            .map_or_else(|| available_cpus().len(), Vec::len);
        let worker_threads = config.effective_worker_threads(cpu_count);
        if worker_threads == 0 {
            return Err(LanePoolError::InvalidWorkerCount);
        }
        let allocator = cpus.clone().map(CpuAllocator::new).transpose()?;

        // A worker count too large to track is a construction error.
        let mut handles = Vec::new();
        if let Err(e) = handles.try_reserve_exact(worker_threads) {
            error!(worker_threads, %e, "cannot track worker threads");
            return Err(LanePoolError::ThreadSpawn {
                index: 0,
                source: std::io::Error::new(std::io::ErrorKind::OutOfMemory, e),
            });
        }

        info!(
            prefix = %config.prefix,
            worker_threads,
            lane_capacity = config.lane_capacity,
            cpuset = ?cpus.as_deref().map(format_cpuset),
            "building lane pool"
        );

        let metrics = LanePoolMetrics::with_prefix(&config.prefix);
        if let Some(ref registry) = config.prometheus_registry {
            if let Err(e) = metrics.register(registry) {
                // Registration is all-or-nothing; the pool runs unexposed.
                warn!(%e, "failed to register prometheus metrics");
            }
        }

        let pool = Self {
            shared: Arc::new(Shared::new(config.lane_capacity, metrics)),
            workers: Mutex::new(handles),
            config,
            worker_threads,
            cpus,
        };

        for index in 0..worker_threads {
            let cpu = allocator.as_ref().map(CpuAllocator::allocate);
            if let Err(source) = pool.spawn_worker(index, cpu) {
                error!(worker = index, %source, "failed to spawn worker thread");
                pool.stop_immediate();
                return Err(LanePoolError::ThreadSpawn { index, source });
            }
        }

        Ok(pool)
    }

    fn spawn_worker(&self, index: usize, cpu: Option<usize>) -> std::io::Result<()> {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("{}-worker-{:04}", self.config.prefix, index))
            .spawn(move || worker::run(shared, index, cpu))?;
        self.workers.lock().push(handle);
        Ok(())
    }

    /// Submit a task to the Normal lane without blocking.
    ///
    /// # Errors
    ///
    /// See [`submit_to`](Self::submit_to).
    #[inline]
    pub fn submit<T: Task>(&self, task: T) -> std::result::Result<(), SubmitError> {
        self.submit_to(Priority::Normal, task)
    }

    /// Submit a task to the given lane without blocking.
    ///
    /// On success the task is appended to the tail of the lane and one idle
    /// worker is woken.
    ///
    /// # Errors
    ///
    /// - `SubmitError::Stopped` once any stop has been requested
    /// - `SubmitError::LaneFull` if the lane holds `lane_capacity` tasks
    /// - `SubmitError::AllocationFailed` if the lane cannot grow
    ///
    /// A rejected task is dropped without running.
    pub fn submit_to<T: Task>(
        &self,
        priority: Priority,
        task: T,
    ) -> std::result::Result<(), SubmitError> {
        let handle = TaskHandle::new(task);
        let outcome = {
            let mut core = self.shared.core.lock();
            self.admit(&mut core, priority, handle)
        };
        outcome.map_err(|rejected| self.reject(rejected))
    }

    /// Submit a task to the Normal lane, waiting for space if it is full.
    ///
    /// # Errors
    ///
    /// See [`submit_blocking_to`](Self::submit_blocking_to).
    #[inline]
    pub fn submit_blocking<T: Task>(&self, task: T) -> std::result::Result<(), SubmitError> {
        self.submit_blocking_to(Priority::Normal, task)
    }

    /// Submit a task to the given lane, waiting for space if it is full.
    ///
    /// Only a full lane makes the caller wait, and only on that lane: a full
    /// Low lane never holds up a High submission. If the pool starts stopping
    /// while the caller waits, the task is abandoned rather than admitted.
    ///
    /// # Errors
    ///
    /// - `SubmitError::Stopped` if a stop was requested before or during the wait
    /// - `SubmitError::AllocationFailed` if the lane cannot grow
    pub fn submit_blocking_to<T: Task>(
        &self,
        priority: Priority,
        task: T,
    ) -> std::result::Result<(), SubmitError> {
        let handle = TaskHandle::new(task);
        let outcome = {
            let mut core = self.shared.core.lock();
            while core.state.is_running() && core.lanes.is_full(priority) {
                self.shared.space_available(priority).wait(&mut core);
            }
            self.admit(&mut core, priority, handle)
        };
        outcome.map_err(|rejected| self.reject(rejected))
    }

    /// Push under the lock and wake one worker.
    fn admit(
        &self,
        core: &mut Core,
        priority: Priority,
        handle: TaskHandle,
    ) -> std::result::Result<(), Rejected> {
        if !core.state.is_running() {
            return Err((SubmitError::Stopped, handle));
        }
        core.lanes.push(priority, handle)?;
        self.shared
            .metrics
            .record_admitted(priority, core.lanes.len(priority));
        self.shared.work_available.notify_one();
        Ok(())
    }

    /// Account for a refused submission. Runs after the lock is released, so
    /// dropping the task here cannot deadlock against the pool.
    fn reject(&self, (e, task): Rejected) -> SubmitError {
        drop(task);
        self.shared.metrics.record_rejected();
        debug!(reason = %e, "submission rejected");
        e
    }

    /// Stop now, discarding queued work.
    ///
    /// Every task still waiting in a lane is destroyed without running. Tasks
    /// already executing finish, then all workers are joined. Calling this
    /// again, or after [`stop_after_drain`](Self::stop_after_drain), returns
    /// immediately.
    ///
    /// # Stopping from a task
    ///
    /// When called from inside a task, the calling worker cannot join
    /// itself: its handle is released unjoined and the state becomes
    /// [`PoolState::Stopped`] once every other worker has exited, while the
    /// caller is still finishing its task. That worker exits on its own as
    /// soon as the task returns, without dispatching anything else.
    pub fn stop_immediate(&self) {
        let discarded = {
            let mut core = self.shared.core.lock();
            match self.shared.begin_stop(&mut core) {
                Some(discarded) => discarded,
                None => return,
            }
        };
        debug!(discarded = discarded.len(), "immediate stop requested");
        drop(discarded);
        self.join_workers();
    }

    /// Stop once every queued task has been executed.
    ///
    /// Blocks until all lanes are empty while workers keep dispatching as
    /// usual, then stops and joins the workers. Every task submitted before
    /// this call is executed exactly once; none is discarded. If another
    /// thread stops the pool during the wait, this returns without acting.
    ///
    /// # Deadlocks
    ///
    /// Calling this from inside a task of a single-worker pool that still has
    /// queued work never returns, since the only worker is the caller.
    pub fn stop_after_drain(&self) {
        let discarded = {
            let mut core = self.shared.core.lock();
            if !core.lanes.is_empty() {
                debug!(queued = core.lanes.total_len(), "waiting for lanes to drain");
            }
            while core.state.is_running() && !core.lanes.is_empty() {
                self.shared.drained.wait(&mut core);
            }
            match self.shared.begin_stop(&mut core) {
                Some(discarded) => discarded,
                None => return,
            }
        };
        debug_assert!(discarded.is_empty());
        self.join_workers();
    }

    /// Join every worker exactly once, then mark the pool stopped.
    fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                // Stop requested from inside a task; this worker exits on its own.
                continue;
            }
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                error!(worker = ?name, "worker thread panicked");
            }
        }

        self.shared.core.lock().state = PoolState::Stopped;
        info!(prefix = %self.config.prefix, "lane pool stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        self.shared.core.lock().state
    }

    /// Number of tasks waiting in a lane.
    pub fn queued(&self, priority: Priority) -> usize {
        self.shared.core.lock().lanes.len(priority)
    }

    /// Number of tasks waiting across all lanes.
    pub fn queued_total(&self) -> usize {
        self.shared.core.lock().lanes.total_len()
    }

    /// Number of worker threads. Fixed for the pool's lifetime.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Maximum queued tasks per lane. Fixed for the pool's lifetime.
    pub fn lane_capacity(&self) -> usize {
        self.config.lane_capacity
    }

    /// CPUs the workers are pinned to, if a cpuset was configured.
    pub fn cpus(&self) -> Option<&[usize]> {
        self.cpus.as_deref()
    }

    /// Get the resolved configuration.
    pub fn config(&self) -> &LanePoolConfig {
        &self.config
    }

    /// Get the pool metrics.
    ///
    /// The metrics are always collected. If a registry was provided via
    /// `LanePoolBuilder::prometheus_registry()`, they are also registered
    /// for exposition.
    pub fn metrics(&self) -> &LanePoolMetrics {
        &self.shared.metrics
    }
}

impl Drop for LanePool {
    fn drop(&mut self) {
        self.stop_immediate();
    }
}

impl fmt::Debug for LanePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanePool")
            .field("config", &self.config)
            .field("worker_threads", &self.worker_threads)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for LanePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LanePool[{}]: workers({}, cpus={}) lanes(capacity={})",
            self.config.prefix,
            self.worker_threads,
            self.cpus.as_deref().map_or_else(|| "any".to_string(), format_cpuset),
            self.config.lane_capacity,
        )
    }
}
