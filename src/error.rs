//! Error types for lanepool.

use thiserror::Error;

use crate::lanes::Priority;

/// Errors that can occur when building a [`LanePool`](crate::LanePool).
///
/// All of these are fatal to construction: no pool is returned and any
/// worker threads that were already started have been stopped and joined.
#[derive(Debug, Error)]
pub enum LanePoolError {
    /// Error extracting configuration from figment.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The pool needs at least one worker thread.
    #[error("worker thread count must be at least 1")]
    InvalidWorkerCount,

    /// Every lane needs room for at least one task.
    #[error("lane capacity must be at least 1")]
    InvalidLaneCapacity,

    /// Error parsing CPU set string.
    #[error("invalid cpuset format: {0}")]
    InvalidCpuSet(String),

    /// CPU ID is not available on this system.
    #[error("CPU {0} is not available on this system")]
    CpuNotAvailable(usize),

    /// No CPUs available after applying constraints.
    #[error("no CPUs available after applying constraints")]
    NoCpusAvailable,

    /// Error setting thread affinity.
    #[error("failed to set thread affinity for CPU {0}")]
    AffinityFailed(usize),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread {index}: {source}")]
    ThreadSpawn {
        /// Index of the worker that could not be started
        index: usize,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a submission was turned away.
///
/// Rejection is always reported to the caller and never blocks once the pool
/// is stopping. The rejected task is dropped without being executed; callers
/// may retry, pick another lane, or switch to a blocking submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A stop has been requested; no more work is admitted.
    #[error("pool is stopping")]
    Stopped,

    /// The target lane already holds `lane_capacity` tasks.
    #[error("{0} lane is full")]
    LaneFull(Priority),

    /// Storage for the task could not be allocated.
    #[error("failed to allocate space in the {0} lane")]
    AllocationFailed(Priority),
}

/// Result type alias for lanepool construction.
pub type Result<T> = std::result::Result<T, LanePoolError>;
