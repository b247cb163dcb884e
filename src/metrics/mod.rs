//! Metrics for lanepool observability.
//!
//! Counters and gauges are always updated (plain atomic operations) and can
//! optionally be exposed by handing the pool a Prometheus registry.
//!
//! # Available Metrics
//!
//! ## Gauges (current values)
//!
//! - `lanepool_queued_low` - Tasks waiting in the Low lane
//! - `lanepool_queued_normal` - Tasks waiting in the Normal lane
//! - `lanepool_queued_high` - Tasks waiting in the High lane
//! - `lanepool_busy_workers` - Workers currently executing a task
//!
//! ## Counters (cumulative)
//!
//! - `lanepool_submitted_tasks` - Tasks admitted to a lane
//! - `lanepool_rejected_tasks` - Submissions turned away
//! - `lanepool_executed_tasks` - Tasks that ran to completion or panicked
//! - `lanepool_discarded_tasks` - Queued tasks destroyed by an immediate stop
//! - `lanepool_panicked_tasks` - Tasks whose `execute` panicked
//! - `lanepool_forced_normal_dispatches` - Normal picks made while High work waited
//!
//! # Example
//!
//! ```ignore
//! use prometheus::Registry;
//! use lanepool::LanePoolBuilder;
//!
//! let registry = Registry::new();
//! let pool = LanePoolBuilder::new()
//!     .prometheus_registry(registry.clone())
//!     .build()?;
//!
//! let encoder = prometheus::TextEncoder::new();
//! let mut buffer = String::new();
//! encoder.encode_utf8(&registry.gather(), &mut buffer)?;
//! ```

mod prometheus;

pub use self::prometheus::LanePoolMetrics;
