//! # lanepool
//!
//! **Three lanes, one pool**
//!
//! A fixed-size worker thread pool that executes submitted tasks from three
//! bounded priority lanes, with backpressure and anti-starvation dispatch.
//!
//! ## Features
//!
//! - **Priority Lanes**: Low, Normal and High FIFO lanes, each with its own capacity
//! - **Fair Dispatch**: High is preferred, but Normal gets a turn after at most three High tasks
//! - **Backpressure**: `submit()` fails fast on a full lane, `submit_blocking()` waits for space
//! - **Two Ways to Stop**: discard queued work immediately, or drain everything first
//! - **CPU Pinning**: Optionally pins workers to a CPU set
//! - **Flexible Configuration**: Configure via files (TOML/YAML/JSON), environment variables, or code
//! - **CLI Integration**: Built-in clap support for command-line overrides
//! - **Prometheus Metrics**: Lane depths, rejections, discards and panics
//!
//! ## Quick Start
//!
//! ```
//! use lanepool::{LanePoolBuilder, Priority};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = LanePoolBuilder::new()
//!         .prefix("myapp")
//!         .worker_threads(4)
//!         .lane_capacity(256)
//!         .build()?;
//!
//!     pool.submit_to(Priority::High, || println!("urgent"))?;
//!     pool.submit(|| println!("routine"))?;
//!     pool.submit_to(Priority::Low, || println!("whenever"))?;
//!
//!     // Run everything that was queued, then shut down
//!     pool.stop_after_drain();
//!     Ok(())
//! }
//! ```
//!
//! ## Dispatch Order
//!
//! Each time a worker picks a task:
//!
//! 1. If High and Normal are both empty, the oldest Low task runs.
//! 2. Otherwise, if High has work and either Normal is empty or fewer than
//!    [`FAIRNESS_WINDOW`] High tasks are unpaid, the oldest High task runs.
//! 3. Otherwise the oldest Normal task runs.
//!
//! Low work can starve under sustained High/Normal load.
//!
//! ## Configuration
//!
//! Configuration sources are merged in order (later sources override earlier):
//!
//! 1. Default values
//! 2. Config files (via `.file()`)
//! 3. Environment variables (via `.env_prefix()`)
//! 4. Programmatic overrides
//! 5. CLI arguments (via `.with_cli_args()`)
//!
//! ### Config File Example (TOML)
//!
//! ```toml
//! prefix = "myapp"
//! cpuset = "0-7"
//! worker_threads = 8
//! lane_capacity = 4096
//! ```
//!
//! ### Environment Variables
//!
//! With `.env_prefix("LANEPOOL")`:
//! - `LANEPOOL_PREFIX=myapp`
//! - `LANEPOOL_CPUSET=0-7`
//! - `LANEPOOL_WORKER_THREADS=8`
//! - `LANEPOOL_LANE_CAPACITY=4096`
//!
//! ### CLI Arguments
//!
//! ```ignore
//! use clap::Parser;
//! use lanepool::{LanePoolArgs, LanePoolBuilder};
//!
//! #[derive(Parser)]
//! struct MyArgs {
//!     #[command(flatten)]
//!     pool: LanePoolArgs,
//! }
//!
//! let args = MyArgs::parse();
//! let pool = LanePoolBuilder::new()
//!     .file("config.toml")
//!     .env_prefix("LANEPOOL")
//!     .with_cli_args(&args.pool)
//!     .build()?;
//! ```
//!
//! ## CPU Set Format
//!
//! The `cpuset` option accepts a string in Linux taskset/numactl format:
//! - Single CPUs: `"0"`, `"5"`
//! - Ranges: `"0-7"`, `"16-23"`
//! - Mixed: `"0-3,8-11"`, `"0,2,4,6-8"`
//!
//! ## Thread Naming
//!
//! Workers are named with the configured prefix:
//! `{prefix}-worker-0000`, `{prefix}-worker-0001`, ...

pub(crate) mod affinity;
pub mod builder;
pub mod config;
pub mod cpuset;
pub(crate) mod dispatch;
pub mod error;
pub(crate) mod lanes;
pub mod metrics;
pub(crate) mod pool;
pub(crate) mod shared;
pub(crate) mod task;
pub(crate) mod worker;

pub use builder::{LanePoolArgs, LanePoolBuilder};
pub use config::LanePoolConfig;
pub use dispatch::FAIRNESS_WINDOW;
pub use error::{LanePoolError, Result, SubmitError};
pub use lanes::{Priority, DEFAULT_LANE_CAPACITY};
pub use metrics::LanePoolMetrics;
pub use pool::LanePool;
pub use shared::PoolState;
pub use task::Task;
