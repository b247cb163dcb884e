//! Configuration types for lanepool.

use serde::{Deserialize, Serialize};

use crate::lanes::DEFAULT_LANE_CAPACITY;
use prometheus::Registry;

/// Configuration for a [`LanePool`](crate::LanePool).
///
/// This struct can be deserialized from TOML, YAML, JSON, or environment variables
/// using figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LanePoolConfig {
    /// Thread name and metric prefix (default: "lanepool")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Number of worker threads (default: one per available CPU)
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Maximum queued tasks per lane (default: 1024)
    #[serde(default = "default_lane_capacity")]
    pub lane_capacity: usize,

    /// CPU set string (e.g., "0-7,16-23") to pin workers to, or None to leave
    /// them unpinned
    #[serde(default)]
    pub cpuset: Option<String>,

    /// Prometheus registry for metrics exposition.
    /// Not serializable - must be set programmatically.
    #[serde(skip)]
    pub prometheus_registry: Option<Registry>,
}

fn default_prefix() -> String {
    "lanepool".to_string()
}

fn default_lane_capacity() -> usize {
    DEFAULT_LANE_CAPACITY
}

impl Default for LanePoolConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            worker_threads: None,
            lane_capacity: default_lane_capacity(),
            cpuset: None,
            prometheus_registry: None,
        }
    }
}

impl LanePoolConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the effective number of worker threads.
    ///
    /// Returns the configured value, or `available_cpus` (at least 1) when
    /// unset. A configured 0 is returned as-is and rejected at build time.
    pub fn effective_worker_threads(&self, available_cpus: usize) -> usize {
        self.worker_threads.unwrap_or(available_cpus.max(1))
    }
}
