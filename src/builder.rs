//! Builder pattern for constructing lane pools.
//!
//! The builder supports multiple configuration sources using figment:
//! - Default values
//! - Config files (TOML, YAML, JSON)
//! - Environment variables
//! - Programmatic overrides
//! - CLI arguments via clap

use crate::config::LanePoolConfig;
use crate::error::Result;
use crate::pool::LanePool;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use prometheus::Registry;
use std::path::Path;

/// Builder for constructing a [`LanePool`].
///
/// Configuration sources are merged in the following order (later sources override earlier):
/// 1. Default values
/// 2. Config files (in order added)
/// 3. Environment variables
/// 4. Programmatic overrides
/// 5. CLI arguments
///
/// # Examples
///
/// ```ignore
/// use lanepool::LanePoolBuilder;
///
/// let pool = LanePoolBuilder::new()
///     .file("lanepool.toml")
///     .env_prefix("LANEPOOL")
///     .prefix("ingest")
///     .worker_threads(4)
///     .build()?;
/// ```
pub struct LanePoolBuilder {
    figment: Figment,
    prometheus_registry: Option<Registry>,
}

impl Default for LanePoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LanePoolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanePoolBuilder")
            .field("figment", &self.figment)
            .field(
                "prometheus_registry",
                &self.prometheus_registry.as_ref().map(|_| "<Registry>"),
            )
            .finish()
    }
}

impl LanePoolBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(LanePoolConfig::default())),
            prometheus_registry: None,
        }
    }

    fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.figment = self.figment.merge(Serialized::default(key, value));
        self
    }

    /// Add a configuration file.
    ///
    /// Supports TOML, YAML, and JSON formats (detected by extension, TOML
    /// otherwise). Files are merged in the order they are added; a missing
    /// file contributes nothing.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let builder = LanePoolBuilder::new()
    ///     .file("lanepool.toml")
    ///     .file("lanepool.local.toml"); // Overrides values from lanepool.toml
    /// ```
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.figment = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => self.figment.merge(Yaml::file(path)),
            "json" => self.figment.merge(Json::file(path)),
            _ => self.figment.merge(Toml::file(path)),
        };
        self
    }

    /// Add environment variables with a prefix.
    ///
    /// Variables are read as `{PREFIX}_{KEY}`, e.g. `LANEPOOL_WORKER_THREADS`
    /// or `LANEPOOL_LANE_CAPACITY`. The prefix is given without the trailing
    /// underscore.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.figment = self
            .figment
            .merge(Env::prefixed(&format!("{prefix}_")));
        self
    }

    /// Set the thread name and metric prefix.
    ///
    /// Worker threads are named `{prefix}-worker-{NNNN}`.
    pub fn prefix(self, prefix: impl Into<String>) -> Self {
        self.set("prefix", prefix.into())
    }

    /// Set the number of worker threads.
    ///
    /// Default is one per available CPU (or per CPU in the cpuset).
    pub fn worker_threads(self, n: usize) -> Self {
        self.set("worker_threads", n)
    }

    /// Set the maximum number of queued tasks per lane. Default is 1024.
    pub fn lane_capacity(self, capacity: usize) -> Self {
        self.set("lane_capacity", capacity)
    }

    /// Pin workers to a CPU set, handed out round-robin.
    ///
    /// Format: `"0-7,16-23"` for ranges, `"0,2,4,6"` for individual CPUs.
    pub fn cpuset(self, cpuset: impl Into<String>) -> Self {
        self.set("cpuset", cpuset.into())
    }

    /// Provide an external Prometheus registry for metrics exposition.
    pub fn prometheus_registry(mut self, registry: Registry) -> Self {
        self.prometheus_registry = Some(registry);
        self
    }

    /// Apply CLI argument overrides.
    ///
    /// Only values present in `args` are applied.
    pub fn with_cli_args(mut self, args: &LanePoolArgs) -> Self {
        if let Some(ref prefix) = args.lanepool_prefix {
            self = self.prefix(prefix.clone());
        }
        if let Some(n) = args.lanepool_workers {
            self = self.worker_threads(n);
        }
        if let Some(capacity) = args.lanepool_lane_capacity {
            self = self.lane_capacity(capacity);
        }
        if let Some(ref cpuset) = args.lanepool_cpuset {
            self = self.cpuset(cpuset.clone());
        }
        self
    }

    /// Resolve the layered configuration without starting anything.
    ///
    /// # Errors
    ///
    /// Returns `LanePoolError::Config` if a source is malformed.
    pub fn config(&self) -> Result<LanePoolConfig> {
        let mut config: LanePoolConfig = self.figment.extract().map_err(Box::new)?;
        config.prometheus_registry = self.prometheus_registry.clone();
        Ok(config)
    }

    /// Build the pool and start its workers.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration extraction fails
    /// - Worker count or lane capacity is 0
    /// - CPU set is invalid or contains unavailable CPUs
    /// - A worker thread cannot be spawned
    pub fn build(self) -> Result<LanePool> {
        LanePool::from_config(self.config()?)
    }
}

/// CLI arguments for lane pool configuration.
///
/// Flatten into an application's clap parser and apply with
/// [`LanePoolBuilder::with_cli_args`].
///
/// # Examples
///
/// ```ignore
/// use clap::Parser;
/// use lanepool::{LanePoolArgs, LanePoolBuilder};
///
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     pool: LanePoolArgs,
/// }
///
/// let args = MyArgs::parse();
/// let pool = LanePoolBuilder::new()
///     .with_cli_args(&args.pool)
///     .build()?;
/// ```
#[derive(Debug, Default, Clone, clap::Args)]
pub struct LanePoolArgs {
    /// Worker thread name prefix
    #[arg(long)]
    pub lanepool_prefix: Option<String>,

    /// Number of worker threads
    #[arg(long)]
    pub lanepool_workers: Option<usize>,

    /// Maximum queued tasks per priority lane
    #[arg(long)]
    pub lanepool_lane_capacity: Option<usize>,

    /// CPU set to pin workers to (e.g., "0-7,16-23")
    #[arg(long)]
    pub lanepool_cpuset: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LanePoolError;
    use clap::Parser;

    #[test]
    fn test_builder_defaults() {
        let config = LanePoolBuilder::new().config().unwrap();
        assert_eq!(config.prefix, "lanepool");
        assert!(config.worker_threads.is_none());
        assert_eq!(config.lane_capacity, 1024);
        assert!(config.cpuset.is_none());
    }

    #[test]
    fn test_builder_programmatic_override() {
        let config = LanePoolBuilder::new()
            .prefix("ingest")
            .worker_threads(3)
            .lane_capacity(8)
            .cpuset("0")
            .config()
            .unwrap();

        assert_eq!(config.prefix, "ingest");
        assert_eq!(config.worker_threads, Some(3));
        assert_eq!(config.lane_capacity, 8);
        assert_eq!(config.cpuset, Some("0".to_string()));
    }

    #[test]
    fn test_builder_cli_args_override_programmatic() {
        let args = LanePoolArgs {
            lanepool_prefix: Some("cli".to_string()),
            lanepool_workers: Some(2),
            lanepool_lane_capacity: None,
            lanepool_cpuset: None,
        };

        let config = LanePoolBuilder::new()
            .prefix("code")
            .lane_capacity(32)
            .with_cli_args(&args)
            .config()
            .unwrap();

        assert_eq!(config.prefix, "cli");
        assert_eq!(config.worker_threads, Some(2));
        // Untouched by the CLI
        assert_eq!(config.lane_capacity, 32);
    }

    #[test]
    fn test_cli_args_parse() {
        #[derive(Parser)]
        struct App {
            #[command(flatten)]
            pool: LanePoolArgs,
        }

        let app = App::parse_from([
            "app",
            "--lanepool-workers",
            "6",
            "--lanepool-lane-capacity",
            "128",
        ]);
        assert_eq!(app.pool.lanepool_workers, Some(6));
        assert_eq!(app.pool.lanepool_lane_capacity, Some(128));
        assert!(app.pool.lanepool_prefix.is_none());
    }

    #[test]
    fn test_file_and_env_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "lanepool.toml",
                r#"
                    prefix = "from-file"
                    worker_threads = 2
                    lane_capacity = 64
                "#,
            )?;
            jail.create_file("lanepool.json", r#"{ "lane_capacity": 96 }"#)?;
            jail.set_env("LANEPOOL_WORKER_THREADS", "5");

            let config = LanePoolBuilder::new()
                .file("lanepool.toml")
                .file("lanepool.json")
                .env_prefix("LANEPOOL")
                .config()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.prefix, "from-file");
            assert_eq!(config.lane_capacity, 96);
            assert_eq!(config.worker_threads, Some(5));
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("pool.yml", "worker_threads: 7\ncpuset: \"0-1\"\n")?;

            let config = LanePoolBuilder::new()
                .file("pool.yml")
                .config()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.worker_threads, Some(7));
            assert_eq!(config.cpuset.as_deref(), Some("0-1"));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("bad.toml", r#"lane_capacity = "lots""#)?;

            let result = LanePoolBuilder::new().file("bad.toml").config();
            assert!(matches!(result, Err(LanePoolError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn test_build_starts_pool() {
        let pool = LanePoolBuilder::new()
            .prefix("built")
            .worker_threads(2)
            .lane_capacity(16)
            .build()
            .unwrap();

        assert_eq!(pool.worker_threads(), 2);
        assert_eq!(pool.lane_capacity(), 16);
        assert_eq!(pool.config().prefix, "built");
    }
}
