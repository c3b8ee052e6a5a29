//! Agent configuration

use anyhow::{Context, Result};
use prewarm_lib::{
    HourDistance, ManagerConfig, PoolConfig, PredictionConfig, SchedulerConfig,
    SimulatedRuntimeConfig,
};
use serde::Deserialize;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Deployment name attached to log records
    #[serde(default = "default_deployment")]
    pub deployment: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Prediction lookback horizon in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,

    #[serde(default = "default_similarity_tolerance_hours")]
    pub similarity_tolerance_hours: u32,

    /// Minimum probability that triggers pre-warming
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub hour_distance: HourDistance,

    #[serde(default)]
    pub utc_offset_secs: i32,

    /// Invocation history retention; the prediction window when unset
    #[serde(default)]
    pub retention_hours: Option<i64>,

    #[serde(default)]
    pub evict_on_low_demand: bool,

    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,

    /// Prediction cycle interval in seconds
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Simulated container initialization cost
    #[serde(default = "default_init_cost_ms")]
    pub init_cost_ms: u64,

    /// Simulated warm dispatch overhead
    #[serde(default = "default_invoke_overhead_ms")]
    pub invoke_overhead_ms: u64,
}

fn default_deployment() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "default".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_window_hours() -> i64 {
    prewarm_lib::predictor::DEFAULT_WINDOW_HOURS
}

fn default_similarity_tolerance_hours() -> u32 {
    prewarm_lib::predictor::DEFAULT_SIMILARITY_TOLERANCE_HOURS
}

fn default_threshold() -> f64 {
    prewarm_lib::predictor::DEFAULT_THRESHOLD
}

fn default_pool_capacity() -> usize {
    prewarm_lib::pool::DEFAULT_POOL_CAPACITY
}

fn default_init_timeout_ms() -> u64 {
    prewarm_lib::pool::DEFAULT_INIT_TIMEOUT.as_millis() as u64
}

fn default_cycle_interval() -> u64 {
    prewarm_lib::predictor::DEFAULT_CYCLE_INTERVAL.as_secs()
}

fn default_init_cost_ms() -> u64 {
    prewarm_lib::runtime::DEFAULT_INIT_COST.as_millis() as u64
}

fn default_invoke_overhead_ms() -> u64 {
    prewarm_lib::runtime::DEFAULT_INVOKE_OVERHEAD.as_millis() as u64
}

impl AgentConfig {
    /// Load configuration from an optional file and `PREWARM_*` environment variables.
    ///
    /// Invalid values fail startup instead of falling back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let config: AgentConfig = builder
            .add_source(config::Environment::with_prefix("PREWARM").try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config
            .manager_config()
            .validate()
            .context("Invalid prediction or pool configuration")?;
        config
            .scheduler_config()
            .validate()
            .context("Invalid scheduler configuration")?;
        config
            .runtime_config()
            .validate()
            .context("Invalid runtime configuration")?;

        Ok(config)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            deployment: self.deployment.clone(),
            prediction: PredictionConfig {
                window_hours: self.window_hours,
                similarity_tolerance_hours: self.similarity_tolerance_hours,
                threshold: self.threshold,
                hour_distance: self.hour_distance,
                utc_offset_secs: self.utc_offset_secs,
            },
            pool: PoolConfig {
                capacity: self.pool_capacity,
                init_timeout: Duration::from_millis(self.init_timeout_ms),
            },
            retention_hours: self.retention_hours,
            evict_on_low_demand: self.evict_on_low_demand,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            cycle_interval: Duration::from_secs(self.cycle_interval_secs),
        }
    }

    pub fn runtime_config(&self) -> SimulatedRuntimeConfig {
        SimulatedRuntimeConfig {
            init_cost: Duration::from_millis(self.init_cost_ms),
            invoke_overhead: Duration::from_millis(self.invoke_overhead_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("prewarm-agent")
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_file_values_map_to_manager_config() {
        let file = write_config(
            "deployment = \"edge\"\nthreshold = 0.75\nhour_distance = \"linear\"\npool_capacity = 3\n",
        );
        let config = AgentConfig::load(file.path().to_str()).unwrap();

        let manager = config.manager_config();
        assert_eq!(manager.deployment, "edge");
        assert_eq!(manager.prediction.threshold, 0.75);
        assert_eq!(manager.prediction.hour_distance, HourDistance::Linear);
        assert_eq!(manager.prediction.window_hours, 24);
        assert_eq!(manager.pool.capacity, 3);
    }

    #[test]
    fn test_invalid_threshold_fails_load() {
        let file = write_config("threshold = 1.5\n");
        assert!(AgentConfig::load(file.path().to_str()).is_err());
    }

    #[test]
    fn test_same_contents_get_distinct_files() {
        let first = write_config("threshold = 0.5\n");
        let second = write_config("threshold = 0.5\n");
        assert_ne!(first.path(), second.path());

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
    }
}
