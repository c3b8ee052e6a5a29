//! Container runtime seam
//!
//! The manager never talks to a real sandbox directly. Everything that
//! allocates, runs or tears down a container goes through [`ContainerRuntime`].

use crate::error::ConfigError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default cost of initializing a container from scratch
pub const DEFAULT_INIT_COST: Duration = Duration::from_millis(500);

/// Default fixed overhead of dispatching to an initialized container
pub const DEFAULT_INVOKE_OVERHEAD: Duration = Duration::from_millis(100);

/// Lifecycle operations of a function container
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Allocate and load a container for the function. May block for a while.
    async fn initialize(&self, function_id: &str) -> Result<()>;

    /// Run the function body in an initialized container
    async fn invoke(&self, function_id: &str, input: Value) -> Result<Value>;

    /// Release a container that is no longer kept warm
    async fn release(&self, function_id: &str) -> Result<()>;
}

/// Costs of the simulated runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedRuntimeConfig {
    pub init_cost: Duration,
    pub invoke_overhead: Duration,
}

impl Default for SimulatedRuntimeConfig {
    fn default() -> Self {
        Self {
            init_cost: DEFAULT_INIT_COST,
            invoke_overhead: DEFAULT_INVOKE_OVERHEAD,
        }
    }
}

impl SimulatedRuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.init_cost.is_zero() {
            return Err(ConfigError::NonPositiveDuration("init_cost"));
        }
        Ok(())
    }
}

/// Runtime that stands in for real container work with timed sleeps
#[derive(Debug, Default)]
pub struct SimulatedRuntime {
    config: SimulatedRuntimeConfig,
    initializations: AtomicU64,
    invocations: AtomicU64,
    releases: AtomicU64,
}

impl SimulatedRuntime {
    pub fn new(config: SimulatedRuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            initializations: AtomicU64::new(0),
            invocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &SimulatedRuntimeConfig {
        &self.config
    }

    /// Containers initialized so far, cold starts and pre-warms alike
    pub fn initializations(&self) -> u64 {
        self.initializations.load(Ordering::Relaxed)
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContainerRuntime for SimulatedRuntime {
    async fn initialize(&self, function_id: &str) -> Result<()> {
        debug!(function_id = %function_id, cost_ms = self.config.init_cost.as_millis() as u64, "Initializing container");
        tokio::time::sleep(self.config.init_cost).await;
        self.initializations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn invoke(&self, _function_id: &str, input: Value) -> Result<Value> {
        if !self.config.invoke_overhead.is_zero() {
            tokio::time::sleep(self.config.invoke_overhead).await;
        }
        self.invocations.fetch_add(1, Ordering::Relaxed);
        Ok(json!({ "processed": input }))
    }

    async fn release(&self, function_id: &str) -> Result<()> {
        debug!(function_id = %function_id, "Releasing container");
        self.releases.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_runtime() -> SimulatedRuntime {
        SimulatedRuntime::new(SimulatedRuntimeConfig {
            init_cost: Duration::from_millis(5),
            invoke_overhead: Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn test_zero_init_cost_is_rejected() {
        let config = SimulatedRuntimeConfig {
            init_cost: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(
            SimulatedRuntime::new(config).unwrap_err(),
            ConfigError::NonPositiveDuration("init_cost")
        );
    }

    #[test]
    fn test_invoke_wraps_input() {
        let runtime = fast_runtime();
        let output =
            tokio_test::block_on(runtime.invoke("echo", json!({ "data": "sample" }))).unwrap();

        assert_eq!(output, json!({ "processed": { "data": "sample" } }));
        assert_eq!(runtime.invocations(), 1);
    }

    #[tokio::test]
    async fn test_counters_track_lifecycle() {
        let runtime = fast_runtime();
        runtime.initialize("fn").await.unwrap();
        runtime.initialize("fn").await.unwrap();
        runtime.release("fn").await.unwrap();

        assert_eq!(runtime.initializations(), 2);
        assert_eq!(runtime.releases(), 1);
    }
}
