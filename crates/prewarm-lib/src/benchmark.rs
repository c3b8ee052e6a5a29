//! In-process comparison of traditional cold starts and predictive warm-up

use crate::executor::FunctionExecutor;
use crate::manager::{ManagerConfig, ResourceManager};
use crate::models::{ExecutionMode, LatencySample, Method};
use crate::runtime::{SimulatedRuntime, SimulatedRuntimeConfig};
use crate::stats::BenchmarkReport;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Parameters of a comparison run
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub function_name: String,
    pub iterations: usize,
    /// Idle time between two requests
    pub pause: Duration,
    /// Warm the function before the first predictive request
    pub prewarm_before_run: bool,
    pub runtime: SimulatedRuntimeConfig,
    pub input: Value,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            function_name: "test_function".to_string(),
            iterations: 10,
            pause: Duration::from_millis(100),
            prewarm_before_run: true,
            runtime: SimulatedRuntimeConfig::default(),
            input: json!({ "data": "sample" }),
        }
    }
}

/// Report plus the raw time series behind it
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub report: BenchmarkReport,
    pub samples: Vec<LatencySample>,
}

/// Run both methods back to back against separate simulated runtimes
pub async fn run_comparison(config: &BenchmarkConfig) -> Result<BenchmarkRun> {
    let mut samples = Vec::with_capacity(config.iterations * 2);

    info!(iterations = config.iterations, "Testing traditional cold start approach");
    let runtime = Arc::new(SimulatedRuntime::new(config.runtime.clone())?);
    let executor = FunctionExecutor::new(runtime);
    for _ in 0..config.iterations {
        let timestamp = Utc::now();
        let execution = executor
            .execute(&config.function_name, config.input.clone(), ExecutionMode::Cold)
            .await
            .context("Traditional execution failed")?;
        samples.push(LatencySample {
            function_name: config.function_name.clone(),
            method: Method::Traditional,
            timestamp,
            duration_ms: execution.elapsed.as_secs_f64() * 1000.0,
        });
        tokio::time::sleep(config.pause).await;
    }

    info!(iterations = config.iterations, "Testing predictive approach");
    let runtime = Arc::new(SimulatedRuntime::new(config.runtime.clone())?);
    let manager = ResourceManager::new(
        ManagerConfig {
            deployment: "benchmark".to_string(),
            ..Default::default()
        },
        runtime,
    )?;
    if config.prewarm_before_run {
        manager
            .prewarm(&config.function_name)
            .await
            .context("Initial pre-warm failed")?;
    }
    for _ in 0..config.iterations {
        let report = manager
            .handle_request(&config.function_name, config.input.clone(), Utc::now())
            .await
            .context("Predictive execution failed")?;
        samples.push(LatencySample {
            function_name: config.function_name.clone(),
            method: Method::Predictive,
            timestamp: report.requested_at,
            duration_ms: report.elapsed_ms,
        });
        tokio::time::sleep(config.pause).await;
    }

    Ok(BenchmarkRun {
        report: BenchmarkReport::from_samples(&samples),
        samples,
    })
}
