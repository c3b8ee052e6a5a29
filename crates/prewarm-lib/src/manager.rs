//! Predictive resource manager
//!
//! Ties the invocation history, the demand predictor and the warm pool
//! together. One manager per deployment; construct it explicitly and share
//! it behind an `Arc`.

use crate::error::{ConfigError, PrewarmError};
use crate::executor::FunctionExecutor;
use crate::history::InvocationHistory;
use crate::models::{
    DemandEstimate, Execution, ExecutionMode, ExecutionReport, PrewarmAction, PrewarmDecision,
};
use crate::observability::{PrewarmMetrics, StructuredLogger};
use crate::pool::{EvictionReason, PoolConfig, WarmOutcome, WarmPool};
use crate::predictor::{DemandPredictor, HourOfDayPredictor, PredictionConfig};
use crate::runtime::ContainerRuntime;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Configuration for a resource manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name attached to every log record of this manager
    pub deployment: String,
    pub prediction: PredictionConfig,
    pub pool: PoolConfig,
    /// How long invocation records are kept; defaults to the prediction window
    pub retention_hours: Option<i64>,
    /// Evict warm functions a prediction cycle finds idle
    pub evict_on_low_demand: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            deployment: "default".to_string(),
            prediction: PredictionConfig::default(),
            pool: PoolConfig::default(),
            retention_hours: None,
            evict_on_low_demand: false,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.prediction.validate()?;
        self.pool.validate()?;
        if let Some(hours) = self.retention_hours {
            if hours <= 0 {
                return Err(ConfigError::NonPositiveDuration("retention_hours"));
            }
        }
        Ok(())
    }

    /// Retention never drops records still inside the prediction window
    pub fn retention(&self) -> Duration {
        let hours = self
            .retention_hours
            .unwrap_or(self.prediction.window_hours)
            .max(self.prediction.window_hours);
        Duration::hours(hours)
    }
}

/// Snapshot of manager state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStats {
    pub functions_tracked: usize,
    pub history_records: usize,
    pub warm_functions: Vec<String>,
    pub pool_capacity: usize,
}

/// Records invocations, predicts demand and drives the warm pool
pub struct ResourceManager {
    config: ManagerConfig,
    history: InvocationHistory,
    predictor: Arc<dyn DemandPredictor>,
    pool: WarmPool,
    executor: FunctionExecutor,
    logger: StructuredLogger,
    metrics: PrewarmMetrics,
}

impl ResourceManager {
    /// Create a manager using the hour-of-day predictor
    pub fn new(config: ManagerConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<Self, ConfigError> {
        let predictor = Arc::new(HourOfDayPredictor::new(config.prediction.clone())?);
        Self::with_predictor(config, runtime, predictor)
    }

    /// Create a manager with a custom predictor
    pub fn with_predictor(
        config: ManagerConfig,
        runtime: Arc<dyn ContainerRuntime>,
        predictor: Arc<dyn DemandPredictor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let logger = StructuredLogger::new(config.deployment.clone());
        let pool = WarmPool::new(runtime.clone(), config.pool.clone())?.with_logger(logger.clone());

        Ok(Self {
            history: InvocationHistory::new(),
            predictor,
            pool,
            executor: FunctionExecutor::new(runtime).with_init_timeout(config.pool.init_timeout),
            logger,
            metrics: PrewarmMetrics::new(),
            config,
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn history(&self) -> &InvocationHistory {
        &self.history
    }

    pub fn pool(&self) -> &WarmPool {
        &self.pool
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn predictor_name(&self) -> &str {
        self.predictor.name()
    }

    /// Record an invocation reported by an upstream router
    pub fn report_invocation(&self, function_id: &str, timestamp: DateTime<Utc>) {
        self.history.record(function_id, timestamp);
    }

    /// Decide the startup mode for a request arriving at `now`.
    ///
    /// The invocation is recorded first, whatever the outcome. A cold hit
    /// warms the function right away so the next request finds it warm.
    pub async fn on_invocation_request(&self, function_id: &str, now: DateTime<Utc>) -> ExecutionMode {
        self.admit(function_id, now).await.0
    }

    /// Startup mode plus whether a warm container is ready for this request
    async fn admit(&self, function_id: &str, now: DateTime<Utc>) -> (ExecutionMode, bool) {
        self.history.record(function_id, now);

        if self.pool.acquire(function_id) {
            return (ExecutionMode::Warm, true);
        }

        match self.pool.warm(function_id).await {
            Ok(_) => (ExecutionMode::Cold, self.pool.acquire(function_id)),
            Err(e) => {
                warn!(function_id = %function_id, error = %e, "Reactive warm-up failed");
                (ExecutionMode::Cold, false)
            }
        }
    }

    /// Serve an execution request end to end.
    ///
    /// The reported duration covers the whole request, including a reactive
    /// warm-up on a cold hit. That warm-up's container runs the body; only
    /// when it could not be created does the request fall back to a one-shot
    /// cold container.
    pub async fn handle_request(
        &self,
        function_id: &str,
        input: Value,
        now: DateTime<Utc>,
    ) -> Result<ExecutionReport, PrewarmError> {
        let start = Instant::now();
        let (mode, container_ready) = self.admit(function_id, now).await;

        let executor_mode = if container_ready {
            ExecutionMode::Warm
        } else {
            ExecutionMode::Cold
        };

        match self.executor.execute(function_id, input, executor_mode).await {
            Ok(execution) => {
                let execution = Execution {
                    elapsed: start.elapsed(),
                    mode,
                    ..execution
                };
                self.metrics.observe_execution(execution.mode, execution.elapsed);
                self.logger
                    .log_execution(function_id, execution.mode, execution.elapsed);
                Ok(ExecutionReport::new(function_id, execution, now))
            }
            Err(e) => {
                self.metrics.inc_execution_errors();
                Err(e)
            }
        }
    }

    /// Demand estimate for a function at `now`
    pub fn estimate(&self, function_id: &str, now: DateTime<Utc>) -> DemandEstimate {
        self.predictor.estimate(&self.history, function_id, now)
    }

    pub fn predict(&self, function_id: &str, now: DateTime<Utc>) -> bool {
        self.predictor.predict(&self.history, function_id, now)
    }

    /// Warm a function ahead of demand
    pub async fn prewarm(&self, function_id: &str) -> Result<WarmOutcome, PrewarmError> {
        self.pool.warm(function_id).await
    }

    pub async fn evict(&self, function_id: &str) -> bool {
        self.pool.evict(function_id).await
    }

    /// Apply the retention policy. Returns the number of records dropped.
    pub fn trim_history(&self, now: DateTime<Utc>) -> usize {
        let removed = self.history.trim(now, self.config.retention());
        self.metrics
            .set_history_size(self.history.functions().len(), self.history.total_records());
        removed
    }

    /// Predict demand for every known function and pre-warm or evict.
    ///
    /// Meant to run on a schedule, independent of incoming requests.
    pub async fn run_prediction_cycle(&self, now: DateTime<Utc>) -> Vec<PrewarmDecision> {
        let start = Instant::now();
        self.trim_history(now);

        let function_ids: BTreeSet<String> = self
            .history
            .functions()
            .into_iter()
            .chain(self.pool.warm_functions())
            .collect();

        let mut decisions = Vec::with_capacity(function_ids.len());
        for function_id in function_ids {
            let estimate = self.estimate(&function_id, now);
            self.logger
                .log_prediction(&function_id, self.predictor.name(), &estimate);

            let action = if estimate.in_demand {
                match self.pool.warm(&function_id).await {
                    Ok(WarmOutcome::Prewarmed { .. }) => PrewarmAction::Prewarmed,
                    Ok(WarmOutcome::AlreadyWarm) => PrewarmAction::AlreadyWarm,
                    Err(e) => {
                        warn!(function_id = %function_id, error = %e, "Pre-warm failed");
                        PrewarmAction::Failed
                    }
                }
            } else if self.config.evict_on_low_demand
                && self
                    .pool
                    .evict_for(&function_id, EvictionReason::LowDemand)
                    .await
            {
                PrewarmAction::Evicted
            } else {
                PrewarmAction::Skipped
            };

            decisions.push(PrewarmDecision {
                function_id,
                estimate,
                action,
            });
        }

        let elapsed = start.elapsed();
        self.metrics.observe_prediction_cycle(elapsed.as_secs_f64());
        debug!(
            functions = decisions.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "Prediction cycle completed"
        );

        decisions
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            functions_tracked: self.history.functions().len(),
            history_records: self.history.total_records(),
            warm_functions: self.pool.warm_functions(),
            pool_capacity: self.pool.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{SimulatedRuntime, SimulatedRuntimeConfig};
    use chrono::TimeZone;
    use serde_json::json;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn manager_with(config: ManagerConfig) -> (ResourceManager, Arc<SimulatedRuntime>) {
        let runtime = Arc::new(
            SimulatedRuntime::new(SimulatedRuntimeConfig {
                init_cost: std::time::Duration::from_millis(5),
                invoke_overhead: std::time::Duration::ZERO,
            })
            .unwrap(),
        );
        let manager = ResourceManager::new(config, runtime.clone()).unwrap();
        (manager, runtime)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ManagerConfig {
            retention_hours: Some(0),
            ..Default::default()
        };
        let runtime = Arc::new(SimulatedRuntime::default());
        assert!(ResourceManager::new(config, runtime).is_err());
    }

    #[test]
    fn test_retention_covers_prediction_window() {
        let config = ManagerConfig {
            retention_hours: Some(2),
            ..Default::default()
        };
        assert_eq!(config.retention(), Duration::hours(24));
        assert_eq!(ManagerConfig::default().retention(), Duration::hours(24));
    }

    #[tokio::test]
    async fn test_first_request_cold_then_warm() {
        let (manager, runtime) = manager_with(ManagerConfig::default());

        assert_eq!(
            manager.on_invocation_request("fn", at(1, 9)).await,
            ExecutionMode::Cold
        );
        assert!(manager.pool().is_warm("fn"));
        assert_eq!(
            manager.on_invocation_request("fn", at(1, 9)).await,
            ExecutionMode::Warm
        );
        assert_eq!(manager.history().len("fn"), 2);
        assert_eq!(runtime.initializations(), 1);
    }

    #[tokio::test]
    async fn test_handle_request_reports_mode_and_output() {
        let (manager, _runtime) = manager_with(ManagerConfig::default());

        let first = manager
            .handle_request("fn", json!({ "data": "sample" }), at(1, 9))
            .await
            .unwrap();
        let second = manager
            .handle_request("fn", json!({ "data": "sample" }), at(1, 9))
            .await
            .unwrap();

        assert_eq!(first.mode, ExecutionMode::Cold);
        assert_eq!(second.mode, ExecutionMode::Warm);
        assert_eq!(second.output, json!({ "processed": { "data": "sample" } }));
        assert_eq!(second.function_id, "fn");
    }

    #[tokio::test]
    async fn test_prediction_cycle_prewarms_in_demand_functions() {
        let (manager, _runtime) = manager_with(ManagerConfig::default());
        manager.report_invocation("morning", at(2, 8));
        manager.report_invocation("night", at(2, 2));

        let decisions = manager.run_prediction_cycle(at(2, 9)).await;

        assert_eq!(decisions.len(), 2);
        let morning = decisions.iter().find(|d| d.function_id == "morning").unwrap();
        assert_eq!(morning.action, PrewarmAction::Prewarmed);
        let night = decisions.iter().find(|d| d.function_id == "night").unwrap();
        assert_eq!(night.action, PrewarmAction::Skipped);

        assert!(manager.pool().is_warm("morning"));
        assert!(!manager.pool().is_warm("night"));

        let again = manager.run_prediction_cycle(at(2, 9)).await;
        let morning = again.iter().find(|d| d.function_id == "morning").unwrap();
        assert_eq!(morning.action, PrewarmAction::AlreadyWarm);
    }

    #[tokio::test]
    async fn test_prediction_cycle_evicts_idle_when_enabled() {
        let (manager, _runtime) = manager_with(ManagerConfig {
            evict_on_low_demand: true,
            ..Default::default()
        });
        manager.report_invocation("fn", at(3, 9));
        manager.prewarm("fn").await.unwrap();

        let decisions = manager.run_prediction_cycle(at(3, 18)).await;

        assert_eq!(decisions[0].action, PrewarmAction::Evicted);
        assert!(!manager.pool().is_warm("fn"));
    }

    #[tokio::test]
    async fn test_prediction_cycle_trims_expired_history() {
        let (manager, _runtime) = manager_with(ManagerConfig::default());
        manager.report_invocation("stale", at(1, 9));
        manager.report_invocation("fresh", at(5, 9));

        let decisions = manager.run_prediction_cycle(at(5, 10)).await;

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].function_id, "fresh");
        let stats = manager.stats();
        assert_eq!(stats.functions_tracked, 1);
        assert_eq!(stats.history_records, 1);
    }

    #[tokio::test]
    async fn test_cold_hit_reports_whole_request_with_one_initialization() {
        let runtime = Arc::new(
            SimulatedRuntime::new(SimulatedRuntimeConfig {
                init_cost: std::time::Duration::from_millis(40),
                invoke_overhead: std::time::Duration::ZERO,
            })
            .unwrap(),
        );
        let manager = ResourceManager::new(ManagerConfig::default(), runtime.clone()).unwrap();

        let wall = Instant::now();
        let report = manager
            .handle_request("thumbnail", json!(null), at(1, 9))
            .await
            .unwrap();
        let wall_ms = wall.elapsed().as_secs_f64() * 1000.0;

        assert_eq!(report.mode, ExecutionMode::Cold);
        assert!(report.elapsed_ms >= 40.0, "reported {}ms", report.elapsed_ms);
        assert!(report.elapsed_ms <= wall_ms);
        // The reactive warm-up container served the body and stays warm
        assert_eq!(runtime.initializations(), 1);
        assert_eq!(runtime.releases(), 0);
        assert!(manager.pool().is_warm("thumbnail"));
    }

    struct StuckRuntime;

    #[async_trait::async_trait]
    impl ContainerRuntime for StuckRuntime {
        async fn initialize(&self, _function_id: &str) -> anyhow::Result<()> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(())
        }

        async fn invoke(&self, _function_id: &str, input: Value) -> anyhow::Result<Value> {
            Ok(input)
        }

        async fn release(&self, _function_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cold_fallback_respects_init_timeout() {
        let config = ManagerConfig {
            pool: PoolConfig {
                init_timeout: std::time::Duration::from_millis(50),
                ..Default::default()
            },
            ..Default::default()
        };
        let manager = ResourceManager::new(config, Arc::new(StuckRuntime)).unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            manager.handle_request("stuck", Value::Null, at(1, 9)),
        )
        .await
        .expect("request must finish within the init timeouts");

        assert!(matches!(
            result.unwrap_err(),
            PrewarmError::InitializationTimeout { .. }
        ));
        assert!(!manager.pool().is_warm("stuck"));
    }
}
