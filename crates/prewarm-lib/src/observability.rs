//! Observability infrastructure for the prewarm manager
//!
//! Provides:
//! - Prometheus metrics (execution latency by mode, pre-warm and eviction counts, pool size)
//! - Structured JSON logging with tracing

use crate::models::{DemandEstimate, ExecutionMode};
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Histogram buckets for execution latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0,
];

/// Histogram buckets for prediction cycles (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PrewarmMetricsInner> = OnceLock::new();

struct PrewarmMetricsInner {
    execution_latency_seconds: HistogramVec,
    executions: IntCounterVec,
    execution_errors: IntCounter,
    prewarms: IntCounter,
    evictions: IntCounterVec,
    initialization_failures: IntCounter,
    warm_pool_size: IntGauge,
    functions_tracked: IntGauge,
    history_records: IntGauge,
    prediction_cycle_seconds: Histogram,
}

impl PrewarmMetricsInner {
    fn new() -> Self {
        Self {
            execution_latency_seconds: register_histogram_vec!(
                "prewarm_execution_latency_seconds",
                "Wall-clock duration of function executions",
                &["mode"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register execution_latency_seconds"),

            executions: register_int_counter_vec!(
                "prewarm_executions_total",
                "Function executions by startup mode",
                &["mode"]
            )
            .expect("Failed to register executions_total"),

            execution_errors: register_int_counter!(
                "prewarm_execution_errors_total",
                "Executions that failed during initialization or in the function body"
            )
            .expect("Failed to register execution_errors_total"),

            prewarms: register_int_counter!(
                "prewarm_containers_prewarmed_total",
                "Cold to warm transitions of the warm pool"
            )
            .expect("Failed to register containers_prewarmed_total"),

            evictions: register_int_counter_vec!(
                "prewarm_containers_evicted_total",
                "Warm to cold transitions of the warm pool",
                &["reason"]
            )
            .expect("Failed to register containers_evicted_total"),

            initialization_failures: register_int_counter!(
                "prewarm_initialization_failures_total",
                "Container initializations that failed or timed out"
            )
            .expect("Failed to register initialization_failures_total"),

            warm_pool_size: register_int_gauge!(
                "prewarm_warm_pool_size",
                "Number of functions currently holding a warm container"
            )
            .expect("Failed to register warm_pool_size"),

            functions_tracked: register_int_gauge!(
                "prewarm_functions_tracked",
                "Number of functions with retained invocation history"
            )
            .expect("Failed to register functions_tracked"),

            history_records: register_int_gauge!(
                "prewarm_history_records",
                "Number of retained invocation records"
            )
            .expect("Failed to register history_records"),

            prediction_cycle_seconds: register_histogram!(
                "prewarm_prediction_cycle_seconds",
                "Time spent predicting demand for all tracked functions",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_cycle_seconds"),
        }
    }
}

/// Prewarm metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance. Every manager in the
/// process reports into the same registry.
#[derive(Clone)]
pub struct PrewarmMetrics {
    _private: (),
}

impl Default for PrewarmMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PrewarmMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrewarmMetrics").finish()
    }
}

impl PrewarmMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PrewarmMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PrewarmMetricsInner {
        GLOBAL_METRICS.get_or_init(PrewarmMetricsInner::new)
    }

    /// Record a completed execution
    pub fn observe_execution(&self, mode: ExecutionMode, elapsed: Duration) {
        let inner = self.inner();
        inner
            .execution_latency_seconds
            .with_label_values(&[mode.as_str()])
            .observe(elapsed.as_secs_f64());
        inner.executions.with_label_values(&[mode.as_str()]).inc();
    }

    pub fn inc_execution_errors(&self) {
        self.inner().execution_errors.inc();
    }

    pub fn inc_prewarms(&self) {
        self.inner().prewarms.inc();
    }

    pub fn inc_evictions(&self, reason: &str) {
        self.inner().evictions.with_label_values(&[reason]).inc();
    }

    pub fn inc_initialization_failures(&self) {
        self.inner().initialization_failures.inc();
    }

    pub fn set_warm_pool_size(&self, size: usize) {
        self.inner().warm_pool_size.set(size as i64);
    }

    /// Update history size gauges
    pub fn set_history_size(&self, functions: usize, records: usize) {
        self.inner().functions_tracked.set(functions as i64);
        self.inner().history_records.set(records as i64);
    }

    pub fn observe_prediction_cycle(&self, duration_secs: f64) {
        self.inner().prediction_cycle_seconds.observe(duration_secs);
    }
}

/// Structured logger for prewarm events
///
/// Consistent JSON-formatted records for pre-warms, evictions, executions
/// and predictions, tagged with the deployment they belong to.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    deployment: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("default")
    }
}

impl StructuredLogger {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Log a cold to warm transition
    pub fn log_prewarm(&self, function_id: &str, init_duration: Duration) {
        info!(
            event = "container_prewarmed",
            deployment = %self.deployment,
            function_id = %function_id,
            init_ms = init_duration.as_secs_f64() * 1000.0,
            "container pre-warmed for {}",
            function_id
        );
    }

    /// Log a warm to cold transition
    pub fn log_eviction(&self, function_id: &str, reason: &str) {
        info!(
            event = "container_evicted",
            deployment = %self.deployment,
            function_id = %function_id,
            reason = %reason,
            "Container evicted"
        );
    }

    /// Log a failed container initialization
    pub fn log_initialization_failure(&self, function_id: &str, error: &str) {
        warn!(
            event = "initialization_failed",
            deployment = %self.deployment,
            function_id = %function_id,
            error = %error,
            "Container initialization failed, function stays cold"
        );
    }

    /// Log a completed execution
    pub fn log_execution(&self, function_id: &str, mode: ExecutionMode, elapsed: Duration) {
        debug!(
            event = "function_executed",
            deployment = %self.deployment,
            function_id = %function_id,
            mode = %mode,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Function executed"
        );
    }

    /// Log the demand estimate behind a pre-warm decision
    pub fn log_prediction(&self, function_id: &str, predictor: &str, estimate: &DemandEstimate) {
        debug!(
            event = "demand_predicted",
            deployment = %self.deployment,
            function_id = %function_id,
            predictor = %predictor,
            recent = estimate.recent,
            similar = estimate.similar,
            probability = estimate.probability,
            in_demand = estimate.in_demand,
            "Demand predicted"
        );
    }

    /// Log manager startup
    pub fn log_startup(&self, version: &str, predictor: &str) {
        info!(
            event = "manager_started",
            deployment = %self.deployment,
            version = %version,
            predictor = %predictor,
            "Prewarm manager started"
        );
    }

    /// Log manager shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "manager_shutdown",
            deployment = %self.deployment,
            reason = %reason,
            "Prewarm manager shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prewarm_metrics_creation() {
        let metrics = PrewarmMetrics::new();

        metrics.observe_execution(ExecutionMode::Cold, Duration::from_millis(500));
        metrics.observe_execution(ExecutionMode::Warm, Duration::from_millis(100));
        metrics.inc_prewarms();
        metrics.inc_evictions("capacity");
        metrics.set_warm_pool_size(3);
        metrics.set_history_size(2, 10);
        metrics.observe_prediction_cycle(0.001);

        // Handles share one registry
        let _second = PrewarmMetrics::new();
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-deployment");
        assert_eq!(logger.deployment(), "test-deployment");
    }
}
