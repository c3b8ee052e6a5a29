//! Core data models for the prewarm manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Instant at which a function was invoked
pub type InvocationRecord = DateTime<Utc>;

/// How a container was started for an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Container initialized from scratch before running the body
    Cold,
    /// Pre-initialized container, body runs directly
    Warm,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Cold => "cold",
            ExecutionMode::Warm => "warm",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single function execution
#[derive(Debug, Clone)]
pub struct Execution {
    pub output: serde_json::Value,
    pub elapsed: Duration,
    pub mode: ExecutionMode,
}

/// Response to an execution request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub function_id: String,
    pub output: serde_json::Value,
    pub elapsed_ms: f64,
    pub mode: ExecutionMode,
    pub requested_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn new(function_id: &str, execution: Execution, requested_at: DateTime<Utc>) -> Self {
        Self {
            function_id: function_id.to_string(),
            output: execution.output,
            elapsed_ms: execution.elapsed.as_secs_f64() * 1000.0,
            mode: execution.mode,
            requested_at,
        }
    }
}

/// Frequency estimate behind a single demand prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandEstimate {
    /// Invocations inside the lookback window
    pub recent: usize,
    /// Recent invocations at a similar hour of day
    pub similar: usize,
    pub probability: f64,
    /// Whether the probability reached the threshold
    pub in_demand: bool,
}

impl DemandEstimate {
    /// Estimate for a function with nothing in its window
    pub fn empty() -> Self {
        Self {
            recent: 0,
            similar: 0,
            probability: 0.0,
            in_demand: false,
        }
    }
}

/// Action taken for one function during a prediction cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrewarmAction {
    Prewarmed,
    AlreadyWarm,
    Evicted,
    Skipped,
    Failed,
}

/// Outcome of a prediction cycle for a single function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrewarmDecision {
    pub function_id: String,
    pub estimate: DemandEstimate,
    pub action: PrewarmAction,
}

/// Benchmark approach a latency sample was taken with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Traditional,
    Predictive,
}

/// One point of a latency time series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySample {
    pub function_name: String,
    pub method: Method,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
}
