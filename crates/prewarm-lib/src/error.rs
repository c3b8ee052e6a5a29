//! Error types for configuration and the execution path

use std::time::Duration;
use thiserror::Error;

/// Rejected configuration values. Never clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("window_hours must be positive, got {0}")]
    NonPositiveWindow(i64),

    #[error("similarity_tolerance_hours must be between 0 and 23, got {0}")]
    InvalidTolerance(u32),

    #[error("threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("utc_offset_secs must be within +/-86399, got {0}")]
    InvalidUtcOffset(i32),

    #[error("warm pool capacity must be at least 1")]
    ZeroCapacity,

    #[error("{0} must be a positive duration")]
    NonPositiveDuration(&'static str),
}

/// Failures surfaced from warm-up and execution
#[derive(Debug, Error)]
pub enum PrewarmError {
    #[error("container initialization failed for {function_id}: {source}")]
    InitializationFailed {
        function_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("container initialization for {function_id} timed out after {timeout:?}")]
    InitializationTimeout {
        function_id: String,
        timeout: Duration,
    },

    #[error("function {function_id} failed: {source}")]
    ExecutionFailed {
        function_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PrewarmError {
    pub fn function_id(&self) -> &str {
        match self {
            PrewarmError::InitializationFailed { function_id, .. }
            | PrewarmError::InitializationTimeout { function_id, .. }
            | PrewarmError::ExecutionFailed { function_id, .. } => function_id,
        }
    }

    /// True when the failure happened before the function body ran
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            PrewarmError::InitializationFailed { .. } | PrewarmError::InitializationTimeout { .. }
        )
    }
}
