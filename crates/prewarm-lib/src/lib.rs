//! Predictive pre-warming library for serverless function containers
//!
//! This crate provides the core functionality for:
//! - Recording per-function invocation history
//! - Hour-of-day demand prediction
//! - A bounded warm container pool with at-most-once initialization
//! - Cold and warm execution through a pluggable container runtime
//! - Health checks and observability

pub mod benchmark;
pub mod error;
pub mod executor;
pub mod health;
pub mod history;
pub mod manager;
pub mod models;
pub mod observability;
pub mod pool;
pub mod predictor;
pub mod runtime;
pub mod stats;

pub use error::{ConfigError, PrewarmError};
pub use executor::FunctionExecutor;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::InvocationHistory;
pub use manager::{ManagerConfig, ManagerStats, ResourceManager};
pub use models::*;
pub use observability::{PrewarmMetrics, StructuredLogger};
pub use pool::{EvictionReason, PoolConfig, PoolEvent, WarmOutcome, WarmPool};
pub use predictor::{
    DemandPredictor, HourDistance, HourOfDayPredictor, PredictionConfig, PrewarmScheduler,
    SchedulerConfig, SchedulerStats,
};
pub use runtime::{ContainerRuntime, SimulatedRuntime, SimulatedRuntimeConfig};
pub use stats::{BenchmarkReport, LatencyStats};
