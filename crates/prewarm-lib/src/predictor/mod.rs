//! Demand prediction

mod config;
mod hourly;
mod scheduler;

pub use config::{
    HourDistance, PredictionConfig, DEFAULT_SIMILARITY_TOLERANCE_HOURS, DEFAULT_THRESHOLD,
    DEFAULT_WINDOW_HOURS,
};
pub use hourly::HourOfDayPredictor;
pub use scheduler::{PrewarmScheduler, SchedulerConfig, SchedulerStats, DEFAULT_CYCLE_INTERVAL};

use crate::history::InvocationHistory;
use crate::models::DemandEstimate;
use chrono::{DateTime, Utc};

/// Trait for demand prediction implementations
pub trait DemandPredictor: Send + Sync {
    /// Estimate how likely `function_id` is to be invoked soon
    fn estimate(
        &self,
        history: &InvocationHistory,
        function_id: &str,
        now: DateTime<Utc>,
    ) -> DemandEstimate;

    /// Whether the function should be kept warm
    fn predict(&self, history: &InvocationHistory, function_id: &str, now: DateTime<Utc>) -> bool {
        self.estimate(history, function_id, now).in_demand
    }

    /// Short identifier used in logs and metrics
    fn name(&self) -> &str;
}
