//! Hour-of-day frequency estimator
//!
//! Share of the recent invocations that happened at an hour of day close to
//! the current one. No smoothing and no decay weighting.

use super::{DemandPredictor, PredictionConfig};
use crate::error::ConfigError;
use crate::history::InvocationHistory;
use crate::models::DemandEstimate;
use chrono::{DateTime, Timelike, Utc};

/// Frequency predictor bucketing invocations by hour of day
#[derive(Debug, Clone)]
pub struct HourOfDayPredictor {
    config: PredictionConfig,
}

impl HourOfDayPredictor {
    /// Create a predictor, rejecting an invalid configuration
    pub fn new(config: PredictionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Hour of day of `t` in the configured time zone
    pub fn hour_of_day(&self, t: DateTime<Utc>) -> u32 {
        t.with_timezone(&self.config.offset()).hour()
    }
}

impl Default for HourOfDayPredictor {
    fn default() -> Self {
        Self {
            config: PredictionConfig::default(),
        }
    }
}

impl DemandPredictor for HourOfDayPredictor {
    fn estimate(
        &self,
        history: &InvocationHistory,
        function_id: &str,
        now: DateTime<Utc>,
    ) -> DemandEstimate {
        let recent = history.recent(function_id, now, self.config.window());
        if recent.is_empty() {
            return DemandEstimate::empty();
        }

        let current_hour = self.hour_of_day(now);
        let tolerance = self.config.similarity_tolerance_hours;
        let similar = recent
            .iter()
            .filter(|t| {
                self.config
                    .hour_distance
                    .between(self.hour_of_day(**t), current_hour)
                    <= tolerance
            })
            .count();

        let probability = similar as f64 / recent.len() as f64;

        DemandEstimate {
            recent: recent.len(),
            similar,
            probability,
            in_demand: probability >= self.config.threshold,
        }
    }

    fn name(&self) -> &str {
        "hour_of_day"
    }
}
