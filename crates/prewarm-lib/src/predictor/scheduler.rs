//! Prediction scheduling loop
//!
//! Runs a prediction cycle periodically so functions get warmed ahead of
//! the requests that would otherwise hit a cold container.

use crate::error::ConfigError;
use crate::manager::ResourceManager;
use crate::models::{PrewarmAction, PrewarmDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Default interval between prediction cycles
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the prewarm scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between prediction cycles
    pub cycle_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_interval.is_zero() {
            return Err(ConfigError::NonPositiveDuration("cycle_interval"));
        }
        Ok(())
    }
}

/// Statistics about the prewarm scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub total_prewarmed: u64,
    pub total_evicted: u64,
    pub total_failed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Periodically predicts demand and pre-warms functions
pub struct PrewarmScheduler {
    manager: Arc<ResourceManager>,
    config: SchedulerConfig,
    stats: RwLock<SchedulerStats>,
}

impl PrewarmScheduler {
    /// Create a new prewarm scheduler
    pub fn new(manager: Arc<ResourceManager>, config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            manager,
            config,
            stats: RwLock::new(SchedulerStats::default()),
        })
    }

    /// Run the scheduling loop until shutdown
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.cycle_interval.as_secs_f64(),
            deployment = %self.manager.config().deployment,
            "Starting prewarm scheduler"
        );

        let mut ticker = interval(self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once(Utc::now()).await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down prewarm scheduler");
                    break;
                }
            }
        }
    }

    /// Run a single prediction cycle as of `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> Vec<PrewarmDecision> {
        let decisions = self.manager.run_prediction_cycle(now).await;

        let count = |action: PrewarmAction| {
            decisions.iter().filter(|d| d.action == action).count() as u64
        };
        let prewarmed = count(PrewarmAction::Prewarmed);
        let evicted = count(PrewarmAction::Evicted);
        let failed = count(PrewarmAction::Failed);

        {
            let mut stats = self.stats.write().await;
            stats.cycles += 1;
            stats.total_prewarmed += prewarmed;
            stats.total_evicted += evicted;
            stats.total_failed += failed;
            stats.last_cycle_at = Some(now);
        }

        debug!(
            functions = decisions.len(),
            prewarmed = prewarmed,
            evicted = evicted,
            failed = failed,
            "Prewarm cycle finished"
        );

        decisions
    }

    /// Get statistics about the scheduler
    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use crate::runtime::{SimulatedRuntime, SimulatedRuntimeConfig};
    use chrono::TimeZone;

    fn test_manager() -> Arc<ResourceManager> {
        let runtime = Arc::new(
            SimulatedRuntime::new(SimulatedRuntimeConfig {
                init_cost: Duration::from_millis(1),
                invoke_overhead: Duration::ZERO,
            })
            .unwrap(),
        );
        Arc::new(ResourceManager::new(ManagerConfig::default(), runtime).unwrap())
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SchedulerConfig {
            cycle_interval: Duration::ZERO,
        };
        assert!(PrewarmScheduler::new(test_manager(), config).is_err());
    }

    #[tokio::test]
    async fn test_run_once_updates_stats() {
        let manager = test_manager();
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        manager.report_invocation("api", now - chrono::Duration::minutes(30));

        let scheduler = PrewarmScheduler::new(manager.clone(), SchedulerConfig::default()).unwrap();
        let decisions = scheduler.run_once(now).await;

        assert_eq!(decisions.len(), 1);
        assert!(manager.pool().is_warm("api"));

        let stats = scheduler.stats().await;
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.total_prewarmed, 1);
        assert_eq!(stats.last_cycle_at, Some(now));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let scheduler = Arc::new(
            PrewarmScheduler::new(
                test_manager(),
                SchedulerConfig {
                    cycle_interval: Duration::from_millis(10),
                },
            )
            .unwrap(),
        );
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(scheduler.clone().run(rx));
        tokio::time::sleep(Duration::from_millis(35)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(scheduler.stats().await.cycles >= 1);
    }
}
