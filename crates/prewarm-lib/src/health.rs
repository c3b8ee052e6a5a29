//! Health check infrastructure for the prewarm agent
//!
//! Component health tracking for liveness and readiness probes. Beyond
//! manual updates, [`HealthRegistry::assess`] derives the status of the warm
//! pool and the scheduler from the manager's own state.

use crate::manager::ResourceManager;
use crate::predictor::SchedulerStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components, healthy when there are none
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const HISTORY: &str = "history";
    pub const PREDICTOR: &str = "predictor";
    pub const WARM_POOL: &str = "warm_pool";
    pub const SCHEDULER: &str = "scheduler";
}

/// Scheduler is considered stalled after this many missed cycles
const STALLED_CYCLES: u32 = 3;

/// Health registry for tracking component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<AtomicBool>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Derive warm pool and scheduler health from live state
    pub async fn assess(
        &self,
        manager: &ResourceManager,
        scheduler: &SchedulerStats,
        cycle_interval: Duration,
        now: DateTime<Utc>,
    ) {
        let pool = manager.pool();
        let pool_health = if pool.len() >= pool.capacity() {
            ComponentHealth::degraded(format!(
                "Warm pool full ({} functions), evicting least recently used",
                pool.capacity()
            ))
        } else {
            ComponentHealth::healthy()
        };
        self.update(components::WARM_POOL, pool_health).await;

        let stall_after = chrono::Duration::from_std(cycle_interval * STALLED_CYCLES)
            .unwrap_or_else(|_| chrono::Duration::weeks(52));
        let scheduler_health = match scheduler.last_cycle_at {
            Some(last) if now - last > stall_after => ComponentHealth::unhealthy(format!(
                "No prediction cycle since {}",
                last.to_rfc3339()
            )),
            Some(_) if scheduler.total_failed > 0 => ComponentHealth::degraded(format!(
                "{} pre-warm attempts failed",
                scheduler.total_failed
            )),
            _ => ComponentHealth::healthy(),
        };
        self.update(components::SCHEDULER, scheduler_health).await;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let reason = if !self.ready.load(Ordering::Acquire) {
            Some("Manager not yet initialized")
        } else if !self.health().await.status.is_operational() {
            Some("Critical component unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use crate::pool::PoolConfig;
    use crate::runtime::{SimulatedRuntime, SimulatedRuntimeConfig};

    fn small_manager(capacity: usize) -> ResourceManager {
        let runtime = Arc::new(
            SimulatedRuntime::new(SimulatedRuntimeConfig {
                init_cost: Duration::from_millis(1),
                invoke_overhead: Duration::ZERO,
            })
            .unwrap(),
        );
        let config = ManagerConfig {
            pool: PoolConfig {
                capacity,
                ..Default::default()
            },
            ..Default::default()
        };
        ResourceManager::new(config, runtime).unwrap()
    }

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::new();
        registry.register(components::WARM_POOL).await;
        registry.register(components::PREDICTOR).await;

        registry
            .set_degraded(components::WARM_POOL, "Initialization timeouts")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry
            .set_unhealthy(components::PREDICTOR, "Predictor crashed")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_readiness_gates() {
        let registry = HealthRegistry::new();
        registry.register(components::WARM_POOL).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Manager not yet initialized"));

        registry.set_ready(true);
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(components::WARM_POOL, "Failed").await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Critical component unhealthy"));
    }

    #[tokio::test]
    async fn test_assess_full_pool_is_degraded() {
        let manager = small_manager(1);
        manager.prewarm("only").await.unwrap();
        let registry = HealthRegistry::new();

        registry
            .assess(&manager, &SchedulerStats::default(), Duration::from_secs(60), Utc::now())
            .await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::WARM_POOL].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            health.components[components::SCHEDULER].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_assess_stalled_scheduler_is_unhealthy() {
        let manager = small_manager(4);
        let registry = HealthRegistry::new();
        let now = Utc::now();
        let stats = SchedulerStats {
            cycles: 5,
            last_cycle_at: Some(now - chrono::Duration::minutes(10)),
            ..Default::default()
        };

        registry
            .assess(&manager, &stats, Duration::from_secs(60), now)
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!registry.readiness().await.ready);
    }
}
