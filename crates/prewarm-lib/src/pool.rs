//! Warm container pool
//!
//! Tracks which functions hold a pre-initialized container. Each function is
//! either COLD or WARM; `warm` moves it to WARM, `evict` back to COLD. The
//! pool is bounded and evicts the least recently used function when full.

use crate::error::{ConfigError, PrewarmError};
use crate::observability::{PrewarmMetrics, StructuredLogger};
use crate::runtime::ContainerRuntime;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of functions kept warm at once
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Default upper bound on a single container initialization
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_CHANNEL_SIZE: usize = 256;

/// Configuration for the warm pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of warm functions
    pub capacity: usize,
    /// Initialization timeout; waiters are never blocked longer than this
    pub init_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.init_timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration("init_timeout"));
        }
        Ok(())
    }
}

/// Why a function left the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Requested by a caller
    Explicit,
    /// Least recently used function dropped to make room
    Capacity,
    /// Predicted idle by a prediction cycle
    LowDemand,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Explicit => "explicit",
            EvictionReason::Capacity => "capacity",
            EvictionReason::LowDemand => "low_demand",
        }
    }
}

/// State transitions published by the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolEvent {
    Prewarmed {
        function_id: String,
    },
    Evicted {
        function_id: String,
        reason: EvictionReason,
    },
}

/// Result of a successful `warm` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmOutcome {
    /// This call initialized the container, evicting `evicted` to stay
    /// within capacity
    Prewarmed { evicted: Vec<String> },
    /// Someone else already did
    AlreadyWarm,
}

#[derive(Debug, Clone, Copy)]
struct WarmEntry {
    /// Insertion order, fixed while the function stays warm
    inserted: u64,
    last_used: u64,
}

/// Warm membership with recency ticks for LRU eviction
#[derive(Debug, Default)]
struct WarmSet {
    entries: HashMap<String, WarmEntry>,
    tick: u64,
}

impl WarmSet {
    fn contains(&self, function_id: &str) -> bool {
        self.entries.contains_key(function_id)
    }

    fn touch(&mut self, function_id: &str) -> bool {
        self.tick += 1;
        let tick = self.tick;
        match self.entries.get_mut(function_id) {
            Some(entry) => {
                entry.last_used = tick;
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, function_id: &str) {
        self.tick += 1;
        let tick = self.tick;
        self.entries.insert(
            function_id.to_string(),
            WarmEntry {
                inserted: tick,
                last_used: tick,
            },
        );
    }

    /// Least recently used function warmed before `function_id`, if the set
    /// is over `capacity`.
    ///
    /// Only older entries qualify, so concurrent warm-ups never evict each
    /// other's fresh containers; the newest one trims the set.
    fn over_capacity_victim(&self, function_id: &str, capacity: usize) -> Option<String> {
        if self.entries.len() <= capacity {
            return None;
        }
        let inserted = self.entries.get(function_id)?.inserted;
        self.entries
            .iter()
            .filter(|(_, entry)| entry.inserted < inserted)
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| id.clone())
    }

    fn remove(&mut self, function_id: &str) -> bool {
        self.entries.remove(function_id).is_some()
    }
}

type TransitionLock = Arc<tokio::sync::Mutex<()>>;

/// Bounded set of functions with a pre-initialized container
pub struct WarmPool {
    runtime: Arc<dyn ContainerRuntime>,
    config: PoolConfig,
    warm: Mutex<WarmSet>,
    /// Serializes state changes per function across awaits. Entries only
    /// live while a transition is in flight or waited on.
    transitions: DashMap<String, TransitionLock>,
    events: broadcast::Sender<PoolEvent>,
    logger: StructuredLogger,
    metrics: PrewarmMetrics,
}

impl WarmPool {
    /// Create a pool, rejecting an invalid configuration
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Ok(Self {
            runtime,
            config,
            warm: Mutex::new(WarmSet::default()),
            transitions: DashMap::new(),
            events,
            logger: StructuredLogger::default(),
            metrics: PrewarmMetrics::new(),
        })
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Subscribe to pre-warm and eviction events
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    fn warm_set(&self) -> MutexGuard<'_, WarmSet> {
        // The set is consistent after every statement, so a poisoned lock is still usable
        self.warm.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `transition` while holding the function's transition lock
    async fn with_transition<F, T>(&self, function_id: &str, transition: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let lock = self
            .transitions
            .entry(function_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;

        let result = transition.await;

        drop(guard);
        // Nobody else holds or waits on the lock once only the map's copy is left
        self.transitions
            .remove_if(function_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Whether the function currently holds a warm container
    pub fn is_warm(&self, function_id: &str) -> bool {
        self.warm_set().contains(function_id)
    }

    /// Claim the warm container for an execution, refreshing its recency
    pub fn acquire(&self, function_id: &str) -> bool {
        self.warm_set().touch(function_id)
    }

    pub fn len(&self) -> usize {
        self.warm_set().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Warm function ids, sorted
    pub fn warm_functions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.warm_set().entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Initialize a container for the function unless it is already warm.
    ///
    /// Concurrent callers for the same function share one initialization:
    /// the first runs it, the rest wait and observe the result. A failed or
    /// timed out initialization leaves the function cold. When the pool
    /// overflows, least recently used functions are evicted afterwards, each
    /// under its own transition lock.
    pub async fn warm(&self, function_id: &str) -> Result<WarmOutcome, PrewarmError> {
        if self.is_warm(function_id) {
            return Ok(WarmOutcome::AlreadyWarm);
        }

        let prewarmed = self
            .with_transition(function_id, self.initialize(function_id))
            .await?;
        if !prewarmed {
            return Ok(WarmOutcome::AlreadyWarm);
        }

        let mut evicted = Vec::new();
        loop {
            let victim = self
                .warm_set()
                .over_capacity_victim(function_id, self.config.capacity);
            let Some(victim) = victim else { break };
            if self.evict_for(&victim, EvictionReason::Capacity).await {
                evicted.push(victim);
            }
        }

        Ok(WarmOutcome::Prewarmed { evicted })
    }

    /// Body of `warm` under the transition lock. Returns false when a
    /// concurrent caller got there first.
    async fn initialize(&self, function_id: &str) -> Result<bool, PrewarmError> {
        if self.is_warm(function_id) {
            debug!(function_id = %function_id, "Warmed by a concurrent caller");
            return Ok(false);
        }

        let start = Instant::now();
        let initialized =
            tokio::time::timeout(self.config.init_timeout, self.runtime.initialize(function_id))
                .await;

        let error = match initialized {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(PrewarmError::InitializationFailed {
                function_id: function_id.to_string(),
                source,
            }),
            Err(_) => Some(PrewarmError::InitializationTimeout {
                function_id: function_id.to_string(),
                timeout: self.config.init_timeout,
            }),
        };
        if let Some(error) = error {
            self.metrics.inc_initialization_failures();
            self.logger
                .log_initialization_failure(function_id, &error.to_string());
            return Err(error);
        }

        let size = {
            let mut set = self.warm_set();
            set.insert(function_id);
            set.entries.len()
        };

        self.logger.log_prewarm(function_id, start.elapsed());
        self.metrics.inc_prewarms();
        self.metrics.set_warm_pool_size(size);
        let _ = self.events.send(PoolEvent::Prewarmed {
            function_id: function_id.to_string(),
        });
        Ok(true)
    }

    /// Drop the function's warm container. Returns false if it was cold.
    pub async fn evict(&self, function_id: &str) -> bool {
        self.evict_for(function_id, EvictionReason::Explicit).await
    }

    /// Evict with an explicit reason for logs and metrics.
    ///
    /// The function leaves the warm set before its container is released and
    /// the transition lock is held throughout, so a concurrent `warm` waits
    /// for the release and then initializes a fresh container.
    pub async fn evict_for(&self, function_id: &str, reason: EvictionReason) -> bool {
        self.with_transition(function_id, async {
            let removed = self.warm_set().remove(function_id);
            if removed {
                self.release(function_id, reason).await;
            }
            removed
        })
        .await
    }

    async fn release(&self, function_id: &str, reason: EvictionReason) {
        if let Err(e) = self.runtime.release(function_id).await {
            warn!(function_id = %function_id, error = %e, "Failed to release container");
        }

        self.logger.log_eviction(function_id, reason.as_str());
        self.metrics.inc_evictions(reason.as_str());
        self.metrics.set_warm_pool_size(self.len());
        let _ = self.events.send(PoolEvent::Evicted {
            function_id: function_id.to_string(),
            reason,
        });
    }
}
