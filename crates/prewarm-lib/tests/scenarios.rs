//! End-to-end prewarm scenarios

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use prewarm_lib::{
    ContainerRuntime, DemandPredictor, ExecutionMode, FunctionExecutor, HourOfDayPredictor,
    InvocationHistory, ManagerConfig, PoolConfig, PoolEvent, PredictionConfig, PrewarmError,
    ResourceManager, SimulatedRuntime, SimulatedRuntimeConfig,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, day, hour, 0, 0).unwrap()
}

fn fast_runtime() -> Arc<SimulatedRuntime> {
    Arc::new(
        SimulatedRuntime::new(SimulatedRuntimeConfig {
            init_cost: std::time::Duration::from_millis(20),
            invoke_overhead: std::time::Duration::from_millis(2),
        })
        .unwrap(),
    )
}

#[test]
fn test_recorded_invocation_visible_only_inside_window() {
    let history = InvocationHistory::new();
    let t = at(10, 12);
    let window = Duration::hours(24);
    history.record("fn", t);

    for offset in [0, 1, 12, 24] {
        let now = t + Duration::hours(offset);
        assert_eq!(history.recent("fn", now, window), vec![t], "offset {offset}h");
    }
    assert!(history
        .recent("fn", t + window + Duration::milliseconds(1), window)
        .is_empty());
}

#[test]
fn test_hour_nine_on_five_days_predicts_demand() {
    let history = InvocationHistory::new();
    for day in 1..=5 {
        history.record("daily-report", at(day, 9));
    }
    let predictor = HourOfDayPredictor::new(PredictionConfig::new(24, 1, 0.6).unwrap()).unwrap();

    let estimate = predictor.estimate(&history, "daily-report", at(5, 9));
    assert_eq!(estimate.probability, 1.0);
    assert!(predictor.predict(&history, "daily-report", at(5, 9)));
}

#[test]
fn test_single_night_invocation_does_not_predict_afternoon_demand() {
    let history = InvocationHistory::new();
    history.record("etl", at(7, 3));
    let predictor = HourOfDayPredictor::default();

    let estimate = predictor.estimate(&history, "etl", at(7, 15));
    assert_eq!(estimate.recent, 1);
    assert_eq!(estimate.similar, 0);
    assert_eq!(estimate.probability, 0.0);
    assert!(!estimate.in_demand);
}

#[tokio::test]
async fn test_empty_history_cold_then_warm() {
    let runtime = fast_runtime();
    let manager = ResourceManager::new(ManagerConfig::default(), runtime.clone()).unwrap();
    let mut events = manager.pool().subscribe();
    let now = at(3, 10);

    assert!(!manager.predict("thumbnail", now));
    assert!(!manager.pool().is_warm("thumbnail"));

    let first = manager
        .handle_request("thumbnail", json!({ "image": "a.png" }), now)
        .await
        .unwrap();
    assert_eq!(first.mode, ExecutionMode::Cold);

    let second = manager
        .handle_request("thumbnail", json!({ "image": "a.png" }), now)
        .await
        .unwrap();
    assert_eq!(second.mode, ExecutionMode::Warm);

    let prewarmed: Vec<PoolEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        prewarmed,
        vec![PoolEvent::Prewarmed {
            function_id: "thumbnail".to_string()
        }]
    );
}

#[tokio::test]
async fn test_cold_execution_not_faster_than_warm() {
    let executor = FunctionExecutor::new(fast_runtime());
    let input = json!({ "data": "sample" });

    let cold = executor
        .execute("resize", input.clone(), ExecutionMode::Cold)
        .await
        .unwrap();
    let warm = executor
        .execute("resize", input, ExecutionMode::Warm)
        .await
        .unwrap();

    assert!(cold.elapsed >= warm.elapsed);
}

/// Runtime that counts initializations and takes a while to do them
struct SlowCountingRuntime {
    initializations: AtomicUsize,
}

#[async_trait]
impl ContainerRuntime for SlowCountingRuntime {
    async fn initialize(&self, _function_id: &str) -> Result<()> {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.initializations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn invoke(&self, _function_id: &str, input: Value) -> Result<Value> {
        Ok(input)
    }

    async fn release(&self, _function_id: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_initialize_once() {
    let runtime = Arc::new(SlowCountingRuntime {
        initializations: AtomicUsize::new(0),
    });
    let manager = Arc::new(ResourceManager::new(ManagerConfig::default(), runtime.clone()).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.prewarm("burst").await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(runtime.initializations.load(Ordering::SeqCst), 1);
    assert!(manager.pool().is_warm("burst"));
}

struct BrokenRuntime;

#[async_trait]
impl ContainerRuntime for BrokenRuntime {
    async fn initialize(&self, _function_id: &str) -> Result<()> {
        anyhow::bail!("sandbox refused to start")
    }

    async fn invoke(&self, _function_id: &str, input: Value) -> Result<Value> {
        Ok(input)
    }

    async fn release(&self, _function_id: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_broken_initialization_never_reports_warm() {
    let manager = ResourceManager::new(ManagerConfig::default(), Arc::new(BrokenRuntime)).unwrap();

    let mode = manager.on_invocation_request("fn", at(4, 8)).await;
    assert_eq!(mode, ExecutionMode::Cold);
    assert!(!manager.pool().is_warm("fn"));
    // The invocation is still recorded
    assert_eq!(manager.history().len("fn"), 1);

    let err = manager
        .handle_request("fn", Value::Null, at(4, 8))
        .await
        .unwrap_err();
    assert!(matches!(err, PrewarmError::InitializationFailed { .. }));
}

#[tokio::test]
async fn test_scheduled_prediction_warms_before_first_request() {
    let config = ManagerConfig {
        pool: PoolConfig {
            capacity: 8,
            ..Default::default()
        },
        ..Default::default()
    };
    let manager = ResourceManager::new(config, fast_runtime()).unwrap();
    manager.report_invocation("checkout", at(6, 17));
    manager.report_invocation("checkout", at(6, 18));

    manager.run_prediction_cycle(at(6, 18)).await;

    let mode = manager.on_invocation_request("checkout", at(6, 18)).await;
    assert_eq!(mode, ExecutionMode::Warm);
}
