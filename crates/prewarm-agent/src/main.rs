//! Prewarm Agent - predictive container pre-warming for serverless functions
//!
//! Records invocations, predicts hour-of-day demand and keeps a bounded
//! pool of warm containers ahead of incoming requests.

use anyhow::Result;
use prewarm_lib::{
    health::{components, HealthRegistry},
    PrewarmMetrics, PrewarmScheduler, ResourceManager, SimulatedRuntime,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting prewarm-agent");

    let config_path = std::env::var("PREWARM_CONFIG").ok();
    let config = config::AgentConfig::load(config_path.as_deref())?;
    info!(
        deployment = %config.deployment,
        window_hours = config.window_hours,
        threshold = config.threshold,
        pool_capacity = config.pool_capacity,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::HISTORY).await;
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::WARM_POOL).await;
    health_registry.register(components::SCHEDULER).await;

    let metrics = PrewarmMetrics::new();

    let runtime = Arc::new(SimulatedRuntime::new(config.runtime_config())?);
    let manager = Arc::new(ResourceManager::new(config.manager_config(), runtime)?);
    let scheduler_config = config.scheduler_config();
    let cycle_interval = scheduler_config.cycle_interval;
    let scheduler = Arc::new(PrewarmScheduler::new(manager.clone(), scheduler_config)?);

    let logger = manager.logger().clone();
    logger.log_startup(AGENT_VERSION, manager.predictor_name());

    let (shutdown_tx, _) = broadcast::channel(1);

    let scheduler_handle = tokio::spawn(scheduler.clone().run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(
        manager,
        scheduler,
        health_registry.clone(),
        metrics,
        cycle_interval,
    ));

    health_registry.set_ready(true);

    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false);
    let _ = shutdown_tx.send(());

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Scheduler task panicked");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task panicked"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}
