//! HTTP API for invocations, predictions, health checks and Prometheus metrics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use prewarm_lib::{
    health::HealthRegistry, ComponentStatus, DemandEstimate, PrewarmError, PrewarmMetrics,
    PrewarmScheduler, ResourceManager, WarmOutcome,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ResourceManager>,
    pub scheduler: Arc<PrewarmScheduler>,
    pub health_registry: HealthRegistry,
    pub metrics: PrewarmMetrics,
    pub cycle_interval: Duration,
}

impl AppState {
    pub fn new(
        manager: Arc<ResourceManager>,
        scheduler: Arc<PrewarmScheduler>,
        health_registry: HealthRegistry,
        metrics: PrewarmMetrics,
        cycle_interval: Duration,
    ) -> Self {
        Self {
            manager,
            scheduler,
            health_registry,
            metrics,
            cycle_interval,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvocationReport {
    pub function_id: String,
    /// Defaults to the time the report is received
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub function_id: String,
    pub at: DateTime<Utc>,
    pub estimate: DemandEstimate,
    pub warm: bool,
}

#[derive(Debug, Serialize)]
pub struct PrewarmResponse {
    pub function_id: String,
    pub prewarmed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evicted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EvictResponse {
    pub function_id: String,
    pub evicted: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Execution-path failures mapped onto HTTP responses
struct ApiError(PrewarmError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            PrewarmError::InitializationTimeout { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, "initialization_timeout")
            }
            PrewarmError::InitializationFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "initialization_failed")
            }
            PrewarmError::ExecutionFailed { .. } => (StatusCode::BAD_GATEWAY, "execution_failed"),
        };
        warn!(function_id = %self.0.function_id(), error = %self.0, "Request failed");

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code,
            }),
        )
            .into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let scheduler_stats = state.scheduler.stats().await;
    state
        .health_registry
        .assess(&state.manager, &scheduler_stats, state.cycle_interval, Utc::now())
        .await;
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.manager.stats();
    state
        .metrics
        .set_history_size(stats.functions_tracked, stats.history_records);
    state.metrics.set_warm_pool_size(stats.warm_functions.len());

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Record an invocation observed by an upstream router
async fn report_invocation(
    State(state): State<Arc<AppState>>,
    Json(report): Json<InvocationReport>,
) -> impl IntoResponse {
    let timestamp = report.timestamp.unwrap_or_else(Utc::now);
    state
        .manager
        .report_invocation(&report.function_id, timestamp);
    StatusCode::ACCEPTED
}

/// Execute a function, warm if possible
async fn invoke(
    State(state): State<Arc<AppState>>,
    Path(function_id): Path<String>,
    body: Option<Json<InvokeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let input = body.map(|Json(req)| req.input).unwrap_or_default();
    let report = state
        .manager
        .handle_request(&function_id, input, Utc::now())
        .await
        .map_err(ApiError)?;
    Ok(Json(report))
}

async fn prediction(
    State(state): State<Arc<AppState>>,
    Path(function_id): Path<String>,
) -> impl IntoResponse {
    let now = Utc::now();
    let estimate = state.manager.estimate(&function_id, now);
    let warm = state.manager.pool().is_warm(&function_id);

    Json(PredictionResponse {
        function_id,
        at: now,
        estimate,
        warm,
    })
}

async fn prewarm(
    State(state): State<Arc<AppState>>,
    Path(function_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.manager.prewarm(&function_id).await.map_err(ApiError)?;
    let (prewarmed, evicted) = match outcome {
        WarmOutcome::Prewarmed { evicted } => (true, evicted),
        WarmOutcome::AlreadyWarm => (false, Vec::new()),
    };

    Ok(Json(PrewarmResponse {
        function_id,
        prewarmed,
        evicted,
    }))
}

async fn evict(
    State(state): State<Arc<AppState>>,
    Path(function_id): Path<String>,
) -> impl IntoResponse {
    let evicted = state.manager.evict(&function_id).await;
    Json(EvictResponse {
        function_id,
        evicted,
    })
}

async fn pool(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.manager.stats())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/invocations", post(report_invocation))
        .route("/api/v1/pool", get(pool))
        .route("/api/v1/functions/:function_id/invoke", post(invoke))
        .route("/api/v1/functions/:function_id/prediction", get(prediction))
        .route("/api/v1/functions/:function_id/prewarm", post(prewarm))
        .route("/api/v1/functions/:function_id/evict", post(evict))
        .with_state(state)
}

/// Start the API server
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
