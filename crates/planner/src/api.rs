//! HTTP API for policies, forecast notifications, health checks and metrics

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use planner_lib::{
    health::HealthRegistry,
    observability::PlannerMetrics,
    store::{PolicyStore, StoreError},
    Forecast, Policy,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: PlannerMetrics,
    pub policies: Arc<dyn PolicyStore>,
    pub forecast_tx: mpsc::Sender<Forecast>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: PlannerMetrics,
        policies: Arc<dyn PolicyStore>,
        forecast_tx: mpsc::Sender<Forecast>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            policies,
            forecast_tx,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyList {
    pub policies: Vec<Policy>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastAccepted {
    pub id: Uuid,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Errors surfaced to API clients
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = match self {
            ApiError::NotFound(e) => (StatusCode::NOT_FOUND, "not_found", e),
            ApiError::BadRequest(e) => (StatusCode::BAD_REQUEST, "bad_request", e),
            ApiError::Unavailable(e) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", e),
            ApiError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", e),
        };
        let body = ErrorResponse {
            error,
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
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
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Policies filtered by window bounds; both bounds select policies inside the window
async fn list_policies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<PolicyList>, ApiError> {
    let store = &state.policies;
    let policies = match (query.start, query.end) {
        (Some(start), Some(end)) => store.find_all_by_time_window(start, end).await?,
        (Some(start), None) => store.find_by_start_time(start).await?,
        (None, Some(end)) => store.find_by_end_time(end).await?,
        (None, None) => store.find_all().await?,
    };
    let total = policies.len();
    Ok(Json(PolicyList { policies, total }))
}

async fn get_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.policies.find_by_id(id).await?))
}

async fn selected_policy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Policy>, ApiError> {
    let (Some(start), Some(end)) = (query.start, query.end) else {
        return Err(ApiError::BadRequest(
            "both start and end are required".to_string(),
        ));
    };
    Ok(Json(
        state
            .policies
            .find_selected_by_time_window(start, end)
            .await?,
    ))
}

async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.policies.delete_by_id(id).await?;
    info!(policy_id = %id, "Policy deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Queue a forecast update for the planning worker
async fn push_forecast(
    State(state): State<Arc<AppState>>,
    Json(forecast): Json<Forecast>,
) -> Result<(StatusCode, Json<ForecastAccepted>), ApiError> {
    if forecast.time_window_end <= forecast.time_window_start {
        state.metrics.inc_forecast_notification("rejected");
        return Err(ApiError::BadRequest(
            "forecast window must end after it starts".to_string(),
        ));
    }

    let id = forecast.id;
    match state.forecast_tx.try_send(forecast) {
        Ok(()) => {
            state.metrics.inc_forecast_notification("queued");
            info!(forecast_id = %id, "Forecast update queued");
            Ok((
                StatusCode::ACCEPTED,
                Json(ForecastAccepted {
                    id,
                    status: "queued".to_string(),
                }),
            ))
        }
        Err(TrySendError::Full(_)) => {
            state.metrics.inc_forecast_notification("dropped");
            warn!(forecast_id = %id, "Forecast queue full, update dropped");
            Err(ApiError::Unavailable(
                "planner is busy, retry later".to_string(),
            ))
        }
        Err(TrySendError::Closed(_)) => {
            state.metrics.inc_forecast_notification("dropped");
            Err(ApiError::Unavailable(
                "planning worker stopped".to_string(),
            ))
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/policies", get(list_policies))
        .route("/api/v1/policies/selected", get(selected_policy))
        .route(
            "/api/v1/policies/:id",
            get(get_policy).delete(delete_policy),
        )
        .route("/api/v1/forecasts", post(push_forecast))
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
