//! Salescast HTTP REST API
//!
//! Axum-based HTTP server exposing sales forecasts. Each endpoint has a thin
//! axum handler that delegates to an inner function returning
//! `(StatusCode, serde_json::Value)`, so the behaviour is testable without
//! going through the router.
//!
//! Endpoints:
//! - GET  /              — liveness with model and feature counts
//! - GET  /health        — detailed health (models, features, encoders, persistence)
//! - POST /predict       — single forecast
//! - POST /batch_predict — ordered list of forecasts
//! - GET  /models        — loaded model names
//! - GET  /predictions   — recently persisted forecasts

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use salescast_core::config::HttpConfig;
use salescast_core::models::NewPrediction;
use salescast_core::{Forecaster, PredictionRequest, PredictionStore};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Shared state for all HTTP handlers. Built once at startup.
#[derive(Clone)]
pub struct HttpState {
    pub forecaster: Arc<Forecaster>,
    pub store: Option<Arc<dyn PredictionStore>>,
    pub cors_origins: Vec<String>,
}

impl HttpState {
    pub fn new(forecaster: Forecaster, store: Option<Arc<dyn PredictionStore>>) -> Self {
        Self {
            forecaster: Arc::new(forecaster),
            store,
            cors_origins: HttpConfig::default().cors_origins,
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }
}

/// CORS for the dashboard: listed origins only, credentials allowed, any
/// requested method and header.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = cors_layer(&state.cors_origins);
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .route("/batch_predict", post(batch_predict_handler))
        .route("/models", get(models_handler))
        .route("/predictions", get(history_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Salescast HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    pub fn body(msg: impl Into<String>) -> serde_json::Value {
        serde_json::json!(Self::new(msg))
    }
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn root_inner(state: &HttpState) -> serde_json::Value {
    let artifacts = state.forecaster.artifacts();
    serde_json::json!({
        "message": "Salescast Sales Forecasting API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "models_loaded": artifacts.registry.len(),
        "features_available": artifacts.feature_list.len(),
    })
}

pub fn health_inner(state: &HttpState) -> serde_json::Value {
    let artifacts = state.forecaster.artifacts();
    serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "models": {
            "total_loaded": artifacts.registry.len(),
            "available_models": artifacts.registry.names(),
            "fallback_mode": state.forecaster.fallback_mode(),
        },
        "features": {
            "total_features": artifacts.feature_list.len(),
            "encoders_loaded": artifacts.encoders.len(),
        },
        "persistence": {
            "enabled": state.store.is_some(),
            "backend": state.store.as_ref().map(|s| s.name().to_string()),
        },
    })
}

pub fn models_inner(state: &HttpState) -> serde_json::Value {
    let artifacts = state.forecaster.artifacts();
    serde_json::json!({
        "available_models": artifacts.registry.names(),
        "total_models": artifacts.registry.len(),
        "feature_count": artifacts.feature_list.len(),
    })
}

/// Forecast one request and, when a store is configured, record it.
pub async fn predict_inner(
    state: &HttpState,
    request: PredictionRequest,
) -> (StatusCode, serde_json::Value) {
    let start = Instant::now();

    let response = match state.forecaster.predict(&request) {
        Ok(r) => r,
        Err(e) if e.is_client_error() => {
            tracing::warn!(date = %request.date, "Rejected prediction request: {}", e);
            return (StatusCode::BAD_REQUEST, ErrorResponse::body(e.to_string()));
        }
        Err(e) => {
            tracing::error!("Prediction error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::body(format!("Prediction failed: {}", e)),
            );
        }
    };

    if let Some(store) = &state.store {
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        let recorded = match NewPrediction::from_exchange(&request, &response) {
            Ok(row) => store.record_prediction(row, latency_ms).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            tracing::error!(backend = store.name(), "Failed to persist prediction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::body(format!("Prediction failed: {}", e)),
            );
        }
    }

    (StatusCode::OK, serde_json::json!(response))
}

/// Mark the job failed so it never lingers as `pending` or `running`.
async fn fail_job(store: &dyn PredictionStore, job_id: Uuid, message: &str) {
    if let Err(store_err) = store.fail_batch_job(job_id, message).await {
        tracing::error!(job_id = %job_id, "Failed to mark batch job failed: {}", store_err);
    }
}

fn batch_failed(e: &dyn std::fmt::Display) -> (StatusCode, serde_json::Value) {
    tracing::error!("Batch prediction error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::body(format!("Batch prediction failed: {}", e)),
    )
}

/// Forecast every request in order. Any failure fails the whole batch.
pub async fn batch_predict_inner(
    state: &HttpState,
    requests: Vec<PredictionRequest>,
) -> (StatusCode, serde_json::Value) {
    let mut job_id = None;
    if let Some(store) = &state.store {
        let created = store
            .create_batch_job("batch_predict", serde_json::json!(requests))
            .await;
        let id = match created {
            Ok(id) => id,
            Err(e) => return batch_failed(&e),
        };
        if let Err(e) = store.start_batch_job(id).await {
            fail_job(store.as_ref(), id, &e.to_string()).await;
            return batch_failed(&e);
        }
        job_id = Some(id);
    }

    let batch = match state.forecaster.predict_batch(&requests) {
        Ok(b) => b,
        Err(e) => {
            if let (Some(store), Some(id)) = (&state.store, job_id) {
                fail_job(store.as_ref(), id, &e.to_string()).await;
            }
            return batch_failed(&e);
        }
    };

    let mut body = serde_json::json!(batch);

    if let (Some(store), Some(id)) = (&state.store, job_id) {
        if let Err(e) = store.complete_batch_job(id, body.clone()).await {
            fail_job(store.as_ref(), id, &e.to_string()).await;
            return batch_failed(&e);
        }
        if let Some(obj) = body.as_object_mut() {
            obj.insert("job_id".to_string(), serde_json::json!(id));
        }
    }

    tracing::info!(batch_size = batch.batch_size, "Batch prediction completed");
    (StatusCode::OK, body)
}

pub async fn history_inner(
    state: &HttpState,
    params: HistoryParams,
) -> (StatusCode, serde_json::Value) {
    let Some(store) = &state.store else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorResponse::body("Persistence layer is not configured"),
        );
    };

    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    match store.recent_predictions(limit).await {
        Ok(rows) => (
            StatusCode::OK,
            serde_json::json!({
                "count": rows.len(),
                "predictions": rows,
            }),
        ),
        Err(e) => {
            tracing::error!("History query failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::body(e.to_string()))
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn root_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner(&state)))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner(&state)))
}

pub async fn models_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(models_inner(&state)))
}

pub async fn predict_handler(
    State(state): State<Arc<HttpState>>,
    Json(request): Json<PredictionRequest>,
) -> impl IntoResponse {
    let (status, body) = predict_inner(&state, request).await;
    (status, Json(body))
}

pub async fn batch_predict_handler(
    State(state): State<Arc<HttpState>>,
    Json(requests): Json<Vec<PredictionRequest>>,
) -> impl IntoResponse {
    let (status, body) = batch_predict_inner(&state, requests).await;
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let (status, body) = history_inner(&state, params).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
