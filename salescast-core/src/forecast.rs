//! Prediction dispatcher.
//!
//! `Forecaster` owns the loaded artifacts and the jitter source. It is built
//! once at startup and shared behind an `Arc`; nothing in it changes while
//! requests are served.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::ModelArtifacts;
use crate::config::PredictionConfig;
use crate::error::ForecastError;
use crate::fallback::{fallback_prediction, EntropyJitter, JitterSource, SeededJitter, FALLBACK_MODEL_NAME};
use crate::features::build_feature_vector;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Strict `YYYY-MM-DD`. chrono skips whitespace ahead of numeric fields, so
/// padded input is rejected up front.
pub fn parse_date(date: &str) -> Result<NaiveDate, ForecastError> {
    if date.trim() != date {
        return Err(ForecastError::InvalidDate(date.to_string()));
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| ForecastError::InvalidDate(date.to_string()))
}

// ============================================================================
// Request / Response
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRequest {
    pub store_id: i64,
    pub dept_id: i64,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub fuel_price: Option<f64>,
    #[serde(default)]
    pub markdowns: Option<Vec<f64>>,
    #[serde(default)]
    pub cpi: Option<f64>,
    #[serde(default)]
    pub unemployment: Option<f64>,
    #[serde(default)]
    pub is_holiday: bool,
}

impl PredictionRequest {
    /// Request with every optional covariate absent.
    pub fn new(store_id: i64, dept_id: i64, date: impl Into<String>) -> Self {
        Self {
            store_id,
            dept_id,
            date: date.into(),
            temperature: None,
            fuel_price: None,
            markdowns: None,
            cpi: None,
            unemployment: None,
            is_holiday: false,
        }
    }

    pub fn parse_date(&self) -> Result<NaiveDate, ForecastError> {
        parse_date(&self.date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub store_id: i64,
    pub dept_id: i64,
    pub date: String,
    pub predicted_sales: f64,
    pub confidence_interval: [f64; 2],
    pub model_used: String,
    pub prediction_timestamp: DateTime<Utc>,
}

impl PredictionResponse {
    fn new(request: &PredictionRequest, predicted_sales: f64, model_used: &str) -> Self {
        Self {
            store_id: request.store_id,
            dept_id: request.dept_id,
            date: request.date.clone(),
            predicted_sales,
            confidence_interval: confidence_interval(predicted_sales),
            model_used: model_used.to_string(),
            prediction_timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub predictions: Vec<PredictionResponse>,
    pub batch_size: usize,
    pub timestamp: DateTime<Utc>,
}

/// Fixed ±10% band around the point forecast.
pub fn confidence_interval(predicted: f64) -> [f64; 2] {
    [predicted * 0.9, predicted * 1.1]
}

// ============================================================================
// Forecaster
// ============================================================================

pub struct Forecaster {
    artifacts: ModelArtifacts,
    preferred_models: Vec<String>,
    jitter: Arc<dyn JitterSource>,
}

impl Forecaster {
    pub fn new(
        artifacts: ModelArtifacts,
        preferred_models: Vec<String>,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        Self {
            artifacts,
            preferred_models,
            jitter,
        }
    }

    /// Seeded jitter when `fallback_seed` is set, entropy otherwise.
    pub fn from_config(artifacts: ModelArtifacts, config: &PredictionConfig) -> Self {
        let jitter: Arc<dyn JitterSource> = match config.fallback_seed {
            Some(seed) => Arc::new(SeededJitter::new(seed)),
            None => Arc::new(EntropyJitter),
        };
        Self::new(artifacts, config.preferred_models.clone(), jitter)
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    pub fn fallback_mode(&self) -> bool {
        self.artifacts.fallback_mode()
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, ForecastError> {
        tracing::info!(
            store_id = request.store_id,
            dept_id = request.dept_id,
            date = %request.date,
            "Prediction request"
        );

        let date = request.parse_date()?;

        let selected = self.artifacts.registry.select(&self.preferred_models);
        let Some((model_name, model)) = selected else {
            tracing::info!("Using fallback prediction algorithm");
            let predicted = fallback_prediction(request, self.jitter.as_ref());
            return Ok(PredictionResponse::new(request, predicted, FALLBACK_MODEL_NAME));
        };

        let features = build_feature_vector(request, date, &self.artifacts.feature_list);
        let predicted = model.predict(&features)?;

        tracing::info!(model = model_name, kind = model.kind(), "Prediction successful: {:.2}", predicted);
        Ok(PredictionResponse::new(request, predicted, model_name))
    }

    /// Predict each request in order. The first failure aborts the batch.
    pub fn predict_batch(
        &self,
        requests: &[PredictionRequest],
    ) -> Result<BatchPrediction, ForecastError> {
        let predictions = requests
            .iter()
            .map(|r| self.predict(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchPrediction {
            batch_size: predictions.len(),
            predictions,
            timestamp: Utc::now(),
        })
    }
}
