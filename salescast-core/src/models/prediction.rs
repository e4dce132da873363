use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::forecast::{parse_date, PredictionRequest, PredictionResponse};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub store_id: i64,
    pub dept_id: i64,
    pub prediction_date: NaiveDate,
    pub predicted_sales: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    pub model_used: String,
    pub input_features: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the `predictions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub store_id: i64,
    pub dept_id: i64,
    pub prediction_date: NaiveDate,
    pub predicted_sales: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    pub model_used: String,
    pub input_features: serde_json::Value,
}

impl NewPrediction {
    pub fn from_exchange(
        request: &PredictionRequest,
        response: &PredictionResponse,
    ) -> Result<Self, ForecastError> {
        let prediction_date = parse_date(&response.date)?;

        Ok(Self {
            store_id: response.store_id,
            dept_id: response.dept_id,
            prediction_date,
            predicted_sales: response.predicted_sales,
            confidence_lower: response.confidence_interval[0],
            confidence_upper: response.confidence_interval[1],
            model_used: response.model_used.clone(),
            input_features: serde_json::to_value(request).unwrap_or(serde_json::json!({})),
        })
    }
}
