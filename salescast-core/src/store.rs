//! Prediction history store.
//!
//! `PredictionStore` is the seam the HTTP layer records through. The Postgres
//! implementation wraps each logical write in `db::with_transaction`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::with_transaction;
use crate::error::ForecastError;
use crate::models::{BatchJob, BatchJobStatus, NewPrediction, PredictionRecord, SystemMetric, UserSession};

pub const PREDICTION_LATENCY_METRIC: &str = "prediction_latency_ms";

#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Persist one served prediction together with its latency metric.
    async fn record_prediction(
        &self,
        prediction: NewPrediction,
        latency_ms: f64,
    ) -> Result<i64, ForecastError>;

    /// Newest first.
    async fn recent_predictions(&self, limit: i64) -> Result<Vec<PredictionRecord>, ForecastError>;

    async fn create_batch_job(
        &self,
        job_type: &str,
        input_data: serde_json::Value,
    ) -> Result<Uuid, ForecastError>;

    async fn start_batch_job(&self, job_id: Uuid) -> Result<(), ForecastError>;

    async fn complete_batch_job(
        &self,
        job_id: Uuid,
        results: serde_json::Value,
    ) -> Result<(), ForecastError>;

    async fn fail_batch_job(&self, job_id: Uuid, error_message: &str) -> Result<(), ForecastError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn record_metric(
        &self,
        metric_name: &str,
        metric_value: Option<f64>,
        metric_data: serde_json::Value,
    ) -> Result<i64, ForecastError> {
        let name = metric_name.to_string();
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move { insert_metric(&mut **tx, &name, metric_value, metric_data).await })
        })
        .await
    }

    pub async fn metrics_named(&self, metric_name: &str) -> Result<Vec<SystemMetric>, ForecastError> {
        let rows = sqlx::query_as::<_, SystemMetric>(
            "SELECT * FROM system_metrics WHERE metric_name = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(metric_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_session(
        &self,
        user_data: serde_json::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<UserSession, ForecastError> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (session_id, user_data, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_data)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn find_session(&self, session_id: &str) -> Result<Option<UserSession>, ForecastError> {
        let session =
            sqlx::query_as::<_, UserSession>("SELECT * FROM user_sessions WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    pub async fn batch_job(&self, job_id: Uuid) -> Result<Option<BatchJob>, ForecastError> {
        let job = sqlx::query_as::<_, BatchJob>("SELECT * FROM batch_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn set_batch_status(
        &self,
        job_id: Uuid,
        status: BatchJobStatus,
        results: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<(), ForecastError> {
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs
            SET status = $2,
                results = COALESCE($3, results),
                error_message = COALESCE($4, error_message),
                started_at = CASE WHEN $2 = 'running' THEN now() ELSE started_at END,
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN now() ELSE completed_at END,
                updated_at = now()
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(results)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ForecastError::Other(format!("batch job {job_id} not found")));
        }
        Ok(())
    }
}

async fn insert_metric(
    conn: &mut PgConnection,
    metric_name: &str,
    metric_value: Option<f64>,
    metric_data: serde_json::Value,
) -> Result<i64, ForecastError> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO system_metrics (metric_name, metric_value, metric_data)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(metric_name)
    .bind(metric_value)
    .bind(metric_data)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

#[async_trait]
impl PredictionStore for PgStore {
    async fn record_prediction(
        &self,
        prediction: NewPrediction,
        latency_ms: f64,
    ) -> Result<i64, ForecastError> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let (id,): (i64,) = sqlx::query_as(
                    r#"
                    INSERT INTO predictions (
                        store_id, dept_id, prediction_date, predicted_sales,
                        confidence_lower, confidence_upper, model_used, input_features
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING id
                    "#,
                )
                .bind(prediction.store_id)
                .bind(prediction.dept_id)
                .bind(prediction.prediction_date)
                .bind(prediction.predicted_sales)
                .bind(prediction.confidence_lower)
                .bind(prediction.confidence_upper)
                .bind(&prediction.model_used)
                .bind(&prediction.input_features)
                .fetch_one(&mut **tx)
                .await?;

                insert_metric(
                    &mut **tx,
                    PREDICTION_LATENCY_METRIC,
                    Some(latency_ms),
                    serde_json::json!({ "prediction_id": id, "model_used": prediction.model_used }),
                )
                .await?;

                Ok(id)
            })
        })
        .await
    }

    async fn recent_predictions(&self, limit: i64) -> Result<Vec<PredictionRecord>, ForecastError> {
        let rows = sqlx::query_as::<_, PredictionRecord>(
            "SELECT * FROM predictions ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_batch_job(
        &self,
        job_type: &str,
        input_data: serde_json::Value,
    ) -> Result<Uuid, ForecastError> {
        let job_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO batch_jobs (job_id, job_type, status, input_data)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(job_id)
        .bind(job_type)
        .bind(BatchJobStatus::Pending.as_str())
        .bind(input_data)
        .execute(&self.pool)
        .await?;
        Ok(job_id)
    }

    async fn start_batch_job(&self, job_id: Uuid) -> Result<(), ForecastError> {
        self.set_batch_status(job_id, BatchJobStatus::Running, None, None)
            .await
    }

    async fn complete_batch_job(
        &self,
        job_id: Uuid,
        results: serde_json::Value,
    ) -> Result<(), ForecastError> {
        self.set_batch_status(job_id, BatchJobStatus::Completed, Some(results), None)
            .await
    }

    async fn fail_batch_job(&self, job_id: Uuid, error_message: &str) -> Result<(), ForecastError> {
        self.set_batch_status(
            job_id,
            BatchJobStatus::Failed,
            None,
            Some(error_message.to_string()),
        )
        .await
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// Tests — require a live PostgreSQL; skipped when unreachable
// ============================================================================
