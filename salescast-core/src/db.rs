use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

use crate::config::DatabaseConfig;
use crate::error::ForecastError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id BIGSERIAL PRIMARY KEY,
        store_id BIGINT NOT NULL,
        dept_id BIGINT NOT NULL,
        prediction_date DATE NOT NULL,
        predicted_sales DOUBLE PRECISION NOT NULL,
        confidence_lower DOUBLE PRECISION NOT NULL,
        confidence_upper DOUBLE PRECISION NOT NULL,
        model_used VARCHAR(100) NOT NULL,
        input_features JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_predictions_store_dept ON predictions (store_id, dept_id)",
    "CREATE INDEX IF NOT EXISTS idx_predictions_date ON predictions (prediction_date)",
    "CREATE INDEX IF NOT EXISTS idx_predictions_created_at ON predictions (created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS user_sessions (
        id BIGSERIAL PRIMARY KEY,
        session_id VARCHAR(255) NOT NULL UNIQUE,
        user_data JSONB NOT NULL DEFAULT '{}'::jsonb,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS system_metrics (
        id BIGSERIAL PRIMARY KEY,
        metric_name VARCHAR(100) NOT NULL,
        metric_value DOUBLE PRECISION,
        metric_data JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_system_metrics_name ON system_metrics (metric_name)",
    r#"
    CREATE TABLE IF NOT EXISTS batch_jobs (
        id BIGSERIAL PRIMARY KEY,
        job_id UUID NOT NULL UNIQUE,
        job_type VARCHAR(50) NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        input_data JSONB NOT NULL DEFAULT '{}'::jsonb,
        results JSONB,
        error_message TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        started_at TIMESTAMPTZ,
        completed_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_batch_jobs_status ON batch_jobs (status)",
];

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, ForecastError> {
    let url = config.active_url().ok_or(ForecastError::PersistenceDisabled)?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(url)
        .await?;
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Idempotent; safe to call on every startup.
pub async fn create_tables(pool: &PgPool) -> Result<(), ForecastError> {
    with_transaction(pool, |tx| {
        Box::pin(async move {
            for statement in SCHEMA {
                sqlx::query(*statement).execute(&mut **tx).await?;
            }
            Ok(())
        })
    })
    .await
}

/// Run `f` inside a transaction.
///
/// `Ok` commits, `Err` rolls back and hands the error back to the caller.
/// The connection returns to the pool on every path, including when the
/// future is dropped midway (sqlx rolls back an uncommitted transaction on
/// drop).
pub async fn with_transaction<T, F>(pool: &PgPool, f: F) -> Result<T, ForecastError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut Transaction<'static, Postgres>) -> BoxFuture<'t, Result<T, ForecastError>>,
{
    let mut tx = pool.begin().await?;
    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(e)
        }
    }
}
