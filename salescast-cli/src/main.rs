//! salescast-cli — command-line client for the Salescast forecasting API
//!
//! # Subcommands
//! - `status`                                  — show server health
//! - `models`                                  — list loaded models
//! - `predict --store N --dept N --date D ...` — forecast one store/department/week
//! - `batch <requests.json>`                   — forecast a JSON array of requests
//! - `evaluate <observations.json>`            — score forecasts locally (WMAE, MAE, RMSE, MAPE)

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use salescast_core::metrics::{evaluate, EvaluationReport, Observation};
use salescast_core::{BatchPrediction, PredictionRequest, PredictionResponse, SalescastConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "salescast-cli",
    version,
    about = "Salescast sales forecasting client"
)]
struct Cli {
    /// Salescast HTTP server URL (overrides SALESCAST_HTTP_URL env var)
    #[arg(long, env = "SALESCAST_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show Salescast server status
    Status,

    /// List the models the server has loaded
    Models,

    /// Forecast weekly sales for one store and department
    Predict {
        #[arg(long)]
        store: i64,

        #[arg(long)]
        dept: i64,

        /// Week date, YYYY-MM-DD
        #[arg(long)]
        date: String,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        fuel_price: Option<f64>,

        #[arg(long)]
        cpi: Option<f64>,

        #[arg(long)]
        unemployment: Option<f64>,

        /// Comma-separated markdown amounts
        #[arg(long, value_delimiter = ',')]
        markdowns: Option<Vec<f64>>,

        /// Mark the week as a holiday week
        #[arg(long)]
        holiday: bool,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Forecast every request in a JSON array file
    Batch {
        file: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Score actual vs predicted sales from a JSON array of observations
    Evaluate {
        file: String,

        /// Config file supplying the holiday/regular weights
        #[arg(short, long, default_value = "salescast.toml")]
        config: String,

        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Option<String>,
    pub models: HealthModels,
    pub features: HealthFeatures,
    #[serde(default)]
    pub persistence: Option<HealthPersistence>,
}

#[derive(Debug, Deserialize)]
pub struct HealthModels {
    pub total_loaded: usize,
    pub available_models: Vec<String>,
    pub fallback_mode: bool,
}

#[derive(Debug, Deserialize)]
pub struct HealthFeatures {
    pub total_features: usize,
    pub encoders_loaded: usize,
}

#[derive(Debug, Deserialize)]
pub struct HealthPersistence {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    pub available_models: Vec<String>,
    pub total_models: usize,
    pub feature_count: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Decode a success body, or turn the server's `{"error": ...}` into an error.
fn decode<T: DeserializeOwned>(url: &str, resp: reqwest::blocking::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);
        bail!("server returned {}: {}", status, message);
    }
    resp.json()
        .with_context(|| format!("failed to parse response from {}", url))
}

pub fn fetch_health(server: &str) -> anyhow::Result<HealthResponse> {
    let url = format!("{}/health", server);
    let resp = client()?
        .get(&url)
        .send()
        .with_context(|| format!("cannot reach {}", url))?;
    decode(&url, resp)
}

pub fn fetch_models(server: &str) -> anyhow::Result<ModelsResponse> {
    let url = format!("{}/models", server);
    let resp = client()?
        .get(&url)
        .send()
        .with_context(|| format!("cannot reach {}", url))?;
    decode(&url, resp)
}

pub fn request_prediction(
    server: &str,
    request: &PredictionRequest,
) -> anyhow::Result<PredictionResponse> {
    let url = format!("{}/predict", server);
    let resp = client()?
        .post(&url)
        .json(request)
        .send()
        .with_context(|| format!("connection failed to {}", url))?;
    decode(&url, resp)
}

pub fn request_batch(
    server: &str,
    requests: &[PredictionRequest],
) -> anyhow::Result<BatchPrediction> {
    let url = format!("{}/batch_predict", server);
    let resp = client()?
        .post(&url)
        .json(requests)
        .send()
        .with_context(|| format!("connection failed to {}", url))?;
    decode(&url, resp)
}

// ============================================================================
// Local helpers
// ============================================================================

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn format_prediction(p: &PredictionResponse) -> String {
    format!(
        "Store {:>4}  Dept {:>3}  {}  {:>12.2}  [{:.2} .. {:.2}]  {}",
        p.store_id,
        p.dept_id,
        p.date,
        p.predicted_sales,
        p.confidence_interval[0],
        p.confidence_interval[1],
        p.model_used
    )
}

pub fn format_report(report: &EvaluationReport) -> String {
    let mape = report
        .mape
        .map(|m| format!("{:.2}%", m))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Observations: {}\nWMAE:         {:.4}\nMAE:          {:.4}\nRMSE:         {:.4}\nMAPE:         {}",
        report.count, report.wmae, report.mae, report.rmse, mape
    )
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn do_status(server: &str) -> anyhow::Result<()> {
    let health = fetch_health(server)?;
    println!("Salescast server: {}", health.status);
    println!("Timestamp:        {}", health.timestamp.as_deref().unwrap_or("?"));
    println!(
        "Models:           {} loaded{}",
        health.models.total_loaded,
        if health.models.fallback_mode { " (fallback mode)" } else { "" }
    );
    if !health.models.available_models.is_empty() {
        println!("                  {}", health.models.available_models.join(", "));
    }
    println!("Features:         {}", health.features.total_features);
    println!("Encoders:         {}", health.features.encoders_loaded);
    let persistence = health.persistence.map(|p| p.enabled).unwrap_or(false);
    println!("Persistence:      {}", if persistence { "enabled" } else { "disabled" });
    Ok(())
}

fn do_models(server: &str) -> anyhow::Result<()> {
    let models = fetch_models(server)?;
    if models.available_models.is_empty() {
        println!("No models loaded ({} features)", models.feature_count);
        return Ok(());
    }
    for name in &models.available_models {
        println!("{}", name);
    }
    println!("\n{} models, {} features", models.total_models, models.feature_count);
    Ok(())
}

fn do_predict(server: &str, request: PredictionRequest, json: bool) -> anyhow::Result<()> {
    let prediction = request_prediction(server, &request)?;
    if json {
        return print_json(&prediction);
    }
    println!("{}", format_prediction(&prediction));
    Ok(())
}

fn do_batch(server: &str, file: &str, json: bool) -> anyhow::Result<()> {
    let requests: Vec<PredictionRequest> = read_json_file(Path::new(file))?;
    let batch = request_batch(server, &requests)?;
    if json {
        return print_json(&batch);
    }
    for p in &batch.predictions {
        println!("{}", format_prediction(p));
    }
    println!("\n{} predictions", batch.batch_size);
    Ok(())
}

fn do_evaluate(file: &str, config_path: &str, json: bool) -> anyhow::Result<()> {
    let config = SalescastConfig::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;
    let observations: Vec<Observation> = read_json_file(Path::new(file))?;
    let report = evaluate(&observations, &config.metrics)?;
    if json {
        return print_json(&report);
    }
    println!("{}", format_report(&report));
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::Models => do_models(&server),
        Commands::Predict {
            store,
            dept,
            date,
            temperature,
            fuel_price,
            cpi,
            unemployment,
            markdowns,
            holiday,
            json,
        } => {
            let request = PredictionRequest {
                temperature,
                fuel_price,
                cpi,
                unemployment,
                markdowns,
                is_holiday: holiday,
                ..PredictionRequest::new(store, dept, date)
            };
            do_predict(&server, request, json)
        }
        Commands::Batch { file, json } => do_batch(&server, &file, json),
        Commands::Evaluate { file, config, json } => do_evaluate(&file, &config, json),
    };

    if let Err(e) = result {
        eprintln!("salescast-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
