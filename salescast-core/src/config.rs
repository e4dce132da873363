use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SalescastConfig {
    pub service: ServiceConfig,
    pub http: HttpConfig,
    pub artifacts: ArtifactsConfig,
    pub prediction: PredictionConfig,
    pub features: FeatureEngineeringConfig,
    pub metrics: MetricsConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS. Empty disables cross-origin access.
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

/// Locations of the artifacts produced by the training pipeline.
///
/// `model_registry_file` is relative to `models_dir`; the feature list and
/// encoder files are relative to `data_dir`. Absolute entries are used as-is.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub data_dir: String,
    pub models_dir: String,
    pub model_registry_file: String,
    pub feature_list_file: String,
    pub encoders_file: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            models_dir: "results/models".to_string(),
            model_registry_file: "advanced_models.json".to_string(),
            feature_list_file: "processed/feature_list.txt".to_string(),
            encoders_file: "processed/label_encoders.json".to_string(),
        }
    }
}

impl ArtifactsConfig {
    /// Point every artifact at `<root>/...` using the default relative layout.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = Self::default();
        Self {
            data_dir: root.join(&defaults.data_dir).display().to_string(),
            models_dir: root.join(&defaults.models_dir).display().to_string(),
            ..defaults
        }
    }

    pub fn model_registry_path(&self) -> PathBuf {
        resolve(&self.models_dir, &self.model_registry_file)
    }

    pub fn feature_list_path(&self) -> PathBuf {
        resolve(&self.data_dir, &self.feature_list_file)
    }

    pub fn encoders_path(&self) -> PathBuf {
        resolve(&self.data_dir, &self.encoders_file)
    }
}

fn resolve(dir: &str, file: &str) -> PathBuf {
    let file = PathBuf::from(expand(file));
    if file.is_absolute() {
        file
    } else {
        PathBuf::from(expand(dir)).join(file)
    }
}

/// `~` and `$VAR` expansion. An undefined variable leaves the path as written.
fn expand(path: &str) -> String {
    match shellexpand::full(path) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            tracing::warn!(path, "Artifact path not expanded: {}", e);
            path.to_string()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PredictionConfig {
    /// Model names tried in order before falling back to the first name in
    /// the registry.
    pub preferred_models: Vec<String>,
    /// Seed for the fallback heuristic's jitter. Unseeded when absent.
    pub fallback_seed: Option<u64>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            preferred_models: vec!["weighted_ensemble".to_string()],
            fallback_seed: None,
        }
    }
}

/// Feature-engineering constants shared with the training pipeline. The
/// serving path does not apply them.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeatureEngineeringConfig {
    pub lag_periods: Vec<u32>,
    pub rolling_windows: Vec<u32>,
    pub ewm_spans: Vec<u32>,
    pub min_periods_rolling: u32,
    pub outlier_threshold: f64,
    pub handle_negative_sales: bool,
    pub target_column: String,
}

impl Default for FeatureEngineeringConfig {
    fn default() -> Self {
        Self {
            lag_periods: vec![1, 2, 4, 8, 12, 26],
            rolling_windows: vec![4, 8, 12, 26],
            ewm_spans: vec![4, 8, 12, 26],
            min_periods_rolling: 1,
            outlier_threshold: 3.0,
            handle_negative_sales: true,
            target_column: "Weekly_Sales".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub primary_metric: String,
    pub secondary_metrics: Vec<String>,
    pub holiday_weight: f64,
    pub regular_weight: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            primary_metric: "wmae".to_string(),
            secondary_metrics: vec!["mae".to_string(), "rmse".to_string(), "mape".to_string()],
            holiday_weight: 5.0,
            regular_weight: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before giving up.
    pub acquire_timeout_secs: u64,
    pub enabled: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            acquire_timeout_secs: 30,
            enabled: true,
        }
    }
}

impl DatabaseConfig {
    /// The connection string to use, if persistence is switched on.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

impl SalescastConfig {
    /// Load `path` (optional) layered under `SALESCAST__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SALESCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }

    /// A `DATABASE_URL` value takes precedence over the configured URL.
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.database.url = Some(url);
        }
        self
    }
}
