pub mod artifacts;
pub mod config;
pub mod db;
pub mod error;
pub mod fallback;
pub mod features;
pub mod forecast;
pub mod metrics;
pub mod models;
pub mod predictor;
pub mod store;

pub use artifacts::{CategoricalEncoders, FeatureList, ModelArtifacts};
pub use config::SalescastConfig;
pub use error::{ArtifactError, ForecastError, ModelError};
pub use fallback::{JitterSource, FALLBACK_MODEL_NAME};
pub use forecast::{BatchPrediction, Forecaster, PredictionRequest, PredictionResponse};
pub use predictor::{ModelRegistry, ModelSpec, Predictor};
pub use store::{PgStore, PredictionStore};
