use thiserror::Error;

pub const INVALID_DATE_MESSAGE: &str = "Invalid date format. Use YYYY-MM-DD";

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("{}", INVALID_DATE_MESSAGE)]
    InvalidDate(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence layer is not configured")]
    PersistenceDisabled,

    #[error("Other error: {0}")]
    Other(String),
}

impl ForecastError {
    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ForecastError::InvalidDate(_))
    }
}

/// Failures raised while evaluating a loaded model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("tree {tree} node {node} reads feature {feature} but the vector has {len} entries")]
    FeatureIndex {
        tree: usize,
        node: usize,
        feature: usize,
        len: usize,
    },

    #[error("model produced a non-finite value ({0})")]
    NonFinite(f64),

    #[error("invalid model definition: {0}")]
    Invalid(String),
}

/// Problems reading startup artifacts. These never abort startup; the loader
/// logs them and substitutes a default.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model '{name}' rejected: {source}")]
    InvalidModel {
        name: String,
        #[source]
        source: ModelError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_date_message_is_explicit() {
        let err = ForecastError::InvalidDate("2024-13-01".to_string());
        assert!(err.to_string().contains("Invalid date format"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_model_error_is_server_error() {
        let err: ForecastError = ModelError::NonFinite(f64::NAN).into();
        assert!(!err.is_client_error());
        assert!(err.to_string().starts_with("Model error:"));
    }
}
