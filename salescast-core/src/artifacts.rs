//! Startup artifact loader.
//!
//! Reads the model registry, the feature-name list and the categorical
//! encoders produced by the training pipeline. Each read fails independently
//! and degrades to a default; nothing here aborts startup.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::ArtifactsConfig;
use crate::error::ArtifactError;
use crate::predictor::{ModelRegistry, ModelSpec};

/// Columns assumed when no feature list has been exported.
pub const DEFAULT_FEATURES: [&str; 7] = [
    "Store",
    "Dept",
    "Temperature",
    "Fuel_Price",
    "CPI",
    "Unemployment",
    "IsHoliday",
];

/// Ordered feature column names. Defines vector length and positions.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureList(Vec<String>);

impl FeatureList {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// One column per non-blank line, surrounding whitespace trimmed.
    pub fn parse(text: &str) -> Self {
        Self(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl Default for FeatureList {
    fn default() -> Self {
        Self(DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect())
    }
}

/// Column name -> (category label -> integer code).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoricalEncoders(HashMap<String, HashMap<String, i64>>);

impl CategoricalEncoders {
    pub fn new(map: HashMap<String, HashMap<String, i64>>) -> Self {
        Self(map)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything loaded from disk at startup. Immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct ModelArtifacts {
    pub registry: ModelRegistry,
    pub feature_list: FeatureList,
    pub encoders: CategoricalEncoders,
}

impl ModelArtifacts {
    pub fn new(
        registry: ModelRegistry,
        feature_list: FeatureList,
        encoders: CategoricalEncoders,
    ) -> Self {
        Self {
            registry,
            feature_list,
            encoders,
        }
    }

    /// Load all three artifacts, substituting defaults for anything missing
    /// or unreadable.
    pub fn load(config: &ArtifactsConfig) -> Self {
        tracing::info!("Loading models and artifacts...");

        let registry_path = config.model_registry_path();
        let registry = match load_registry(&registry_path) {
            Ok(r) => {
                tracing::info!(path = %registry_path.display(), "Loaded {} models", r.len());
                r
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load model registry; using fallback prediction algorithm");
                ModelRegistry::new()
            }
        };

        let features_path = config.feature_list_path();
        let feature_list = match load_feature_list(&features_path) {
            Ok(f) => {
                tracing::info!(path = %features_path.display(), "Loaded {} features", f.len());
                f
            }
            Err(e) => {
                tracing::warn!(error = %e, "Using fallback feature list");
                FeatureList::default()
            }
        };

        let encoders_path = config.encoders_path();
        let encoders = match load_encoders(&encoders_path) {
            Ok(e) => {
                tracing::info!(path = %encoders_path.display(), "Loaded {} label encoders", e.len());
                e
            }
            Err(e) => {
                tracing::warn!(error = %e, "Using empty label encoders");
                CategoricalEncoders::default()
            }
        };

        tracing::info!("Model loading completed");
        Self::new(registry, feature_list, encoders)
    }

    /// No models available; requests are served by the heuristic.
    pub fn fallback_mode(&self) -> bool {
        self.registry.is_empty()
    }
}

pub fn load_registry(path: &Path) -> Result<ModelRegistry, ArtifactError> {
    let specs: BTreeMap<String, ModelSpec> = read_json(path)?;
    ModelRegistry::from_specs(specs)
        .map_err(|(name, source)| ArtifactError::InvalidModel { name, source })
}

pub fn load_feature_list(path: &Path) -> Result<FeatureList, ArtifactError> {
    let text = read_text(path)?;
    Ok(FeatureList::parse(&text))
}

pub fn load_encoders(path: &Path) -> Result<CategoricalEncoders, ArtifactError> {
    read_json(path).map(CategoricalEncoders::new)
}

fn read_text(path: &Path) -> Result<String, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.display().to_string()));
    }
    std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| ArtifactError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn layout(dir: &TempDir) -> ArtifactsConfig {
        let config = ArtifactsConfig::rooted_at(dir.path());
        fs::create_dir_all(config.model_registry_path().parent().unwrap()).unwrap();
        fs::create_dir_all(config.feature_list_path().parent().unwrap()).unwrap();
        config
    }

    #[test]
    fn test_empty_directory_degrades_to_defaults() {
        let dir = TempDir::new().unwrap();
        let artifacts = ModelArtifacts::load(&layout(&dir));

        assert!(artifacts.fallback_mode());
        assert_eq!(artifacts.registry.len(), 0);
        assert_eq!(artifacts.feature_list, FeatureList::default());
        assert_eq!(artifacts.feature_list.len(), 7);
        assert!(artifacts.encoders.is_empty());
    }

    #[test]
    fn test_loads_all_three_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = layout(&dir);

        fs::write(
            config.model_registry_path(),
            r#"{
                "ridge": { "kind": "linear", "intercept": 10.0, "coefficients": [1, 1, 1] },
                "weighted_ensemble": { "kind": "weighted_ensemble", "members": [
                    { "weight": 1.0, "model": { "kind": "linear", "intercept": 0.0, "coefficients": [1, 0, 0] } }
                ]}
            }"#,
        )
        .unwrap();
        fs::write(config.feature_list_path(), "Store\n  Dept \n\nYear\n").unwrap();
        fs::write(config.encoders_path(), r#"{ "Type": { "A": 0, "B": 1, "C": 2 } }"#).unwrap();

        let artifacts = ModelArtifacts::load(&config);
        assert!(!artifacts.fallback_mode());
        assert_eq!(artifacts.registry.names(), vec!["ridge", "weighted_ensemble"]);
        assert_eq!(artifacts.feature_list.names(), &["Store", "Dept", "Year"]);
        assert_eq!(artifacts.encoders.len(), 1);
    }

    #[test]
    fn test_corrupt_registry_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = layout(&dir);
        fs::write(config.model_registry_path(), b"\x80\x04\x95 not json").unwrap();
        fs::write(config.encoders_path(), "{ broken").unwrap();
        fs::write(config.feature_list_path(), "Store\nDept\n").unwrap();

        let artifacts = ModelArtifacts::load(&config);
        assert!(artifacts.fallback_mode());
        assert!(artifacts.encoders.is_empty());
        assert_eq!(artifacts.feature_list.len(), 2);
    }

    #[test]
    fn test_invalid_model_rejects_registry() {
        let dir = TempDir::new().unwrap();
        let config = layout(&dir);
        fs::write(
            config.model_registry_path(),
            r#"{ "gbm": { "kind": "tree_ensemble", "trees": [] } }"#,
        )
        .unwrap();

        let err = load_registry(&config.model_registry_path()).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidModel { ref name, .. } if name == "gbm"));
        assert!(ModelArtifacts::load(&config).fallback_mode());
    }

    #[test]
    fn test_missing_file_reports_not_found() {
        let err = load_feature_list(Path::new("/nonexistent/feature_list.txt")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }
}
