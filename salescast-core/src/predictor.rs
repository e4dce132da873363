//! Predictors and the model registry.
//!
//! The registry artifact is a JSON object mapping a model name to a model
//! spec. Three spec kinds are understood:
//! - **linear** — intercept plus one coefficient per feature
//! - **tree_ensemble** — boosted regression trees summed onto a base score
//! - **weighted_ensemble** — weighted mean of nested member specs
//!
//! Specs are validated when the registry is built, so a request never walks
//! a malformed tree. Evaluation can still fail when the incoming vector does
//! not fit the model (wrong length, out-of-range feature index).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ModelError;

// ============================================================================
// Predictor trait
// ============================================================================

/// Anything that maps one feature vector to one numeric output.
pub trait Predictor: Send + Sync + fmt::Debug {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Short label for logging.
    fn kind(&self) -> &'static str;
}

// ============================================================================
// Serialized specs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
    WeightedEnsemble(WeightedEnsemble),
}

impl ModelSpec {
    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            ModelSpec::Linear(m) => m.validate(),
            ModelSpec::TreeEnsemble(m) => m.validate(),
            ModelSpec::WeightedEnsemble(m) => m.validate(),
        }
    }
}

impl Predictor for ModelSpec {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        let value = match self {
            ModelSpec::Linear(m) => m.predict(features)?,
            ModelSpec::TreeEnsemble(m) => m.predict(features)?,
            ModelSpec::WeightedEnsemble(m) => m.predict(features)?,
        };
        if !value.is_finite() {
            return Err(ModelError::NonFinite(value));
        }
        Ok(value)
    }

    fn kind(&self) -> &'static str {
        match self {
            ModelSpec::Linear(_) => "linear",
            ModelSpec::TreeEnsemble(_) => "tree_ensemble",
            ModelSpec::WeightedEnsemble(_) => "weighted_ensemble",
        }
    }
}

// ============================================================================
// Linear
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.is_empty() {
            return Err(ModelError::Invalid("linear model has no coefficients".into()));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid("linear model has non-finite parameters".into()));
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::FeatureCount {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum();
        Ok(self.intercept + dot)
    }
}

// ============================================================================
// Tree ensemble
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl TreeEnsemble {
    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("tree ensemble has no trees".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Invalid(format!("tree {t} is empty")));
            }
            // Children must point forward, which also rules out cycles.
            for (i, node) in tree.nodes.iter().enumerate() {
                if let TreeNode::Split { left, right, .. } = node {
                    for child in [*left, *right] {
                        if child <= i || child >= tree.nodes.len() {
                            return Err(ModelError::Invalid(format!(
                                "tree {t} node {i} has invalid child {child}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        let mut total = 0.0;
        for (t, tree) in self.trees.iter().enumerate() {
            total += tree.leaf_value(t, features)?;
        }
        Ok(self.base_score + self.learning_rate * total)
    }
}

impl RegressionTree {
    fn leaf_value(&self, tree: usize, features: &[f64]) -> Result<f64, ModelError> {
        let mut idx = 0;
        // A well-formed path visits each node at most once.
        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(idx).ok_or_else(|| {
                ModelError::Invalid(format!("tree {tree} has no node {idx}"))
            })?;
            match node {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = features.get(*feature).ok_or(ModelError::FeatureIndex {
                        tree,
                        node: idx,
                        feature: *feature,
                        len: features.len(),
                    })?;
                    idx = if *x <= *threshold { *left } else { *right };
                }
            }
        }
        Err(ModelError::Invalid(format!("tree {tree} does not terminate in a leaf")))
    }
}

// ============================================================================
// Weighted ensemble
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleMember {
    pub weight: f64,
    pub model: ModelSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightedEnsemble {
    pub members: Vec<EnsembleMember>,
}

impl WeightedEnsemble {
    fn validate(&self) -> Result<(), ModelError> {
        if self.members.is_empty() {
            return Err(ModelError::Invalid("weighted ensemble has no members".into()));
        }
        if self.members.iter().any(|m| m.weight < 0.0 || !m.weight.is_finite()) {
            return Err(ModelError::Invalid("ensemble weights must be finite and non-negative".into()));
        }
        if self.total_weight() <= 0.0 {
            return Err(ModelError::Invalid("ensemble weights sum to zero".into()));
        }
        self.members.iter().try_for_each(|m| m.model.validate())
    }

    fn total_weight(&self) -> f64 {
        self.members.iter().map(|m| m.weight).sum()
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        let mut weighted = 0.0;
        for member in &self.members {
            weighted += member.weight * member.model.predict(features)?;
        }
        Ok(weighted / self.total_weight())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Name-ordered set of loaded models. Built once at startup and shared
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<dyn Predictor>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register every spec. One bad spec rejects the whole
    /// registry, mirroring an unreadable artifact.
    pub fn from_specs(specs: BTreeMap<String, ModelSpec>) -> Result<Self, (String, ModelError)> {
        let mut registry = Self::new();
        for (name, spec) in specs {
            if let Err(e) = spec.validate() {
                return Err((name, e));
            }
            registry.insert(name, Arc::new(spec));
        }
        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, model: Arc<dyn Predictor>) {
        self.models.insert(name.into(), model);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// First preferred name present in the registry, else the
    /// lexicographically smallest name.
    pub fn select(&self, preferred: &[String]) -> Option<(&str, &Arc<dyn Predictor>)> {
        preferred
            .iter()
            .find_map(|name| self.models.get_key_value(name.as_str()))
            .or_else(|| self.models.iter().next())
            .map(|(name, model)| (name.as_str(), model))
    }
}
