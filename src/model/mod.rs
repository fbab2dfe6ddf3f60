//! Classifier families and their persisted parameter format
//!
//! Each family implements [`Classifier`]. Persisted models are described by
//! [`ModelSpec`] and turned into trait objects once, at load time, by
//! [`build_classifier`]. Whether a model can report feature importances is
//! decided by its family rather than probed at request time.

mod linear;
mod pipeline;
mod tree;

pub use linear::LogisticRegression;
pub use pipeline::{Pipeline, PipelineStep, StandardScaler};
pub use tree::{DecisionTree, GradientBoosting, RandomForest, TreeNode};

use crate::error::ModelError;
use crate::features::N_FEATURES;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trained binary classifier.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Short family name used in logs.
    fn name(&self) -> &str;

    /// Width of the feature matrix the model expects.
    fn n_features(&self) -> usize {
        N_FEATURES
    }

    /// Probability of the positive (churn) class for each row.
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Per-feature importance weights, when the family carries them.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    fn has_importances(&self) -> bool {
        self.feature_importances().is_some()
    }
}

/// A tree as persisted: a flat node list with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub nodes: Vec<TreeNode>,
}

/// A named stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStep {
    pub name: String,
    #[serde(flatten)]
    pub step: ModelSpec,
}

/// Persisted description of a model, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    RandomForest {
        trees: Vec<TreeSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_importances: Option<Vec<f64>>,
    },
    GradientBoosting {
        init: f64,
        learning_rate: f64,
        trees: Vec<TreeSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_importances: Option<Vec<f64>>,
    },
    /// Only valid as a non-final pipeline step.
    StandardScaler { mean: Vec<f64>, scale: Vec<f64> },
    Pipeline { steps: Vec<NamedStep> },
}

/// Turn a persisted description into a ready-to-use classifier.
pub fn build_classifier(spec: ModelSpec) -> Result<Box<dyn Classifier>, ModelError> {
    match spec {
        ModelSpec::LogisticRegression {
            coefficients,
            intercept,
        } => Ok(Box::new(LogisticRegression::new(coefficients, intercept)?)),
        ModelSpec::RandomForest {
            trees,
            feature_importances,
        } => {
            let trees = build_trees(trees)?;
            let importances = feature_importances.map(validate_importances).transpose()?;
            Ok(Box::new(RandomForest::new(trees, importances)?))
        }
        ModelSpec::GradientBoosting {
            init,
            learning_rate,
            trees,
            feature_importances,
        } => {
            let trees = build_trees(trees)?;
            let importances = feature_importances.map(validate_importances).transpose()?;
            Ok(Box::new(GradientBoosting::new(
                init,
                learning_rate,
                trees,
                importances,
            )?))
        }
        ModelSpec::StandardScaler { .. } => Err(ModelError::InvalidStructure(
            "standard_scaler is a transform, not a classifier".to_string(),
        )),
        ModelSpec::Pipeline { steps } => Ok(Box::new(Pipeline::from_steps(steps)?)),
    }
}

fn build_trees(specs: Vec<TreeSpec>) -> Result<Vec<DecisionTree>, ModelError> {
    specs
        .into_iter()
        .map(|spec| DecisionTree::new(spec.nodes))
        .collect()
}

fn validate_importances(values: Vec<f64>) -> Result<Array1<f64>, ModelError> {
    if values.len() != N_FEATURES {
        return Err(ModelError::InvalidStructure(format!(
            "feature_importances has {} entries, expected {}",
            values.len(),
            N_FEATURES
        )));
    }
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ModelError::InvalidStructure(
            "feature_importances must be finite and non-negative".to_string(),
        ));
    }
    Ok(Array1::from(values))
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

pub(crate) fn check_width(features: &Array2<f64>, expected: usize) -> Result<(), ModelError> {
    if features.ncols() != expected {
        return Err(ModelError::FeatureCount {
            expected,
            actual: features.ncols(),
        });
    }
    Ok(())
}

pub(crate) fn check_finite(probabilities: &Array1<f64>) -> Result<(), ModelError> {
    match probabilities.iter().position(|p| !p.is_finite()) {
        Some(row) => Err(ModelError::NonFinite { row }),
        None => Ok(()),
    }
}
