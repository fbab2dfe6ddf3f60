//! Decision trees and the two ensemble families built on them

use super::{check_finite, check_width, sigmoid, Classifier};
use crate::error::ModelError;
use crate::features::N_FEATURES;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// One node of a flattened tree.
///
/// A split sends a row to `left` when `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
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

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Validates the node list. Children must point strictly forward, so
    /// traversal always terminates.
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::InvalidStructure("tree has no nodes".to_string()));
        }
        for (idx, node) in nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= N_FEATURES {
                        return Err(ModelError::InvalidStructure(format!(
                            "node {idx} splits on feature {feature}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::InvalidStructure(format!(
                            "node {idx} has a non-finite threshold"
                        )));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= nodes.len() {
                            return Err(ModelError::InvalidStructure(format!(
                                "node {idx} points to invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(ModelError::InvalidStructure(format!(
                            "leaf {idx} has a non-finite value"
                        )));
                    }
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn leaf_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.nodes.iter().filter_map(|node| match *node {
            TreeNode::Leaf { value } => Some(value),
            TreeNode::Split { .. } => None,
        })
    }

    /// Leaf value reached by a single row.
    pub fn evaluate(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Averages per-tree positive-class probabilities.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    importances: Option<Array1<f64>>,
}

impl RandomForest {
    pub fn new(
        trees: Vec<DecisionTree>,
        importances: Option<Array1<f64>>,
    ) -> Result<Self, ModelError> {
        if trees.is_empty() {
            return Err(ModelError::InvalidStructure("forest has no trees".to_string()));
        }
        // forest leaves are class probabilities
        for (idx, tree) in trees.iter().enumerate() {
            if let Some(value) = tree.leaf_values().find(|v| !(0.0..=1.0).contains(v)) {
                return Err(ModelError::InvalidStructure(format!(
                    "tree {idx} has leaf probability {value} outside [0, 1]"
                )));
            }
        }
        Ok(Self { trees, importances })
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        check_width(features, N_FEATURES)?;
        let n_trees = self.trees.len() as f64;
        let probabilities: Array1<f64> = features
            .outer_iter()
            .map(|row| self.trees.iter().map(|t| t.evaluate(row)).sum::<f64>() / n_trees)
            .collect();
        check_finite(&probabilities)?;
        Ok(probabilities)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.importances.clone()
    }
}

/// Additive trees on the log-odds scale.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    trees: Vec<DecisionTree>,
    importances: Option<Array1<f64>>,
}

impl GradientBoosting {
    pub fn new(
        init: f64,
        learning_rate: f64,
        trees: Vec<DecisionTree>,
        importances: Option<Array1<f64>>,
    ) -> Result<Self, ModelError> {
        if !init.is_finite() || !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(ModelError::InvalidStructure(
                "boosting needs a finite init and a positive learning rate".to_string(),
            ));
        }
        Ok(Self {
            init,
            learning_rate,
            trees,
            importances,
        })
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &str {
        "gradient_boosting"
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        check_width(features, N_FEATURES)?;
        let probabilities: Array1<f64> = features
            .outer_iter()
            .map(|row| {
                let margin: f64 = self.trees.iter().map(|t| t.evaluate(row)).sum();
                sigmoid(self.init + self.learning_rate * margin)
            })
            .collect();
        check_finite(&probabilities)?;
        Ok(probabilities)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.importances.clone()
    }
}
