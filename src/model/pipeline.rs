use super::{build_classifier, check_width, Classifier, ModelSpec, NamedStep};
use crate::error::ModelError;
use crate::features::N_FEATURES;
use ndarray::{Array1, Array2};

/// Per-column standardization, `(x - mean) / scale`.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != N_FEATURES || scale.len() != N_FEATURES {
            return Err(ModelError::InvalidStructure(format!(
                "scaler needs {} means and scales, got {} and {}",
                N_FEATURES,
                mean.len(),
                scale.len()
            )));
        }
        if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) || mean.iter().any(|m| !m.is_finite())
        {
            return Err(ModelError::InvalidStructure(
                "scaler parameters must be finite with non-zero scale".to_string(),
            ));
        }
        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        check_width(features, N_FEATURES)?;
        Ok((features - &self.mean) / &self.scale)
    }
}

#[derive(Debug)]
pub enum PipelineStep {
    Scaler(StandardScaler),
    Estimator(Box<dyn Classifier>),
}

/// Transforms followed by a final estimator.
///
/// The pipeline has no importances of its own; it reports those of the first
/// named step that has them.
#[derive(Debug)]
pub struct Pipeline {
    steps: Vec<(String, PipelineStep)>,
}

impl Pipeline {
    /// Every step but the last must be a transform; the last must be an estimator.
    pub fn from_steps(steps: Vec<NamedStep>) -> Result<Self, ModelError> {
        let steps: Vec<(String, PipelineStep)> = steps
            .into_iter()
            .map(|NamedStep { name, step }| {
                let step = match step {
                    ModelSpec::StandardScaler { mean, scale } => {
                        PipelineStep::Scaler(StandardScaler::new(mean, scale)?)
                    }
                    estimator => PipelineStep::Estimator(build_classifier(estimator)?),
                };
                Ok((name, step))
            })
            .collect::<Result<_, ModelError>>()?;

        let last = steps.len().checked_sub(1).ok_or_else(|| {
            ModelError::InvalidStructure("pipeline has no steps".to_string())
        })?;
        for (idx, (name, step)) in steps.iter().enumerate() {
            match (step, idx == last) {
                (PipelineStep::Scaler(_), true) => {
                    return Err(ModelError::InvalidStructure(format!(
                        "final pipeline step '{name}' is not an estimator"
                    )))
                }
                (PipelineStep::Estimator(_), false) => {
                    return Err(ModelError::InvalidStructure(format!(
                        "intermediate pipeline step '{name}' must be a transform"
                    )))
                }
                _ => {}
            }
        }

        Ok(Self { steps })
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl Classifier for Pipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let mut current = features.to_owned();
        for (name, step) in &self.steps {
            match step {
                PipelineStep::Scaler(scaler) => current = scaler.transform(&current)?,
                PipelineStep::Estimator(model) => {
                    tracing::trace!(step = %name, "running pipeline estimator");
                    return model.predict_proba(&current);
                }
            }
        }
        Err(ModelError::InvalidStructure(
            "pipeline has no estimator".to_string(),
        ))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.steps.iter().find_map(|(_, step)| match step {
            PipelineStep::Estimator(model) => model.feature_importances(),
            PipelineStep::Scaler(_) => None,
        })
    }
}
