use super::{check_finite, check_width, sigmoid, Classifier};
use crate::error::ModelError;
use crate::features::N_FEATURES;
use ndarray::{Array1, Array2};

/// Binary logistic regression on raw (or pipeline-scaled) features.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self, ModelError> {
        if coefficients.len() != N_FEATURES {
            return Err(ModelError::InvalidStructure(format!(
                "logistic regression has {} coefficients, expected {}",
                coefficients.len(),
                N_FEATURES
            )));
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::InvalidStructure(
                "logistic regression parameters must be finite".to_string(),
            ));
        }
        Ok(Self {
            coefficients: Array1::from(coefficients),
            intercept,
        })
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        check_width(features, N_FEATURES)?;
        let probabilities = features
            .dot(&self.coefficients)
            .mapv(|z| sigmoid(z + self.intercept));
        check_finite(&probabilities)?;
        Ok(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_model_is_even_odds() {
        let model = LogisticRegression::new(vec![0.0; N_FEATURES], 0.0).unwrap();
        let probs = model.predict_proba(&Array2::ones((3, N_FEATURES))).unwrap();
        assert_eq!(probs.to_vec(), vec![0.5, 0.5, 0.5]);
        assert!(!model.has_importances());
    }

    #[test]
    fn test_age_coefficient_raises_risk() {
        let mut coefficients = vec![0.0; N_FEATURES];
        coefficients[1] = 0.1;
        let model = LogisticRegression::new(coefficients, -4.0).unwrap();
        let features = array![
            [600.0, 20.0, 1.0, 0.0, 1.0, 1.0, 1.0, 50000.0, 1.0],
            [600.0, 60.0, 1.0, 0.0, 1.0, 1.0, 1.0, 50000.0, 1.0],
        ];
        let probs = model.predict_proba(&features).unwrap();
        assert!(probs[0] < 0.5);
        assert!(probs[1] > 0.5);
    }

    #[test]
    fn test_wrong_width_fails() {
        let model = LogisticRegression::new(vec![0.0; N_FEATURES], 0.0).unwrap();
        let err = model.predict_proba(&Array2::zeros((1, 4))).unwrap_err();
        assert_eq!(err, ModelError::FeatureCount { expected: 9, actual: 4 });
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(LogisticRegression::new(vec![1.0; 3], 0.0).is_err());
        assert!(LogisticRegression::new(vec![0.0; N_FEATURES], f64::NAN).is_err());
    }
}
