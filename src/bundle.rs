//! Per-geography model bundles and the immutable registry that holds them

use crate::error::{BundleError, ModelError};
use crate::geography::Geography;
use crate::model::{build_classifier, Classifier, ModelSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk layout of `model_<country>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleFile {
    /// Calibrated decision cutoff in `[0, 1]`.
    pub threshold: f64,
    pub model: ModelSpec,
}

/// A trained classifier paired with its decision threshold.
#[derive(Debug)]
pub struct ModelBundle {
    classifier: Box<dyn Classifier>,
    threshold: f64,
}

impl ModelBundle {
    pub fn new(classifier: Box<dyn Classifier>, threshold: f64) -> Result<Self, ModelError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ModelError::InvalidThreshold(threshold));
        }
        Ok(Self {
            classifier,
            threshold,
        })
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Boundary-inclusive churn decision for one probability.
    pub fn decide(&self, probability: f64) -> u8 {
        u8::from(probability >= self.threshold)
    }

    pub fn from_file(file: BundleFile, path: &Path) -> Result<Self, BundleError> {
        let invalid = |e: ModelError| BundleError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let classifier = build_classifier(file.model).map_err(invalid)?;
        Self::new(classifier, file.threshold).map_err(invalid)
    }

    /// Read and validate one bundle file.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let contents = fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: BundleFile =
            serde_json::from_str(&contents).map_err(|source| BundleError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(file, path)
    }
}

/// The three geography bundles, fixed for the life of the process.
#[derive(Debug)]
pub struct ModelRegistry {
    france: ModelBundle,
    spain: ModelBundle,
    germany: ModelBundle,
}

impl ModelRegistry {
    pub fn new(france: ModelBundle, spain: ModelBundle, germany: ModelBundle) -> Self {
        Self {
            france,
            spain,
            germany,
        }
    }

    /// Path of the bundle for `geography` inside `model_dir`.
    pub fn bundle_path(model_dir: &Path, geography: Geography) -> PathBuf {
        model_dir.join(format!("{}.json", geography.bundle_stem()))
    }

    /// Load every bundle from `model_dir`. Any failure aborts the whole load.
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self, BundleError> {
        let model_dir = model_dir.as_ref();
        let load_one = |geography: Geography| -> Result<ModelBundle, BundleError> {
            let path = Self::bundle_path(model_dir, geography);
            let bundle = ModelBundle::load(&path)?;
            tracing::info!(
                geography = %geography,
                model = bundle.classifier().name(),
                threshold = bundle.threshold(),
                importances = bundle.classifier().has_importances(),
                "loaded model bundle from {}",
                path.display()
            );
            Ok(bundle)
        };

        Ok(Self {
            france: load_one(Geography::France)?,
            spain: load_one(Geography::Spain)?,
            germany: load_one(Geography::Germany)?,
        })
    }

    pub fn bundle(&self, geography: Geography) -> &ModelBundle {
        match geography {
            Geography::France => &self.france,
            Geography::Spain => &self.spain,
            Geography::Germany => &self.germany,
        }
    }
}
