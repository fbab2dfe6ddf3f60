//! Batch scoring: geography routing, threshold decisions and importance lookup

use crate::bundle::ModelRegistry;
use crate::error::ScoringError;
use crate::features::{FEATURE_LABELS, N_FEATURES};
use crate::geography::Geography;
use crate::schema::{validate_and_preprocess, CustomerRecord};
use ndarray::Axis;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Decision and probability for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub customer_id: i64,
    pub geography: String,
    /// 1 when the customer is predicted to leave.
    pub prediction: u8,
    /// Rounded to 4 decimal places.
    pub churn_probability: f64,
}

/// Round half away from zero to 4 decimal places.
pub fn round_probability(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

/// Score a batch, all-or-nothing.
///
/// Records are grouped by geography in order of first appearance and keep
/// their input order within a group. The decision compares the unrounded
/// probability with the bundle threshold (`>=`).
pub fn score_batch(
    registry: &ModelRegistry,
    records: &[CustomerRecord],
) -> Result<Vec<PredictionResult>, ScoringError> {
    if records.is_empty() {
        return Err(ScoringError::NoData);
    }

    let features = validate_and_preprocess(records)?;

    let mut groups: Vec<(Geography, Vec<usize>)> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let geography: Geography = record
            .geography
            .parse()
            .map_err(|_| ScoringError::UnsupportedGeography(record.geography.clone()))?;
        match groups.iter_mut().find(|(g, _)| *g == geography) {
            Some((_, rows)) => rows.push(idx),
            None => groups.push((geography, vec![idx])),
        }
    }

    let mut results = Vec::with_capacity(records.len());
    for (geography, rows) in groups {
        let bundle = registry.bundle(geography);
        let group_features = features.select(Axis(0), &rows);
        let probabilities = bundle
            .classifier()
            .predict_proba(&group_features)
            .map_err(|e| {
                tracing::error!(geography = %geography, error = %e, "classifier failed");
                ScoringError::from(e)
            })?;

        tracing::debug!(
            geography = %geography,
            rows = rows.len(),
            threshold = bundle.threshold(),
            "scored group"
        );

        for (&row, &probability) in rows.iter().zip(probabilities.iter()) {
            results.push(PredictionResult {
                customer_id: records[row].customer_id,
                geography: geography.as_str().to_string(),
                prediction: bundle.decide(probability),
                churn_probability: round_probability(probability),
            });
        }
    }

    Ok(results)
}

/// One labelled importance weight.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWeight {
    pub label: String,
    pub weight: f64,
}

/// Feature label to weight, kept in the canonical feature order.
///
/// Serializes as a JSON object whose keys follow that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureImportanceMap {
    entries: Vec<FeatureWeight>,
}

impl FeatureImportanceMap {
    pub fn from_weights(weights: &[f64; N_FEATURES]) -> Self {
        let entries = FEATURE_LABELS
            .iter()
            .zip(weights.iter())
            .map(|(label, &weight)| FeatureWeight {
                label: label.to_string(),
                weight,
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureWeight> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }
}

impl Serialize for FeatureImportanceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.label, &entry.weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureImportanceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = FeatureImportanceMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of feature labels to weights")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(N_FEATURES));
                while let Some((label, weight)) = access.next_entry::<String, f64>()? {
                    entries.push(FeatureWeight { label, weight });
                }
                Ok(FeatureImportanceMap { entries })
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Importance weights of one geography's model.
///
/// An unknown country fails with [`ScoringError::UnsupportedCountry`]; a
/// known country whose model carries no importances fails with
/// [`ScoringError::ImportanceUnsupported`].
pub fn feature_importances(
    registry: &ModelRegistry,
    country: &str,
) -> Result<FeatureImportanceMap, ScoringError> {
    let geography: Geography = country
        .parse()
        .map_err(|_| ScoringError::UnsupportedCountry(country.to_string()))?;

    let importances = registry
        .bundle(geography)
        .classifier()
        .feature_importances()
        .ok_or_else(|| ScoringError::ImportanceUnsupported(geography.as_str().to_string()))?;

    let mut weights = [0.0; N_FEATURES];
    for (slot, value) in weights.iter_mut().zip(importances.iter()) {
        *slot = *value;
    }
    Ok(FeatureImportanceMap::from_weights(&weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::ModelBundle;
    use crate::error::ModelError;
    use crate::model::{Classifier, DecisionTree, LogisticRegression, RandomForest, TreeNode};
    use ndarray::{Array1, Array2};

    fn logistic_bundle(intercept: f64, threshold: f64) -> ModelBundle {
        let model = LogisticRegression::new(vec![0.0; N_FEATURES], intercept).unwrap();
        ModelBundle::new(Box::new(model), threshold).unwrap()
    }

    fn forest_bundle(threshold: f64) -> ModelBundle {
        let tree = DecisionTree::new(vec![TreeNode::Leaf { value: 0.7 }]).unwrap();
        let importances = Array1::from(vec![0.1, 0.3, 0.05, 0.15, 0.2, 0.01, 0.09, 0.05, 0.05]);
        let model = RandomForest::new(vec![tree], Some(importances)).unwrap();
        ModelBundle::new(Box::new(model), threshold).unwrap()
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::new(
            logistic_bundle(0.0, 0.5),
            forest_bundle(0.8),
            logistic_bundle(2.0, 0.6),
        )
    }

    fn record(id: i64, geography: &str) -> CustomerRecord {
        CustomerRecord {
            customer_id: id,
            geography: geography.to_string(),
            credit_score: Some(619.0),
            age: Some(42.0),
            tenure: Some(2.0),
            balance: Some(0.0),
            num_of_products: Some(1.0),
            has_credit_card: Some(1),
            is_active_member: Some(1),
            estimated_salary: Some(101348.88),
            gender: Some("Female".to_string()),
            gender_male: None,
        }
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        // France model yields exactly 0.5 against a 0.5 threshold
        let results = score_batch(&registry(), &[record(1, "France")]).unwrap();
        assert_eq!(results[0].churn_probability, 0.5);
        assert_eq!(results[0].prediction, 1);
    }

    #[test]
    fn test_routes_by_geography() {
        let results = score_batch(
            &registry(),
            &[record(1, "Spain"), record(2, "Germany"), record(3, "France")],
        )
        .unwrap();

        assert_eq!(results[0].customer_id, 1);
        assert_eq!(results[0].churn_probability, 0.7);
        assert_eq!(results[0].prediction, 0);

        assert_eq!(results[1].customer_id, 2);
        assert_eq!(results[1].churn_probability, 0.8808);
        assert_eq!(results[1].prediction, 1);

        assert_eq!(results[2].geography, "France");
    }

    #[test]
    fn test_groups_in_first_appearance_order() {
        let batch = [
            record(10, "Germany"),
            record(11, "France"),
            record(12, "Germany"),
            record(13, "Spain"),
            record(14, "France"),
        ];
        let ids: Vec<i64> = score_batch(&registry(), &batch)
            .unwrap()
            .iter()
            .map(|r| r.customer_id)
            .collect();
        assert_eq!(ids, vec![10, 12, 11, 14, 13]);
    }

    #[test]
    fn test_unsupported_geography_fails_whole_batch() {
        let err = score_batch(&registry(), &[record(1, "France"), record(2, "Italy")]).unwrap_err();
        assert!(matches!(err, ScoringError::UnsupportedGeography(ref g) if g == "Italy"));
    }

    #[derive(Debug)]
    struct NanClassifier;

    impl Classifier for NanClassifier {
        fn name(&self) -> &str {
            "nan"
        }

        fn predict_proba(&self, _features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
            Err(ModelError::NonFinite { row: 0 })
        }
    }

    #[test]
    fn test_classifier_failure_fails_whole_batch() {
        let registry = ModelRegistry::new(
            logistic_bundle(0.0, 0.5),
            forest_bundle(0.8),
            ModelBundle::new(Box::new(NanClassifier), 0.5).unwrap(),
        );
        // France scores successfully before the Germany group fails
        let err = score_batch(&registry, &[record(1, "France"), record(2, "Germany")]).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::Classification(ModelError::NonFinite { row: 0 })
        ));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_empty_batch_is_no_data() {
        assert!(matches!(score_batch(&registry(), &[]), Err(ScoringError::NoData)));
    }

    #[test]
    fn test_round_probability() {
        assert_eq!(round_probability(0.123_46), 0.1235);
        assert_eq!(round_probability(0.880_797), 0.8808);
        assert_eq!(round_probability(1.0), 1.0);
        assert_eq!(round_probability(0.0), 0.0);
    }

    #[test]
    fn test_importances_for_tree_model() {
        let map = feature_importances(&registry(), "Spain").unwrap();
        assert_eq!(map.labels(), FEATURE_LABELS.to_vec());
        assert_eq!(map.get("Возраст"), Some(0.3));
    }

    #[test]
    fn test_importance_errors_are_distinct() {
        assert!(matches!(
            feature_importances(&registry(), "Italy"),
            Err(ScoringError::UnsupportedCountry(_))
        ));
        assert!(matches!(
            feature_importances(&registry(), "France"),
            Err(ScoringError::ImportanceUnsupported(_))
        ));
    }

    #[test]
    fn test_importance_map_preserves_order_through_json() {
        let map = FeatureImportanceMap::from_weights(&[0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1]);
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.starts_with("{\"Кредитный рейтинг\":0.9"));
        let back: FeatureImportanceMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
