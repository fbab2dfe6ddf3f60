//! Customer record wire type, gender normalization and feature-matrix validation

use crate::error::ScoringError;
use crate::features::{FEATURE_COLUMNS, N_FEATURES};
use ndarray::Array2;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One customer as submitted for scoring.
///
/// Every model feature is optional on the wire so that an absent field is
/// reported as a missing column for the whole batch rather than rejected by
/// the JSON decoder. `gender_male` keeps the raw JSON value: anything that is
/// not a number normalizes to 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    #[serde(alias = "CustomerId")]
    pub customer_id: i64,
    #[serde(alias = "Geography")]
    pub geography: String,
    #[serde(default, alias = "CreditScore", skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<f64>,
    #[serde(default, alias = "Age", skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(default, alias = "Tenure", skip_serializing_if = "Option::is_none")]
    pub tenure: Option<f64>,
    #[serde(default, alias = "Balance", skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(default, alias = "NumOfProducts", skip_serializing_if = "Option::is_none")]
    pub num_of_products: Option<f64>,
    #[serde(default, alias = "HasCrCard", skip_serializing_if = "Option::is_none")]
    pub has_credit_card: Option<i64>,
    #[serde(default, alias = "IsActiveMember", skip_serializing_if = "Option::is_none")]
    pub is_active_member: Option<i64>,
    #[serde(default, alias = "EstimatedSalary", skip_serializing_if = "Option::is_none")]
    pub estimated_salary: Option<f64>,
    #[serde(default, alias = "Gender", skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(
        default,
        alias = "Gender_Male",
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub gender_male: Option<Value>,
}

/// Distinguishes an explicit `null` (present) from an absent field.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl CustomerRecord {
    /// Feature values in canonical order; `None` marks an absent column.
    pub fn feature_values(&self) -> [Option<f64>; N_FEATURES] {
        [
            self.credit_score,
            self.age,
            self.tenure,
            self.balance,
            self.num_of_products,
            self.has_credit_card.map(|v| v as f64),
            self.is_active_member.map(|v| v as f64),
            self.estimated_salary,
            normalize_gender(self).map(|v| v as f64),
        ]
    }
}

/// Coerce a pre-encoded gender flag to an integer.
///
/// Numbers truncate toward zero, numeric strings are parsed, and everything
/// else (null, garbage text, arrays) becomes 0.
pub fn coerce_gender_male(value: &Value) -> i64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v.trunc() as i64,
        _ => 0,
    }
}

/// Resolve `genderMale` for a record.
///
/// An existing `genderMale` field wins, even when unparseable. Otherwise the
/// categorical `gender` yields 1 only for "male" (trimmed, any case). Returns
/// `None` when neither representation is present.
pub fn normalize_gender(record: &CustomerRecord) -> Option<i64> {
    if let Some(value) = &record.gender_male {
        return Some(coerce_gender_male(value));
    }
    record
        .gender
        .as_deref()
        .map(|g| i64::from(g.trim().eq_ignore_ascii_case("male")))
}

/// Build the `(n_records, 9)` feature matrix for a batch.
///
/// Validation is all-or-nothing: a column is missing when any record lacks
/// it, and the error names each missing column once in canonical order.
pub fn validate_and_preprocess(records: &[CustomerRecord]) -> Result<Array2<f64>, ScoringError> {
    let mut matrix = Array2::<f64>::zeros((records.len(), N_FEATURES));
    let mut missing = [false; N_FEATURES];

    for (row, record) in records.iter().enumerate() {
        for (col, value) in record.feature_values().into_iter().enumerate() {
            match value {
                Some(v) => matrix[[row, col]] = v,
                None => missing[col] = true,
            }
        }
    }

    let missing_columns: Vec<String> = FEATURE_COLUMNS
        .iter()
        .zip(missing.iter())
        .filter(|(_, &is_missing)| is_missing)
        .map(|(name, _)| name.to_string())
        .collect();

    if !missing_columns.is_empty() {
        tracing::debug!(missing = ?missing_columns, "batch failed column validation");
        return Err(ScoringError::MissingFeatures(missing_columns));
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_record() -> CustomerRecord {
        CustomerRecord {
            customer_id: 1,
            geography: "France".to_string(),
            credit_score: Some(850.0),
            age: Some(43.0),
            tenure: Some(2.0),
            balance: Some(125510.82),
            num_of_products: Some(1.0),
            has_credit_card: Some(1),
            is_active_member: Some(1),
            estimated_salary: Some(79084.10),
            gender: Some("Male".to_string()),
            gender_male: None,
        }
    }

    #[test]
    fn test_gender_string_variants() {
        let mut record = complete_record();
        for (raw, expected) in [
            ("Male", 1),
            ("  mAlE ", 1),
            ("MALE", 1),
            ("Female", 0),
            ("female ", 0),
            ("unknown", 0),
            ("", 0),
        ] {
            record.gender = Some(raw.to_string());
            assert_eq!(normalize_gender(&record), Some(expected), "gender {:?}", raw);
        }
    }

    #[test]
    fn test_gender_male_takes_precedence() {
        let mut record = complete_record();
        record.gender = Some("Male".to_string());
        record.gender_male = Some(json!(0));
        assert_eq!(normalize_gender(&record), Some(0));
    }

    #[test]
    fn test_non_numeric_gender_male_is_zero() {
        for value in [json!("yes"), json!(null), json!([1]), json!({"a": 1}), json!("")] {
            assert_eq!(coerce_gender_male(&value), 0, "value {}", value);
        }
        assert_eq!(coerce_gender_male(&json!(1)), 1);
        assert_eq!(coerce_gender_male(&json!(" 1 ")), 1);
        assert_eq!(coerce_gender_male(&json!(1.9)), 1);
        assert_eq!(coerce_gender_male(&json!(true)), 1);
    }

    #[test]
    fn test_no_gender_representation() {
        let mut record = complete_record();
        record.gender = None;
        record.gender_male = None;
        assert_eq!(normalize_gender(&record), None);
    }

    #[test]
    fn test_explicit_null_gender_male_is_present() {
        let record: CustomerRecord = serde_json::from_value(json!({
            "customerId": 7,
            "geography": "Spain",
            "genderMale": null
        }))
        .unwrap();
        assert_eq!(record.gender_male, Some(Value::Null));
        assert_eq!(normalize_gender(&record), Some(0));
    }

    #[test]
    fn test_accepts_original_column_names() {
        let record: CustomerRecord = serde_json::from_value(json!({
            "CustomerId": 15634602,
            "Geography": "France",
            "CreditScore": 619,
            "Age": 42,
            "Tenure": 2,
            "Balance": 0.0,
            "NumOfProducts": 1,
            "HasCrCard": 1,
            "IsActiveMember": 1,
            "EstimatedSalary": 101348.88,
            "Gender_Male": 0
        }))
        .unwrap();
        assert_eq!(record.customer_id, 15634602);
        assert_eq!(record.credit_score, Some(619.0));
        assert_eq!(normalize_gender(&record), Some(0));
    }

    #[test]
    fn test_matrix_layout() {
        let matrix = validate_and_preprocess(&[complete_record()]).unwrap();
        assert_eq!(matrix.shape(), &[1, N_FEATURES]);
        assert_eq!(
            matrix.row(0).to_vec(),
            vec![850.0, 43.0, 2.0, 125510.82, 1.0, 1.0, 1.0, 79084.10, 1.0]
        );
    }

    #[test]
    fn test_missing_columns_reported_once_in_order() {
        let mut first = complete_record();
        first.tenure = None;
        let mut second = complete_record();
        second.credit_score = None;
        second.tenure = None;
        second.gender = None;

        let err = validate_and_preprocess(&[first, second]).unwrap_err();
        match err {
            ScoringError::MissingFeatures(columns) => {
                assert_eq!(columns, vec!["CreditScore", "Tenure", "Gender_Male"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
