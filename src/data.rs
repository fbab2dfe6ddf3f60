//! Customer CSV loading, column validation and descriptive statistics using Polars

use crate::error::DashboardError;
use crate::features::{
    CUSTOMER_ID_COLUMN, FEATURE_COLUMNS, GENDER_COLUMN, GENDER_MALE_COLUMN, GEOGRAPHY_COLUMN,
};
use crate::schema::{normalize_gender, CustomerRecord};
use polars::prelude::*;
use serde_json::Value;
use std::path::Path;

/// Model features other than gender, which may arrive in either form.
const NON_GENDER_FEATURES: [&str; 8] = [
    FEATURE_COLUMNS[0],
    FEATURE_COLUMNS[1],
    FEATURE_COLUMNS[2],
    FEATURE_COLUMNS[3],
    FEATURE_COLUMNS[4],
    FEATURE_COLUMNS[5],
    FEATURE_COLUMNS[6],
    FEATURE_COLUMNS[7],
];

/// Loaded customer file: the raw frame plus records ready for scoring
#[derive(Debug)]
pub struct CustomerData {
    pub frame: DataFrame,
    pub records: Vec<CustomerRecord>,
}

/// Mean/min/max of one numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub column: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Descriptive statistics shown before scoring
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    pub total: usize,
    pub by_geography: Vec<(String, u64)>,
    pub by_gender: Vec<(String, u64)>,
    pub by_products: Vec<(String, u64)>,
    pub by_credit_card: Vec<(String, u64)>,
    pub by_activity: Vec<(String, u64)>,
    pub numeric: Vec<NumericSummary>,
}

pub fn check_csv_extension(path: &Path) -> Result<(), DashboardError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        Ok(())
    } else {
        Err(DashboardError::NotCsv(path.to_path_buf()))
    }
}

pub fn read_customer_csv(path: &Path) -> Result<DataFrame, DashboardError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Columns the dashboard needs before it may call the scoring service.
///
/// Gender is satisfied by either `Gender_Male` or `Gender` and is reported
/// as `Gender_Male/Gender` when both are absent.
pub fn missing_columns(df: &DataFrame) -> Vec<String> {
    let mut missing: Vec<String> = [CUSTOMER_ID_COLUMN, GEOGRAPHY_COLUMN]
        .iter()
        .chain(NON_GENDER_FEATURES.iter())
        .filter(|name| !has_column(df, name))
        .map(|name| name.to_string())
        .collect();

    if !has_column(df, GENDER_MALE_COLUMN) && !has_column(df, GENDER_COLUMN) {
        missing.push(format!("{}/{}", GENDER_MALE_COLUMN, GENDER_COLUMN));
    }
    missing
}

/// Load, validate and convert a customer CSV
///
/// # Arguments
/// * `path` - Path to a `.csv` file with one customer per row
///
/// # Returns
/// * `CustomerData` with the frame and one `CustomerRecord` per row
pub fn load_customer_data(path: &Path) -> Result<CustomerData, DashboardError> {
    check_csv_extension(path)?;
    let frame = read_customer_csv(path)?;

    let missing = missing_columns(&frame);
    if !missing.is_empty() {
        return Err(DashboardError::MissingColumns(missing));
    }
    if frame.height() == 0 {
        return Err(DashboardError::InvalidColumn {
            column: CUSTOMER_ID_COLUMN.to_string(),
            reason: "file has no rows".to_string(),
        });
    }

    let records = to_records(&frame)?;
    tracing::debug!(rows = records.len(), "loaded customer file {}", path.display());
    Ok(CustomerData { frame, records })
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, DashboardError> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, DashboardError> {
    let series = df.column(name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, DashboardError> {
    let series = df.column(name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn optional_string_column(
    df: &DataFrame,
    name: &str,
) -> Result<Option<Vec<Option<String>>>, DashboardError> {
    if has_column(df, name) {
        string_column(df, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Convert each row into a scoring record. Extra columns are ignored.
fn to_records(df: &DataFrame) -> Result<Vec<CustomerRecord>, DashboardError> {
    let ids = int_column(df, CUSTOMER_ID_COLUMN)?;
    let geographies = string_column(df, GEOGRAPHY_COLUMN)?;
    let credit_score = float_column(df, "CreditScore")?;
    let age = float_column(df, "Age")?;
    let tenure = float_column(df, "Tenure")?;
    let balance = float_column(df, "Balance")?;
    let products = float_column(df, "NumOfProducts")?;
    let credit_card = int_column(df, "HasCrCard")?;
    let active = int_column(df, "IsActiveMember")?;
    let salary = float_column(df, "EstimatedSalary")?;
    let gender = optional_string_column(df, GENDER_COLUMN)?;
    let gender_male = optional_string_column(df, GENDER_MALE_COLUMN)?;

    (0..df.height())
        .map(|row| {
            let customer_id = ids[row].ok_or_else(|| DashboardError::InvalidColumn {
                column: CUSTOMER_ID_COLUMN.to_string(),
                reason: format!("empty value in row {}", row + 1),
            })?;
            let geography = geographies[row]
                .clone()
                .ok_or_else(|| DashboardError::InvalidColumn {
                    column: GEOGRAPHY_COLUMN.to_string(),
                    reason: format!("empty value in row {}", row + 1),
                })?;
            Ok(CustomerRecord {
                customer_id,
                geography,
                credit_score: credit_score[row],
                age: age[row],
                tenure: tenure[row],
                balance: balance[row],
                num_of_products: products[row],
                has_credit_card: credit_card[row],
                is_active_member: active[row],
                estimated_salary: salary[row],
                gender: gender.as_ref().and_then(|g| g[row].clone()),
                // an existing column always counts as present; empty cells normalize to 0
                gender_male: gender_male
                    .as_ref()
                    .map(|g| g[row].clone().map(Value::String).unwrap_or(Value::Null)),
            })
        })
        .collect()
}

/// Category counts for a column, most frequent first
pub fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, u64)>, DashboardError> {
    let counts = df
        .clone()
        .lazy()
        .group_by([col(column)])
        .agg([len().alias("count")])
        .collect()?;

    let keys = counts.column(column)?.cast(&DataType::String)?;
    let values = counts.column("count")?.cast(&DataType::UInt64)?;
    let mut out: Vec<(String, u64)> = keys
        .str()?
        .into_iter()
        .zip(values.u64()?.into_iter())
        .map(|(key, count)| (key.unwrap_or("null").to_string(), count.unwrap_or(0)))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(out)
}

pub fn summarize(df: &DataFrame, column: &str) -> Result<NumericSummary, DashboardError> {
    let series = df.column(column)?.cast(&DataType::Float64)?;
    let values = series.f64()?;
    Ok(NumericSummary {
        column: column.to_string(),
        mean: values.mean(),
        min: values.min(),
        max: values.max(),
    })
}

fn relabel(counts: Vec<(String, u64)>, labels: &[(&str, &str)]) -> Vec<(String, u64)> {
    counts
        .into_iter()
        .map(|(key, count)| {
            let label = labels
                .iter()
                .find(|(raw, _)| *raw == key)
                .map(|(_, label)| label.to_string())
                .unwrap_or(key);
            (label, count)
        })
        .collect()
}

/// Gender counts from the normalized flag, so either input form works.
fn gender_counts(records: &[CustomerRecord]) -> Vec<(String, u64)> {
    let (mut male, mut female) = (0u64, 0u64);
    for record in records {
        match normalize_gender(record) {
            Some(1) => male += 1,
            Some(_) => female += 1,
            None => {}
        }
    }
    let mut counts = vec![
        ("Мужчины".to_string(), male),
        ("Женщины".to_string(), female),
    ];
    counts.retain(|(_, count)| *count > 0);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn describe(data: &CustomerData) -> Result<DescriptiveStats, DashboardError> {
    let df = &data.frame;
    let numeric = ["Age", "CreditScore", "Tenure", "Balance"]
        .iter()
        .map(|column| summarize(df, column))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DescriptiveStats {
        total: df.height(),
        by_geography: value_counts(df, GEOGRAPHY_COLUMN)?,
        by_gender: gender_counts(&data.records),
        by_products: value_counts(df, "NumOfProducts")?,
        by_credit_card: relabel(
            value_counts(df, "HasCrCard")?,
            &[("1", "1 (Есть карта)"), ("0", "0 (Нет карты)")],
        ),
        by_activity: relabel(
            value_counts(df, "IsActiveMember")?,
            &[("1", "1 (Активный)"), ("0", "0 (Не активный)")],
        ),
        numeric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn create_test_csv(header: &str, rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{}", header).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    const HEADER: &str = "RowNumber,CustomerId,Surname,CreditScore,Geography,Gender,Age,Tenure,Balance,NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary";

    fn sample_rows() -> Vec<&'static str> {
        vec![
            "1,15634602,Hargrave,619,France,Female,42,2,0.0,1,1,1,101348.88",
            "2,15647311,Hill,608,Spain,Female,41,1,83807.86,1,0,1,112542.58",
            "3,15619304,Onio,502,France,Female,42,8,159660.8,3,1,0,113931.57",
            "4,15701354,Boni,699,Germany,Female,39,1,0.0,2,1,0,93826.63",
            "5,15601346,Bartlett,850,France,Male,43,2,125510.82,1,1,1,79084.1",
        ]
    }

    #[test]
    fn test_load_customer_data() {
        let file = create_test_csv(HEADER, &sample_rows());
        let data = load_customer_data(file.path()).unwrap();

        assert_eq!(data.records.len(), 5);
        let last = &data.records[4];
        assert_eq!(last.customer_id, 15601346);
        assert_eq!(last.geography, "France");
        assert_eq!(last.credit_score, Some(850.0));
        assert_eq!(last.has_credit_card, Some(1));
        assert_eq!(normalize_gender(last), Some(1));
        assert_eq!(last.gender_male, None);
    }

    #[test]
    fn test_gender_male_column_is_used() {
        let header = "CustomerId,Geography,CreditScore,Age,Tenure,Balance,NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary,Gender_Male";
        let file = create_test_csv(
            header,
            &[
                "1,France,600,30,1,0,1,1,1,5000,1",
                "2,Spain,600,30,1,0,1,1,1,5000,0",
            ],
        );
        let data = load_customer_data(file.path()).unwrap();
        assert_eq!(normalize_gender(&data.records[0]), Some(1));
        assert_eq!(normalize_gender(&data.records[1]), Some(0));
    }

    #[test]
    fn test_missing_columns_reported() {
        let file = create_test_csv(
            "CustomerId,Geography,CreditScore,Age",
            &["1,France,600,30"],
        );
        match load_customer_data(file.path()) {
            Err(DashboardError::MissingColumns(columns)) => {
                assert_eq!(
                    columns,
                    vec![
                        "Tenure",
                        "Balance",
                        "NumOfProducts",
                        "HasCrCard",
                        "IsActiveMember",
                        "EstimatedSalary",
                        "Gender_Male/Gender",
                    ]
                );
            }
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_csv_extension() {
        assert!(check_csv_extension(Path::new("customers.CSV")).is_ok());
        assert!(matches!(
            check_csv_extension(Path::new("customers.xlsx")),
            Err(DashboardError::NotCsv(_))
        ));
        assert!(check_csv_extension(Path::new("customers")).is_err());
    }

    #[test]
    fn test_describe() {
        let file = create_test_csv(HEADER, &sample_rows());
        let data = load_customer_data(file.path()).unwrap();
        let stats = describe(&data).unwrap();

        assert_eq!(stats.total, 5);
        assert_eq!(stats.by_geography[0], ("France".to_string(), 3));
        assert_eq!(
            stats.by_gender,
            vec![("Женщины".to_string(), 4), ("Мужчины".to_string(), 1)]
        );
        assert_eq!(stats.by_credit_card[0], ("1 (Есть карта)".to_string(), 4));

        let age = &stats.numeric[0];
        assert_eq!(age.column, "Age");
        assert_eq!(age.min, Some(39.0));
        assert_eq!(age.max, Some(43.0));
        assert!((age.mean.unwrap() - 41.4).abs() < 1e-9);
    }
}
