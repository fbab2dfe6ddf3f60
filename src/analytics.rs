//! Aggregate churn analytics over scored customers

use crate::geography::Geography;
use crate::schema::{normalize_gender, CustomerRecord};
use crate::scoring::{FeatureImportanceMap, PredictionResult};
use std::collections::{BTreeMap, HashMap};

/// Age bands as right-closed intervals `(lower, upper]`.
pub const AGE_BANDS: [(&str, f64, f64); 5] = [
    ("<30", 0.0, 30.0),
    ("30-40", 30.0, 40.0),
    ("40-50", 40.0, 50.0),
    ("50-60", 50.0, 60.0),
    ("60+", 60.0, 100.0),
];

/// Balance bands as right-closed intervals; the last band is open-ended.
pub const BALANCE_BANDS: [(&str, f64, f64); 5] = [
    ("0", -1.0, 0.0),
    ("0-10000", 0.0, 10_000.0),
    ("10000-50000", 10_000.0, 50_000.0),
    ("50000-100000", 50_000.0, 100_000.0),
    ("100000+", 100_000.0, f64::INFINITY),
];

/// Stay/leave counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChurnDistribution {
    pub stay: usize,
    pub leave: usize,
}

pub fn churn_distribution(results: &[PredictionResult]) -> ChurnDistribution {
    let leave = results.iter().filter(|r| r.prediction == 1).count();
    ChurnDistribution {
        stay: results.len() - leave,
        leave,
    }
}

/// The `n` predicted churners with the highest probability.
pub fn top_risk(results: &[PredictionResult], n: usize) -> Vec<PredictionResult> {
    let mut churners: Vec<PredictionResult> = results
        .iter()
        .filter(|r| r.prediction == 1)
        .cloned()
        .collect();
    churners.sort_by(|a, b| b.churn_probability.total_cmp(&a.churn_probability));
    churners.truncate(n);
    churners
}

/// Mean churn probability for one segment; `mean` is `None` for an empty band.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub label: String,
    pub count: usize,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAnalytics {
    pub by_geography: Vec<GroupMean>,
    pub by_gender: Vec<GroupMean>,
    pub by_activity: Vec<GroupMean>,
    pub by_age_band: Vec<GroupMean>,
    pub by_balance_band: Vec<GroupMean>,
    pub by_products: Vec<GroupMean>,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn finish(&self, label: impl Into<String>) -> GroupMean {
        GroupMean {
            label: label.into(),
            count: self.count,
            mean: (self.count > 0).then(|| self.sum / self.count as f64),
        }
    }
}

fn band_index(bands: &[(&str, f64, f64)], value: f64) -> Option<usize> {
    bands
        .iter()
        .position(|&(_, lower, upper)| value > lower && value <= upper)
}

fn product_label(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Join predictions to their input records by customer id and average the
/// churn probability per segment.
///
/// Predictions whose customer id has no record only count toward geography.
/// When ids repeat, the first record wins.
pub fn segment_analytics(
    records: &[CustomerRecord],
    results: &[PredictionResult],
) -> SegmentAnalytics {
    let mut by_id: HashMap<i64, &CustomerRecord> = HashMap::with_capacity(records.len());
    for record in records {
        by_id.entry(record.customer_id).or_insert(record);
    }

    let mut geography: BTreeMap<Geography, Accumulator> = BTreeMap::new();
    let mut gender: BTreeMap<i64, Accumulator> = BTreeMap::new();
    let mut activity: BTreeMap<i64, Accumulator> = BTreeMap::new();
    let mut products: Vec<(f64, Accumulator)> = Vec::new();
    let mut age: Vec<Accumulator> = AGE_BANDS.iter().map(|_| Accumulator::default()).collect();
    let mut balance: Vec<Accumulator> =
        BALANCE_BANDS.iter().map(|_| Accumulator::default()).collect();

    for result in results {
        let p = result.churn_probability;
        if let Ok(geo) = result.geography.parse::<Geography>() {
            geography.entry(geo).or_default().add(p);
        }

        let Some(record) = by_id.get(&result.customer_id) else {
            continue;
        };
        if let Some(flag) = normalize_gender(record) {
            gender.entry(flag).or_default().add(p);
        }
        if let Some(flag) = record.is_active_member {
            activity.entry(flag).or_default().add(p);
        }
        if let Some(idx) = record.age.and_then(|a| band_index(&AGE_BANDS, a)) {
            age[idx].add(p);
        }
        if let Some(idx) = record.balance.and_then(|b| band_index(&BALANCE_BANDS, b)) {
            balance[idx].add(p);
        }
        if let Some(n) = record.num_of_products {
            match products.iter_mut().find(|(value, _)| *value == n) {
                Some((_, acc)) => acc.add(p),
                None => {
                    let mut acc = Accumulator::default();
                    acc.add(p);
                    products.push((n, acc));
                }
            }
        }
    }
    products.sort_by(|a, b| a.0.total_cmp(&b.0));

    SegmentAnalytics {
        by_geography: geography
            .iter()
            .map(|(geo, acc)| acc.finish(geo.display_name()))
            .collect(),
        by_gender: gender
            .iter()
            .map(|(flag, acc)| acc.finish(if *flag == 1 { "Мужской" } else { "Женский" }))
            .collect(),
        by_activity: activity
            .iter()
            .map(|(flag, acc)| match flag {
                0 => acc.finish("Не активный"),
                1 => acc.finish("Активный"),
                other => acc.finish(other.to_string()),
            })
            .collect(),
        by_age_band: AGE_BANDS
            .iter()
            .zip(age.iter())
            .map(|((label, _, _), acc)| acc.finish(*label))
            .collect(),
        by_balance_band: BALANCE_BANDS
            .iter()
            .zip(balance.iter())
            .map(|((label, _, _), acc)| acc.finish(*label))
            .collect(),
        by_products: products
            .iter()
            .map(|(value, acc)| acc.finish(product_label(*value)))
            .collect(),
    }
}

/// Importance maps that were fetched, and the countries whose request failed.
#[derive(Debug, Default)]
pub struct ImportanceOutcomes {
    pub maps: Vec<(Geography, FeatureImportanceMap)>,
    pub failures: Vec<(Geography, String)>,
}

/// Separate per-country importance responses into successes and failures,
/// keeping request order in both.
pub fn split_importances(
    outcomes: Vec<(Geography, crate::Result<FeatureImportanceMap>)>,
) -> ImportanceOutcomes {
    let mut split = ImportanceOutcomes::default();
    for (geography, outcome) in outcomes {
        match outcome {
            Ok(map) => split.maps.push((geography, map)),
            Err(err) => split.failures.push((geography, format!("{:#}", err))),
        }
    }
    split
}

/// One feature's weight per country plus the cross-country mean.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceRow {
    pub label: String,
    pub weights: Vec<f64>,
    pub mean: f64,
}

/// Features as rows, countries as columns, sorted by mean weight.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceTable {
    pub countries: Vec<Geography>,
    pub rows: Vec<ImportanceRow>,
}

/// Merge per-country importance maps into one table keyed by feature label.
///
/// A label absent for some country counts as 0 there.
pub fn importance_table(maps: &[(Geography, FeatureImportanceMap)]) -> ImportanceTable {
    let countries: Vec<Geography> = maps.iter().map(|(geo, _)| *geo).collect();

    let mut labels: Vec<String> = Vec::new();
    for (_, map) in maps {
        for entry in map.iter() {
            if !labels.contains(&entry.label) {
                labels.push(entry.label.clone());
            }
        }
    }

    let mut rows: Vec<ImportanceRow> = labels
        .into_iter()
        .map(|label| {
            let weights: Vec<f64> = maps
                .iter()
                .map(|(_, map)| map.get(&label).unwrap_or(0.0))
                .collect();
            let mean = if weights.is_empty() {
                0.0
            } else {
                weights.iter().sum::<f64>() / weights.len() as f64
            };
            ImportanceRow {
                label,
                weights,
                mean,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.mean.total_cmp(&a.mean));

    ImportanceTable { countries, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: i64, geography: &str, prediction: u8, p: f64) -> PredictionResult {
        PredictionResult {
            customer_id: id,
            geography: geography.to_string(),
            prediction,
            churn_probability: p,
        }
    }

    fn record(id: i64, age: f64, balance: f64, products: f64, active: i64, gender: &str) -> CustomerRecord {
        CustomerRecord {
            customer_id: id,
            geography: "France".to_string(),
            age: Some(age),
            balance: Some(balance),
            num_of_products: Some(products),
            is_active_member: Some(active),
            gender: Some(gender.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_distribution_and_top_risk() {
        let results = vec![
            result(1, "France", 1, 0.61),
            result(2, "France", 0, 0.20),
            result(3, "Spain", 1, 0.93),
            result(4, "Germany", 1, 0.75),
        ];
        assert_eq!(churn_distribution(&results), ChurnDistribution { stay: 1, leave: 3 });

        let top: Vec<i64> = top_risk(&results, 2).iter().map(|r| r.customer_id).collect();
        assert_eq!(top, vec![3, 4]);
    }

    #[test]
    fn test_band_edges_are_right_closed() {
        assert_eq!(band_index(&AGE_BANDS, 30.0), Some(0));
        assert_eq!(band_index(&AGE_BANDS, 30.5), Some(1));
        assert_eq!(band_index(&AGE_BANDS, 0.0), None);
        assert_eq!(band_index(&BALANCE_BANDS, 0.0), Some(0));
        assert_eq!(band_index(&BALANCE_BANDS, 0.01), Some(1));
        assert_eq!(band_index(&BALANCE_BANDS, 250_000.0), Some(4));
    }

    #[test]
    fn test_segment_means() {
        let records = vec![
            record(1, 25.0, 0.0, 1.0, 1, "Male"),
            record(2, 45.0, 120_000.0, 2.0, 0, "Female"),
            record(3, 47.0, 60_000.0, 2.0, 0, "Female"),
        ];
        let results = vec![
            result(1, "France", 0, 0.2),
            result(2, "Germany", 1, 0.8),
            result(3, "Germany", 1, 0.6),
        ];
        let analytics = segment_analytics(&records, &results);

        assert_eq!(analytics.by_geography[0].label, "Франция");
        assert_eq!(analytics.by_geography[1].label, "Германия");
        assert!((analytics.by_geography[1].mean.unwrap() - 0.7).abs() < 1e-12);

        assert_eq!(analytics.by_gender[0].label, "Женский");
        assert_eq!(analytics.by_gender[0].count, 2);

        assert_eq!(analytics.by_activity[0].label, "Не активный");
        assert_eq!(analytics.by_age_band.len(), 5);
        assert_eq!(analytics.by_age_band[0].mean, Some(0.2));
        assert_eq!(analytics.by_age_band[1].mean, None);
        assert_eq!(analytics.by_balance_band[4].mean, Some(0.8));

        let products: Vec<&str> = analytics.by_products.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(products, vec!["1", "2"]);
    }

    #[test]
    fn test_split_importances_keeps_failures() {
        let weights = [0.1, 0.5, 0.0, 0.1, 0.1, 0.0, 0.1, 0.1, 0.0];
        let outcomes = vec![
            (Geography::France, Err(anyhow::anyhow!("scoring service returned 500"))),
            (Geography::Germany, Ok(FeatureImportanceMap::from_weights(&weights))),
            (Geography::Spain, Err(anyhow::anyhow!("timed out"))),
        ];
        let split = split_importances(outcomes);

        assert_eq!(split.maps.len(), 1);
        assert_eq!(split.maps[0].0, Geography::Germany);
        let failed: Vec<Geography> = split.failures.iter().map(|(g, _)| *g).collect();
        assert_eq!(failed, vec![Geography::France, Geography::Spain]);
        assert_eq!(split.failures[1].1, "timed out");

        let none = split_importances(vec![(Geography::France, Err(anyhow::anyhow!("down")))]);
        assert!(none.maps.is_empty());
    }

    #[test]
    fn test_importance_table_merges_and_sorts() {
        let france = FeatureImportanceMap::from_weights(&[0.1, 0.5, 0.0, 0.1, 0.1, 0.0, 0.1, 0.1, 0.0]);
        let spain = FeatureImportanceMap::from_weights(&[0.3, 0.3, 0.0, 0.1, 0.1, 0.0, 0.1, 0.1, 0.0]);
        let table = importance_table(&[(Geography::France, france), (Geography::Spain, spain)]);

        assert_eq!(table.countries, vec![Geography::France, Geography::Spain]);
        assert_eq!(table.rows.len(), 9);
        assert_eq!(table.rows[0].label, "Возраст");
        assert!((table.rows[0].mean - 0.4).abs() < 1e-12);
        assert_eq!(table.rows[1].label, "Кредитный рейтинг");
        assert_eq!(table.rows[0].weights, vec![0.5, 0.3]);
    }
}
