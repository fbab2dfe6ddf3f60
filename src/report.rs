//! Console report tables and prediction export

use crate::analytics::{ChurnDistribution, GroupMean, ImportanceTable, SegmentAnalytics};
use crate::data::DescriptiveStats;
use crate::scoring::PredictionResult;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

fn print_counts(title: &str, key_header: &str, counts: &[(String, u64)]) {
    println!("\n📌 {}", title);
    println!("  {:<24} | {:>10}", key_header, "Количество");
    println!("  {:-<24}-|-{:->10}", "", "");
    for (key, count) in counts {
        println!("  {:<24} | {:>10}", key, count);
    }
}

/// Print the pre-scoring statistics of the uploaded file
pub fn print_descriptive_statistics(stats: &DescriptiveStats) {
    println!("\n=== 📊 Статистика по данным ===");
    println!("Total customers: {}", stats.total);

    print_counts("Распределение клиентов по странам", "Страна", &stats.by_geography);
    print_counts("Распределение клиентов по полу", "Пол", &stats.by_gender);
    print_counts(
        "Распределение клиентов по количеству продуктов",
        "Кол-во продуктов",
        &stats.by_products,
    );
    print_counts(
        "Клиенты по наличию кредитной карты",
        "Статус карты",
        &stats.by_credit_card,
    );
    print_counts("Клиенты по активности", "Активность", &stats.by_activity);

    println!("\n📌 Numeric columns");
    println!(
        "  {:<14} | {:>12} | {:>12} | {:>12}",
        "Column", "Среднее", "Минимум", "Максимум"
    );
    println!("  {:-<14}-|-{:->12}-|-{:->12}-|-{:->12}", "", "", "", "");
    for summary in &stats.numeric {
        println!(
            "  {:<14} | {:>12} | {:>12} | {:>12}",
            summary.column,
            format_opt(summary.mean, 2),
            format_opt(summary.min, 2),
            format_opt(summary.max, 2)
        );
    }
}

fn format_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

fn print_prediction_rows(results: &[PredictionResult]) {
    println!(
        "  {:>12} | {:<8} | {:>12} | {:>18}",
        "ID клиента", "Страна", "Предсказание", "Вероятность оттока"
    );
    println!("  {:->12}-|-{:-<8}-|-{:->12}-|-{:->18}", "", "", "", "");
    for r in results {
        println!(
            "  {:>12} | {:<8} | {:>12} | {:>18.4}",
            r.customer_id, r.geography, r.prediction, r.churn_probability
        );
    }
}

fn top_heading(top_n: usize) -> String {
    format!("=== Топ-{} клиентов с высоким риском оттока ===", top_n)
}

/// Print every prediction followed by the highest-risk churners.
///
/// The heading names the requested `top_n`, even when fewer customers churn.
pub fn print_predictions(results: &[PredictionResult], top: &[PredictionResult], top_n: usize) {
    println!("\n=== Результаты предсказаний клиентов ===");
    println!("Легенда: 0 = клиент останется, 1 = клиент уйдёт\n");
    print_prediction_rows(results);

    println!("\n{}\n", top_heading(top_n));
    if top.is_empty() {
        println!("  No customers are predicted to churn.");
    } else {
        print_prediction_rows(top);
    }
}

pub fn print_distribution(distribution: &ChurnDistribution) {
    let total = (distribution.stay + distribution.leave).max(1) as f64;
    println!("\n=== Распределение предсказаний по оттоку ===");
    println!(
        "  Останется: {:>6} ({:.1}%)",
        distribution.stay,
        distribution.stay as f64 / total * 100.0
    );
    println!(
        "  Уйдёт:     {:>6} ({:.1}%)",
        distribution.leave,
        distribution.leave as f64 / total * 100.0
    );
}

fn print_group_means(title: &str, key_header: &str, groups: &[GroupMean]) {
    println!("\n#### {}", title);
    println!("  {:<16} | {:>8} | {:>26}", key_header, "Клиенты", "Средняя вероятность ухода");
    println!("  {:-<16}-|-{:->8}-|-{:->26}", "", "", "");
    for group in groups {
        println!(
            "  {:<16} | {:>8} | {:>26}",
            group.label,
            group.count,
            format_opt(group.mean, 4)
        );
    }
}

/// Print mean churn probability per segment
pub fn print_segment_analytics(analytics: &SegmentAnalytics) {
    println!("\n=== Средняя вероятность ухода ===");
    print_group_means("По странам", "Страна", &analytics.by_geography);
    print_group_means("По полу", "Пол", &analytics.by_gender);
    print_group_means("По активности", "Активность", &analytics.by_activity);
    print_group_means("По возрастным группам", "Возрастная группа", &analytics.by_age_band);
    print_group_means("По группам баланса", "Баланс", &analytics.by_balance_band);
    print_group_means("По количеству продуктов", "Кол-во продуктов", &analytics.by_products);
}

/// Print the merged per-country feature importance table
pub fn print_importance_table(table: &ImportanceTable) {
    println!("\n=== Важность признаков по странам ===");
    let mut header = format!("  {:<26}", "Признак");
    for country in &table.countries {
        header.push_str(&format!(" | {:>9}", country.display_name()));
    }
    header.push_str(&format!(" | {:>16}", "Средняя важность"));
    println!("{}", header);

    for row in &table.rows {
        let mut line = format!("  {:<26}", row.label);
        for weight in &row.weights {
            line.push_str(&format!(" | {:>9.4}", weight));
        }
        line.push_str(&format!(" | {:>16.4}", row.mean));
        println!("{}", line);
    }
}

/// Predictions as a DataFrame with the service's column naming
pub fn predictions_frame(results: &[PredictionResult]) -> PolarsResult<DataFrame> {
    let ids: Vec<i64> = results.iter().map(|r| r.customer_id).collect();
    let geographies: Vec<&str> = results.iter().map(|r| r.geography.as_str()).collect();
    let predictions: Vec<i32> = results.iter().map(|r| i32::from(r.prediction)).collect();
    let probabilities: Vec<f64> = results.iter().map(|r| r.churn_probability).collect();

    df!(
        "CustomerId" => ids,
        "Geography" => geographies,
        "prediction" => predictions,
        "churn_probability" => probabilities
    )
}

/// Write predictions to a CSV file
pub fn write_predictions_csv(results: &[PredictionResult], output_path: &Path) -> crate::Result<()> {
    let mut frame = predictions_frame(results)?;
    let mut file = File::create(output_path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)?;
    tracing::info!(rows = results.len(), "predictions saved to {}", output_path.display());
    Ok(())
}
