//! ChurnForge: bank churn scoring service and terminal dashboard
//!
//! `serve` loads the per-country model bundles and exposes the scoring API.
//! `report` validates a customer CSV, scores it through the API and prints
//! the churn analytics.

use anyhow::Result;
use churnforge::cli::{Command, ReportArgs, ServeArgs};
use churnforge::{analytics, data, report, server, Args, ScoringClient};
use clap::Parser;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    match &args.command {
        Command::Serve(serve_args) => run_serve(serve_args).await,
        Command::Report(report_args) => run_report(report_args, args.verbose).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "churnforge=debug,tower_http=debug"
    } else {
        "churnforge=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_serve(args: &ServeArgs) -> Result<()> {
    let addr = args.socket_addr()?;
    tracing::info!("loading model bundles from {}", args.model_dir.display());
    server::serve(addr, &args.model_dir).await
}

/// Run the dashboard pipeline for one customer file
async fn run_report(args: &ReportArgs, verbose: bool) -> Result<()> {
    println!("=== Прогноз оттока клиентов банка ===\n");

    let start_time = Instant::now();

    // Step 1: Load and validate data
    if verbose {
        println!("Step 1: Loading customer file");
        println!("  Input file: {}", args.input.display());
    }

    let data_start = Instant::now();
    let customers = data::load_customer_data(&args.input)?;
    let data_time = data_start.elapsed();

    println!("✓ Data loaded: {} customers", customers.records.len());
    if verbose {
        println!("  Processing time: {:.2}s", data_time.as_secs_f64());
        println!("  Frame shape: {:?}", customers.frame.shape());
    }

    // Step 2: Descriptive statistics
    match data::describe(&customers) {
        Ok(stats) => report::print_descriptive_statistics(&stats),
        Err(err) => println!("\n✗ Не удалось рассчитать статистику: {:#}", err),
    }

    // Step 3: Score through the service
    if verbose {
        println!("\nStep 2: Requesting predictions");
        println!("  Service: {}", args.api_url);
    }

    let client = ScoringClient::new(&args.api_url, args.timeout())?;
    let predict_start = Instant::now();
    match client.predict_batch(&customers.records).await {
        Ok(results) => {
            let predict_time = predict_start.elapsed();
            println!("\n✓ Predictions received: {}", results.len());
            if verbose {
                println!("  Request time: {:.2}s", predict_time.as_secs_f64());
            }

            // Step 4: Prediction tables and export
            let top = analytics::top_risk(&results, args.top);
            report::print_predictions(&results, &top, args.top);
            report::print_distribution(&analytics::churn_distribution(&results));

            match report::write_predictions_csv(&results, &args.output) {
                Ok(()) => println!("\n✓ Предсказания сохранены в {}", args.output.display()),
                Err(err) => println!("\n✗ Не удалось сохранить предсказания: {:#}", err),
            }

            // Step 5: Segment analytics
            let segments = analytics::segment_analytics(&customers.records, &results);
            report::print_segment_analytics(&segments);
        }
        // prediction tables and segment analytics need results; importances do not
        Err(err) => println!("\n✗ Ошибка при получении предсказаний: {:#}", err),
    }

    // Step 6: Feature importances per country
    if verbose {
        println!("\nStep 3: Requesting feature importances");
    }

    let outcomes = analytics::split_importances(client.all_feature_importances().await);
    for (geography, err) in &outcomes.failures {
        tracing::warn!("feature importances unavailable for {}: {}", geography, err);
        println!(
            "⚠ Важность признаков для {} недоступна: {}",
            geography.display_name(),
            err
        );
    }
    if outcomes.maps.is_empty() {
        println!("\n✗ Не удалось получить важность признаков ни для одной страны");
    } else {
        report::print_importance_table(&analytics::importance_table(&outcomes.maps));
    }

    let total_time = start_time.elapsed();
    println!("\n=== Report Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}
