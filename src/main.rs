//! ChurnForge: Telco customer churn prediction CLI
//!
//! This is the main entrypoint that loads the trained pipeline once, then
//! scores either a single customer (with a report) or a whole CSV batch.

use anyhow::{Context, Result};
use churnforge::data::{load_customers, write_predictions};
use churnforge::viz::{self, BatchSummary};
use churnforge::{build_record, report, Args, CustomerRecord, PredictionResult, Predictor};
use clap::Parser;
use serde::Serialize;
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    if args.verbose {
        println!("ChurnForge - Telco Customer Churn Prediction");
        println!("============================================\n");
        println!("Loading model from: {}", args.model.display());
    }

    // No customer input is read unless the model loads
    let predictor = Predictor::from_artifact(&args.model).context("Failed to load model")?;

    if let Some(input) = &args.batch {
        run_batch_mode(&args, &predictor, input)
    } else {
        run_single_mode(&args, &predictor)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();
}

#[derive(Serialize)]
struct PredictionOutput<'a> {
    record: &'a CustomerRecord,
    prediction: &'a PredictionResult,
    report: Option<String>,
}

/// Score one customer captured from flags or a form file
fn run_single_mode(args: &Args, predictor: &Predictor) -> Result<()> {
    let fields = args.customer_fields()?;
    let record = build_record(&fields);

    if !args.json {
        print_input_summary(&record);
    }

    let outcome = predict_and_report(args, predictor, &record);
    // stdout carries only the JSON document in --json mode
    if args.json {
        eprintln!("Prediction attempt finished.");
    } else {
        println!("\nPrediction attempt finished.");
    }
    outcome
}

fn predict_and_report(args: &Args, predictor: &Predictor, record: &CustomerRecord) -> Result<()> {
    let start_time = Instant::now();
    let result = predictor.predict(record).context("Prediction failed")?;
    let elapsed = start_time.elapsed();

    let report_path = if args.no_report {
        None
    } else {
        Some(report::render(record, &result, &args.output_dir, args.format)?)
    };

    if args.json {
        let output = PredictionOutput {
            record,
            prediction: &result,
            report: report_path.as_ref().map(|p| p.display().to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if result.is_churn() {
        println!("\n✗ This customer is likely to churn.");
    } else {
        println!("\n✓ This customer is not likely to churn.");
    }
    if let Some(percent) = result.probability_percent() {
        println!("  Probability of churn: {}", percent);
    }
    if args.verbose {
        println!("  Inference time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    }
    if let Some(path) = report_path {
        println!("\nReport saved to: {}", path.display());
    }

    Ok(())
}

fn print_input_summary(record: &CustomerRecord) {
    println!("=== Input Summary ===");
    let width = record
        .display_fields()
        .map(|(column, _)| column.len())
        .max()
        .unwrap_or(0);
    for (column, value) in record.display_fields() {
        println!("  {:width$} | {}", column, value, width = width);
    }
}

/// Score every customer in a CSV file
fn run_batch_mode(args: &Args, predictor: &Predictor, input: &str) -> Result<()> {
    println!("=== Batch Scoring ===\n");

    let start_time = Instant::now();

    // Step 1: Load customers
    if args.verbose {
        println!("Step 1: Loading customers");
        println!("  Input file: {}", input);
    }
    let customers = load_customers(input)?;
    println!("✓ Data loaded: {} customers", customers.len());

    // Step 2: Predict
    if args.verbose {
        println!("\nStep 2: Scoring customers");
    }
    let predict_start = Instant::now();
    let records: Vec<CustomerRecord> = customers.iter().map(build_record).collect();
    let results = records
        .iter()
        .map(|record| {
            predictor
                .predict(record)
                .with_context(|| format!("Prediction failed for {}", record.describe()))
        })
        .collect::<Result<Vec<_>>>()?;
    println!("✓ Predictions complete");
    if args.verbose {
        println!(
            "  Scoring time: {:.2}s",
            predict_start.elapsed().as_secs_f64()
        );
    }

    // Step 3: Write predictions
    write_predictions(&args.predictions, &records, &results)?;
    println!("✓ Predictions written to: {}", args.predictions);

    // Step 4: Statistics and chart
    let summary = BatchSummary::from_results(&results);
    viz::print_batch_statistics(&summary);
    if args.verbose {
        println!("\nStep 3: Generating chart");
        println!("  Output file: {}", args.chart);
    }
    viz::create_batch_chart(&summary, &args.chart)?;

    let total_time = start_time.elapsed();
    println!("\n=== Batch Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}
