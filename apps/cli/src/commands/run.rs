//! Run command implementation.

use anyhow::Context;
use colored::Colorize;
use pluvio_core::{AppConfig, Pipeline, PipelineReport};
use pluvio_tracking::open_store;
use serde_json::json;

/// Execute the run command.
///
/// Runs every pipeline stage once and logs the result as one tracked run.
pub fn execute(config: &AppConfig, json_output: bool) -> anyhow::Result<()> {
    let store = open_store(&config.tracking).context("Failed to open tracking store")?;
    let report = Pipeline::new(config, &*store).run().context("Pipeline run failed")?;

    if json_output {
        print_json(config, &report)
    } else {
        print_human(config, &report);
        Ok(())
    }
}

fn print_json(config: &AppConfig, report: &PipelineReport) -> anyhow::Result<()> {
    let training = &report.training;
    let output = json!({
        "experiment": config.tracking.experiment_name,
        "run_id": training.run_id.to_string(),
        "model_uri": training.model_uri.to_string(),
        "raw_rows": report.raw_rows,
        "clean_rows": report.clean_rows,
        "feature_rows": report.feature_rows,
        "feature_columns": report.feature_columns,
        "train_rows": training.split.train,
        "test_rows": training.split.test,
        "rmse": training.rmse,
        "drift_detected": training.drift_detected,
        "clean_drift": report.clean_drift,
        "model": training.model,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_human(config: &AppConfig, report: &PipelineReport) {
    let training = &report.training;

    println!("{}", "Pipeline Run".bold().cyan());
    println!();
    println!("  Experiment: {}", config.tracking.experiment_name.green());
    println!("  Run: {}", training.run_id.to_string().green());
    println!();

    println!("{}", "Data:".bold());
    println!("  Loaded: {} rows", report.raw_rows);
    println!("  Cleaned: {} rows", report.clean_rows);
    println!("  Features: {} rows x {} columns", report.feature_rows, report.feature_columns);
    println!(
        "  Cleaning drift: {}/{} columns",
        report.clean_drift.drifted_count(),
        report.clean_drift.total()
    );
    println!();

    println!("{}", "Model:".bold());
    println!("  Split: {} train / {} test", training.split.train, training.split.test);
    println!("  RMSE: {}", format!("{:.4}", training.rmse).green());
    let drift = if training.drift_detected { "yes".yellow() } else { "no".green() };
    println!("  Prediction drift: {drift}");
    println!("  Logged: {}", training.model_uri.to_string().dimmed());
}
