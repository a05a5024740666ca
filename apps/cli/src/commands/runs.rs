//! Runs command implementation.

use anyhow::Context;
use colored::Colorize;
use pluvio_core::AppConfig;
use pluvio_tracking::{open_store, TrackingStore};
use serde_json::json;

/// Execute the runs command.
///
/// Shows the latest finished run of the configured experiment with its params, metrics
/// and tags.
pub fn execute(config: &AppConfig, json_output: bool) -> anyhow::Result<()> {
    let experiment = &config.tracking.experiment_name;
    let store = open_store(&config.tracking).context("Failed to open tracking store")?;

    let Some(info) = store.latest_run(experiment).context("Failed to query runs")? else {
        if json_output {
            println!("{}", serde_json::to_string_pretty(&json!({ "experiment": experiment, "run": null }))?);
        } else {
            println!("{}", format!("No finished runs in experiment {experiment}").yellow());
        }
        return Ok(());
    };

    let record = store.get_run(&info.run_id).context("Failed to read run")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "experiment": experiment, "run": record }))?);
        return Ok(());
    }

    println!("{}", "Latest Run".bold().cyan());
    println!();
    println!("  Experiment: {}", experiment.green());
    println!("  Run: {}", record.info.run_id.to_string().green());
    println!("  Status: {}", record.info.status.as_str());
    println!("  Started: {}", record.info.start_time.to_rfc3339().dimmed());

    for (title, entries) in [("Params:", &record.params), ("Tags:", &record.tags)] {
        if entries.is_empty() {
            continue;
        }
        println!();
        println!("{}", title.bold());
        for (key, value) in entries {
            println!("  {}: {value}", key.cyan());
        }
    }

    if !record.metrics.is_empty() {
        println!();
        println!("{}", "Metrics:".bold());
        for (key, value) in &record.metrics {
            println!("  {}: {value}", key.cyan());
        }
    }
    Ok(())
}
