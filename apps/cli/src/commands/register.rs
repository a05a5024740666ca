//! Register command implementation.

use anyhow::Context;
use colored::Colorize;
use pluvio_core::AppConfig;
use pluvio_tracking::{open_store, register_latest_run};

/// Execute the register command.
///
/// Promotes the model of the experiment's most recent finished run to a new version of
/// the configured registered model.
pub fn execute(config: &AppConfig, json_output: bool) -> anyhow::Result<()> {
    let tracking = &config.tracking;
    let store = open_store(tracking).context("Failed to open tracking store")?;
    let version = register_latest_run(
        &*store,
        &tracking.experiment_name,
        &tracking.artifact_path,
        &tracking.model_name,
    )
    .with_context(|| format!("Failed to register latest run of {}", tracking.experiment_name))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&version)?);
        return Ok(());
    }

    println!("{}", "Model Registered".bold().cyan());
    println!();
    println!("  Name: {}", version.name.green());
    println!("  Version: {}", version.version.to_string().green());
    println!("  Run: {}", version.run_id.to_string().dimmed());
    println!("  Source: {}", version.source.dimmed());
    Ok(())
}
