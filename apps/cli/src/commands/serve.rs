//! Serve command implementation.

use anyhow::Context;
use colored::Colorize;
use pluvio_core::AppConfig;
use pluvio_serve::Predictor;
use pluvio_tracking::open_store;

/// Execute the serve command.
///
/// The model is loaded before the runtime starts, so a missing registration
/// fails fast instead of producing a service that answers with errors.
pub fn execute(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(&config.tracking).context("Failed to open tracking store")?;
    let predictor = Predictor::load(&*store, &config.tracking.model_name)
        .with_context(|| format!("Failed to load registered model {}", config.tracking.model_name))?;

    println!("{}", "Prediction Service".bold().cyan());
    println!();
    println!(
        "  Model: {} (version {})",
        predictor.model_name().green(),
        predictor.version().version.to_string().green()
    );
    println!("  Input: {}", predictor.feature_name().green());
    println!("  Listening: {}", format!("http://{}", config.serve.address).cyan());
    println!();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime
        .block_on(pluvio_serve::serve(config.serve.address, predictor))
        .context("Prediction service failed")?;
    Ok(())
}
