//! Pluvio CLI - command-line interface for the precipitation pipeline
//!
//! Provides the `pluvio` command: run the pipeline, promote the latest run to
//! the model registry, serve predictions, and inspect tracked runs.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pluvio_core::AppConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Pluvio - daily precipitation pipeline
///
/// Loads a station's daily weather feed, cleans it, checks it for drift,
/// derives lag features and trains a linear precipitation model that is
/// tracked, registered and served.
#[derive(Parser, Debug)]
#[command(name = "pluvio", author, version, about = "Pluvio - daily precipitation pipeline")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (defaults to ./pluvio.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline end to end
    ///
    /// Load, clean, drift-check, build features, train and log one tracked run.
    Run {
        /// Data source url or path (overrides source.location)
        #[arg(long)]
        source: Option<String>,

        /// Tracking server url or local store directory (overrides tracking.uri)
        #[arg(long)]
        tracking_uri: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register the latest finished run's model under the configured name
    Register {
        /// Registered model name (overrides tracking.model_name)
        #[arg(long)]
        name: Option<String>,

        /// Tracking server url or local store directory (overrides tracking.uri)
        #[arg(long)]
        tracking_uri: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve predictions from the latest registered model
    Serve {
        /// Bind address (overrides serve.address)
        #[arg(long)]
        address: Option<SocketAddr>,

        /// Registered model name (overrides tracking.model_name)
        #[arg(long)]
        name: Option<String>,

        /// Tracking server url or local store directory (overrides tracking.uri)
        #[arg(long)]
        tracking_uri: Option<String>,
    },

    /// Show the latest finished run of the configured experiment
    Runs {
        /// Tracking server url or local store directory (overrides tracking.uri)
        #[arg(long)]
        tracking_uri: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so `--json` output stays parseable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Run { source, tracking_uri, json } => {
            if let Some(source) = source {
                config.source.location = source;
            }
            apply_tracking_uri(&mut config, tracking_uri)?;
            commands::run::execute(&config, json)
        }
        Command::Register { name, tracking_uri, json } => {
            apply_model_name(&mut config, name);
            apply_tracking_uri(&mut config, tracking_uri)?;
            commands::register::execute(&config, json)
        }
        Command::Serve { address, name, tracking_uri } => {
            if let Some(address) = address {
                config.serve.address = address;
            }
            apply_model_name(&mut config, name);
            apply_tracking_uri(&mut config, tracking_uri)?;
            commands::serve::execute(&config)
        }
        Command::Runs { tracking_uri, json } => {
            apply_tracking_uri(&mut config, tracking_uri)?;
            commands::runs::execute(&config, json)
        }
    }
}

fn apply_model_name(config: &mut AppConfig, name: Option<String>) {
    if let Some(name) = name {
        config.tracking.model_name = name;
    }
}

/// Apply the override shared by every command and re-check the result.
fn apply_tracking_uri(config: &mut AppConfig, uri: Option<String>) -> anyhow::Result<()> {
    if let Some(uri) = uri {
        config.tracking.uri = uri;
    }
    config.validate().context("Invalid configuration")?;
    Ok(())
}
