use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use pulse::config::{ExportFormat, TelemetryConfig};
use pulse::probes::SystemProbe;
use pulse::TelemetryService;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments for the telemetry engine
#[derive(Parser)]
#[command(
    name = "pulse",
    about = "Dashboard telemetry engine - metrics aggregation and debug logging",
    long_about = "Ingests numeric samples from system probes and status pollers, keeps \
                  bounded rolling histories per metric, classifies health against \
                  configured thresholds, and exports consistent point-in-time snapshots."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Where to write the final snapshot; stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Export format of the final snapshot
    #[arg(long, value_enum, default_value = "json")]
    format: CliFormat,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliFormat {
    Json,
    Csv,
}

impl From<CliFormat> for ExportFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Json => ExportFormat::Json,
            CliFormat::Csv => ExportFormat::Csv,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TelemetryConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            TelemetryConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            warn!("No configuration file provided, using defaults");
            Ok(TelemetryConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    let config = load_config(cli.config.as_ref())?;
    let service = TelemetryService::init(config)?;
    service.register_producer(Arc::new(SystemProbe::default()));
    service.start();
    info!("Telemetry engine running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    service.shutdown().await;

    let exported = service.export(cli.format.into())?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &exported)
                .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
            info!("Final snapshot written to {}", path.display());
        }
        None => println!("{}", exported),
    }

    Ok(())
}
