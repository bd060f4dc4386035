//! CLI Entry Point for sonar-daq
//!
//! Provides command-line interface for:
//! - Acquiring from a MaxBotix rangefinder on a serial port and reporting
//!   range and reading rate until Ctrl+C
//! - Checking a configuration file without touching hardware
//!
//! # Usage
//!
//! Acquire with the configured port and model:
//! ```bash
//! sonar-daq run --config config/sonar.toml
//! ```
//!
//! Override the port and model:
//! ```bash
//! sonar-daq run --port /dev/ttyACM0 --model mb1200
//! ```
//!
//! Validate configuration:
//! ```bash
//! sonar-daq check-config --config config/sonar.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sonar_daq::config::{SerialConfig, SonarConfig, DEFAULT_CONFIG_PATH};
use sonar_daq::hardware::Model;
use sonar_daq::tracing_setup::{self, OutputFormat, TracingConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sonar-daq")]
#[command(about = "MaxBotix ultrasonic rangefinder acquisition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire range readings until Ctrl+C
    Run {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Serial port, overrides sensor.serial.port
        #[arg(long)]
        port: Option<String>,

        /// Sensor model, overrides sensor.model
        #[arg(long, value_enum)]
        model: Option<Model>,

        /// Log output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        log_format: OutputFormat,
    },

    /// Load and validate a configuration file, then print it
    CheckConfig {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            port,
            model,
            log_format,
        } => {
            let mut settings = load_config(&config)?;
            apply_overrides(&mut settings, port, model);
            settings.validate().context("invalid configuration")?;

            let level = tracing_setup::parse_log_level(&settings.application.log_level)?;
            tracing_setup::init(TracingConfig::new(level).with_format(log_format))?;

            run(settings).await
        }
        Commands::CheckConfig { config } => {
            let settings = load_config(&config)?;
            settings.validate().context("invalid configuration")?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            println!("Configuration OK: {}", config.display());
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<SonarConfig> {
    SonarConfig::load_from(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn apply_overrides(settings: &mut SonarConfig, port: Option<String>, model: Option<Model>) {
    if let Some(model) = model {
        settings.sensor.model = model;
    }
    if let Some(port) = port {
        match settings.sensor.serial.as_mut() {
            Some(serial) => serial.port = port,
            None => settings.sensor.serial = Some(SerialConfig::new(port)),
        }
    }
}

#[cfg(feature = "serial")]
async fn run(settings: SonarConfig) -> Result<()> {
    use sonar_daq::hardware::byte_source::SerialByteSource;
    use sonar_daq::report::spawn_reporter;
    use sonar_daq::subsystem::Rangefinder;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    let serial = settings
        .sensor
        .serial
        .clone()
        .context("no serial port configured; set sensor.serial.port or pass --port")?;

    tracing::info!(
        name = %settings.application.name,
        model = %settings.sensor.model,
        port = %serial.port,
        baud_rate = serial.baud_rate,
        "opening rangefinder"
    );
    let source = SerialByteSource::open(&serial.port, serial.baud_rate)
        .await
        .with_context(|| format!("failed to open {}", serial.port))?;

    let cancel = CancellationToken::new();
    let sonar = Arc::new(
        Rangefinder::builder(settings.sensor.model)
            .serial(Box::new(source))
            .rate_window(settings.rate_window()?)
            .acquisition_config(serial.acquisition_config())
            .cancellation_token(cancel.clone())
            .build(),
    );

    let reporter = spawn_reporter(
        sonar.clone(),
        settings.report_interval(),
        settings.reporting.format,
        cancel.clone(),
    );

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, stopping acquisition");
            ctrl_c.cancel();
        }
    });

    let outcome = sonar.wait().await;
    cancel.cancel();
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "reporter task failed");
    }

    match outcome? {
        Some(summary) => tracing::info!(
            readings = summary.readings,
            bytes_read = summary.bytes_read,
            framing_errors = summary.framing_errors,
            "shutdown complete"
        ),
        None => tracing::info!("shutdown complete"),
    }
    Ok(())
}

#[cfg(not(feature = "serial"))]
async fn run(_settings: SonarConfig) -> Result<()> {
    anyhow::bail!("serial support not enabled; rebuild with --features serial")
}
