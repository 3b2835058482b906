use anyhow::{Context, Result};
use clap::Parser;
use perftest_config::{ConfigLoader, PerftestConfig};
use perftest_output::sink_for;
use perftest_plugin::Dispatcher;
use perftest_plugins::default_registry;
use std::path::PathBuf;
use tracing::{debug, info, warn};

mod cli;
use cli::Cli;

/// Where the configuration was read from, reported once logging is up
enum ConfigSource {
    File(PathBuf),
    MissingFile(PathBuf),
    Environment,
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from: {:?}", path),
            ConfigSource::MissingFile(path) => {
                warn!("Configuration file not found: {:?}. Using defaults.", path)
            }
            ConfigSource::Environment => {
                debug!("No configuration file specified. Loaded from environment or defaults.")
            }
        }
    }
}

fn load_config(config_path: Option<&PathBuf>) -> Result<(PerftestConfig, ConfigSource)> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) if path.exists() => {
            let config = loader
                .from_file(path)
                .context(format!("Failed to load configuration from {:?}", path))?;
            Ok((config, ConfigSource::File(path.clone())))
        }
        Some(path) => {
            let config = loader
                .from_env()
                .context("Failed to load configuration from environment")?;
            Ok((config, ConfigSource::MissingFile(path.clone())))
        }
        None => {
            let config = loader
                .from_env()
                .context("Failed to load configuration from environment")?;
            Ok((config, ConfigSource::Environment))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Invalid --log-level")?;
    }
    perftest_logging::init_logging(&config.logging)?;
    source.log();

    let ctx = cli.execution_context();
    info!(test = %ctx.test, provider = %ctx.provider, amount = ctx.amount, "ipa-perftest starting");

    let registry = default_registry().context("Failed to register tests")?;
    let dispatcher = Dispatcher::new(registry, config);
    let sink = sink_for(ctx.results_output_file.clone());

    let report = dispatcher
        .dispatch(&ctx, sink.as_ref())
        .await
        .with_context(|| format!("{} could not be run", ctx.test))?;

    if let Some(archive) = &report.archive {
        info!(archive = %archive.display(), "Run archived");
    }
    std::process::exit(report.exit_code());
}
