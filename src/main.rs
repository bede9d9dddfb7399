//! mackerel-plugin-envsensor - environment sensor plugin binary
//!
//! Invoked by mackerel-agent once per reporting interval. Prints metric values,
//! or graph definitions when the agent asks for them, and exits.

use anyhow::Context;
use clap::Parser;
use mp_envsensor::{output, Collector, DefaultPlatform, PluginConfig, Profile, DEFAULT_PREFIX};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "mackerel-plugin-envsensor")]
#[command(about = "Environment sensor metrics for mackerel-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Reads BME280, SHT2x and TSL2561 sensors on the I2C bus and prints \
                        mackerel-agent plugin metrics")]
struct Cli {
    /// Metric key prefix
    #[arg(long = "metric-key-prefix", default_value = DEFAULT_PREFIX)]
    metric_key_prefix: String,

    /// Temp file name
    #[arg(long)]
    tempfile: Option<PathBuf>,

    /// Sensor inventory and key naming: qualified or flat
    #[arg(long, default_value_t = Profile::Qualified)]
    profile: Profile,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = PluginConfig::new(cli.metric_key_prefix)
        .with_tempfile(cli.tempfile)
        .with_profile(cli.profile);
    debug!(?config, "plugin configured");

    let collector = Collector::new(DefaultPlatform::new(), config);
    output::run(&collector)
        .await
        .context("environment sensor plugin failed")?;

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // stdout carries the metric lines; logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(level).into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    Ok(())
}
