//! meshaddrd entry point.

use anyhow::{Context, Result};
use clap::Parser;
use meshaddr_core::SubsystemConfig;
use meshaddrd::Daemon;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG_PATH: &str = "/etc/meshaddr/meshaddrd.toml";

/// IPv6 address management daemon for 6LoWPAN mesh interfaces
#[derive(Parser, Debug)]
#[command(name = "meshaddrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json)?;

    if args.dump_config {
        let config = SubsystemConfig::load_or_default(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?;
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    info!(config = %args.config.display(), "meshaddrd: starting");
    match run(&args).await {
        Ok(()) => {
            info!("meshaddrd: exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "meshaddrd: exiting with error");
            Err(e)
        }
    }
}

/// Initialize structured logging
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {:?}", level))?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.compact().finish())
    }
    .context("failed to set logger")?;

    Ok(())
}

async fn run(args: &Args) -> Result<()> {
    let mut daemon = Daemon::from_path(&args.config)?;

    let stats = daemon
        .run(async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "meshaddrd: signal handler failed");
            }
        })
        .await;
    info!(fast_ticks = stats.fast_ticks, slow_ticks = stats.slow_ticks, "meshaddrd: tick loop stopped");

    daemon.shutdown()
}
