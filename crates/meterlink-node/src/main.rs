//! Meterlink Node - smart-meter telegram bridge daemon
//!
//! Runs exactly one of two roles per process:
//! - publisher: frame telegrams from the meter-bridge TCP stream and
//!   publish them to an MQTT topic
//! - subscriber: persist telegrams from the MQTT topic to dated backup
//!   files, reconnecting to the broker indefinitely

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use meterlink_bridge::service;
use meterlink_core::{Config, Role};

#[derive(Parser)]
#[command(name = "meterlink-node")]
#[command(about = "Smart-meter telegram bridge: meter stream to MQTT, MQTT to file backups")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, short, default_value = "config.yml")]
    config: PathBuf,

    /// Enable verbose logging (overrides the config file)
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Config errors are startup-fatal; anyhow reports them on stderr
    // before logging is up.
    let config = Config::load(&args.config)?;

    let level = if args.verbose || config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        config = %args.config.display(),
        role = %config.role,
        "starting meterlink node"
    );

    let result = match config.role {
        Role::Publisher => service::run_publisher(&config).await,
        Role::Subscriber => service::run_subscriber(&config).await,
    };

    if let Err(e) = result {
        error!(error = %e, code = e.error_code(), role = %config.role, "meterlink node failed");
        return Err(e.into());
    }

    info!("meterlink node stopped");
    Ok(())
}
