//! Aegis Daemon - disaster-event consensus pipeline
//!
//! The daemon provides:
//! - Oracle polling of seismic, flood, fire and social sources
//! - Stake-weighted validator consensus per event
//! - Funded responses, parametric payouts and coordination messages
//! - REST API and lifecycle event streaming

use aegis_daemon::config::AegisConfig;
use aegis_daemon::error::{DaemonError, DaemonResult};
use aegis_daemon::server::Server;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Aegis Daemon CLI
#[derive(Parser)]
#[command(name = "aegisd")]
#[command(about = "Aegis Daemon - disaster-event consensus pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AEGIS_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "AEGIS_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "AEGIS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "AEGIS_LOG_JSON")]
    json: bool,

    /// Accept pushed signals only; do not poll any source
    #[arg(long, env = "AEGIS_NO_ORACLE")]
    no_oracle: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let mut config = AegisConfig::load(cli.config.as_deref())?;

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if cli.no_oracle {
        config.oracle.enabled = false;
    }

    // Print startup banner
    println!(
        r#"
     _    _____ ____ ___ ____
    / \  | ____/ ___|_ _/ ___|
   / _ \ |  _|| |  _ | |\___ \
  / ___ \| |__| |_| || | ___) |
 /_/   \_\_____\____|___|____/

  Disaster-event consensus pipeline
  Version: {}
  Oracle: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        if config.oracle.enabled { "polling" } else { "push-only" },
        config.server.listen_addr
    );

    let server = Server::new(config)?;
    server.run().await
}
