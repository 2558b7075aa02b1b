//! Conveyor CLI
//!
//! Command-line interface for browsing, editing and running pipelines on a
//! pipeline server.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Conveyor pipeline CLI", long_about = None)]
struct Cli {
    /// Pipeline server URL
    #[arg(long, env = "CONVEYOR_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "CONVEYOR_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// How long notifications stay up, in milliseconds
    #[arg(long, env = "CONVEYOR_NOTIFICATION_MS", default_value_t = 3500)]
    notification_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conveyor_cli=info,conveyor_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
        timeout: Duration::from_secs(cli.timeout),
        notification_duration: Duration::from_millis(cli.notification_ms),
    };
    config.validate()?;

    handle_command(cli.command, &config).await
}
