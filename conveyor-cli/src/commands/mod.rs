//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod pipeline;
mod run;

pub use pipeline::PipelineCommands;
pub use run::RunCommands;

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::*;
use conveyor_client::{ConveyorClient, PipelineApi, Session};
use conveyor_core::notification::{Notification, NotificationKind};

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Run history and run control
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Show the server version
    Version,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Version => {
            let version = config.client()?.version().await?;
            println!("Server version: {}", version.cyan());
            Ok(())
        }
    }
}

/// Session against the configured server
fn session(config: &Config) -> Result<Session<ConveyorClient>> {
    Ok(Session::new(config.client()?, config.notifications()))
}

/// Print the session's notification and turn a failed operation into an error
fn report(session: &Session<ConveyorClient>, succeeded: bool) -> Result<()> {
    let notification = session.notifications().current();
    session.notifications().close();

    if !succeeded {
        match notification {
            Some(n) => bail!(n.message),
            None => bail!("Operation failed"),
        }
    }
    if let Some(n) = notification {
        print_notification(&n);
    }
    Ok(())
}

fn print_notification(notification: &Notification) {
    let line = match notification.kind {
        NotificationKind::Success => format!("✓ {}", notification.message).green().bold(),
        NotificationKind::Info => format!("▸ {}", notification.message).cyan(),
        NotificationKind::Warning => format!("! {}", notification.message).yellow(),
        NotificationKind::Error => format!("✗ {}", notification.message).red().bold(),
    };
    println!("{}", line);
}
