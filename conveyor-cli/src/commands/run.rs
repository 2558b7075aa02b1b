//! Run command handlers

use anyhow::Result;
use chrono::Local;
use clap::Subcommand;
use colored::*;
use conveyor_core::format::iso_date_time;
use conveyor_core::history::{RunHistory, RunOutcome, RunView, StageOutcome};

use super::{report, session};
use crate::config::Config;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Show the run history of a pipeline
    List {
        /// Pipeline name
        name: String,
    },
    /// Start a run
    Launch {
        /// Pipeline name
        name: String,
    },
    /// Cancel the active run
    Cancel {
        /// Pipeline name
        name: String,
    },
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let mut session = session(config)?;

    match command {
        RunCommands::List { name } => {
            session.select(Some(&name));
            let loaded = session.load_runs().await;
            report(&session, loaded)?;
            print_history(&name, session.runs());
            Ok(())
        }
        RunCommands::Launch { name } => {
            let launched = session.launch(&name).await;
            report(&session, launched)
        }
        RunCommands::Cancel { name } => {
            let cancelled = session.cancel(&name).await;
            report(&session, cancelled)
        }
    }
}

fn print_history(name: &str, history: &RunHistory) {
    let runs = match history {
        RunHistory::NoRuns => {
            println!("{}", format!("No runs for '{}' yet.", name).yellow());
            return;
        }
        RunHistory::Runs(runs) => runs,
    };

    println!("{}", format!("Runs of {}:", name).bold());
    println!();
    for run in runs {
        print_run(run);
    }
}

fn print_run(run: &RunView) {
    let outcome = match run.outcome {
        RunOutcome::Success => run.outcome.to_string().green(),
        RunOutcome::Failed => run.outcome.to_string().red(),
    };
    let started = iso_date_time(Some(&run.started_at.with_timezone(&Local)));

    println!(
        "  {} {}  {}  {}",
        "▸".cyan(),
        run.label.bold(),
        outcome,
        started.dimmed()
    );
    if let Some(duration) = &run.duration {
        println!("    Duration: {}", duration);
    }

    for stage in &run.stages {
        let dot = match stage.outcome {
            StageOutcome::Skipped => "○".dimmed(),
            StageOutcome::Success => "●".green(),
            StageOutcome::Failed => "●".red(),
        };
        println!(
            "    {} {:<24} {:<8} {}",
            dot,
            stage.task_name,
            stage.outcome.to_string(),
            stage.duration.as_deref().unwrap_or_default().dimmed()
        );
    }
    println!();
}
