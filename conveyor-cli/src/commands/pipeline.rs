//! Pipeline command handlers
//!
//! Handles all pipeline-related CLI commands including registration,
//! listing, viewing, editing and deletion.

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::Subcommand;
use colored::*;
use conveyor_client::{ConveyorClient, PipelineApi};
use conveyor_core::domain::kv::Part;
use conveyor_core::domain::pipeline::PipelineDefinition;
use conveyor_core::domain::stage::{StageDefinition, StageField};
use conveyor_core::dto::pipeline::{PipelineRecord, RegisterFilePath};
use conveyor_core::listing::filter_pipelines;
use conveyor_core::validate::{missing_variables, validate};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{report, session};
use crate::config::Config;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// List registered pipelines
    List {
        /// Only show pipelines whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Show a pipeline definition
    Show {
        /// Pipeline name
        name: String,
    },
    /// Register a pipeline from a local JSON definition
    Create {
        /// Path to the definition file
        #[arg(short, long)]
        file: PathBuf,

        /// Variables as KEY=VALUE pairs, added to those in the file
        #[arg(short, long = "var", value_parser = parse_key_val)]
        vars: Vec<(String, String)>,
    },
    /// Register a pipeline from a definition file on the server
    Register {
        /// Path of the definition on the server
        path: String,

        /// Path of a variable file on the server
        #[arg(long)]
        variable_file: Option<String>,
    },
    /// Change a registered pipeline
    Edit {
        /// Pipeline name
        name: String,

        /// Run stages in parallel
        #[arg(long)]
        parallel: Option<bool>,

        /// Set a variable (KEY=VALUE)
        #[arg(long = "set-var", value_parser = parse_key_val)]
        set_vars: Vec<(String, String)>,

        /// Remove a variable
        #[arg(long = "unset-var")]
        unset_vars: Vec<String>,

        /// Mark a stage as skipped
        #[arg(long)]
        skip: Vec<String>,

        /// Clear the skipped flag of a stage
        #[arg(long)]
        unskip: Vec<String>,
    },
    /// Delete a pipeline
    Delete {
        /// Pipeline name
        name: String,
    },
    /// Check a local definition file without sending it
    Validate {
        /// Path to the definition file
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].trim().to_string(), s[pos + 1..].to_string()))
}

/// Handle pipeline commands
///
/// # Arguments
/// * `command` - The pipeline command to execute
/// * `config` - The CLI configuration
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    match command {
        PipelineCommands::List { filter } => list_pipelines(config, filter.as_deref()).await,
        PipelineCommands::Show { name } => show_pipeline(&config.client()?, &name).await,
        PipelineCommands::Create { file, vars } => create_pipeline(config, &file, vars).await,
        PipelineCommands::Register {
            path,
            variable_file,
        } => register_pipeline(&config.client()?, path, variable_file).await,
        PipelineCommands::Edit {
            name,
            parallel,
            set_vars,
            unset_vars,
            skip,
            unskip,
        } => {
            let changes = Changes {
                parallel,
                set_vars,
                unset_vars,
                skip,
                unskip,
            };
            edit_pipeline(config, &name, changes).await
        }
        PipelineCommands::Delete { name } => delete_pipeline(config, &name).await,
        PipelineCommands::Validate { file } => validate_file(&file),
    }
}

/// List pipelines, optionally filtered by name
async fn list_pipelines(config: &Config, filter: Option<&str>) -> Result<()> {
    let mut session = session(config)?;
    let loaded = session.load_pipelines().await;
    report(&session, loaded)?;

    let pipelines = filter_pipelines(session.pipelines(), filter.unwrap_or_default());
    if pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
        return Ok(());
    }

    let now = Utc::now().timestamp_millis();
    println!(
        "{}",
        format!("Found {} pipeline(s):", pipelines.len()).bold()
    );
    println!();
    for pipeline in pipelines {
        println!("  {} {}", "▸".cyan(), pipeline.name.bold());
        println!("    Status:   {}", pipeline.status.dimmed());
        println!("    Last run: {}", pipeline.last_run_label(now).dimmed());
        println!("    Runtime:  {}", pipeline.runtime_label().dimmed());
        println!();
    }

    Ok(())
}

/// Fetch and display a single pipeline
async fn show_pipeline(client: &ConveyorClient, name: &str) -> Result<()> {
    match client.get_pipeline(name).await? {
        Some(record) => print_pipeline_details(&PipelineDefinition::from(record)),
        None => println!("{}", format!("Pipeline '{}' has no definition.", name).yellow()),
    }
    Ok(())
}

/// Register a pipeline from a local definition file
async fn create_pipeline(
    config: &Config,
    file: &Path,
    vars: Vec<(String, String)>,
) -> Result<()> {
    let definition = vars
        .iter()
        .try_fold(load_definition(file)?, |def, (key, value)| {
            set_variable(&def, key, value)
        })?;

    let mut session = session(config)?;
    session.begin_create();
    session.edit(|_| Ok(definition))?;
    let submitted = session.submit().await;
    report(&session, submitted)
}

/// Register a pipeline from a file the server can read
async fn register_pipeline(
    client: &ConveyorClient,
    path: String,
    variable_file: Option<String>,
) -> Result<()> {
    let msg = client
        .register_filepath(&RegisterFilePath {
            definition_path: path,
            variable_file: variable_file.unwrap_or_default(),
        })
        .await?;
    println!("{}", format!("✓ {}", msg).green().bold());
    Ok(())
}

/// Requested changes to a registered pipeline
#[derive(Debug, Default)]
struct Changes {
    parallel: Option<bool>,
    set_vars: Vec<(String, String)>,
    unset_vars: Vec<String>,
    skip: Vec<String>,
    unskip: Vec<String>,
}

impl Changes {
    fn apply(&self, definition: &PipelineDefinition) -> Result<PipelineDefinition> {
        let mut next = match self.parallel {
            Some(parallel) => definition.with_parallel(parallel),
            None => definition.clone(),
        };
        for (key, value) in &self.set_vars {
            next = set_variable(&next, key, value)?;
        }
        for key in &self.unset_vars {
            next = unset_variable(&next, key)?;
        }
        for stage in &self.skip {
            next = set_skip(&next, stage, true)?;
        }
        for stage in &self.unskip {
            next = set_skip(&next, stage, false)?;
        }
        Ok(next)
    }
}

/// Fetch a pipeline, apply changes and send the update
async fn edit_pipeline(config: &Config, name: &str, changes: Changes) -> Result<()> {
    let mut session = session(config)?;
    if !session.begin_edit(name).await {
        if session.notifications().is_visible() {
            return report(&session, false);
        }
        bail!("Pipeline '{}' has no definition to edit", name);
    }

    let updated = match session.editor() {
        Some(editor) => changes.apply(&editor.draft)?,
        None => bail!("Pipeline '{}' could not be opened for editing", name),
    };
    debug!("Applying {:?} to '{}'", changes, name);
    session.edit(|_| Ok(updated))?;

    let submitted = session.submit().await;
    report(&session, submitted)
}

/// Delete a pipeline
async fn delete_pipeline(config: &Config, name: &str) -> Result<()> {
    let mut session = session(config)?;
    let deleted = session.delete(name).await;
    report(&session, deleted)
}

/// Validate a local definition file
fn validate_file(file: &Path) -> Result<()> {
    let definition = load_definition(file)?;
    validate(&definition)?;

    println!(
        "{}",
        format!("✓ Pipeline '{}' is valid", definition.name)
            .green()
            .bold()
    );
    warn_missing_variables(&definition);
    Ok(())
}

fn load_definition(file: &Path) -> Result<PipelineDefinition> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read definition file: {}", file.display()))?;
    parse_definition(&content)
        .with_context(|| format!("Failed to parse definition file: {}", file.display()))
}

/// Parse a JSON definition: `{name, parallel, stages, variables}`
fn parse_definition(content: &str) -> Result<PipelineDefinition> {
    let record: PipelineRecord = serde_json::from_str(content)?;
    Ok(PipelineDefinition::from(record))
}

/// Set `key` to `value`, adding the variable if it is not defined yet
fn set_variable(
    definition: &PipelineDefinition,
    key: &str,
    value: &str,
) -> Result<PipelineDefinition> {
    let key = key.trim();
    if key.is_empty() {
        bail!("Variable name cannot be empty");
    }

    let index = match variable_index(definition, key) {
        Some(index) => index,
        None => {
            let added = definition.add_variable();
            let index = added.variables.len() - 1;
            return Ok(added
                .update_variable(index, key, Part::Key)?
                .update_variable(index, value, Part::Value)?);
        }
    };
    Ok(definition.update_variable(index, value, Part::Value)?)
}

fn unset_variable(definition: &PipelineDefinition, key: &str) -> Result<PipelineDefinition> {
    let index = variable_index(definition, key.trim())
        .ok_or_else(|| anyhow!("Variable '{}' is not defined", key))?;
    Ok(definition.remove_variable(index)?)
}

fn variable_index(definition: &PipelineDefinition, key: &str) -> Option<usize> {
    definition
        .variables
        .entries()
        .iter()
        .position(|kv| kv.key.trim() == key)
}

fn set_skip(
    definition: &PipelineDefinition,
    stage: &str,
    skip: bool,
) -> Result<PipelineDefinition> {
    let index = definition
        .stages
        .iter()
        .position(|s| s.name == stage)
        .ok_or_else(|| anyhow!("Stage '{}' not found", stage))?;
    Ok(definition.set_stage_field(index, StageField::Skip(skip))?)
}

fn warn_missing_variables(definition: &PipelineDefinition) {
    let missing = missing_variables(definition);
    if !missing.is_empty() {
        println!(
            "{}",
            format!("! Undefined variables: {}", missing.join(", ")).yellow()
        );
    }
}

/// Print detailed pipeline information
fn print_pipeline_details(pipeline: &PipelineDefinition) {
    println!("{}", "Pipeline Details:".bold());
    println!("  Name:      {}", pipeline.name.bold());
    println!("  Parallel:  {}", pipeline.parallel);

    if !pipeline.variables.is_empty() {
        println!("\n{}", "Variables:".bold());
        for (key, value) in pipeline.variables.complete_entries() {
            println!("  {} = {}", key.cyan(), value);
        }
    }

    println!("\n{}", "Stages:".bold());
    println!("{}", "─".repeat(80).dimmed());
    for stage in &pipeline.stages {
        print_stage(stage);
    }
    println!("{}", "─".repeat(80).dimmed());

    warn_missing_variables(pipeline);
}

fn print_stage(stage: &StageDefinition) {
    let marker = if stage.skip {
        "(skipped)".yellow()
    } else {
        "".normal()
    };
    println!("  {} {} {}", "▸".cyan(), stage.name.bold(), marker);
    println!("    Task:       {}", stage.task);
    if !stage.args.is_empty() {
        println!("    Args:       {}", stage.args.join(" ").dimmed());
    }
    if let Some(pwd) = &stage.pwd {
        println!("    Directory:  {}", pwd.dimmed());
    }
    if !stage.env.is_empty() {
        println!(
            "    Env:        {}",
            stage.env.to_assignments().join(", ").dimmed()
        );
    }
    if !stage.depends_on.is_empty() {
        println!("    Depends on: {}", stage.depends_on.join(", ").dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"{
        "name": "build",
        "parallel": false,
        "stages": [
            {"name": "compile", "task": "make {TARGET}", "env": ["CC=clang"]},
            {"name": "test", "task": "make test", "depends_on": ["compile"]}
        ],
        "variables": {"TARGET": "debug"}
    }"#;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("TARGET=a=b").unwrap(),
            ("TARGET".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("TARGET").is_err());
    }

    #[test]
    fn test_parse_definition() {
        let def = parse_definition(DEFINITION).unwrap();
        assert_eq!(def.name, "build");
        assert_eq!(def.stages.len(), 2);
        assert_eq!(def.stages[0].env.to_assignments(), vec!["CC=clang"]);
        assert!(validate(&def).is_ok());
        assert!(missing_variables(&def).is_empty());

        assert!(parse_definition("{").is_err());
    }

    #[test]
    fn test_set_and_unset_variable() {
        let def = parse_definition(DEFINITION).unwrap();

        let def = set_variable(&def, "TARGET", "release").unwrap();
        assert_eq!(def.variables.len(), 1);
        assert_eq!(def.variables.to_map()["TARGET"], "release");

        let def = set_variable(&def, " JOBS ", "4").unwrap();
        assert_eq!(def.variables.to_map()["JOBS"], "4");

        let def = unset_variable(&def, "TARGET").unwrap();
        assert!(!def.variables.to_map().contains_key("TARGET"));
        assert!(unset_variable(&def, "TARGET").is_err());
        assert!(set_variable(&def, " ", "x").is_err());
    }

    #[test]
    fn test_changes_apply() {
        let def = parse_definition(DEFINITION).unwrap();
        let changes = Changes {
            parallel: Some(true),
            skip: vec!["test".to_string()],
            unset_vars: vec!["TARGET".to_string()],
            ..Default::default()
        };

        let next = changes.apply(&def).unwrap();
        assert!(next.parallel);
        assert!(next.stages[1].skip);
        assert!(next.variables.is_empty());
        assert_eq!(missing_variables(&next), vec!["TARGET"]);

        let bad = Changes {
            skip: vec!["deploy".to_string()],
            ..Default::default()
        };
        assert!(bad.apply(&def).is_err());
    }
}
