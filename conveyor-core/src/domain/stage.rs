//! Stage definitions

use serde::{Deserialize, Serialize};

use crate::domain::kv::{KeyValue, KeyValueList};
use crate::error::ModelError;

/// One stage of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Identifier, referenced by other stages' `depends_on`
    pub name: String,

    /// Command to run
    pub task: String,

    /// Arguments passed to the task; empty placeholders are allowed while editing
    pub args: Vec<String>,

    /// Working directory
    pub pwd: Option<String>,

    /// Stage stays in the definition but is not executed
    pub skip: bool,

    /// Environment entries
    pub env: KeyValueList,

    /// Names of earlier stages this stage waits on, without duplicates
    pub depends_on: Vec<String>,
}

/// A scalar stage field together with its new value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageField {
    Name(String),
    Task(String),
    Pwd(Option<String>),
    Skip(bool),
}

fn entry_index(list: &'static str, index: usize, len: usize) -> Result<usize, ModelError> {
    if index < len {
        Ok(index)
    } else {
        Err(ModelError::EntryOutOfRange { list, index, len })
    }
}

impl StageDefinition {
    pub fn new(name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn with_field(&self, field: StageField) -> Self {
        let mut stage = self.clone();
        match field {
            StageField::Name(name) => stage.name = name,
            StageField::Task(task) => stage.task = task,
            StageField::Pwd(pwd) => stage.pwd = pwd.filter(|p| !p.trim().is_empty()),
            StageField::Skip(skip) => stage.skip = skip,
        }
        stage
    }

    /// Add a dependency; blank or already-present names are ignored
    pub fn with_dependency(&self, stage_name: &str) -> Self {
        let mut stage = self.clone();
        if !stage_name.trim().is_empty() && !stage.depends_on.iter().any(|d| d == stage_name) {
            stage.depends_on.push(stage_name.to_string());
        }
        stage
    }

    pub fn without_dependency(&self, dep_index: usize) -> Result<Self, ModelError> {
        let index = entry_index("depends_on", dep_index, self.depends_on.len())?;
        let mut stage = self.clone();
        stage.depends_on.remove(index);
        Ok(stage)
    }

    /// Drop every reference to `stage_name` from `depends_on`
    pub fn without_references_to(&self, stage_name: &str) -> Self {
        let mut stage = self.clone();
        stage.depends_on.retain(|d| d != stage_name);
        stage
    }

    pub fn with_arg(&self) -> Self {
        let mut stage = self.clone();
        stage.args.push(String::new());
        stage
    }

    pub fn with_arg_value(
        &self,
        arg_index: usize,
        value: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let index = entry_index("args", arg_index, self.args.len())?;
        let mut stage = self.clone();
        stage.args[index] = value.into();
        Ok(stage)
    }

    pub fn without_arg(&self, arg_index: usize) -> Result<Self, ModelError> {
        let index = entry_index("args", arg_index, self.args.len())?;
        let mut stage = self.clone();
        stage.args.remove(index);
        Ok(stage)
    }

    pub fn with_env_var(&self) -> Self {
        let mut stage = self.clone();
        stage.env = stage.env.push_empty();
        stage
    }

    /// Replace env row `env_index` with a raw `KEY=VALUE` string
    pub fn with_env_value(&self, env_index: usize, raw: &str) -> Result<Self, ModelError> {
        let index = entry_index("env", env_index, self.env.len())?;
        let mut stage = self.clone();
        stage.env = self.env.replace(index, KeyValue::parse(raw))?;
        Ok(stage)
    }

    pub fn without_env_var(&self, env_index: usize) -> Result<Self, ModelError> {
        let index = entry_index("env", env_index, self.env.len())?;
        let mut stage = self.clone();
        stage.env = self.env.remove(index)?;
        Ok(stage)
    }
}
