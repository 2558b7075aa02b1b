//! Pipeline DTOs
//!
//! Outbound: the register (create) and update payloads.
//! Inbound: full pipeline records for edit mode, and list summaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::null_as_default;
use crate::domain::kv::{KeyValue, KeyValueList};
use crate::domain::pipeline::PipelineDefinition;
use crate::domain::stage::StageDefinition;
use crate::error::ValidationError;
use crate::validate::validate;

/// An environment entry on the wire
///
/// Always written as `"KEY=VALUE"`; `{key, value}` objects are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvEntry {
    Assignment(String),
    Pair {
        #[serde(alias = "Key")]
        key: String,
        #[serde(alias = "Value", default)]
        value: String,
    },
}

impl From<&EnvEntry> for KeyValue {
    fn from(entry: &EnvEntry) -> Self {
        match entry {
            EnvEntry::Assignment(raw) => KeyValue::parse(raw),
            EnvEntry::Pair { key, value } => KeyValue::new(key.clone(), value.clone()),
        }
    }
}

/// Stage as sent to and received from the server
///
/// Field names are the same as in `StageDefinition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePayload {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "Task", default)]
    pub task: String,

    #[serde(alias = "Args", default, deserialize_with = "null_as_default")]
    pub args: Vec<String>,

    #[serde(alias = "Pwd", default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,

    #[serde(alias = "Skip", default)]
    pub skip: bool,

    #[serde(alias = "Env", default, deserialize_with = "null_as_default")]
    pub env: Vec<EnvEntry>,

    #[serde(alias = "DependsOn", default, deserialize_with = "null_as_default")]
    pub depends_on: Vec<String>,
}

impl From<&StageDefinition> for StagePayload {
    fn from(stage: &StageDefinition) -> Self {
        Self {
            name: stage.name.clone(),
            task: stage.task.clone(),
            args: stage.args.clone(),
            pwd: stage.pwd.clone(),
            skip: stage.skip,
            env: stage
                .env
                .to_assignments()
                .into_iter()
                .map(EnvEntry::Assignment)
                .collect(),
            depends_on: stage.depends_on.clone(),
        }
    }
}

impl From<&StagePayload> for StageDefinition {
    fn from(payload: &StagePayload) -> Self {
        Self {
            name: payload.name.clone(),
            task: payload.task.clone(),
            args: payload.args.clone(),
            pwd: payload.pwd.clone().filter(|p| !p.trim().is_empty()),
            skip: payload.skip,
            env: payload.env.iter().map(KeyValue::from).collect(),
            depends_on: payload.depends_on.clone(),
        }
    }
}

/// Body of the register request: `{pipeline: {name, parallel, stages}, variables}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub pipeline: PipelineBody,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineBody {
    pub name: String,
    pub parallel: bool,
    pub stages: Vec<StagePayload>,
}

/// Body of the update request: `{name, parallel, stages, variables}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePipeline {
    pub name: String,
    pub parallel: bool,
    pub stages: Vec<StagePayload>,
    pub variables: BTreeMap<String, String>,
}

/// Body of the register-from-file request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFilePath {
    #[serde(rename = "filepath")]
    pub definition_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variable_file: String,
}

/// Full pipeline as fetched for editing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "Parallel", default)]
    pub parallel: bool,

    #[serde(alias = "Stages", default, deserialize_with = "null_as_default")]
    pub stages: Vec<StagePayload>,

    #[serde(alias = "Variables", default, deserialize_with = "null_as_default")]
    pub variables: BTreeMap<String, String>,
}

/// Pipeline list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "Status", default)]
    pub status: String,

    /// Epoch milliseconds of the last run; 0 means never
    #[serde(alias = "LastRun", default)]
    pub last_run: Option<i64>,

    #[serde(alias = "Runtime", default)]
    pub runtime: Option<String>,

    #[serde(alias = "Stages", default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<StagePayload>>,
}

impl PipelineDefinition {
    fn stage_payloads(&self) -> Vec<StagePayload> {
        self.stages.iter().map(StagePayload::from).collect()
    }

    /// Validate and build the register payload
    pub fn to_create_payload(&self) -> Result<CreatePipeline, ValidationError> {
        validate(self)?;
        Ok(CreatePipeline {
            pipeline: PipelineBody {
                name: self.name.clone(),
                parallel: self.parallel,
                stages: self.stage_payloads(),
            },
            variables: self.variables.to_map(),
        })
    }

    /// Validate and build the update payload
    pub fn to_update_payload(&self) -> Result<UpdatePipeline, ValidationError> {
        validate(self)?;
        Ok(UpdatePipeline {
            name: self.name.clone(),
            parallel: self.parallel,
            stages: self.stage_payloads(),
            variables: self.variables.to_map(),
        })
    }
}

impl From<&PipelineRecord> for PipelineDefinition {
    fn from(record: &PipelineRecord) -> Self {
        Self {
            name: record.name.clone(),
            parallel: record.parallel,
            stages: record.stages.iter().map(StageDefinition::from).collect(),
            variables: KeyValueList::from_map(&record.variables),
        }
    }
}

impl From<PipelineRecord> for PipelineDefinition {
    fn from(record: PipelineRecord) -> Self {
        Self::from(&record)
    }
}
