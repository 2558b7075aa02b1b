//! Run records
//!
//! Historical executions as reported by the execution engine. Read-only on
//! this side; see `crate::history` for the derived views.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::dto::null_as_default;

/// One historical execution of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(alias = "StartedAt")]
    pub started_at: DateTime<Utc>,

    #[serde(
        alias = "EndedAt",
        default,
        deserialize_with = "unset_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(alias = "Successful", default)]
    pub successful: bool,

    #[serde(alias = "Stages", default, deserialize_with = "null_as_default")]
    pub stages: Vec<StageRun>,
}

/// Outcome of one stage within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRun {
    #[serde(alias = "TaskName")]
    pub task_name: String,

    #[serde(alias = "Successful", default)]
    pub successful: bool,

    #[serde(alias = "Skipped", default)]
    pub skipped: bool,

    #[serde(
        alias = "StartedAt",
        default,
        deserialize_with = "unset_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(
        alias = "EndedAt",
        default,
        deserialize_with = "unset_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Decode an optional timestamp, treating the engine's zero time
/// (`0001-01-01T00:00:00Z`) as absent
fn unset_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(value.filter(|ts| ts.year() > 1))
}
