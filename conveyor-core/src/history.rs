//! Run history aggregation
//!
//! Turns raw run records into display-ready views: a label, an outcome and
//! an optional duration per run, and the same per stage.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::domain::run::{RunRecord, StageRun};
use crate::format::duration;

/// Outcome of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Success,
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "Success"),
            RunOutcome::Failed => write!(f, "Failed"),
        }
    }
}

/// Outcome of one stage; skipped takes precedence over success or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageOutcome {
    Skipped,
    Success,
    Failed,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Skipped => write!(f, "Skipped"),
            StageOutcome::Success => write!(f, "Success"),
            StageOutcome::Failed => write!(f, "Failed"),
        }
    }
}

/// Derived view of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunView {
    /// `"Run #N"`, numbered from 1 in input order
    pub label: String,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    /// Only when the run has ended
    pub duration: Option<String>,
    pub stages: Vec<StageView>,
}

/// Derived view of one stage within a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageView {
    pub task_name: String,
    pub outcome: StageOutcome,
    pub skipped: bool,
    /// Only for stages that ran and have both timestamps
    pub duration: Option<String>,
}

/// Aggregated history of a pipeline
///
/// An empty input is its own case so callers render a "no runs" state
/// rather than an empty list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunHistory {
    NoRuns,
    Runs(Vec<RunView>),
}

impl RunHistory {
    pub fn is_empty(&self) -> bool {
        matches!(self, RunHistory::NoRuns)
    }
}

/// Aggregate runs in the order given
pub fn aggregate(runs: &[RunRecord]) -> RunHistory {
    if runs.is_empty() {
        return RunHistory::NoRuns;
    }

    RunHistory::Runs(
        runs.iter()
            .enumerate()
            .map(|(i, run)| run_view(i + 1, run))
            .collect(),
    )
}

fn run_view(position: usize, run: &RunRecord) -> RunView {
    RunView {
        label: format!("Run #{}", position),
        outcome: if run.successful {
            RunOutcome::Success
        } else {
            RunOutcome::Failed
        },
        started_at: run.started_at,
        duration: run.ended_at.map(|end| duration(run.started_at, end)),
        stages: run.stages.iter().map(stage_view).collect(),
    }
}

fn stage_view(stage: &StageRun) -> StageView {
    let outcome = if stage.skipped {
        StageOutcome::Skipped
    } else if stage.successful {
        StageOutcome::Success
    } else {
        StageOutcome::Failed
    };

    let elapsed = match (stage.skipped, stage.started_at, stage.ended_at) {
        (false, Some(start), Some(end)) => Some(duration(start, end)),
        _ => None,
    };

    StageView {
        task_name: stage.task_name.clone(),
        outcome,
        skipped: stage.skipped,
        duration: elapsed,
    }
}
