//! Error types for the pipeline model

use thiserror::Error;

/// Errors raised by edit operations on a pipeline definition
///
/// Edit operations never panic on a bad index; they return one of these and
/// leave the original definition untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Stage index does not exist
    #[error("Stage index {index} out of range (pipeline has {len} stage(s))")]
    StageOutOfRange { index: usize, len: usize },

    /// Index into one of a stage's lists (args, env, depends_on) or the
    /// pipeline variables does not exist
    #[error("Index {index} out of range for {list} (length {len})")]
    EntryOutOfRange {
        list: &'static str,
        index: usize,
        len: usize,
    },
}

/// Structural errors found by the validator
///
/// Only the first failure is reported, in the order the checks run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Pipeline must have at least one stage")]
    NoStages,

    #[error("Pipeline name cannot be empty")]
    EmptyPipelineName,

    #[error("Stage name cannot be empty")]
    EmptyStageName { index: usize },

    #[error("Stage task cannot be empty")]
    EmptyStageTask { index: usize },

    #[error("Duplicate stage name: {name}")]
    DuplicateStageName { name: String },

    #[error("Stage '{stage}' cannot depend on itself")]
    SelfDependency { stage: String },

    #[error("Stage '{stage}' depends on undefined stage '{dependency}'")]
    UndefinedDependency { stage: String, dependency: String },

    /// Closed path through `depends_on`, first and last element equal
    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Stage '{stage}' depends on later stage '{dependency}'")]
    ForwardDependency { stage: String, dependency: String },
}
