//! Core domain types
//!
//! This module contains the in-memory structures the editor works on.
//! Definitions are edited through methods that return a new value, so any
//! earlier value stays valid for undo or change detection.

pub mod kv;
pub mod pipeline;
pub mod run;
pub mod stage;

pub use kv::{KeyValue, KeyValueList, Part};
pub use pipeline::PipelineDefinition;
pub use run::{RunRecord, StageRun};
pub use stage::{StageDefinition, StageField};
