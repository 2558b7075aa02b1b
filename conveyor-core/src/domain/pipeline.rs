//! Pipeline definitions
//!
//! The pipeline-under-edit. Every edit takes `&self` and returns a fresh
//! definition; an edit with a bad index returns `ModelError` instead.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::kv::{KeyValueList, Part};
use crate::domain::stage::{StageDefinition, StageField};
use crate::error::ModelError;

/// Pipeline definition
///
/// Stage order matters: it is the display order and the only direction in
/// which dependencies may point (a stage depends on earlier stages).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name; fixed once the pipeline exists on the server
    pub name: String,

    /// Execution mode flag, interpreted by the execution engine
    pub parallel: bool,

    pub stages: Vec<StageDefinition>,

    /// Pipeline-scoped variables
    pub variables: KeyValueList,
}

impl PipelineDefinition {
    /// Template for a new pipeline: sequential, one blank stage
    pub fn template() -> Self {
        Self {
            stages: vec![StageDefinition::default()],
            ..Self::default()
        }
    }

    pub fn new(name: impl Into<String>, stages: Vec<StageDefinition>) -> Self {
        Self {
            name: name.into(),
            stages,
            ..Self::default()
        }
    }

    /// Stage at `index`, or a range error
    pub fn stage(&self, index: usize) -> Result<&StageDefinition, ModelError> {
        self.stages.get(index).ok_or(ModelError::StageOutOfRange {
            index,
            len: self.stages.len(),
        })
    }

    /// Apply `edit` to stage `index`, producing a new definition
    fn map_stage<F>(&self, index: usize, edit: F) -> Result<Self, ModelError>
    where
        F: FnOnce(&StageDefinition) -> Result<StageDefinition, ModelError>,
    {
        let updated = edit(self.stage(index)?)?;
        let mut pipeline = self.clone();
        pipeline.stages[index] = updated;
        Ok(pipeline)
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut pipeline = self.clone();
        pipeline.name = name.into();
        pipeline
    }

    pub fn with_parallel(&self, parallel: bool) -> Self {
        let mut pipeline = self.clone();
        pipeline.parallel = parallel;
        pipeline
    }

    // =============================================================================
    // Stages
    // =============================================================================

    pub fn add_stage(&self) -> Self {
        let mut pipeline = self.clone();
        pipeline.stages.push(StageDefinition::default());
        pipeline
    }

    /// Remove stage `index`
    ///
    /// References to the removed stage are stripped from every other stage's
    /// `depends_on`, so no dangling dependency survives the removal.
    pub fn remove_stage(&self, index: usize) -> Result<Self, ModelError> {
        let removed = self.stage(index)?;
        let mut pipeline = self.clone();
        pipeline.stages.remove(index);

        if !removed.name.is_empty() && !pipeline.stages.iter().any(|s| s.name == removed.name) {
            for stage in pipeline.stages.iter_mut() {
                if stage.depends_on.contains(&removed.name) {
                    debug!(
                        "Dropping dependency '{}' from stage '{}'",
                        removed.name, stage.name
                    );
                    *stage = stage.without_references_to(&removed.name);
                }
            }
        }

        Ok(pipeline)
    }

    pub fn set_stage_field(&self, index: usize, field: StageField) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| Ok(stage.with_field(field)))
    }

    // =============================================================================
    // Dependencies
    // =============================================================================

    /// Add `stage_name` to stage `index`'s dependencies
    ///
    /// Blank names and names already present are ignored.
    pub fn add_dependency(&self, index: usize, stage_name: &str) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| Ok(stage.with_dependency(stage_name)))
    }

    pub fn remove_dependency(&self, index: usize, dep_index: usize) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| stage.without_dependency(dep_index))
    }

    /// Stages that may be offered as new dependencies for stage `index`
    ///
    /// Earlier stages only, excluding blank names and stages already depended on.
    pub fn candidate_dependencies(&self, index: usize) -> Result<Vec<&str>, ModelError> {
        let stage = self.stage(index)?;
        Ok(self.stages[..index]
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !name.trim().is_empty())
            .filter(|name| !stage.depends_on.iter().any(|d| d == name))
            .collect())
    }

    // =============================================================================
    // Arguments
    // =============================================================================

    pub fn add_arg(&self, index: usize) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| Ok(stage.with_arg()))
    }

    pub fn update_arg(
        &self,
        index: usize,
        arg_index: usize,
        value: impl Into<String>,
    ) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| stage.with_arg_value(arg_index, value))
    }

    pub fn remove_arg(&self, index: usize, arg_index: usize) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| stage.without_arg(arg_index))
    }

    // =============================================================================
    // Environment
    // =============================================================================

    pub fn add_env_var(&self, index: usize) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| Ok(stage.with_env_var()))
    }

    /// Replace env row `env_index` of stage `index` with a raw `KEY=VALUE` string
    pub fn update_env_var(
        &self,
        index: usize,
        env_index: usize,
        raw: &str,
    ) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| stage.with_env_value(env_index, raw))
    }

    pub fn remove_env_var(&self, index: usize, env_index: usize) -> Result<Self, ModelError> {
        self.map_stage(index, |stage| stage.without_env_var(env_index))
    }

    // =============================================================================
    // Variables
    // =============================================================================

    pub fn add_variable(&self) -> Self {
        let mut pipeline = self.clone();
        pipeline.variables = pipeline.variables.push_empty();
        pipeline
    }

    pub fn update_variable(
        &self,
        index: usize,
        value: impl Into<String>,
        part: Part,
    ) -> Result<Self, ModelError> {
        let variables = self.variables.update(index, part, value)?;
        let mut pipeline = self.clone();
        pipeline.variables = variables;
        Ok(pipeline)
    }

    pub fn remove_variable(&self, index: usize) -> Result<Self, ModelError> {
        let variables = self.variables.remove(index)?;
        let mut pipeline = self.clone();
        pipeline.variables = variables;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::kv::KeyValue;

    fn three_stage() -> PipelineDefinition {
        PipelineDefinition::new(
            "ci",
            vec![
                StageDefinition::new("checkout", "git pull"),
                StageDefinition::new("build", "cargo build").with_dependency("checkout"),
                StageDefinition::new("test", "cargo test")
                    .with_dependency("checkout")
                    .with_dependency("build"),
            ],
        )
    }

    fn names(pipeline: &PipelineDefinition) -> Vec<&str> {
        pipeline.stages.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_template_has_one_blank_stage() {
        let pipeline = PipelineDefinition::template();
        assert_eq!(pipeline.stages.len(), 1);
        assert!(!pipeline.parallel);
        assert!(pipeline.variables.is_empty());
        assert_eq!(pipeline.stages[0], StageDefinition::default());
    }

    #[test]
    fn test_add_stage_leaves_original_untouched() {
        let original = three_stage();
        let updated = original.add_stage();

        assert_eq!(original.stages.len(), 3);
        assert_eq!(updated.stages.len(), 4);
        assert_eq!(updated.stages[3], StageDefinition::default());
    }

    #[test]
    fn test_remove_stage_reduces_length_and_keeps_order() {
        let pipeline = three_stage();
        for i in 0..pipeline.stages.len() {
            let updated = pipeline.remove_stage(i).unwrap();
            assert_eq!(updated.stages.len(), pipeline.stages.len() - 1);

            let mut expected = names(&pipeline);
            expected.remove(i);
            assert_eq!(names(&updated), expected);
        }
    }

    #[test]
    fn test_remove_stage_strips_references() {
        let updated = three_stage().remove_stage(1).unwrap();
        assert_eq!(updated.stages[1].name, "test");
        assert_eq!(updated.stages[1].depends_on, vec!["checkout"]);
    }

    #[test]
    fn test_remove_stage_keeps_references_to_duplicate_name() {
        let pipeline = PipelineDefinition::new(
            "dup",
            vec![
                StageDefinition::new("a", "x"),
                StageDefinition::new("a", "y"),
                StageDefinition::new("b", "z").with_dependency("a"),
            ],
        );
        let updated = pipeline.remove_stage(0).unwrap();
        assert_eq!(updated.stages[1].depends_on, vec!["a"]);
    }

    #[test]
    fn test_remove_stage_out_of_range() {
        let err = three_stage().remove_stage(3).unwrap_err();
        assert_eq!(err, ModelError::StageOutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn test_set_stage_field() {
        let pipeline = PipelineDefinition::template()
            .set_stage_field(0, StageField::Name("lint".into()))
            .unwrap()
            .set_stage_field(0, StageField::Task("cargo clippy".into()))
            .unwrap()
            .set_stage_field(0, StageField::Skip(true))
            .unwrap();

        let stage = &pipeline.stages[0];
        assert_eq!(stage.name, "lint");
        assert_eq!(stage.task, "cargo clippy");
        assert!(stage.skip);
        assert!(pipeline.set_stage_field(1, StageField::Skip(false)).is_err());
    }

    #[test]
    fn test_add_dependency_is_idempotent() {
        let pipeline = three_stage()
            .add_dependency(1, "checkout")
            .unwrap()
            .add_dependency(1, "checkout")
            .unwrap();
        assert_eq!(pipeline.stages[1].depends_on, vec!["checkout"]);
    }

    #[test]
    fn test_remove_dependency() {
        let pipeline = three_stage().remove_dependency(2, 0).unwrap();
        assert_eq!(pipeline.stages[2].depends_on, vec!["build"]);
        assert!(pipeline.remove_dependency(2, 1).is_err());
    }

    #[test]
    fn test_candidate_dependencies() {
        let pipeline = three_stage().add_stage();

        assert!(pipeline.candidate_dependencies(0).unwrap().is_empty());
        assert!(pipeline.candidate_dependencies(2).unwrap().is_empty());
        assert_eq!(
            pipeline.candidate_dependencies(3).unwrap(),
            vec!["checkout", "build", "test"]
        );

        let pipeline = pipeline.add_stage();
        assert_eq!(
            pipeline.candidate_dependencies(4).unwrap(),
            vec!["checkout", "build", "test"]
        );
    }

    #[test]
    fn test_arg_and_env_edits_through_pipeline() {
        let pipeline = three_stage()
            .add_arg(0)
            .unwrap()
            .update_arg(0, 0, "--rebase")
            .unwrap()
            .add_env_var(0)
            .unwrap()
            .update_env_var(0, 0, "GIT_TRACE=1")
            .unwrap();

        assert_eq!(pipeline.stages[0].args, vec!["--rebase"]);
        assert_eq!(
            pipeline.stages[0].env.entries()[0],
            KeyValue::new("GIT_TRACE", "1")
        );

        let pipeline = pipeline.remove_arg(0, 0).unwrap().remove_env_var(0, 0).unwrap();
        assert!(pipeline.stages[0].args.is_empty());
        assert!(pipeline.stages[0].env.is_empty());
    }

    #[test]
    fn test_variable_edits() {
        let pipeline = PipelineDefinition::template()
            .add_variable()
            .update_variable(0, "TARGET", Part::Key)
            .unwrap()
            .update_variable(0, "release", Part::Value)
            .unwrap()
            .add_variable();

        assert_eq!(pipeline.variables.len(), 2);
        assert_eq!(pipeline.variables.to_map().len(), 1);

        let pipeline = pipeline.remove_variable(1).unwrap();
        assert_eq!(pipeline.variables.len(), 1);
        assert!(pipeline.remove_variable(1).is_err());
    }
}
