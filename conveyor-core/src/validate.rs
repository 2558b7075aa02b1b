//! Pipeline validation
//!
//! Structural checks run before a definition is submitted. Checks run in a
//! fixed order and stop at the first failure:
//!
//! 1. at least one stage
//! 2. pipeline name
//! 3. stage names and tasks
//! 4. duplicate stage names
//! 5. self and undefined dependencies
//! 6. dependency cycles
//! 7. dependencies on later stages
//!
//! Names and tasks are checked before anything graph-related, since a graph
//! keyed on blank names means nothing.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::domain::pipeline::PipelineDefinition;
use crate::error::ValidationError;

/// `{NAME}` placeholders in tasks and working directories
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Validate a pipeline definition
///
/// # Returns
/// `Ok(())` if the definition can be submitted, otherwise the first error found
pub fn validate(pipeline: &PipelineDefinition) -> Result<(), ValidationError> {
    let result = run_checks(pipeline);
    if let Err(err) = &result {
        debug!("Pipeline '{}' failed validation: {}", pipeline.name, err);
    }
    result
}

fn run_checks(pipeline: &PipelineDefinition) -> Result<(), ValidationError> {
    if pipeline.stages.is_empty() {
        return Err(ValidationError::NoStages);
    }

    if pipeline.name.trim().is_empty() {
        return Err(ValidationError::EmptyPipelineName);
    }

    for (index, stage) in pipeline.stages.iter().enumerate() {
        if stage.name.trim().is_empty() {
            return Err(ValidationError::EmptyStageName { index });
        }
        if stage.task.trim().is_empty() {
            return Err(ValidationError::EmptyStageTask { index });
        }
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, stage) in pipeline.stages.iter().enumerate() {
        if positions.insert(stage.name.as_str(), index).is_some() {
            return Err(ValidationError::DuplicateStageName {
                name: stage.name.clone(),
            });
        }
    }

    for stage in &pipeline.stages {
        for dependency in &stage.depends_on {
            if dependency == &stage.name {
                return Err(ValidationError::SelfDependency {
                    stage: stage.name.clone(),
                });
            }
            if !positions.contains_key(dependency.as_str()) {
                return Err(ValidationError::UndefinedDependency {
                    stage: stage.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    if let Some(path) = find_cycle(pipeline) {
        return Err(ValidationError::Cycle { path });
    }

    for (index, stage) in pipeline.stages.iter().enumerate() {
        for dependency in &stage.depends_on {
            if positions[dependency.as_str()] > index {
                return Err(ValidationError::ForwardDependency {
                    stage: stage.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// First dependency cycle found, as a closed path (`a -> b -> a`)
///
/// Stages are visited in definition order and dependencies in listed order,
/// so the reported cycle is deterministic. Unknown dependency names are
/// ignored here.
pub fn find_cycle(pipeline: &PipelineDefinition) -> Option<Vec<String>> {
    let graph: HashMap<&str, Vec<&str>> = pipeline
        .stages
        .iter()
        .map(|s| {
            (
                s.name.as_str(),
                s.depends_on.iter().map(String::as_str).collect(),
            )
        })
        .collect();

    let mut marks: HashMap<&str, Mark> = graph.keys().map(|k| (*k, Mark::Unvisited)).collect();
    let mut stack: Vec<&str> = Vec::new();

    for stage in &pipeline.stages {
        if marks[stage.name.as_str()] == Mark::Unvisited {
            if let Some(cycle) = visit(stage.name.as_str(), &graph, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }

    None
}

fn visit<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    marks.insert(node, Mark::InProgress);
    stack.push(node);

    for &next in graph.get(node).into_iter().flatten() {
        match marks.get(next).copied() {
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|n| *n == next).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(next.to_string());
                return Some(path);
            }
            Some(Mark::Unvisited) => {
                if let Some(cycle) = visit(next, graph, marks, stack) {
                    return Some(cycle);
                }
            }
            Some(Mark::Done) | None => {}
        }
    }

    stack.pop();
    marks.insert(node, Mark::Done);
    None
}

/// Variables referenced as `{NAME}` in a task, argument, working directory or
/// environment value but not defined in the pipeline's complete variables
///
/// Advisory only; the server may supply variables from a variable file.
/// Names are returned once each, in order of first use.
pub fn missing_variables(pipeline: &PipelineDefinition) -> Vec<String> {
    let defined = pipeline.variables.to_map();
    let mut seen = HashSet::new();
    let mut missing = Vec::new();

    let texts = pipeline.stages.iter().flat_map(|s| {
        std::iter::once(s.task.as_str())
            .chain(s.args.iter().map(String::as_str))
            .chain(s.pwd.as_deref())
            .chain(s.env.entries().iter().map(|kv| kv.value.as_str()))
    });

    for text in texts {
        for captures in PLACEHOLDER.captures_iter(text) {
            let name = &captures[1];
            if !defined.contains_key(name) && seen.insert(name.to_string()) {
                missing.push(name.to_string());
            }
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::kv::Part;
    use crate::domain::stage::{StageDefinition, StageField};

    fn stage(name: &str, deps: &[&str]) -> StageDefinition {
        deps.iter()
            .fold(StageDefinition::new(name, "run"), |s, d| s.with_dependency(d))
    }

    fn pipeline(stages: Vec<StageDefinition>) -> PipelineDefinition {
        PipelineDefinition::new("ci", stages)
    }

    #[test]
    fn test_valid_pipeline() {
        let p = pipeline(vec![
            stage("a", &[]),
            stage("b", &["a"]),
            stage("c", &["a", "b"]),
        ]);
        assert_eq!(validate(&p), Ok(()));
    }

    #[test]
    fn test_no_stages_reported_first() {
        let p = PipelineDefinition::default();
        assert_eq!(validate(&p), Err(ValidationError::NoStages));

        let p = PipelineDefinition::new("  ", vec![]);
        assert_eq!(validate(&p), Err(ValidationError::NoStages));
    }

    #[test]
    fn test_blank_pipeline_name() {
        let p = PipelineDefinition::new(" ", vec![stage("a", &[])]);
        assert_eq!(validate(&p), Err(ValidationError::EmptyPipelineName));
    }

    #[test]
    fn test_blank_stage_name_and_task() {
        let p = pipeline(vec![stage("a", &[]), StageDefinition::new("  ", "run")]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::EmptyStageName { index: 1 })
        );

        let p = pipeline(vec![StageDefinition::new("a", " \t")]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::EmptyStageTask { index: 0 })
        );
    }

    #[test]
    fn test_names_checked_before_dependencies() {
        let p = pipeline(vec![stage("a", &["ghost"]), StageDefinition::new("", "run")]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::EmptyStageName { index: 1 })
        );
    }

    #[test]
    fn test_duplicate_stage_name() {
        let p = pipeline(vec![stage("a", &[]), stage("a", &[])]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::DuplicateStageName { name: "a".into() })
        );
    }

    #[test]
    fn test_self_and_undefined_dependencies() {
        let p = pipeline(vec![stage("a", &["a"])]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::SelfDependency { stage: "a".into() })
        );

        let p = pipeline(vec![stage("a", &[]), stage("b", &["gone"])]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::UndefinedDependency {
                stage: "b".into(),
                dependency: "gone".into()
            })
        );
    }

    #[test]
    fn test_cycle_detected_in_loaded_pipeline() {
        let p = pipeline(vec![
            stage("a", &["c"]),
            stage("b", &["a"]),
            stage("c", &["b"]),
        ]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::Cycle {
                path: vec!["a".into(), "c".into(), "b".into(), "a".into()]
            })
        );
    }

    #[test]
    fn test_forward_dependency_without_cycle() {
        let p = pipeline(vec![stage("a", &["b"]), stage("b", &[])]);
        assert_eq!(
            validate(&p),
            Err(ValidationError::ForwardDependency {
                stage: "a".into(),
                dependency: "b".into()
            })
        );
    }

    #[test]
    fn test_find_cycle_none_for_diamond() {
        let p = pipeline(vec![
            stage("a", &[]),
            stage("b", &["a"]),
            stage("c", &["a"]),
            stage("d", &["b", "c"]),
        ]);
        assert!(find_cycle(&p).is_none());
    }

    #[test]
    fn test_missing_variables() {
        let p = pipeline(vec![
            StageDefinition::new("build", "make {TARGET} {JOBS}")
                .with_field(StageField::Pwd(Some("/src/{REPO}".into()))),
            StageDefinition::new("ship", "scp {TARGET} {HOST}"),
        ])
        .add_variable()
        .update_variable(0, "JOBS", Part::Key)
        .unwrap()
        .update_variable(0, "4", Part::Value)
        .unwrap();

        assert_eq!(missing_variables(&p), vec!["TARGET", "REPO", "HOST"]);
    }

    #[test]
    fn test_missing_variables_in_args_and_env() {
        let transcode = StageDefinition::new("transcode", "node")
            .with_arg()
            .with_arg_value(0, "{action}")
            .unwrap()
            .with_env_var()
            .with_env_value(0, "FFMPEG_PATH={ffmpeg_path}")
            .unwrap();
        let p = pipeline(vec![transcode]);

        assert_eq!(missing_variables(&p), vec!["action", "ffmpeg_path"]);

        let p = p
            .add_variable()
            .update_variable(0, "action", Part::Key)
            .unwrap()
            .update_variable(0, "encode", Part::Value)
            .unwrap();
        assert_eq!(missing_variables(&p), vec!["ffmpeg_path"]);
    }
}
