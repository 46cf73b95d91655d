//! Producer resolution: from requested names to the pipelines producing
//! them.

use indexmap::IndexMap;

use super::workflow::{DataEdge, EdgeSource, WorkflowGraph};
use crate::errors::{NiflowError, WiringError};
use crate::pipeline::Pipeline;
use crate::spec::PipelineName;
use crate::study::{InputMatch, Study};

/// Resolves `targets` in `study` into a [`WorkflowGraph`].
///
/// Provided inputs are leaves. Every other spec is produced by building
/// its producer pipeline once and recursively resolving that pipeline's
/// inputs.
pub fn resolve(study: &Study, targets: &[&str]) -> Result<WorkflowGraph, NiflowError> {
    let mut resolver = Resolver {
        study,
        built: IndexMap::new(),
        visiting: Vec::new(),
        edges: Vec::new(),
        inputs: IndexMap::new(),
    };
    for target in targets {
        resolver.resolve_spec(target, None)?;
    }

    let Resolver {
        built,
        edges,
        inputs,
        ..
    } = resolver;
    let pipelines: Vec<Pipeline> = built.into_values().collect();

    tracing::info!(
        study = %study.name(),
        targets = ?targets,
        pipelines = pipelines.len(),
        inputs = inputs.len(),
        "workflow resolved"
    );

    Ok(WorkflowGraph::new(
        study.name(),
        targets.iter().map(ToString::to_string).collect(),
        pipelines,
        edges,
        inputs.into_values().collect(),
    ))
}

struct Resolver<'a> {
    study: &'a Study,
    // insertion order is post-order, so upstream pipelines come first
    built: IndexMap<PipelineName, Pipeline>,
    visiting: Vec<PipelineName>,
    edges: Vec<DataEdge>,
    inputs: IndexMap<String, InputMatch>,
}

impl Resolver<'_> {
    fn resolve_spec(&mut self, name: &str, consumer: Option<&PipelineName>) -> Result<(), NiflowError> {
        let spec = self.study.definition().data_spec(name)?;

        if let Some(input) = self.study.input(name) {
            self.inputs
                .entry(name.to_string())
                .or_insert_with(|| input.clone());
            if let Some(consumer) = consumer {
                self.edges.push(DataEdge {
                    from: EdgeSource::StudyInput,
                    to: consumer.clone(),
                    spec: name.to_string(),
                    kind: spec.kind(),
                });
            }
            return Ok(());
        }

        let Some(producer) = spec.pipeline() else {
            return Err(WiringError::no_producer(
                self.study.name(),
                name,
                consumer.map(PipelineName::as_str),
            )
            .into());
        };

        self.ensure_built(producer)?;
        let declares = self
            .built
            .get(producer)
            .is_some_and(|pipeline| pipeline.has_output(name));
        if !declares {
            return Err(
                WiringError::missing_output(self.study.name(), producer.as_str(), name).into(),
            );
        }

        if let Some(consumer) = consumer {
            self.edges.push(DataEdge {
                from: EdgeSource::Pipeline(producer.clone()),
                to: consumer.clone(),
                spec: name.to_string(),
                kind: spec.kind(),
            });
        }
        Ok(())
    }

    fn ensure_built(&mut self, name: &PipelineName) -> Result<(), NiflowError> {
        if self.built.contains_key(name) {
            return Ok(());
        }
        if let Some(start) = self.visiting.iter().position(|p| p == name) {
            let mut path: Vec<String> = self.visiting[start..]
                .iter()
                .map(ToString::to_string)
                .collect();
            path.push(name.to_string());
            return Err(WiringError::cycle(self.study.name(), None, path).into());
        }

        self.visiting.push(name.clone());
        let pipeline = self.study.pipeline(name.as_str())?;
        for input in pipeline.inputs() {
            self.resolve_spec(input.name(), Some(name))?;
        }
        self.visiting.pop();

        tracing::debug!(study = %self.study.name(), pipeline = %name, "pipeline resolved");
        self.built.insert(name.clone(), pipeline);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use crate::formats::FileFormat;
    use crate::spec::DataSpec;
    use crate::study::StudyDefinition;
    use crate::testing::fixtures::passthrough_pipeline;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn chain() -> Arc<StudyDefinition> {
        StudyDefinition::builder("chain")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("nifti", FileFormat::NiftiGz).produced_by("conversion_pipeline"))
            .data(DataSpec::dataset("brain", FileFormat::NiftiGz).produced_by("bet_pipeline"))
            .data(DataSpec::dataset("brain_mask", FileFormat::NiftiGz).produced_by("bet_pipeline"))
            .data(DataSpec::dataset("masked", FileFormat::NiftiGz).produced_by("mask_pipeline"))
            .pipeline("conversion_pipeline", passthrough_pipeline(&["primary"], &["nifti"]))
            .pipeline("bet_pipeline", passthrough_pipeline(&["nifti"], &["brain", "brain_mask"]))
            .pipeline(
                "mask_pipeline",
                passthrough_pipeline(&["nifti", "brain_mask"], &["masked"]),
            )
            .build()
            .unwrap()
    }

    fn provided(definition: Arc<StudyDefinition>) -> Study {
        Study::builder(definition, "subject")
            .input(InputMatch::dataset("primary", "t1_mprage", FileFormat::Dicom))
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolves_in_dependency_order() {
        let study = provided(chain());
        let graph = study.workflow(&["masked"]).unwrap();
        assert_eq!(
            graph.execution_order(),
            vec!["conversion_pipeline", "bet_pipeline", "mask_pipeline"]
        );
        assert_eq!(graph.inputs().len(), 1);
        let deps: Vec<&str> = graph
            .dependencies_of("mask_pipeline")
            .into_iter()
            .map(PipelineName::as_str)
            .collect();
        assert_eq!(deps, vec!["conversion_pipeline", "bet_pipeline"]);
    }

    #[test]
    fn test_shared_producer_built_once() {
        let study = provided(chain());
        let graph = study.workflow(&["brain", "brain_mask", "masked"]).unwrap();
        assert_eq!(graph.pipelines().len(), 3);
    }

    #[test]
    fn test_provided_input_short_circuits_producer() {
        let study = Study::builder(chain(), "subject")
            .input(InputMatch::dataset("nifti", "t1.nii.gz", FileFormat::NiftiGz))
            .build()
            .unwrap();
        let graph = study.workflow(&["brain"]).unwrap();
        assert_eq!(graph.execution_order(), vec!["bet_pipeline"]);
        assert_eq!(graph.edges()[0].from, EdgeSource::StudyInput);
    }

    #[test]
    fn test_missing_input_has_no_producer() {
        let study = Study::builder(chain(), "subject").build().unwrap();
        let err = study.workflow(&["brain"]).unwrap_err();
        assert_eq!(err.code(), Some(codes::NO_PRODUCER));
        assert!(err.to_string().contains("primary"));
        assert!(err.to_string().contains("conversion_pipeline"));
    }

    #[test]
    fn test_undeclared_target_is_spec_not_found() {
        let study = provided(chain());
        let err = study.workflow(&["ref_brain"]).unwrap_err();
        assert!(err.is_spec_not_found());
    }

    #[test]
    fn test_pipeline_cycle_reports_path() {
        let looped = StudyDefinition::builder("looped")
            .data(DataSpec::dataset("a", FileFormat::Text).produced_by("a_pipeline"))
            .data(DataSpec::dataset("b", FileFormat::Text).produced_by("b_pipeline"))
            .pipeline("a_pipeline", passthrough_pipeline(&["b"], &["a"]))
            .pipeline("b_pipeline", passthrough_pipeline(&["a"], &["b"]))
            .build()
            .unwrap();
        let study = Study::builder(looped, "subject").build().unwrap();
        let err = study.workflow(&["a"]).unwrap_err();
        assert_eq!(err.code(), Some(codes::CYCLE));
        assert!(err.to_string().contains("a_pipeline -> b_pipeline -> a_pipeline"));
    }

    #[test]
    fn test_producer_must_declare_output() {
        let lazy = StudyDefinition::builder("lazy")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("a", FileFormat::Text).produced_by("p"))
            .data(DataSpec::dataset("b", FileFormat::Text).produced_by("p"))
            .pipeline("p", passthrough_pipeline(&["primary"], &["a"]))
            .build()
            .unwrap();
        let study = provided(lazy);
        let err = study.workflow(&["b"]).unwrap_err();
        assert_eq!(err.code(), Some(codes::MISSING_OUTPUT));
    }

    #[test]
    fn test_fingerprint_stable_across_builds() {
        let study = provided(chain());
        let first = study.workflow(&["masked"]).unwrap();
        let second = study.workflow(&["masked"]).unwrap();
        assert_ne!(first.build_id(), second.build_id());
        let fingerprint = first.fingerprint().unwrap();
        assert_eq!(fingerprint, second.fingerprint().unwrap());
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));

        let other = study.workflow(&["brain"]).unwrap();
        assert_ne!(fingerprint, other.fingerprint().unwrap());
    }

    #[test]
    fn test_graph_serializes_to_json() {
        let study = provided(chain());
        let graph = study.workflow(&["brain"]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
        assert_eq!(json["study"], "subject");
        assert_eq!(json["pipelines"][1]["name"], "bet_pipeline");
        assert_eq!(json["edges"][0]["from"]["type"], "study_input");
    }
}
