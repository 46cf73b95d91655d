//! Fixtures for building studies in tests.

use std::sync::Arc;

use crate::errors::NiflowError;
use crate::pipeline::{Pipeline, PipelineContext, ToolInterface, ToolNode};
use crate::study::{InputMatch, Study, StudyDefinition};

/// A pipeline factory that wires every input and output through one
/// builtin node whose ports are named after the specs.
pub fn passthrough_pipeline(
    inputs: &[&str],
    outputs: &[&str],
) -> impl Fn(&PipelineContext<'_>) -> Result<Pipeline, NiflowError> + Send + Sync + 'static {
    let inputs: Vec<String> = inputs.iter().map(ToString::to_string).collect();
    let outputs: Vec<String> = outputs.iter().map(ToString::to_string).collect();
    move |ctx: &PipelineContext<'_>| {
        let mut interface = ToolInterface::builtin("passthrough");
        for name in &inputs {
            interface = interface.input(name.as_str());
        }
        for name in &outputs {
            interface = interface.output(name.as_str());
        }

        let mut builder = ctx.create_pipeline();
        for name in &inputs {
            builder = builder.input(name)?;
        }
        for name in &outputs {
            builder = builder.output(name)?;
        }
        builder = builder.add_node(ToolNode::new("passthrough", interface))?;
        for name in &inputs {
            builder = builder.connect_input(name, "passthrough", name)?;
        }
        for name in &outputs {
            builder = builder.connect_output(name, "passthrough", name)?;
        }
        builder.build()
    }
}

/// Returns an input match for every spec of `definition` without a
/// producer, each matching a scan named after the spec.
#[must_use]
pub fn all_inputs(definition: &StudyDefinition) -> Vec<InputMatch> {
    definition
        .data_specs()
        .iter()
        .filter(|spec| spec.is_input())
        .map(|spec| InputMatch::new(spec.name(), spec.name(), spec.kind()))
        .collect()
}

/// Instantiates `definition` with every study input provided.
pub fn provided_study(
    definition: &Arc<StudyDefinition>,
    name: &str,
) -> Result<Study, NiflowError> {
    Study::builder(Arc::clone(definition), name)
        .inputs(all_inputs(definition))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FileFormat;
    use crate::spec::DataSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_provided_study_covers_every_input() {
        let definition = StudyDefinition::builder("fixture")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("mask", FileFormat::NiftiGz))
            .data(DataSpec::dataset("brain", FileFormat::NiftiGz).produced_by("bet_pipeline"))
            .pipeline("bet_pipeline", passthrough_pipeline(&["primary", "mask"], &["brain"]))
            .build()
            .unwrap();
        let study = provided_study(&definition, "subject").unwrap();
        assert_eq!(study.inputs().count(), 2);
        let pipeline = study.pipeline("bet_pipeline").unwrap();
        assert_eq!(pipeline.nodes()[0].interface().inputs().len(), 2);
    }
}
