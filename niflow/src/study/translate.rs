//! Sub-study pipelines re-exposed under the containing study's names.

use indexmap::IndexMap;
use std::sync::Arc;

use super::sub_study::SubStudySpec;
use crate::errors::{NiflowError, WiringError};
use crate::pipeline::{Pipeline, PipelineContext, PipelineFactory, PortBinding};
use crate::spec::{DataSpec, OptionSet, OptionValue, PipelineName};

/// Returns a factory building the pipeline `pipeline` of the sub-study
/// `sub_study` and renaming its ports into the containing study.
///
/// Options of the containing study that map into the sub-study are passed
/// down; `fixed` options (component names) are applied last.
pub fn translate(
    sub_study: impl Into<String>,
    pipeline: impl Into<PipelineName>,
    fixed: impl IntoIterator<Item = (String, OptionValue)>,
) -> PipelineFactory {
    translated_factory(sub_study.into(), pipeline.into(), fixed.into_iter().collect())
}

pub(crate) fn translated_factory(
    sub_study: String,
    pipeline: PipelineName,
    fixed: Vec<(String, OptionValue)>,
) -> PipelineFactory {
    Arc::new(move |ctx: &PipelineContext<'_>| build_translated(ctx, &sub_study, &pipeline, &fixed))
}

fn build_translated(
    ctx: &PipelineContext<'_>,
    sub_name: &str,
    pipeline: &PipelineName,
    fixed: &[(String, OptionValue)],
) -> Result<Pipeline, NiflowError> {
    let parent = ctx.study();
    let sub = parent.definition().sub_study_spec(sub_name)?;
    let child = parent.sub_study(sub_name)?;

    let mut overrides: IndexMap<String, OptionValue> = IndexMap::new();
    for (name, value) in ctx.options().iter() {
        if let Ok(internal) = sub.map(name) {
            if child.definition().option_specs().contains(&internal) {
                overrides.insert(internal, value.clone());
            }
        }
    }
    for (name, value) in fixed {
        overrides.insert(name.clone(), value.clone());
    }

    let inner = child.pipeline_with(pipeline.as_str(), &overrides)?;
    let translated = rename(ctx, sub, inner)?;

    tracing::debug!(
        study = %parent.name(),
        sub_study = %sub_name,
        pipeline = %translated.name,
        inner = %pipeline,
        "sub-study pipeline translated"
    );
    Ok(translated)
}

fn rename(
    ctx: &PipelineContext<'_>,
    sub: &SubStudySpec,
    inner: Pipeline,
) -> Result<Pipeline, NiflowError> {
    let study = ctx.study().name();
    let name = ctx.pipeline_name();

    let mut inputs = Vec::with_capacity(inner.inputs.len());
    let mut input_names: IndexMap<String, String> = IndexMap::new();
    for spec in &inner.inputs {
        let external = translated_spec(ctx, sub, spec)?;
        input_names.insert(spec.name().to_string(), external.name().to_string());
        inputs.push(external);
    }

    let mut outputs = Vec::with_capacity(inner.outputs.len());
    let mut output_names: IndexMap<String, String> = IndexMap::new();
    let mut pruned: Vec<(String, Option<String>)> = Vec::new();
    for spec in &inner.outputs {
        let external = translated_spec(ctx, sub, spec)?;
        if external.is_produced_by(name.as_str()) {
            output_names.insert(spec.name().to_string(), external.name().to_string());
            outputs.push(external);
        } else {
            tracing::debug!(
                study = %study,
                pipeline = %name,
                spec = %external.name(),
                producer = ?external.pipeline().map(PipelineName::as_str),
                "translated output pruned"
            );
            pruned.push((
                external.name().to_string(),
                external.pipeline().map(ToString::to_string),
            ));
        }
    }
    if outputs.is_empty() {
        if let Some((spec, producer)) = pruned.first() {
            return Err(WiringError::foreign_output(study, name.as_str(), spec, producer.as_deref()).into());
        }
    }

    let input_bindings = rebind(inner.input_bindings, &input_names);
    let output_bindings = rebind(inner.output_bindings, &output_names);

    let mut options = IndexMap::new();
    for (option, value) in inner.options.iter() {
        let external = sub.inverse_map(option)?;
        options.insert(external, value.clone());
    }

    Ok(Pipeline {
        name: name.clone(),
        study: study.to_string(),
        desc: inner.desc,
        version: inner.version,
        inputs,
        outputs,
        nodes: inner.nodes,
        connections: inner.connections,
        input_bindings,
        output_bindings,
        options: OptionSet::new(study, options),
        citations: inner.citations,
        requirements: inner.requirements,
    })
}

/// Looks up the containing study's spec for a component spec and checks
/// the two agree on kind.
fn translated_spec(
    ctx: &PipelineContext<'_>,
    sub: &SubStudySpec,
    spec: &DataSpec,
) -> Result<DataSpec, NiflowError> {
    let external = sub.inverse_map(spec.name())?;
    let outer = ctx.data_spec(&external)?;
    if outer.kind() != spec.kind() {
        return Err(WiringError::kind_mismatch(
            ctx.study().name(),
            ctx.pipeline_name().as_str(),
            &external,
            outer.kind(),
            spec.kind(),
        )
        .into());
    }
    Ok(outer.clone())
}

fn rebind(bindings: Vec<PortBinding>, names: &IndexMap<String, String>) -> Vec<PortBinding> {
    bindings
        .into_iter()
        .filter_map(|binding| {
            names.get(&binding.spec).map(|external| PortBinding {
                spec: external.clone(),
                ..binding
            })
        })
        .collect()
}
