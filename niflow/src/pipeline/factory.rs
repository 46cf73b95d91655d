use std::sync::Arc;

use super::{Pipeline, PipelineBuilder};
use crate::errors::{NiflowError, SpecNotFoundError};
use crate::spec::{DataSpec, OptionSet, OptionValue, PipelineName};
use crate::study::{Study, StudyDefinition, SubStudySpec};

/// A registered pipeline constructor.
///
/// Factories are resolved by [`PipelineName`] when a study definition is
/// composed and called with a [`PipelineContext`] at build time.
pub type PipelineFactory =
    Arc<dyn Fn(&PipelineContext<'_>) -> Result<Pipeline, NiflowError> + Send + Sync>;

/// Everything a factory sees while building one pipeline.
#[derive(Debug)]
pub struct PipelineContext<'a> {
    study: &'a Study,
    name: PipelineName,
    options: OptionSet,
}

impl<'a> PipelineContext<'a> {
    pub(crate) const fn new(study: &'a Study, name: PipelineName, options: OptionSet) -> Self {
        Self {
            study,
            name,
            options,
        }
    }

    /// Returns the study instance the pipeline is built for.
    #[must_use]
    pub const fn study(&self) -> &'a Study {
        self.study
    }

    /// Returns the study definition.
    #[must_use]
    pub fn definition(&self) -> &'a StudyDefinition {
        self.study.definition()
    }

    /// Returns the name the pipeline is built under.
    #[must_use]
    pub const fn pipeline_name(&self) -> &PipelineName {
        &self.name
    }

    /// Returns the resolved options.
    #[must_use]
    pub const fn options(&self) -> &OptionSet {
        &self.options
    }

    /// Returns one resolved option.
    pub fn option(&self, name: &str) -> Result<&OptionValue, SpecNotFoundError> {
        self.options.get(name)
    }

    /// Looks up a data spec in the study's registry.
    pub fn data_spec(&self, name: &str) -> Result<&'a DataSpec, SpecNotFoundError> {
        self.definition().data_spec(name)
    }

    /// Iterates over the study's sub-study specs in declaration order.
    pub fn sub_study_specs(&self) -> impl Iterator<Item = &'a SubStudySpec> {
        self.definition().sub_study_specs()
    }

    /// Returns true if the study instance was given `name` as an input.
    #[must_use]
    pub fn is_provided(&self, name: &str) -> bool {
        self.study.is_provided(name)
    }

    /// Starts declaring the pipeline.
    #[must_use]
    pub fn create_pipeline(&self) -> PipelineBuilder<'a> {
        PipelineBuilder::new(self.study, self.name.clone(), self.options.clone())
    }
}
