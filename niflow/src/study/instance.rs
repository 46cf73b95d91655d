use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

use super::definition::StudyDefinition;
use crate::errors::{ConfigError, NameKind, NameNotFoundError, NiflowError, SpecificationError};
use crate::formats::{FileFormat, ScalarType};
use crate::graph::{self, WorkflowGraph};
use crate::pipeline::{Pipeline, PipelineContext};
use crate::spec::{DataKind, OptionSet, OptionValue, PipelineName};

/// Externally supplied data bound to a registry name.
#[derive(Debug, Clone, Serialize)]
pub struct InputMatch {
    name: String,
    kind: DataKind,
    pattern: String,
    is_regex: bool,
    #[serde(skip)]
    regex: Option<Regex>,
}

impl InputMatch {
    /// Binds `name` to data matching `pattern` exactly.
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            kind,
            pattern: pattern.into(),
            is_regex: false,
            regex: None,
        }
    }

    /// Binds a dataset input.
    #[must_use]
    pub fn dataset(name: impl Into<String>, pattern: impl Into<String>, format: FileFormat) -> Self {
        Self::new(name, pattern, DataKind::Dataset(format))
    }

    /// Binds a field input.
    #[must_use]
    pub fn field(name: impl Into<String>, pattern: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, pattern, DataKind::Field(ty))
    }

    /// Binds `name` to data whose identifier matches the regular
    /// expression `pattern`.
    pub fn regex(
        name: impl Into<String>,
        pattern: impl Into<String>,
        kind: DataKind,
    ) -> Result<Self, NiflowError> {
        let name = name.into();
        let pattern = pattern.into();
        let regex = Regex::new(&pattern).map_err(|_| ConfigError::InvalidValue {
            name: format!("input pattern for '{name}'"),
            value: pattern.clone(),
        })?;
        Ok(Self {
            name,
            kind,
            pattern,
            is_regex: true,
            regex: Some(regex),
        })
    }

    /// Returns the bound registry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the expected kind.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Returns the pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns true if the pattern is a regular expression.
    #[must_use]
    pub const fn is_regex(&self) -> bool {
        self.is_regex
    }

    /// Returns true if `candidate` (a scan or file name) is selected.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(candidate),
            None => self.pattern == candidate,
        }
    }

    /// Returns the same match bound to another name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// A study instance: a definition with option overrides, provided inputs
/// and one owned instance per sub-study.
#[derive(Debug, Clone)]
pub struct Study {
    name: String,
    definition: Arc<StudyDefinition>,
    options: IndexMap<String, OptionValue>,
    inputs: IndexMap<String, InputMatch>,
    sub_studies: IndexMap<String, Study>,
}

impl Study {
    /// Starts building an instance of `definition`.
    #[must_use]
    pub fn builder(definition: Arc<StudyDefinition>, name: impl Into<String>) -> StudyInstanceBuilder {
        StudyInstanceBuilder {
            definition,
            name: name.into(),
            options: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Returns the instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the definition.
    #[must_use]
    pub fn definition(&self) -> &StudyDefinition {
        &self.definition
    }

    /// Returns the shared definition handle.
    #[must_use]
    pub const fn definition_arc(&self) -> &Arc<StudyDefinition> {
        &self.definition
    }

    /// Returns the instance of a sub-study.
    pub fn sub_study(&self, name: &str) -> Result<&Self, NameNotFoundError> {
        self.sub_studies
            .get(name)
            .ok_or_else(|| NameNotFoundError::new(NameKind::SubStudy, name, &self.name))
    }

    /// Iterates over sub-study instances in declaration order.
    pub fn sub_studies(&self) -> impl Iterator<Item = (&str, &Self)> {
        self.sub_studies.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the effective value of an option: the instance override or
    /// the declared default.
    pub fn option(&self, name: &str) -> Result<&OptionValue, NiflowError> {
        if let Some(value) = self.options.get(name) {
            return Ok(value);
        }
        Ok(self.definition.option_spec(name)?.default_value())
    }

    /// Resolves every option of the study, applying per-build `overrides`
    /// over instance overrides over defaults.
    ///
    /// # Errors
    ///
    /// Fails if an override names an undeclared option or has the wrong
    /// type.
    pub fn resolve_options(
        &self,
        overrides: &IndexMap<String, OptionValue>,
    ) -> Result<OptionSet, NiflowError> {
        for (name, value) in overrides {
            self.definition.option_spec(name)?.check(&self.name, value)?;
        }
        let values = self
            .definition
            .option_specs()
            .iter()
            .map(|spec| {
                let value = overrides
                    .get(spec.name())
                    .or_else(|| self.options.get(spec.name()))
                    .unwrap_or_else(|| spec.default_value());
                (spec.name().to_string(), value.clone())
            })
            .collect();
        Ok(OptionSet::new(&self.name, values))
    }

    /// Returns the provided input bound to `name`, if any.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&InputMatch> {
        self.inputs.get(name)
    }

    /// Iterates over provided inputs.
    pub fn inputs(&self) -> impl Iterator<Item = &InputMatch> {
        self.inputs.values()
    }

    /// Returns true if `name` was provided as an input.
    #[must_use]
    pub fn is_provided(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    /// Builds the pipeline registered under `name` with the instance's
    /// options.
    pub fn pipeline(&self, name: &str) -> Result<Pipeline, NiflowError> {
        self.pipeline_with(name, &IndexMap::new())
    }

    /// Builds the pipeline registered under `name` with per-build option
    /// overrides.
    pub fn pipeline_with(
        &self,
        name: &str,
        overrides: &IndexMap<String, OptionValue>,
    ) -> Result<Pipeline, NiflowError> {
        let factory = self.definition.pipeline_factory(name)?;
        let options = self.resolve_options(overrides)?;
        let ctx = PipelineContext::new(self, PipelineName::new(name), options);
        factory(&ctx)
    }

    /// Resolves `targets` to the validated graph of pipelines that
    /// produce them.
    ///
    /// # Errors
    ///
    /// Fails on undeclared targets, specs without producer that were not
    /// provided, pipeline build failures and dependency cycles.
    pub fn workflow(&self, targets: &[&str]) -> Result<WorkflowGraph, NiflowError> {
        graph::resolve(self, targets)
    }
}

/// Builds a [`Study`] instance.
#[must_use]
#[derive(Debug)]
pub struct StudyInstanceBuilder {
    definition: Arc<StudyDefinition>,
    name: String,
    options: Vec<(String, OptionValue)>,
    inputs: Vec<InputMatch>,
}

impl StudyInstanceBuilder {
    /// Overrides an option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    /// Provides an input.
    pub fn input(mut self, input: InputMatch) -> Self {
        self.inputs.push(input);
        self
    }

    /// Provides several inputs.
    pub fn inputs(mut self, inputs: impl IntoIterator<Item = InputMatch>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Validates overrides and inputs and creates the sub-study instances.
    ///
    /// # Errors
    ///
    /// Fails if an option or input names something the study does not
    /// declare, an option value has the wrong type, an input has the
    /// wrong kind, or an input is provided twice.
    pub fn build(self) -> Result<Study, NiflowError> {
        let Self {
            definition,
            name,
            options: raw_options,
            inputs: raw_inputs,
        } = self;

        let mut options = IndexMap::new();
        for (option, value) in raw_options {
            definition.option_spec(&option)?.check(&name, &value)?;
            options.insert(option, value);
        }

        let mut inputs: IndexMap<String, InputMatch> = IndexMap::new();
        for input in raw_inputs {
            let spec = definition.data_spec(input.name())?;
            if spec.kind() != input.kind() {
                return Err(SpecificationError::type_mismatch(
                    &name,
                    input.name(),
                    spec.kind(),
                    input.kind(),
                )
                .into());
            }
            if inputs.contains_key(input.name()) {
                return Err(SpecificationError::duplicate(&name, "input", input.name()).into());
            }
            inputs.insert(input.name().to_string(), input);
        }

        let mut sub_studies = IndexMap::new();
        for sub in definition.sub_study_specs() {
            let mut child = Study::builder(Arc::clone(sub.study()), format!("{name}_{}", sub.name()));
            for (option, value) in &options {
                if let Ok(internal) = sub.map(option) {
                    if sub.study().option_specs().contains(&internal) {
                        child = child.option(internal, value.clone());
                    }
                }
            }
            for input in inputs.values() {
                if let Ok(internal) = sub.map(input.name()) {
                    if sub.study().data_specs().contains(&internal) {
                        child = child.input(input.renamed(internal));
                    }
                }
            }
            sub_studies.insert(sub.name().to_string(), child.build()?);
        }

        tracing::debug!(
            study = %name,
            definition = %definition.name(),
            options = options.len(),
            inputs = inputs.len(),
            sub_studies = sub_studies.len(),
            "study instance created"
        );

        Ok(Study {
            name,
            definition,
            options,
            inputs,
            sub_studies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use crate::spec::{DataSpec, OptionSpec};
    use crate::testing::fixtures::passthrough_pipeline;
    use pretty_assertions::assert_eq;

    fn component() -> Arc<StudyDefinition> {
        StudyDefinition::builder("t1")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("preproc", FileFormat::NiftiGz).produced_by("preproc_pipeline"))
            .option(OptionSpec::new("bet_frac", 0.5))
            .option(OptionSpec::new("dof", 6))
            .pipeline("preproc_pipeline", passthrough_pipeline(&["primary"], &["preproc"]))
            .build()
            .unwrap()
    }

    fn composite() -> Arc<StudyDefinition> {
        StudyDefinition::builder("multi")
            .sub_study("t1_0", component(), [("frac", "bet_frac")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_option_override_and_default() {
        let study = Study::builder(component(), "subject")
            .option("bet_frac", 0.3)
            .build()
            .unwrap();
        assert_eq!(study.option("bet_frac").unwrap(), &OptionValue::Float(0.3));
        assert_eq!(study.option("dof").unwrap(), &OptionValue::Int(6));
        assert!(study.option("missing").unwrap_err().is_spec_not_found());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = Study::builder(component(), "subject")
            .option("frac", 0.3)
            .build()
            .unwrap_err();
        assert!(err.is_spec_not_found());
        assert!(err.to_string().contains("frac"));
    }

    #[test]
    fn test_option_type_checked() {
        let err = Study::builder(component(), "subject")
            .option("dof", "rigid")
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::INVALID_OPTION));
    }

    #[test]
    fn test_input_kind_checked() {
        let err = Study::builder(component(), "subject")
            .input(InputMatch::dataset("primary", "t1_mprage", FileFormat::Nifti))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::TYPE_MISMATCH));
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let err = Study::builder(component(), "subject")
            .input(InputMatch::dataset("primary", "a", FileFormat::Dicom))
            .input(InputMatch::dataset("primary", "b", FileFormat::Dicom))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::DUPLICATE));
    }

    #[test]
    fn test_per_build_overrides_win() {
        let study = Study::builder(component(), "subject")
            .option("bet_frac", 0.3)
            .build()
            .unwrap();
        let mut overrides = IndexMap::new();
        overrides.insert("bet_frac".to_string(), OptionValue::Float(0.7));
        let options = study.resolve_options(&overrides).unwrap();
        assert_eq!(options.float("bet_frac").unwrap(), 0.7);
        assert_eq!(options.int("dof").unwrap(), 6);
    }

    #[test]
    fn test_sub_study_instances_receive_mapped_options_and_inputs() {
        let study = Study::builder(composite(), "subject")
            .option("frac", 0.2)
            .option("t1_0_dof", 12)
            .input(InputMatch::dataset("t1_0_primary", "t1_mprage", FileFormat::Dicom))
            .build()
            .unwrap();
        let child = study.sub_study("t1_0").unwrap();
        assert_eq!(child.name(), "subject_t1_0");
        assert_eq!(child.option("bet_frac").unwrap(), &OptionValue::Float(0.2));
        assert_eq!(child.option("dof").unwrap(), &OptionValue::Int(12));
        assert!(child.is_provided("primary"));
        assert!(child.input("primary").unwrap().matches("t1_mprage"));

        let err = study.sub_study("t2_0").unwrap_err();
        assert!(NiflowError::from(err).is_name_not_found());
    }

    #[test]
    fn test_regex_input_match() {
        let input = InputMatch::regex("primary", "^t1_.*mprage$", DataKind::Dataset(FileFormat::Dicom))
            .unwrap();
        assert!(input.matches("t1_sag_mprage"));
        assert!(!input.matches("t2_spc"));
        assert!(InputMatch::regex("primary", "(", DataKind::Dataset(FileFormat::Dicom)).is_err());
    }

    #[test]
    fn test_translated_pipeline_uses_external_names() {
        let study = Study::builder(composite(), "subject")
            .option("frac", 0.25)
            .build()
            .unwrap();
        let pipeline = study.pipeline("t1_0_preproc_pipeline").unwrap();
        assert_eq!(pipeline.name().as_str(), "t1_0_preproc_pipeline");
        assert_eq!(pipeline.study(), "subject");
        assert_eq!(pipeline.input_names().collect::<Vec<_>>(), vec!["t1_0_primary"]);
        assert_eq!(pipeline.output_names().collect::<Vec<_>>(), vec!["t1_0_preproc"]);
        assert_eq!(pipeline.options().float("frac").unwrap(), 0.25);
        assert!(pipeline.input_bindings().iter().all(|b| b.spec == "t1_0_primary"));
    }
}
