use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use super::sub_study::SubStudySpec;
use super::translate::translated_factory;
use crate::errors::{
    NameKind, NameNotFoundError, NiflowError, SpecKind, SpecNotFoundError, SpecificationError,
};
use crate::pipeline::{Pipeline, PipelineContext, PipelineFactory};
use crate::spec::{
    is_valid_identifier, DataSpec, OptionRegistry, OptionSpec, OptionValue, PipelineName,
    RegistryBuilder, SpecOrigin, SpecRegistry,
};

/// The class-level description of a study: its merged registries, its
/// sub-studies and its pipeline factories.
///
/// Built once by [`StudyBuilder::build`] and immutable afterwards, so a
/// definition can be shared by any number of study instances.
pub struct StudyDefinition {
    name: String,
    desc: Option<String>,
    bases: Vec<Arc<StudyDefinition>>,
    sub_studies: IndexMap<String, SubStudySpec>,
    data: SpecRegistry,
    options: OptionRegistry,
    pipelines: IndexMap<PipelineName, PipelineFactory>,
}

impl fmt::Debug for StudyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyDefinition")
            .field("name", &self.name)
            .field("bases", &self.bases.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("sub_studies", &self.sub_studies.keys().collect::<Vec<_>>())
            .field("data", &self.data.len())
            .field("options", &self.options.len())
            .field("pipelines", &self.pipelines.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StudyDefinition {
    /// Starts declaring a study.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> StudyBuilder {
        StudyBuilder::new(name)
    }

    /// Returns the study name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Returns the direct base studies.
    #[must_use]
    pub fn bases(&self) -> &[Arc<Self>] {
        &self.bases
    }

    /// Returns the merged data registry.
    #[must_use]
    pub const fn data_specs(&self) -> &SpecRegistry {
        &self.data
    }

    /// Returns the merged option registry.
    #[must_use]
    pub const fn option_specs(&self) -> &OptionRegistry {
        &self.options
    }

    /// Looks up a dataset or field spec.
    pub fn data_spec(&self, name: &str) -> Result<&DataSpec, SpecNotFoundError> {
        self.data.get(name)
    }

    /// Looks up an option spec.
    pub fn option_spec(&self, name: &str) -> Result<&OptionSpec, SpecNotFoundError> {
        self.options.get(name)
    }

    /// Returns true if `name` is a data spec or an option of this study.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.data.contains(name) || self.options.contains(name)
    }

    /// Iterates over all data spec names, then all option names.
    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.data.names().chain(self.options.names())
    }

    /// Looks up a sub-study spec.
    ///
    /// # Errors
    ///
    /// Fails with a [`NameNotFoundError`] if no sub-study has that name.
    pub fn sub_study_spec(&self, name: &str) -> Result<&SubStudySpec, NameNotFoundError> {
        self.sub_studies
            .get(name)
            .ok_or_else(|| NameNotFoundError::new(NameKind::SubStudy, name, &self.name))
    }

    /// Iterates over sub-study specs in declaration order.
    pub fn sub_study_specs(&self) -> impl Iterator<Item = &SubStudySpec> {
        self.sub_studies.values()
    }

    /// Looks up a pipeline factory.
    pub fn pipeline_factory(&self, name: &str) -> Result<&PipelineFactory, SpecNotFoundError> {
        self.pipelines
            .get(name)
            .ok_or_else(|| SpecNotFoundError::new(SpecKind::Pipeline, name, &self.name))
    }

    /// Iterates over registered pipeline names.
    pub fn pipeline_names(&self) -> impl Iterator<Item = &PipelineName> {
        self.pipelines.keys()
    }

    /// Returns true if a factory is registered under `name`.
    #[must_use]
    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Returns true if this study is, or derives from, the study `name`.
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.bases.iter().any(|base| base.is_a(name))
    }

    /// Returns true if `name` appears anywhere in this study's base or
    /// sub-study tree, including the study itself.
    ///
    /// Study names identify definitions within one composition tree.
    /// Definitions are immutable once built, so a tree can only loop back
    /// on itself by name: composing a definition that contains any study
    /// named like the one being built fails with a composition cycle, even
    /// when the two were built separately.
    #[must_use]
    pub fn contains_study(&self, name: &str) -> bool {
        self.name == name
            || self.bases.iter().any(|base| base.contains_study(name))
            || self
                .sub_studies
                .values()
                .any(|sub| sub.study().contains_study(name))
    }
}

struct PendingSubStudy {
    name: String,
    study: Arc<StudyDefinition>,
    pairs: Vec<(String, String)>,
}

struct Translation {
    name: PipelineName,
    sub_study: String,
    pipeline: PipelineName,
    fixed: Vec<(String, OptionValue)>,
}

/// Declares a study and composes it into a [`StudyDefinition`].
#[must_use]
pub struct StudyBuilder {
    name: String,
    desc: Option<String>,
    bases: Vec<Arc<StudyDefinition>>,
    sub_studies: Vec<PendingSubStudy>,
    data: Vec<DataSpec>,
    options: Vec<OptionSpec>,
    pipelines: Vec<(PipelineName, PipelineFactory)>,
    translations: Vec<Translation>,
}

impl StudyBuilder {
    /// Creates a builder for the study `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: None,
            bases: Vec::new(),
            sub_studies: Vec::new(),
            data: Vec::new(),
            options: Vec::new(),
            pipelines: Vec::new(),
            translations: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Inherits specs and pipelines from `base`. With several bases the
    /// first one listed wins.
    pub fn extends(mut self, base: Arc<StudyDefinition>) -> Self {
        self.bases.push(base);
        self
    }

    /// Declares a dataset or field spec.
    pub fn data(mut self, spec: DataSpec) -> Self {
        self.data.push(spec);
        self
    }

    /// Declares an option.
    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    /// Embeds `study` as the sub-study `name`. `pairs` maps external
    /// names to the component's internal names.
    pub fn sub_study<E, I>(
        mut self,
        name: impl Into<String>,
        study: Arc<StudyDefinition>,
        pairs: impl IntoIterator<Item = (E, I)>,
    ) -> Self
    where
        E: Into<String>,
        I: Into<String>,
    {
        self.sub_studies.push(PendingSubStudy {
            name: name.into(),
            study,
            pairs: pairs
                .into_iter()
                .map(|(e, i)| (e.into(), i.into()))
                .collect(),
        });
        self
    }

    /// Registers a pipeline factory.
    pub fn pipeline<F>(mut self, name: impl Into<PipelineName>, factory: F) -> Self
    where
        F: Fn(&PipelineContext<'_>) -> Result<Pipeline, NiflowError> + Send + Sync + 'static,
    {
        self.pipelines.push((name.into(), Arc::new(factory)));
        self
    }

    /// Registers `name` as the sub-study pipeline `pipeline` of
    /// `sub_study`, translated into this study's names. `fixed` options
    /// use the component's names and are applied last.
    pub fn translate<K, V>(
        mut self,
        name: impl Into<PipelineName>,
        sub_study: impl Into<String>,
        pipeline: impl Into<PipelineName>,
        fixed: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<OptionValue>,
    {
        self.translations.push(Translation {
            name: name.into(),
            sub_study: sub_study.into(),
            pipeline: pipeline.into(),
            fixed: fixed.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        });
        self
    }

    /// Composes the declarations into an immutable definition.
    ///
    /// Precedence, lowest first: inherited bases (the first listed base
    /// wins), earlier sub-studies, later sub-studies, own declarations.
    ///
    /// # Errors
    ///
    /// Fails with a [`SpecificationError`] on duplicate or invalid names,
    /// invalid sub-study name maps, recursive composition, or a spec
    /// whose producer has no registered factory.
    pub fn build(self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        let definition = compose(self)?;
        tracing::info!(
            study = %definition.name,
            data = definition.data.len(),
            options = definition.options.len(),
            pipelines = definition.pipelines.len(),
            sub_studies = definition.sub_studies.len(),
            "study definition composed"
        );
        Ok(Arc::new(definition))
    }
}

fn compose(builder: StudyBuilder) -> Result<StudyDefinition, SpecificationError> {
    let StudyBuilder {
        name,
        desc,
        bases,
        sub_studies: pending,
        data: own_data,
        options: own_options,
        pipelines: own_pipelines,
        translations,
    } = builder;

    if !is_valid_identifier(&name) {
        return Err(SpecificationError::invalid_name(&name, &name));
    }
    for base in &bases {
        if base.contains_study(&name) {
            return Err(SpecificationError::composition_cycle(&name, base.name()));
        }
    }
    for sub in &pending {
        if sub.study.contains_study(&name) {
            return Err(SpecificationError::composition_cycle(&name, &sub.name));
        }
    }

    let mut data = RegistryBuilder::<DataSpec>::new(&name);
    let mut options = RegistryBuilder::<OptionSpec>::new(&name);
    let mut factories: IndexMap<PipelineName, PipelineFactory> = IndexMap::new();

    for base in bases.iter().rev() {
        let origin = SpecOrigin::Base(base.name().to_string());
        for spec in base.data_specs().iter() {
            data.insert(origin.clone(), spec.clone());
        }
        for spec in base.option_specs().iter() {
            options.insert(origin.clone(), spec.clone());
        }
        for (pipeline, factory) in &base.pipelines {
            factories.insert(pipeline.clone(), Arc::clone(factory));
        }
    }

    let mut sub_studies: IndexMap<String, SubStudySpec> = IndexMap::new();
    for sub in pending {
        if sub_studies.contains_key(&sub.name) {
            return Err(SpecificationError::duplicate(&name, "sub-study", &sub.name));
        }
        let spec = SubStudySpec::new(&name, sub.name, sub.study, sub.pairs)?;
        merge_sub_study(&name, &spec, &mut data, &mut options, &mut factories)?;
        sub_studies.insert(spec.name().to_string(), spec);
    }

    data.layer(&SpecOrigin::Own, own_data)?;
    options.layer(&SpecOrigin::Own, own_options)?;

    let mut own_names: Vec<PipelineName> = Vec::new();
    for translation in translations {
        let sub = sub_studies
            .get(&translation.sub_study)
            .ok_or_else(|| {
                SpecificationError::invalid_name_map(
                    &name,
                    &translation.sub_study,
                    format!("no such sub-study for translated pipeline '{}'", translation.name),
                )
            })?;
        if !sub.study().has_pipeline(translation.pipeline.as_str()) {
            return Err(SpecificationError::unknown_producer(
                sub.study().name(),
                translation.name.as_str(),
                translation.pipeline.as_str(),
            ));
        }
        for (option, value) in &translation.fixed {
            sub.study()
                .option_spec(option)
                .map_err(|err| SpecificationError::invalid_option(&name, option, err))?
                .check(&name, value)?;
        }
        if own_names.contains(&translation.name) {
            return Err(SpecificationError::duplicate(&name, "pipeline", translation.name.as_str()));
        }
        own_names.push(translation.name.clone());
        factories.insert(
            translation.name,
            translated_factory(translation.sub_study, translation.pipeline, translation.fixed),
        );
    }
    for (pipeline, factory) in own_pipelines {
        if !is_valid_identifier(pipeline.as_str()) {
            return Err(SpecificationError::invalid_name(&name, pipeline.as_str()));
        }
        if own_names.contains(&pipeline) {
            return Err(SpecificationError::duplicate(&name, "pipeline", pipeline.as_str()));
        }
        own_names.push(pipeline.clone());
        factories.insert(pipeline, factory);
    }

    let data = data.build();
    for spec in data.iter() {
        if let Some(producer) = spec.pipeline() {
            if !factories.contains_key(producer) {
                return Err(SpecificationError::unknown_producer(
                    &name,
                    spec.name(),
                    producer.as_str(),
                ));
            }
        }
    }

    Ok(StudyDefinition {
        name,
        desc,
        bases,
        sub_studies,
        data,
        options: options.build(),
        pipelines: factories,
    })
}

/// Re-keys every entry of a sub-study through its name map and merges it
/// over what is already registered.
///
/// An entry the sub-study only consumes does not displace an entry some
/// earlier layer produces, so sub-studies that share an input (a common
/// reference image, say) can be wired to another sub-study's output.
fn merge_sub_study(
    study: &str,
    sub: &SubStudySpec,
    data: &mut RegistryBuilder<DataSpec>,
    options: &mut RegistryBuilder<OptionSpec>,
    factories: &mut IndexMap<PipelineName, PipelineFactory>,
) -> Result<(), SpecificationError> {
    let origin = SpecOrigin::SubStudy(sub.name().to_string());
    let component = sub.study();

    for inner in component.data_specs().iter() {
        let external = external_name(study, sub, inner.name())?;
        let producer = inner.pipeline().map(|p| p.prefixed(sub.name()));
        let rekeyed = inner.rekeyed(external, producer);
        if let Some(existing) = data.get(rekeyed.name()) {
            if existing.kind() != rekeyed.kind() {
                return Err(SpecificationError::type_mismatch(
                    study,
                    rekeyed.name(),
                    existing.kind(),
                    rekeyed.kind(),
                ));
            }
            if rekeyed.is_input() && !existing.is_input() {
                tracing::debug!(
                    study = %study,
                    sub_study = %sub.name(),
                    name = %rekeyed.name(),
                    "sub-study input bound to existing producer"
                );
                continue;
            }
        }
        data.insert(origin.clone(), rekeyed);
    }

    for inner in component.option_specs().iter() {
        let external = external_name(study, sub, inner.name())?;
        options.insert(origin.clone(), inner.renamed(external));
    }

    for pipeline in component.pipeline_names() {
        factories.insert(
            pipeline.prefixed(sub.name()),
            translated_factory(sub.name().to_string(), pipeline.clone(), Vec::new()),
        );
    }
    Ok(())
}

fn external_name(study: &str, sub: &SubStudySpec, internal: &str) -> Result<String, SpecificationError> {
    sub.inverse_map(internal)
        .map_err(|err| SpecificationError::invalid_name_map(study, sub.name(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use crate::formats::{FileFormat, ScalarType};
    use crate::testing::fixtures::passthrough_pipeline;
    use pretty_assertions::assert_eq;

    fn base() -> Arc<StudyDefinition> {
        StudyDefinition::builder("mri")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("preproc", FileFormat::NiftiGz).produced_by("preproc_pipeline"))
            .data(DataSpec::dataset("wm_seg", FileFormat::NiftiGz).produced_by("segmentation_pipeline"))
            .option(OptionSpec::new("bet_frac", 0.5))
            .pipeline("preproc_pipeline", passthrough_pipeline(&["primary"], &["preproc"]))
            .pipeline("segmentation_pipeline", passthrough_pipeline(&["preproc"], &["wm_seg"]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_subclass_replaces_base_spec() {
        let derived = StudyDefinition::builder("motion_ref")
            .extends(base())
            .data(
                DataSpec::dataset("wm_seg", FileFormat::NiftiGz)
                    .produced_by("reference_segmentation_pipeline"),
            )
            .pipeline(
                "reference_segmentation_pipeline",
                passthrough_pipeline(&["preproc"], &["wm_seg"]),
            )
            .build()
            .unwrap();

        let wm_seg = derived.data_spec("wm_seg").unwrap();
        assert!(wm_seg.is_produced_by("reference_segmentation_pipeline"));
        assert_eq!(derived.data_specs().origin("wm_seg"), Some(&SpecOrigin::Own));
        assert_eq!(
            derived.data_specs().origin("preproc"),
            Some(&SpecOrigin::Base("mri".to_string()))
        );
        assert!(derived.has_pipeline("segmentation_pipeline"));
        assert!(derived.is_a("mri"));
    }

    #[test]
    fn test_first_base_wins() {
        let other = StudyDefinition::builder("other")
            .data(DataSpec::dataset("preproc", FileFormat::Nifti))
            .build()
            .unwrap();
        let derived = StudyDefinition::builder("derived")
            .extends(base())
            .extends(other)
            .build()
            .unwrap();
        assert_eq!(
            derived.data_spec("preproc").unwrap().format(),
            Some(FileFormat::NiftiGz)
        );
    }

    #[test]
    fn test_sub_study_entries_rekeyed() {
        let multi = StudyDefinition::builder("multi")
            .sub_study("a", base(), [("ref_primary", "primary")])
            .build()
            .unwrap();

        assert!(multi.data_spec("ref_primary").unwrap().is_input());
        let preproc = multi.data_spec("a_preproc").unwrap();
        assert!(preproc.is_produced_by("a_preproc_pipeline"));
        assert!(multi.has_pipeline("a_preproc_pipeline"));
        assert!(multi.option_spec("a_bet_frac").is_ok());
        assert!(multi.data_spec("preproc").is_err());
        assert_eq!(
            multi.data_specs().origin("a_wm_seg"),
            Some(&SpecOrigin::SubStudy("a".to_string()))
        );
    }

    #[test]
    fn test_precedence_own_over_later_over_earlier() {
        let a = StudyDefinition::builder("a")
            .data(DataSpec::field("shared", ScalarType::Str).produced_by("p"))
            .pipeline("p", passthrough_pipeline(&[], &["shared"]))
            .build()
            .unwrap();
        let b = StudyDefinition::builder("b")
            .data(DataSpec::field("value", ScalarType::Str).produced_by("q"))
            .pipeline("q", passthrough_pipeline(&[], &["value"]))
            .build()
            .unwrap();

        let multi = StudyDefinition::builder("multi")
            .sub_study("x", a, [("shared", "shared")])
            .sub_study("y", b.clone(), [("shared", "value")])
            .build()
            .unwrap();
        assert!(multi.data_spec("shared").unwrap().is_produced_by("y_q"));

        let own = StudyDefinition::builder("own")
            .sub_study("y", b, [("shared", "value")])
            .data(DataSpec::field("shared", ScalarType::Str).produced_by("own_pipeline"))
            .pipeline("own_pipeline", passthrough_pipeline(&[], &["shared"]))
            .build()
            .unwrap();
        assert!(own.data_spec("shared").unwrap().is_produced_by("own_pipeline"));
        assert_eq!(own.data_specs().len(), 1);
    }

    #[test]
    fn test_input_does_not_displace_producer() {
        let consumer = StudyDefinition::builder("consumer")
            .data(DataSpec::dataset("coreg_ref_brain", FileFormat::NiftiGz))
            .build()
            .unwrap();
        let producer = StudyDefinition::builder("producer")
            .data(DataSpec::dataset("brain", FileFormat::NiftiGz).produced_by("bet_pipeline"))
            .pipeline("bet_pipeline", passthrough_pipeline(&[], &["brain"]))
            .build()
            .unwrap();

        let multi = StudyDefinition::builder("multi")
            .sub_study("ref", producer, Vec::<(String, String)>::new())
            .sub_study("t1_0", consumer, [("ref_brain", "coreg_ref_brain")])
            .build()
            .unwrap();
        assert!(multi.data_spec("ref_brain").unwrap().is_produced_by("ref_bet_pipeline"));
    }

    #[test]
    fn test_shared_name_with_different_format_rejected() {
        let consumer = StudyDefinition::builder("consumer")
            .data(DataSpec::dataset("coreg_ref_brain", FileFormat::Nifti))
            .build()
            .unwrap();
        let producer = StudyDefinition::builder("producer")
            .data(DataSpec::dataset("brain", FileFormat::NiftiGz).produced_by("bet_pipeline"))
            .pipeline("bet_pipeline", passthrough_pipeline(&[], &["brain"]))
            .build()
            .unwrap();
        let err = StudyDefinition::builder("multi")
            .sub_study("ref", producer, Vec::<(String, String)>::new())
            .sub_study("t1_0", consumer, [("ref_brain", "coreg_ref_brain")])
            .build()
            .unwrap_err();
        assert_eq!(err.error_info.unwrap().code, codes::TYPE_MISMATCH);
    }

    #[test]
    fn test_unknown_producer_rejected() {
        let err = StudyDefinition::builder("broken")
            .data(DataSpec::dataset("out", FileFormat::Text).produced_by("missing_pipeline"))
            .build()
            .unwrap_err();
        assert_eq!(err.error_info.unwrap().code, codes::UNKNOWN_PRODUCER);
        assert!(err.message.contains("missing_pipeline"));
    }

    #[test]
    fn test_duplicate_own_spec_rejected() {
        let err = StudyDefinition::builder("dup")
            .data(DataSpec::dataset("x", FileFormat::Text))
            .data(DataSpec::dataset("x", FileFormat::Nifti))
            .build()
            .unwrap_err();
        assert_eq!(err.error_info.unwrap().code, codes::DUPLICATE);
    }

    #[test]
    fn test_self_containing_composition_rejected() {
        let inner = StudyDefinition::builder("outer").build().unwrap();
        let err = StudyDefinition::builder("outer")
            .sub_study("inner", inner, Vec::<(String, String)>::new())
            .build()
            .unwrap_err();
        assert_eq!(err.error_info.unwrap().code, codes::COMPOSITION_CYCLE);
    }

    #[test]
    fn test_nested_name_reuse_rejected() {
        let leaf = StudyDefinition::builder("pet").build().unwrap();
        let middle = StudyDefinition::builder("middle")
            .extends(leaf)
            .build()
            .unwrap();
        assert!(middle.contains_study("pet"));
        assert!(!middle.contains_study("mri"));

        let err = StudyDefinition::builder("pet")
            .sub_study("m", middle, Vec::<(String, String)>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("through 'm'"));
        assert_eq!(err.error_info.unwrap().code, codes::COMPOSITION_CYCLE);
    }

    #[test]
    fn test_sub_study_spec_lookup() {
        let multi = StudyDefinition::builder("multi")
            .sub_study("a", base(), Vec::<(String, String)>::new())
            .build()
            .unwrap();
        assert_eq!(multi.sub_study_spec("a").unwrap().name(), "a");
        let err = multi.sub_study_spec("b").unwrap_err();
        assert_eq!(err.kind, NameKind::SubStudy);
    }

    #[test]
    fn test_translate_requires_known_sub_study_pipeline() {
        let err = StudyDefinition::builder("multi")
            .sub_study("a", base(), Vec::<(String, String)>::new())
            .translate("a_custom", "a", "nope_pipeline", Vec::<(String, bool)>::new())
            .build()
            .unwrap_err();
        assert_eq!(err.error_info.unwrap().code, codes::UNKNOWN_PRODUCER);
    }

    #[test]
    fn test_translate_fixed_option_must_match_type() {
        let err = StudyDefinition::builder("multi")
            .sub_study("a", base(), Vec::<(String, String)>::new())
            .translate("a_custom", "a", "preproc_pipeline", [("bet_frac", "not-a-float")])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("bet_frac"));
        assert_eq!(err.error_info.unwrap().code, codes::INVALID_OPTION);

        let unknown = StudyDefinition::builder("multi")
            .sub_study("a", base(), Vec::<(String, String)>::new())
            .translate("a_custom", "a", "preproc_pipeline", [("no_such_option", 1.0)])
            .build()
            .unwrap_err();
        assert_eq!(unknown.error_info.unwrap().code, codes::INVALID_OPTION);

        let ok = StudyDefinition::builder("multi")
            .sub_study("a", base(), Vec::<(String, String)>::new())
            .translate("a_custom", "a", "preproc_pipeline", [("bet_frac", 0.2)])
            .build()
            .unwrap();
        assert!(ok.has_pipeline("a_custom"));
    }
}
