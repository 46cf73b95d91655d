use indexmap::IndexMap;
use std::sync::Arc;

use super::StudyDefinition;
use crate::errors::{NameKind, NameNotFoundError, SpecificationError};
use crate::spec::is_valid_identifier;

/// The pair of injective maps between a sub-study's internal names and
/// the containing study's external names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMap {
    ext_to_int: IndexMap<String, String>,
    int_to_ext: IndexMap<String, String>,
}

impl NameMap {
    /// Returns the internal name explicitly mapped to `external`.
    #[must_use]
    pub fn internal(&self, external: &str) -> Option<&str> {
        self.ext_to_int.get(external).map(String::as_str)
    }

    /// Returns the external name explicitly mapped to `internal`.
    #[must_use]
    pub fn external(&self, internal: &str) -> Option<&str> {
        self.int_to_ext.get(internal).map(String::as_str)
    }

    /// Iterates over explicit `(external, internal)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ext_to_int.iter().map(|(e, i)| (e.as_str(), i.as_str()))
    }

    /// Returns the number of explicit mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ext_to_int.len()
    }

    /// Returns true if nothing is mapped explicitly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ext_to_int.is_empty()
    }
}

/// A component study embedded in a composite study.
///
/// Every name of the component is visible in the containing study under
/// its external name: the explicitly mapped one, or
/// `"{sub_study}_{internal}"` otherwise.
#[derive(Debug, Clone)]
pub struct SubStudySpec {
    name: String,
    study: Arc<StudyDefinition>,
    name_map: NameMap,
}

impl SubStudySpec {
    /// Creates a sub-study spec, validating the name map.
    ///
    /// `pairs` maps external names to the component's internal names.
    ///
    /// # Errors
    ///
    /// Fails if an internal name is not declared by the component, a name
    /// is mapped twice in either direction, or a default prefixed name
    /// collides with an explicitly mapped external name.
    pub fn new<E, I>(
        container: &str,
        name: impl Into<String>,
        study: Arc<StudyDefinition>,
        pairs: impl IntoIterator<Item = (E, I)>,
    ) -> Result<Self, SpecificationError>
    where
        E: Into<String>,
        I: Into<String>,
    {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(SpecificationError::invalid_name(container, &name));
        }

        let mut name_map = NameMap::default();
        for (external, internal) in pairs {
            let external = external.into();
            let internal = internal.into();
            if !is_valid_identifier(&external) {
                return Err(SpecificationError::invalid_name(container, &external));
            }
            if !study.declares(&internal) {
                return Err(SpecificationError::invalid_name_map(
                    container,
                    &name,
                    format!("'{}' does not declare '{internal}'", study.name()),
                ));
            }
            if name_map.ext_to_int.contains_key(&external) {
                return Err(SpecificationError::invalid_name_map(
                    container,
                    &name,
                    format!("external name '{external}' is mapped more than once"),
                ));
            }
            if name_map.int_to_ext.contains_key(&internal) {
                return Err(SpecificationError::invalid_name_map(
                    container,
                    &name,
                    format!("internal name '{internal}' is mapped more than once"),
                ));
            }
            name_map.ext_to_int.insert(external.clone(), internal.clone());
            name_map.int_to_ext.insert(internal, external);
        }

        for internal in study.declared_names() {
            if name_map.int_to_ext.contains_key(internal) {
                continue;
            }
            let default = format!("{name}_{internal}");
            if let Some(mapped) = name_map.ext_to_int.get(&default) {
                return Err(SpecificationError::invalid_name_map(
                    container,
                    &name,
                    format!(
                        "'{default}' is mapped to '{mapped}' and is also the default name of '{internal}'"
                    ),
                ));
            }
        }

        Ok(Self {
            name,
            study,
            name_map,
        })
    }

    /// Returns the sub-study name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the component study definition.
    #[must_use]
    pub const fn study(&self) -> &Arc<StudyDefinition> {
        &self.study
    }

    /// Returns the explicit name map.
    #[must_use]
    pub const fn name_map(&self) -> &NameMap {
        &self.name_map
    }

    /// Returns `"{sub_study}_{name}"`.
    #[must_use]
    pub fn apply_prefix(&self, name: &str) -> String {
        format!("{}_{name}", self.name)
    }

    /// Translates a component name to the containing study's name.
    ///
    /// # Errors
    ///
    /// Fails with a [`NameNotFoundError`] if the component does not
    /// declare `internal`. Callers probing whether a sub-study takes part
    /// in an optional role catch this and skip the sub-study.
    pub fn inverse_map(&self, internal: &str) -> Result<String, NameNotFoundError> {
        if let Some(external) = self.name_map.external(internal) {
            return Ok(external.to_string());
        }
        if self.study.declares(internal) {
            Ok(self.apply_prefix(internal))
        } else {
            Err(NameNotFoundError::new(NameKind::Internal, internal, &self.name))
        }
    }

    /// Translates a containing-study name to the component's name.
    ///
    /// # Errors
    ///
    /// Fails with a [`NameNotFoundError`] if `external` does not refer to
    /// a name of this sub-study.
    pub fn map(&self, external: &str) -> Result<String, NameNotFoundError> {
        if let Some(internal) = self.name_map.internal(external) {
            return Ok(internal.to_string());
        }
        external
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|internal| {
                self.study.declares(internal) && self.name_map.external(internal).is_none()
            })
            .map(ToString::to_string)
            .ok_or_else(|| NameNotFoundError::new(NameKind::External, external, &self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use crate::formats::{FileFormat, ScalarType};
    use crate::spec::{DataSpec, OptionSpec};
    use pretty_assertions::assert_eq;

    fn component() -> Arc<StudyDefinition> {
        StudyDefinition::builder("t1")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("coreg_ref_brain", FileFormat::NiftiGz))
            .data(DataSpec::field("tr", ScalarType::Float))
            .option(OptionSpec::new("bet_frac", 0.5))
            .build()
            .unwrap()
    }

    fn spec() -> SubStudySpec {
        SubStudySpec::new("md", "t1_0", component(), [("ref_brain", "coreg_ref_brain")]).unwrap()
    }

    #[test]
    fn test_inverse_map_explicit_and_default() {
        let spec = spec();
        assert_eq!(spec.inverse_map("coreg_ref_brain").unwrap(), "ref_brain");
        assert_eq!(spec.inverse_map("primary").unwrap(), "t1_0_primary");
        assert_eq!(spec.inverse_map("bet_frac").unwrap(), "t1_0_bet_frac");
    }

    #[test]
    fn test_inverse_map_absent_name_fails() {
        let err = spec().inverse_map("motion_mats").unwrap_err();
        assert_eq!(err.kind, NameKind::Internal);
        assert_eq!(err.name, "motion_mats");
        assert_eq!(err.scope, "t1_0");
    }

    #[test]
    fn test_map_round_trip() {
        let spec = spec();
        for internal in ["primary", "coreg_ref_brain", "tr", "bet_frac"] {
            let external = spec.inverse_map(internal).unwrap();
            assert_eq!(spec.map(&external).unwrap(), internal);
        }
    }

    #[test]
    fn test_map_rejects_foreign_and_shadowed_names() {
        let spec = spec();
        assert!(spec.map("t2_0_primary").is_err());
        assert!(spec.map("t1_0_missing").is_err());
        // explicitly mapped names are not reachable through the prefix
        assert!(spec.map("t1_0_coreg_ref_brain").is_err());
    }

    #[test]
    fn test_unknown_internal_name_rejected() {
        let err = SubStudySpec::new("md", "t1_0", component(), [("ref_wm_seg", "coreg_ref_wmseg")])
            .unwrap_err();
        assert_eq!(err.error_info.unwrap().code, codes::INVALID_NAME_MAP);
    }

    #[test]
    fn test_map_must_be_injective() {
        let err = SubStudySpec::new(
            "md",
            "t1_0",
            component(),
            [("ref_brain", "coreg_ref_brain"), ("other_brain", "coreg_ref_brain")],
        )
        .unwrap_err();
        assert!(err.message.contains("mapped more than once"));

        let err = SubStudySpec::new(
            "md",
            "t1_0",
            component(),
            [("ref_brain", "coreg_ref_brain"), ("ref_brain", "primary")],
        )
        .unwrap_err();
        assert!(err.message.contains("mapped more than once"));
    }

    #[test]
    fn test_default_name_collision_rejected() {
        let err = SubStudySpec::new("md", "t1_0", component(), [("t1_0_tr", "primary")]).unwrap_err();
        assert_eq!(err.error_info.unwrap().code, codes::INVALID_NAME_MAP);
    }
}
