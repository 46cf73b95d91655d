use serde::{Deserialize, Serialize};
use std::fmt;

use super::PipelineName;
use crate::formats::{FileFormat, ScalarType};

/// What a data spec holds: a file-based dataset or a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// A dataset stored in the given file format.
    Dataset(FileFormat),
    /// A scalar field of the given type.
    Field(ScalarType),
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dataset(format) => write!(f, "dataset({format})"),
            Self::Field(ty) => write!(f, "field({ty})"),
        }
    }
}

/// A named, typed data product of a study.
///
/// `pipeline` names the producer. A spec without a producer is a study
/// input that must be provided from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSpec {
    name: String,
    kind: DataKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pipeline: Option<PipelineName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    desc: Option<String>,
}

impl DataSpec {
    /// Declares a dataset input.
    #[must_use]
    pub fn dataset(name: impl Into<String>, format: FileFormat) -> Self {
        Self {
            name: name.into(),
            kind: DataKind::Dataset(format),
            pipeline: None,
            desc: None,
        }
    }

    /// Declares a field input.
    #[must_use]
    pub fn field(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: DataKind::Field(ty),
            pipeline: None,
            desc: None,
        }
    }

    /// Sets the producing pipeline.
    #[must_use]
    pub fn produced_by(mut self, pipeline: impl Into<PipelineName>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Returns the spec name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the spec kind.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Returns the producing pipeline, `None` for study inputs.
    #[must_use]
    pub const fn pipeline(&self) -> Option<&PipelineName> {
        self.pipeline.as_ref()
    }

    /// Returns the description.
    #[must_use]
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Returns true if nothing produces this spec.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        self.pipeline.is_none()
    }

    /// Returns the file format for datasets.
    #[must_use]
    pub const fn format(&self) -> Option<FileFormat> {
        match self.kind {
            DataKind::Dataset(format) => Some(format),
            DataKind::Field(_) => None,
        }
    }

    /// Returns true if `pipeline` produces this spec.
    #[must_use]
    pub fn is_produced_by(&self, pipeline: &str) -> bool {
        self.pipeline.as_ref().is_some_and(|p| p.as_str() == pipeline)
    }

    /// Returns a copy re-keyed under a new name and producer.
    #[must_use]
    pub(crate) fn rekeyed(&self, name: impl Into<String>, pipeline: Option<PipelineName>) -> Self {
        Self {
            name: name.into(),
            kind: self.kind,
            pipeline,
            desc: self.desc.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_and_produced_specs() {
        let input = DataSpec::dataset("primary", FileFormat::Dicom);
        assert!(input.is_input());
        assert_eq!(input.format(), Some(FileFormat::Dicom));

        let produced = DataSpec::field("tr", ScalarType::Float)
            .produced_by("header_info_extraction_pipeline");
        assert!(!produced.is_input());
        assert!(produced.is_produced_by("header_info_extraction_pipeline"));
        assert!(!produced.is_produced_by("motion_mats_pipeline"));
        assert_eq!(produced.format(), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DataKind::Dataset(FileFormat::NiftiGz).to_string(), "dataset(nifti_gz)");
        assert_eq!(DataKind::Field(ScalarType::Str).to_string(), "field(str)");
    }
}
