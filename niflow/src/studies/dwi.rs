//! Diffusion-weighted imaging and the assignment of DWI scans to
//! sub-studies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{interfaces, mri};
use crate::errors::{ConfigError, NiflowError, SpecificationError};
use crate::formats::FileFormat;
use crate::pipeline::{citation, Pipeline, PipelineContext, ToolNode};
use crate::spec::{DataSpec, OptionSpec};
use crate::study::StudyDefinition;

/// The DWI study.
///
/// A sub-study runs from the main diffusion series when one is provided,
/// otherwise from the reference b0. A b0 acquired with the opposite phase
/// encoding direction enables distortion correction.
pub fn dwi_study() -> Result<Arc<StudyDefinition>, SpecificationError> {
    let builder = StudyDefinition::builder("dwi")
        .desc("Diffusion-weighted series with reverse phase-encoded b0 images")
        .extends(mri::mri_study()?)
        .data(DataSpec::dataset("dwi_main", FileFormat::Dicom))
        .data(
            DataSpec::dataset("dwi_ref_plus", FileFormat::Dicom)
                .with_desc("b0 acquired with the main phase encoding direction"),
        )
        .data(
            DataSpec::dataset("dwi_ref_minus", FileFormat::Dicom)
                .with_desc("b0 acquired with the opposite phase encoding direction"),
        )
        .data(DataSpec::dataset("preproc", FileFormat::NiftiGz).produced_by("dwi_preproc_pipeline"))
        .option(OptionSpec::new("distortion_correction", true))
        .option(OptionSpec::new("pe_dir", "j"))
        .pipeline("dwi_preproc_pipeline", dwi_preproc_pipeline)
        .pipeline("header_info_extraction_pipeline", |ctx: &PipelineContext<'_>| {
            mri::header_info_pipeline(ctx, primary_dwi(ctx), false)
        });
    mri::with_header_fields(builder, "header_info_extraction_pipeline").build()
}

fn primary_dwi(ctx: &PipelineContext<'_>) -> &'static str {
    if ctx.is_provided("dwi_main") {
        "dwi_main"
    } else {
        "dwi_ref_plus"
    }
}

fn dwi_preproc_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let main = primary_dwi(ctx);
    let correct = ctx.options().bool("distortion_correction")? && ctx.is_provided("dwi_ref_minus");

    let mut preproc = ToolNode::new("dwipreproc", interfaces::dwipreproc())
        .param("pe_dir", ctx.options().str("pe_dir")?)
        .wall_time(60);
    preproc = if correct {
        preproc.param("rpe_pair", true)
    } else {
        preproc.param("rpe_none", true)
    };

    let mut builder = ctx
        .create_pipeline()
        .desc("Eddy current, motion and distortion correction")
        .citation(citation::MRTRIX)
        .citation(citation::EDDY)
        .input(main)?
        .output("preproc")?
        .add_node(ToolNode::new("convert_main", interfaces::mrconvert()))?
        .add_node(preproc)?
        .connect_input(main, "convert_main", "in_file")?
        .connect("convert_main", "out_file", "dwipreproc", "in_file")?;

    if correct {
        let first = if main == "dwi_main" && ctx.is_provided("dwi_ref_plus") {
            builder = builder
                .input("dwi_ref_plus")?
                .add_node(ToolNode::new("convert_plus", interfaces::mrconvert()))?
                .connect_input("dwi_ref_plus", "convert_plus", "in_file")?;
            "convert_plus"
        } else {
            "convert_main"
        };
        builder = builder
            .input("dwi_ref_minus")?
            .add_node(ToolNode::new("convert_minus", interfaces::mrconvert()))?
            .add_node(ToolNode::new("se_epi_pair", interfaces::mrcat()))?
            .connect_input("dwi_ref_minus", "convert_minus", "in_file")?
            .connect(first, "out_file", "se_epi_pair", "first")?
            .connect("convert_minus", "out_file", "se_epi_pair", "second")?
            .connect("se_epi_pair", "out_file", "dwipreproc", "se_epi")?;
    }

    builder
        .connect_output("preproc", "dwipreproc", "out_file")?
        .build()
}

/// The role of a DWI scan, written `0`, `1` and `-1` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DwiRole {
    /// The main diffusion-weighted series.
    Main,
    /// A b0 with the main phase encoding direction.
    Reference,
    /// A b0 with the opposite phase encoding direction.
    Opposite,
}

impl fmt::Display for DwiRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Main => "0",
            Self::Reference => "1",
            Self::Opposite => "-1",
        })
    }
}

impl FromStr for DwiRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Self::Main),
            "1" => Ok(Self::Reference),
            "-1" => Ok(Self::Opposite),
            other => Err(ConfigError::InvalidValue {
                name: "dwi role".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A DWI scan and its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwiScan {
    /// Pattern matching the scan in the repository.
    pub path: String,
    /// What the scan is.
    pub role: DwiRole,
}

impl DwiScan {
    /// Creates a scan entry.
    #[must_use]
    pub fn new(path: impl Into<String>, role: DwiRole) -> Self {
        Self {
            path: path.into(),
            role,
        }
    }

    /// Creates a scan entry from a textual role.
    pub fn parse(path: impl Into<String>, role: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(path, role.parse()?))
    }
}

/// The scans one DWI sub-study runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DwiGroup {
    /// Main series.
    pub main: Option<String>,
    /// Reference b0, main phase encoding direction.
    pub ref_plus: Option<String>,
    /// Reference b0, opposite phase encoding direction.
    pub ref_minus: Option<String>,
}

/// The outcome of [`assign_dwi_scans`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DwiAssignment {
    /// One entry per DWI sub-study.
    pub groups: Vec<DwiGroup>,
    /// Scans no group uses, in input order.
    pub unused: Vec<String>,
    /// Whether the groups carry opposite phase-encoded b0 images.
    pub distortion_correction: bool,
}

/// Groups DWI scans into sub-studies.
///
/// The policy is best effort:
/// - main series without an opposite b0 run uncorrected, one group each;
/// - without a main series, reference and opposite b0 images are paired
///   in order and the longer list is truncated;
/// - main series with an opposite b0 (and optionally a reference b0) take
///   the b0 at the same position when every list is long enough, and the
///   first b0 otherwise.
///
/// Scans left over are returned in `unused`; callers process them as
/// plain T2-weighted scans.
#[must_use]
pub fn assign_dwi_scans(scans: &[DwiScan]) -> DwiAssignment {
    let by_role = |role: DwiRole| -> Vec<&str> {
        scans
            .iter()
            .filter(|scan| scan.role == role)
            .map(|scan| scan.path.as_str())
            .collect()
    };
    let main = by_role(DwiRole::Main);
    let reference = by_role(DwiRole::Reference);
    let opposite = by_role(DwiRole::Opposite);

    let (groups, distortion_correction): (Vec<DwiGroup>, bool) =
        match (main.is_empty(), reference.is_empty(), opposite.is_empty()) {
            (false, _, true) => {
                tracing::warn!(
                    scans = main.len(),
                    "no opposite phase-encoded b0 provided, DWI motion correction runs without distortion correction"
                );
                let groups = main
                    .iter()
                    .map(|path| DwiGroup {
                        main: owned(path),
                        ..DwiGroup::default()
                    })
                    .collect();
                (groups, false)
            }
            (true, false, false) => {
                let groups = reference
                    .iter()
                    .zip(&opposite)
                    .map(|(plus, minus)| DwiGroup {
                        main: None,
                        ref_plus: owned(plus),
                        ref_minus: owned(minus),
                    })
                    .collect();
                (groups, true)
            }
            (false, true, false) => {
                let paired = main.len() <= opposite.len();
                let groups = main
                    .iter()
                    .enumerate()
                    .map(|(i, path)| DwiGroup {
                        main: owned(path),
                        ref_plus: None,
                        ref_minus: owned(opposite[if paired { i } else { 0 }]),
                    })
                    .collect();
                (groups, true)
            }
            (false, false, false) => {
                let paired = main.len() <= opposite.len() && main.len() <= reference.len();
                let groups = main
                    .iter()
                    .enumerate()
                    .map(|(i, path)| {
                        let at = if paired { i } else { 0 };
                        DwiGroup {
                            main: owned(path),
                            ref_plus: owned(reference[at]),
                            ref_minus: owned(opposite[at]),
                        }
                    })
                    .collect();
                (groups, true)
            }
            _ => (Vec::new(), false),
        };

    let used = |path: &str| {
        groups.iter().any(|group: &DwiGroup| {
            [&group.main, &group.ref_plus, &group.ref_minus]
                .into_iter()
                .any(|scan| scan.as_deref() == Some(path))
        })
    };
    let unused: Vec<String> = scans
        .iter()
        .filter(|scan| !used(scan.path.as_str()))
        .map(|scan| scan.path.clone())
        .collect();
    if !unused.is_empty() {
        tracing::warn!(
            unused = ?unused,
            "DWI scans were not assigned and will be processed as other scans"
        );
    }

    DwiAssignment {
        groups,
        unused,
        distortion_correction,
    }
}

fn owned(path: &str) -> Option<String> {
    Some(path.to_string())
}
