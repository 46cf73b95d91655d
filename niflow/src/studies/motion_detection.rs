//! Head motion detection across every scan of a PET-MR session.
//!
//! A reference scan and any number of T1, T2, EPI and DWI scans are
//! composed as sub-studies. Each of them yields motion matrices and
//! acquisition timing; the composite turns those into a mean displacement
//! trace, splits the acquisition into motion-free frames and derives the
//! outputs used to correct the PET reconstruction.

use std::str::FromStr;
use std::sync::Arc;

use super::dwi::{assign_dwi_scans, dwi_study, DwiAssignment, DwiScan};
use super::{epi, interfaces, mri};
use crate::config::{NiflowConfig, REFERENCE_DATA_VAR};
use crate::errors::{ConfigError, NiflowError, WiringError};
use crate::formats::FileFormat;
use crate::pipeline::{citation, Pipeline, PipelineContext, ToolNode};
use crate::spec::{DataSpec, OptionSpec};
use crate::study::{InputMatch, Study, StudyDefinition};

/// Names every scan sub-study maps onto the reference's products.
const REFERENCE_MAP: [(&str, &str); 1] = [("ref_brain", "coreg_ref_brain")];

/// EPI sub-studies also register against the reference's segmentation.
const EPI_REFERENCE_MAP: [(&str, &str); 3] = [
    ("ref_brain", "coreg_ref_brain"),
    ("ref_wm_seg", "coreg_ref_wmseg"),
    ("ref_preproc", "coreg_ref_preproc"),
];

/// Products of every sub-study the mean displacement is computed from.
const MOTION_INPUTS: [(&str, &str); 4] = [
    ("motion_mats", "merge_motion_mats"),
    ("tr", "merge_tr"),
    ("start_time", "merge_start_time"),
    ("real_duration", "merge_real_duration"),
];

/// The modality of the motion reference scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    /// T1-weighted.
    T1,
    /// T2-weighted.
    T2,
}

impl FromStr for ReferenceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "t1" => Ok(Self::T1),
            "t2" => Ok(Self::T2),
            other => Err(ConfigError::InvalidValue {
                name: "ref_type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// The scans of one session.
#[derive(Debug, Clone)]
pub struct MotionDetectionScans {
    reference: String,
    reference_type: ReferenceType,
    t1s: Vec<String>,
    t2s: Vec<String>,
    epis: Vec<String>,
    dwis: Vec<DwiScan>,
    pet_data_dir: Option<String>,
}

impl MotionDetectionScans {
    /// Starts from the reference scan.
    #[must_use]
    pub fn new(reference: impl Into<String>, reference_type: ReferenceType) -> Self {
        Self {
            reference: reference.into(),
            reference_type,
            t1s: Vec::new(),
            t2s: Vec::new(),
            epis: Vec::new(),
            dwis: Vec::new(),
            pet_data_dir: None,
        }
    }

    /// Adds a T1-weighted scan.
    #[must_use]
    pub fn with_t1(mut self, scan: impl Into<String>) -> Self {
        self.t1s.push(scan.into());
        self
    }

    /// Adds a T2-weighted scan.
    #[must_use]
    pub fn with_t2(mut self, scan: impl Into<String>) -> Self {
        self.t2s.push(scan.into());
        self
    }

    /// Adds an EPI series.
    #[must_use]
    pub fn with_epi(mut self, scan: impl Into<String>) -> Self {
        self.epis.push(scan.into());
        self
    }

    /// Adds a DWI scan.
    #[must_use]
    pub fn with_dwi(mut self, scan: DwiScan) -> Self {
        self.dwis.push(scan);
        self
    }

    /// Uses the PET list-mode data directory for framing.
    #[must_use]
    pub fn with_pet_data_dir(mut self, dir: impl Into<String>) -> Self {
        self.pet_data_dir = Some(dir.into());
        self
    }

    fn has_scans(&self) -> bool {
        !(self.t1s.is_empty() && self.t2s.is_empty() && self.epis.is_empty() && self.dwis.is_empty())
    }
}

/// A composed motion detection study and the inputs matching its scans.
#[derive(Debug, Clone)]
pub struct MotionDetectionSetup {
    /// The composed definition.
    pub definition: Arc<StudyDefinition>,
    /// One input match per supplied scan.
    pub inputs: Vec<InputMatch>,
    /// How DWI scans were grouped, when any were supplied.
    pub dwi: Option<DwiAssignment>,
}

impl MotionDetectionSetup {
    /// Instantiates the study with the supplied scans as inputs.
    pub fn study(&self, name: impl Into<String>) -> Result<Study, NiflowError> {
        Study::builder(Arc::clone(&self.definition), name)
            .inputs(self.inputs.iter().cloned())
            .build()
    }
}

/// The motion detection base: specs, options and pipelines shared by
/// every composition. It declares no sub-studies.
pub fn motion_detection_base(config: &NiflowConfig) -> Result<Arc<StudyDefinition>, NiflowError> {
    let moco_template = config
        .reference_data_dir
        .as_ref()
        .map(|dir| dir.join("moco_template.IMA").display().to_string())
        .unwrap_or_default();

    let text = |name: &str, producer: &str| DataSpec::dataset(name, FileFormat::Text).produced_by(producer);
    let directory =
        |name: &str, producer: &str| DataSpec::dataset(name, FileFormat::Directory).produced_by(producer);

    let builder = [
        "mean_displacement",
        "mean_displacement_rc",
        "mean_displacement_consecutive",
        "mats4average",
        "start_times",
        "motion_par_rc",
        "motion_par",
        "offset_indexes",
    ]
    .into_iter()
    .fold(StudyDefinition::builder("motion_detection_base"), |builder, name| {
        builder.data(text(name, "mean_displacement_pipeline"))
    });

    let definition = builder
        .desc("Motion detection from the motion matrices of every scan in a session")
        .data(text("frame_start_times", "motion_framing_pipeline"))
        .data(text("frame_vol_numbers", "motion_framing_pipeline"))
        .data(directory("timestamps", "motion_framing_pipeline"))
        .data(
            DataSpec::dataset("mean_displacement_plot", FileFormat::Png)
                .produced_by("plot_mean_displacement_pipeline"),
        )
        .data(directory("average_mats", "frame_mean_transformation_mats_pipeline"))
        .data(text("correction_factors", "pet_correction_factors_pipeline"))
        .data(DataSpec::dataset("ute_reg_mat", FileFormat::TextMatrix))
        .data(DataSpec::dataset("ute_qform_mat", FileFormat::TextMatrix))
        .data(DataSpec::dataset("umap", FileFormat::NiftiGz))
        .data(directory("umaps_align2ref", "frame2ref_alignment_pipeline"))
        .data(directory("frame2reference_mats", "frame2ref_alignment_pipeline"))
        .data(directory("motion_detection_output", "gather_outputs_pipeline"))
        .data(directory("moco_series", "create_moco_series_pipeline"))
        .option(
            OptionSpec::new("framing_th", 2.0)
                .with_desc("Mean displacement in mm that starts a new frame"),
        )
        .option(
            OptionSpec::new("framing_temporal_th", 30.0)
                .with_desc("Shortest frame in seconds"),
        )
        .option(OptionSpec::new("md_framing", true))
        .option(OptionSpec::new("align_pct", false))
        .option(OptionSpec::new("align_fixed_binning", false))
        .option(OptionSpec::new("moco_template", moco_template))
        .pipeline("mean_displacement_pipeline", mean_displacement_pipeline)
        .pipeline("motion_framing_pipeline", |ctx: &PipelineContext<'_>| {
            motion_framing_pipeline(ctx, false)
        })
        .pipeline("plot_mean_displacement_pipeline", plot_mean_displacement_pipeline)
        .pipeline(
            "frame_mean_transformation_mats_pipeline",
            frame_mean_transformation_mats_pipeline,
        )
        .pipeline("pet_correction_factors_pipeline", pet_correction_factors_pipeline)
        .pipeline("frame2ref_alignment_pipeline", frame2ref_alignment_pipeline)
        .pipeline("gather_outputs_pipeline", gather_outputs_pipeline)
        .pipeline("create_moco_series_pipeline", create_moco_series_pipeline)
        .build()?;
    Ok(definition)
}

/// Composes a motion detection study over the supplied scans.
///
/// The reference becomes the sub-study `ref` and every other scan a
/// numbered sub-study (`t1_0`, `t2_0`, `epi_0`, `dwi_0`, ...) whose
/// coregistration reference is mapped onto the reference's brain. DWI
/// scans are grouped by [`assign_dwi_scans`]; scans it leaves over are
/// added as further T2 scans.
///
/// # Errors
///
/// Fails with [`ConfigError::InsufficientScans`] when only the reference
/// is given, and with a specification error if the composition is
/// invalid.
pub fn create_motion_detection_study(
    config: &NiflowConfig,
    name: &str,
    scans: &MotionDetectionScans,
) -> Result<MotionDetectionSetup, NiflowError> {
    if !scans.has_scans() {
        return Err(ConfigError::InsufficientScans {
            study: name.to_string(),
        }
        .into());
    }

    let mut builder = StudyDefinition::builder(name).extends(motion_detection_base(config)?);
    let mut inputs = Vec::new();

    if let Some(dir) = &scans.pet_data_dir {
        builder = builder
            .data(DataSpec::dataset("pet_data_dir", FileFormat::Directory))
            .data(
                DataSpec::dataset("frame_start_times", FileFormat::Text)
                    .produced_by("motion_framing_pet_pipeline"),
            )
            .data(
                DataSpec::dataset("frame_vol_numbers", FileFormat::Text)
                    .produced_by("motion_framing_pet_pipeline"),
            )
            .data(
                DataSpec::dataset("timestamps", FileFormat::Directory)
                    .produced_by("motion_framing_pet_pipeline"),
            )
            .pipeline("motion_framing_pet_pipeline", |ctx: &PipelineContext<'_>| {
                motion_framing_pipeline(ctx, true)
            });
        inputs.push(InputMatch::dataset("pet_data_dir", dir, FileFormat::Directory));
    }

    let reference = match scans.reference_type {
        ReferenceType::T1 => mri::t1_study(config)?,
        ReferenceType::T2 => mri::t2_study()?,
    };
    builder = builder
        .sub_study("ref", reference, std::iter::empty::<(&str, &str)>())
        .translate(
            "ref_motion_mats_pipeline",
            "ref",
            "motion_mats_pipeline",
            [("reference_scan", true)],
        );
    inputs.push(InputMatch::dataset("ref_primary", &scans.reference, FileFormat::Dicom));

    if !scans.t1s.is_empty() {
        let t1 = mri::t1_study(config)?;
        for (i, scan) in scans.t1s.iter().enumerate() {
            builder = builder.sub_study(format!("t1_{i}"), Arc::clone(&t1), REFERENCE_MAP);
            inputs.push(InputMatch::dataset(format!("t1_{i}_primary"), scan, FileFormat::Dicom));
        }
    }

    let mut t2_scans: Vec<String> = scans.t2s.clone();

    if !scans.epis.is_empty() {
        let epi = epi::epi_study()?;
        for (i, scan) in scans.epis.iter().enumerate() {
            builder = builder.sub_study(format!("epi_{i}"), Arc::clone(&epi), EPI_REFERENCE_MAP);
            inputs.push(InputMatch::dataset(format!("epi_{i}_primary"), scan, FileFormat::Dicom));
        }
    }

    let mut dwi = None;
    if !scans.dwis.is_empty() {
        let assignment = assign_dwi_scans(&scans.dwis);
        let study = dwi_study()?;
        for (i, group) in assignment.groups.iter().enumerate() {
            let sub = format!("dwi_{i}");
            builder = builder.sub_study(sub.clone(), Arc::clone(&study), REFERENCE_MAP);
            for (role, scan) in [
                ("dwi_main", &group.main),
                ("dwi_ref_plus", &group.ref_plus),
                ("dwi_ref_minus", &group.ref_minus),
            ] {
                if let Some(scan) = scan {
                    inputs.push(InputMatch::dataset(
                        format!("{sub}_{role}"),
                        scan,
                        FileFormat::Dicom,
                    ));
                }
            }
            if !assignment.distortion_correction {
                builder = builder.translate(
                    format!("{sub}_dwi_preproc_pipeline"),
                    sub.as_str(),
                    "dwi_preproc_pipeline",
                    [("distortion_correction", false)],
                );
            }
        }
        t2_scans.extend(assignment.unused.iter().cloned());
        dwi = Some(assignment);
    }

    if !t2_scans.is_empty() {
        let t2 = mri::t2_study()?;
        for (i, scan) in t2_scans.iter().enumerate() {
            builder = builder.sub_study(format!("t2_{i}"), Arc::clone(&t2), REFERENCE_MAP);
            inputs.push(InputMatch::dataset(format!("t2_{i}_primary"), scan.as_str(), FileFormat::Dicom));
        }
    }

    let definition = builder.build()?;
    tracing::info!(
        study = %name,
        sub_studies = definition.sub_study_specs().count(),
        inputs = inputs.len(),
        "motion detection study created"
    );
    Ok(MotionDetectionSetup {
        definition,
        inputs,
        dwi,
    })
}

fn mean_displacement_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    // Sub-studies without motion matrices take no part.
    let mut sources: Vec<Vec<String>> = Vec::new();
    for sub in ctx.sub_study_specs() {
        let names: Result<Vec<String>, _> = MOTION_INPUTS
            .iter()
            .map(|(internal, _)| sub.inverse_map(internal))
            .collect();
        match names {
            Ok(names) => sources.push(names),
            Err(err) => tracing::debug!(
                study = %ctx.study().name(),
                sub_study = %sub.name(),
                error = %err,
                "sub-study skipped for mean displacement"
            ),
        }
    }
    if sources.is_empty() {
        return Err(WiringError::no_producer(
            ctx.study().name(),
            "motion_mats",
            Some(ctx.pipeline_name().as_str()),
        )
        .into());
    }

    let mut builder = ctx
        .create_pipeline()
        .desc("Calculates the mean displacement between each motion matrix and the reference")
        .citation(citation::FSL)
        .input("ref_brain")?;
    for name in sources.iter().flatten() {
        builder = builder.input(name)?;
    }
    for output in [
        "mean_displacement",
        "mean_displacement_rc",
        "mean_displacement_consecutive",
        "start_times",
        "motion_par_rc",
        "motion_par",
        "offset_indexes",
        "mats4average",
    ] {
        builder = builder.output(output)?;
    }

    for (_, merge) in MOTION_INPUTS {
        builder = builder.add_node(ToolNode::new(merge, interfaces::merge(sources.len())))?;
    }
    builder = builder.add_node(ToolNode::new(
        "scan_time_info",
        interfaces::mean_displacement_calculation(),
    ))?;

    for (i, names) in sources.iter().enumerate() {
        let port = format!("in{}", i + 1);
        for (name, (_, merge)) in names.iter().zip(MOTION_INPUTS) {
            builder = builder.connect_input(name, merge, &port)?;
        }
    }
    builder
        .connect("merge_motion_mats", "out", "scan_time_info", "motion_mats")?
        .connect("merge_tr", "out", "scan_time_info", "trs")?
        .connect("merge_start_time", "out", "scan_time_info", "start_times")?
        .connect("merge_real_duration", "out", "scan_time_info", "real_durations")?
        .connect_input("ref_brain", "scan_time_info", "reference")?
        .connect_output("mean_displacement", "scan_time_info", "mean_displacement")?
        .connect_output("mean_displacement_rc", "scan_time_info", "mean_displacement_rc")?
        .connect_output(
            "mean_displacement_consecutive",
            "scan_time_info",
            "mean_displacement_consecutive",
        )?
        .connect_output("start_times", "scan_time_info", "start_times")?
        .connect_output("motion_par_rc", "scan_time_info", "motion_parameters_rc")?
        .connect_output("motion_par", "scan_time_info", "motion_parameters")?
        .connect_output("offset_indexes", "scan_time_info", "offset_indexes")?
        .connect_output("mats4average", "scan_time_info", "mats4average")?
        .build()
}

fn motion_framing_pipeline(
    ctx: &PipelineContext<'_>,
    pet_data_dir: bool,
) -> Result<Pipeline, NiflowError> {
    let options = ctx.options();
    let mut builder = ctx
        .create_pipeline()
        .desc("Finds when head movement exceeded the framing threshold")
        .citation(citation::FSL)
        .input("mean_displacement")?
        .input("mean_displacement_consecutive")?
        .input("start_times")?
        .output("frame_start_times")?
        .output("frame_vol_numbers")?
        .output("timestamps")?
        .add_node(
            ToolNode::new("motion_framing", interfaces::motion_framing())
                .param("motion_threshold", options.float("framing_th")?)
                .param("temporal_threshold", options.float("framing_temporal_th")?),
        )?
        .connect_input("mean_displacement", "motion_framing", "mean_displacement")?
        .connect_input(
            "mean_displacement_consecutive",
            "motion_framing",
            "mean_displacement_consec",
        )?
        .connect_input("start_times", "motion_framing", "start_times")?;
    if pet_data_dir {
        builder = builder
            .input("pet_data_dir")?
            .connect_input("pet_data_dir", "motion_framing", "pet_data_dir")?;
    }
    builder
        .connect_output("frame_start_times", "motion_framing", "frame_start_times")?
        .connect_output("frame_vol_numbers", "motion_framing", "frame_vol_numbers")?
        .connect_output("timestamps", "motion_framing", "timestamps_dir")?
        .build()
}

fn plot_mean_displacement_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    ctx.create_pipeline()
        .desc("Plots the mean displacement against real clock time")
        .citation(citation::FSL)
        .input("mean_displacement_rc")?
        .input("offset_indexes")?
        .input("frame_start_times")?
        .output("mean_displacement_plot")?
        .add_node(
            ToolNode::new("plot_md", interfaces::plot_mean_displacement())
                .param("framing", ctx.options().bool("md_framing")?),
        )?
        .connect_input("mean_displacement_rc", "plot_md", "mean_disp_rc")?
        .connect_input("offset_indexes", "plot_md", "false_indexes")?
        .connect_input("frame_start_times", "plot_md", "frame_start_times")?
        .connect_output("mean_displacement_plot", "plot_md", "mean_disp_plot")?
        .build()
}

fn frame_mean_transformation_mats_pipeline(
    ctx: &PipelineContext<'_>,
) -> Result<Pipeline, NiflowError> {
    ctx.create_pipeline()
        .desc("Averages the transformation matrices within each frame")
        .citation(citation::FSL)
        .input("mats4average")?
        .input("frame_vol_numbers")?
        .output("average_mats")?
        .add_node(ToolNode::new("mats_averaging", interfaces::affine_mat_averaging()))?
        .connect_input("frame_vol_numbers", "mats_averaging", "frame_vol_numbers")?
        .connect_input("mats4average", "mats_averaging", "all_mats4average")?
        .connect_output("average_mats", "mats_averaging", "average_mats")?
        .build()
}

fn pet_correction_factors_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    ctx.create_pipeline()
        .desc("Frame duration correction factors for averaging the PET frames")
        .citation(citation::FSL)
        .input("timestamps")?
        .output("correction_factors")?
        .add_node(ToolNode::new("pet_corr_factors", interfaces::pet_correction_factor()))?
        .connect_input("timestamps", "pet_corr_factors", "timestamps")?
        .connect_output("correction_factors", "pet_corr_factors", "corr_factors")?
        .build()
}

/// Aligns every frame to the reference. The attenuation map is realigned
/// too when one is provided.
fn frame2ref_alignment_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let options = ctx.options();
    let with_umap = ctx.is_provided("umap");
    let mut builder = ctx
        .create_pipeline()
        .desc("Creates the matrices aligning each frame to the reference")
        .citation(citation::FSL)
        .input("average_mats")?
        .input("ute_reg_mat")?
        .input("ute_qform_mat")?
        .output("frame2reference_mats")?
        .add_node(
            ToolNode::new("frame2ref_alignment", interfaces::frame_align2reference())
                .param("pct", options.bool("align_pct")?)
                .param("fixed_binning", options.bool("align_fixed_binning")?),
        )?
        .connect_input("average_mats", "frame2ref_alignment", "average_mats")?
        .connect_input("ute_reg_mat", "frame2ref_alignment", "ute_regmat")?
        .connect_input("ute_qform_mat", "frame2ref_alignment", "ute_qform_mat")?
        .connect_output("frame2reference_mats", "frame2ref_alignment", "frame2reference_mats")?;
    if with_umap {
        builder = builder
            .input("umap")?
            .output("umaps_align2ref")?
            .connect_input("umap", "frame2ref_alignment", "umap")?
            .connect_output("umaps_align2ref", "frame2ref_alignment", "umaps_align2ref")?;
    }
    builder.build()
}

fn gather_outputs_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let gathered = ["mean_displacement_plot", "motion_par"];
    let mut builder = ctx
        .create_pipeline()
        .desc("Gathers the motion detection outputs into one directory")
        .citation(citation::FSL)
        .output("motion_detection_output")?
        .add_node(ToolNode::new("merge_inputs", interfaces::merge(gathered.len())))?
        .add_node(ToolNode::new("copy2dir", interfaces::copy_to_dir()))?;
    for (i, name) in gathered.into_iter().enumerate() {
        builder = builder
            .input(name)?
            .connect_input(name, "merge_inputs", &format!("in{}", i + 1))?;
    }
    builder
        .connect("merge_inputs", "out", "copy2dir", "in_files")?
        .connect_output("motion_detection_output", "copy2dir", "out_dir")?
        .build()
}

fn create_moco_series_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let template = ctx.options().str("moco_template")?;
    if template.is_empty() {
        return Err(ConfigError::Missing {
            name: REFERENCE_DATA_VAR.to_string(),
        }
        .into());
    }
    ctx.create_pipeline()
        .desc("Creates a MoCo series the scanner can import to correct the PET data")
        .citation(citation::FSL)
        .input("start_times")?
        .input("motion_par")?
        .output("moco_series")?
        .add_node(
            ToolNode::new("create_moco_series", interfaces::create_moco_series())
                .param("moco_template", template),
        )?
        .connect_input("start_times", "create_moco_series", "start_times")?
        .connect_input("motion_par", "create_moco_series", "motion_par")?
        .connect_output("moco_series", "create_moco_series", "modified_moco")?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use crate::studies::dwi::DwiRole;
    use crate::testing::{
        assert_error_code, assert_produced_by, assert_runs_before, assert_study_input,
    };
    use pretty_assertions::assert_eq;

    fn config() -> NiflowConfig {
        let mut config = NiflowConfig::default().with_fsl_dir("/opt/fsl");
        config.reference_data_dir = Some("/data/reference".into());
        config
    }

    fn t1_session() -> MotionDetectionScans {
        MotionDetectionScans::new("t1_mprage_ref", ReferenceType::T1).with_t1("t1_mprage_2")
    }

    #[test]
    fn test_reference_alone_is_rejected() {
        let scans = MotionDetectionScans::new("t1_mprage_ref", ReferenceType::T1);
        let err = create_motion_detection_study(&config(), "md", &scans).unwrap_err();
        assert!(matches!(
            err,
            NiflowError::Config(ConfigError::InsufficientScans { .. })
        ));
    }

    #[test]
    fn test_reference_type_parsing() {
        assert_eq!("t2".parse::<ReferenceType>().unwrap(), ReferenceType::T2);
        assert!("ute".parse::<ReferenceType>().is_err());
    }

    #[test]
    fn test_sub_studies_share_the_reference_brain() {
        let setup = create_motion_detection_study(&config(), "md", &t1_session()).unwrap();
        let definition = &setup.definition;

        assert_produced_by(definition, "ref_brain", "ref_brain_extraction_pipeline");
        assert_produced_by(definition, "ref_motion_mats", "ref_motion_mats_pipeline");
        assert_produced_by(definition, "t1_0_motion_mats", "t1_0_motion_mats_pipeline");
        assert_study_input(definition, "t1_0_primary");
        assert!(!definition.declares("t1_0_coreg_ref_brain"));

        let names: Vec<&str> = setup.inputs.iter().map(InputMatch::name).collect();
        assert_eq!(names, vec!["ref_primary", "t1_0_primary"]);
    }

    #[test]
    fn test_mean_displacement_probes_every_sub_study() {
        let setup = create_motion_detection_study(&config(), "md", &t1_session()).unwrap();
        let study = setup.study("subject").unwrap();
        let pipeline = study.pipeline("mean_displacement_pipeline").unwrap();
        let inputs: Vec<&str> = pipeline.input_names().collect();
        assert_eq!(
            inputs,
            vec![
                "ref_brain",
                "ref_motion_mats",
                "ref_tr",
                "ref_start_time",
                "ref_real_duration",
                "t1_0_motion_mats",
                "t1_0_tr",
                "t1_0_start_time",
                "t1_0_real_duration",
            ]
        );
        assert_eq!(pipeline.node("merge_tr").unwrap().interface().inputs().len(), 2);
    }

    #[test]
    fn test_reference_motion_mats_are_identities() {
        let setup = create_motion_detection_study(&config(), "md", &t1_session()).unwrap();
        let study = setup.study("subject").unwrap();
        let pipeline = study.pipeline("ref_motion_mats_pipeline").unwrap();
        let inputs: Vec<&str> = pipeline.input_names().collect();
        assert_eq!(inputs, vec!["ref_preproc"]);
        assert_eq!(
            pipeline.node("motion_mats").unwrap().params().get("reference"),
            Some(&true.into())
        );
    }

    #[test]
    fn test_full_workflow_resolves() {
        let setup = create_motion_detection_study(&config(), "md", &t1_session()).unwrap();
        let study = setup.study("subject").unwrap();
        let graph = study.workflow(&["motion_detection_output"]).unwrap();

        assert_runs_before(&graph, "ref_brain_extraction_pipeline", "t1_0_coregistration_pipeline");
        assert_runs_before(&graph, "t1_0_motion_mats_pipeline", "mean_displacement_pipeline");
        assert_runs_before(&graph, "ref_motion_mats_pipeline", "mean_displacement_pipeline");
        assert_runs_before(&graph, "motion_framing_pipeline", "plot_mean_displacement_pipeline");
        assert_eq!(
            graph.execution_order().last(),
            Some(&"gather_outputs_pipeline")
        );
    }

    #[test]
    fn test_pet_data_dir_replaces_framing() {
        let scans = t1_session().with_pet_data_dir("pet_listmode");
        let setup = create_motion_detection_study(&config(), "md", &scans).unwrap();
        assert_produced_by(&setup.definition, "frame_start_times", "motion_framing_pet_pipeline");
        assert_produced_by(&setup.definition, "timestamps", "motion_framing_pet_pipeline");

        let study = setup.study("subject").unwrap();
        let graph = study.workflow(&["correction_factors"]).unwrap();
        let framing = graph.pipeline("motion_framing_pet_pipeline").unwrap();
        assert!(framing.input_names().any(|name| name == "pet_data_dir"));
        assert!(graph.pipeline("motion_framing_pipeline").is_none());
    }

    #[test]
    fn test_epi_maps_reference_segmentation() {
        let scans = MotionDetectionScans::new("t1_mprage_ref", ReferenceType::T1).with_epi("bold");
        let setup = create_motion_detection_study(&config(), "md", &scans).unwrap();
        let study = setup.study("subject").unwrap();
        let pipeline = study.pipeline("epi_0_coregistration_pipeline").unwrap();
        let inputs: Vec<&str> = pipeline.input_names().collect();
        assert_eq!(
            inputs,
            vec!["epi_0_brain", "ref_preproc", "ref_brain", "ref_wm_seg"]
        );
    }

    #[test]
    fn test_dwi_scans_and_leftovers() {
        let scans = MotionDetectionScans::new("t2_space_ref", ReferenceType::T2)
            .with_t2("t2_flair")
            .with_dwi(DwiScan::new("dwi_ap", DwiRole::Main))
            .with_dwi(DwiScan::new("b0_ap", DwiRole::Reference));
        let setup = create_motion_detection_study(&config(), "md", &scans).unwrap();

        let names: Vec<&str> = setup.inputs.iter().map(InputMatch::name).collect();
        assert_eq!(
            names,
            vec!["ref_primary", "dwi_0_dwi_main", "t2_0_primary", "t2_1_primary"]
        );
        let assignment = setup.dwi.as_ref().unwrap();
        assert!(!assignment.distortion_correction);

        let study = setup.study("subject").unwrap();
        let preproc = study.pipeline("dwi_0_dwi_preproc_pipeline").unwrap();
        assert!(preproc.node("dwipreproc").unwrap().params().contains_key("rpe_none"));
    }

    #[test]
    fn test_umap_alignment_needs_umap() {
        let setup = create_motion_detection_study(&config(), "md", &t1_session()).unwrap();
        let with_ute = |umap: bool| {
            let mut builder = Study::builder(Arc::clone(&setup.definition), "subject")
                .inputs(setup.inputs.iter().cloned())
                .input(InputMatch::dataset("ute_reg_mat", "ute_reg", FileFormat::TextMatrix))
                .input(InputMatch::dataset("ute_qform_mat", "ute_qform", FileFormat::TextMatrix));
            if umap {
                builder = builder.input(InputMatch::dataset("umap", "umap", FileFormat::NiftiGz));
            }
            builder.build().unwrap()
        };

        let err = with_ute(false).workflow(&["umaps_align2ref"]).unwrap_err();
        assert_error_code(&err, codes::MISSING_OUTPUT);

        let graph = with_ute(true).workflow(&["umaps_align2ref"]).unwrap();
        assert_eq!(
            graph.execution_order().last(),
            Some(&"frame2ref_alignment_pipeline")
        );
    }

    #[test]
    fn test_moco_series_needs_template() {
        let setup =
            create_motion_detection_study(&NiflowConfig::default(), "md", &t1_session()).unwrap();
        let study = setup.study("subject").unwrap();
        let err = study.pipeline("create_moco_series_pipeline").unwrap_err();
        assert!(matches!(err, NiflowError::Config(ConfigError::Missing { .. })));

        let setup = create_motion_detection_study(&config(), "md", &t1_session()).unwrap();
        let study = setup.study("subject").unwrap();
        let pipeline = study.pipeline("create_moco_series_pipeline").unwrap();
        assert_eq!(
            pipeline.node("create_moco_series").unwrap().params().get("moco_template"),
            Some(&"/data/reference/moco_template.IMA".into())
        );
    }
}
