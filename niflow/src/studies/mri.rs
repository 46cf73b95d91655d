//! Structural MRI studies: the common base, T1, T2 and the motion
//! reference variants.

use std::sync::Arc;

use super::interfaces;
use crate::config::{Atlas, AtlasImage, NiflowConfig, Resolution, FSL_DIR_VAR};
use crate::errors::{ConfigError, NiflowError, SpecificationError};
use crate::formats::{FileFormat, ScalarType};
use crate::pipeline::{citation, Pipeline, PipelineContext, ToolNode};
use crate::spec::{DataSpec, OptionSpec, OptionValue};
use crate::study::{StudyBuilder, StudyDefinition};

/// Fields and datasets read from the DICOM headers.
pub const HEADER_FIELDS: [&str; 6] = [
    "tr",
    "start_time",
    "real_duration",
    "tot_duration",
    "ped",
    "pe_angle",
];

/// The MRI base study every modality extends.
pub fn mri_study() -> Result<Arc<StudyDefinition>, SpecificationError> {
    mri_builder("mri").build()
}

fn mri_builder(name: &str) -> StudyBuilder {
    let builder = StudyDefinition::builder(name)
        .desc("DICOM conversion, brain extraction and coregistration of one MR scan")
        .data(DataSpec::dataset("primary", FileFormat::Dicom))
        .data(
            DataSpec::dataset("coreg_ref_brain", FileFormat::NiftiGz)
                .with_desc("Brain-extracted image to coregister to"),
        )
        .data(DataSpec::dataset("preproc", FileFormat::NiftiGz).produced_by("basic_preproc_pipeline"))
        .data(DataSpec::dataset("brain", FileFormat::NiftiGz).produced_by("brain_extraction_pipeline"))
        .data(
            DataSpec::dataset("brain_mask", FileFormat::NiftiGz)
                .produced_by("brain_extraction_pipeline"),
        )
        .data(
            DataSpec::dataset("coreg_brain", FileFormat::NiftiGz)
                .produced_by("coregistration_pipeline"),
        )
        .data(
            DataSpec::dataset("coreg_matrix", FileFormat::TextMatrix)
                .produced_by("coregistration_pipeline"),
        )
        .data(
            DataSpec::dataset("qformed", FileFormat::NiftiGz)
                .produced_by("qform_transform_pipeline"),
        )
        .data(
            DataSpec::dataset("qform_mat", FileFormat::TextMatrix)
                .produced_by("qform_transform_pipeline"),
        )
        .data(
            DataSpec::dataset("motion_mats", FileFormat::MotionMats)
                .produced_by("motion_mats_pipeline"),
        )
        .data(DataSpec::dataset("wm_seg", FileFormat::NiftiGz).produced_by("segmentation_pipeline"))
        .option(
            OptionSpec::new("preproc_resolution", Vec::<i64>::new())
                .with_desc("Voxel size to regrid to after conversion, empty keeps the native grid"),
        )
        .option(OptionSpec::new("bet_frac", 0.5))
        .option(OptionSpec::new("bet_reduce_bias", false))
        .option(OptionSpec::new("coreg_dof", 6))
        .option(OptionSpec::new("coreg_cost", "normmi"))
        .option(OptionSpec::new("segmentation_img_type", 1))
        .option(
            OptionSpec::new("reference_scan", false)
                .with_desc("Treat the scan as the motion reference"),
        )
        .pipeline("basic_preproc_pipeline", basic_preproc_pipeline)
        .pipeline("brain_extraction_pipeline", brain_extraction_pipeline)
        .pipeline("coregistration_pipeline", coregistration_pipeline)
        .pipeline("qform_transform_pipeline", qform_transform_pipeline)
        .pipeline("header_info_extraction_pipeline", |ctx: &PipelineContext<'_>| {
            header_info_pipeline(ctx, "primary", false)
        })
        .pipeline("motion_mats_pipeline", |ctx: &PipelineContext<'_>| {
            motion_mats_pipeline(ctx, None)
        })
        .pipeline("segmentation_pipeline", segmentation_pipeline);
    with_header_fields(builder, "header_info_extraction_pipeline")
}

/// Declares the DICOM header fields and `dcm_info` as produced by
/// `producer`.
pub(super) fn with_header_fields(builder: StudyBuilder, producer: &str) -> StudyBuilder {
    HEADER_FIELDS
        .iter()
        .fold(builder, |builder, field| {
            let ty = if *field == "tr" {
                ScalarType::Float
            } else {
                ScalarType::Str
            };
            builder.data(DataSpec::field(*field, ty).produced_by(producer))
        })
        .data(DataSpec::dataset("dcm_info", FileFormat::Text).produced_by(producer))
}

/// T1-weighted structural study with registration to MNI space.
pub fn t1_study(config: &NiflowConfig) -> Result<Arc<StudyDefinition>, SpecificationError> {
    let template = config
        .atlas_path(Atlas::Mni152, AtlasImage::Masked, Resolution::TwoMm)
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    StudyDefinition::builder("t1")
        .desc("T1-weighted structural scan")
        .extends(mri_study()?)
        .data(
            DataSpec::dataset("mni_brain", FileFormat::NiftiGz)
                .produced_by("mni_registration_pipeline"),
        )
        .data(
            DataSpec::dataset("mni_matrix", FileFormat::TextMatrix)
                .produced_by("mni_registration_pipeline"),
        )
        .option(OptionSpec::new("bet_reduce_bias", true))
        .option(
            OptionSpec::new("mni_template", template)
                .with_desc("Brain-extracted MNI template, empty when FSL is not configured"),
        )
        .pipeline("mni_registration_pipeline", mni_registration_pipeline)
        .build()
}

/// T2-weighted structural study.
pub fn t2_study() -> Result<Arc<StudyDefinition>, SpecificationError> {
    StudyDefinition::builder("t2")
        .desc("T2-weighted structural scan")
        .extends(mri_study()?)
        .option(OptionSpec::new("segmentation_img_type", 2))
        .build()
}

/// A T1 scan acting as motion reference. Its motion matrices are
/// identities written while reading the headers.
pub fn motion_reference_t1_study(
    config: &NiflowConfig,
) -> Result<Arc<StudyDefinition>, SpecificationError> {
    motion_reference("motion_reference_t1", t1_study(config)?)
}

/// A T2 scan acting as motion reference.
pub fn motion_reference_t2_study() -> Result<Arc<StudyDefinition>, SpecificationError> {
    motion_reference("motion_reference_t2", t2_study()?)
}

fn motion_reference(
    name: &str,
    base: Arc<StudyDefinition>,
) -> Result<Arc<StudyDefinition>, SpecificationError> {
    let builder = StudyDefinition::builder(name)
        .extends(base)
        .data(DataSpec::dataset("wm_seg", FileFormat::NiftiGz).produced_by("segmentation_pipeline"))
        .data(
            DataSpec::dataset("motion_mats", FileFormat::MotionMats)
                .produced_by("header_info_extraction_pipeline"),
        )
        .data(DataSpec::dataset("preproc", FileFormat::NiftiGz).produced_by("basic_preproc_pipeline"))
        .option(OptionSpec::new("preproc_resolution", vec![1]))
        .pipeline("header_info_extraction_pipeline", |ctx: &PipelineContext<'_>| {
            header_info_pipeline(ctx, "primary", true)
        });
    with_header_fields(builder, "header_info_extraction_pipeline").build()
}

/// Converts `dicom` to NIfTI and optionally regrids it.
pub(super) fn conversion_nodes(
    ctx: &PipelineContext<'_>,
    prefix: &str,
) -> Result<(ToolNode, ToolNode), NiflowError> {
    let mut convert = ToolNode::new(format!("{prefix}mrconvert"), interfaces::mrconvert());
    if let Some(resolution) = voxel_size(ctx.option("preproc_resolution")?) {
        convert = convert.param("voxel_size", resolution);
    }
    Ok((
        ToolNode::new(format!("{prefix}dcm2niix"), interfaces::dcm2niix()),
        convert,
    ))
}

fn voxel_size(value: &OptionValue) -> Option<String> {
    value
        .as_list()
        .filter(|items| !items.is_empty())
        .map(|_| value.to_string())
}

fn basic_preproc_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let (dcm2niix, mrconvert) = conversion_nodes(ctx, "")?;
    ctx.create_pipeline()
        .desc("Converts the primary DICOM series to NIfTI")
        .citation(citation::MRTRIX)
        .input("primary")?
        .output("preproc")?
        .add_node(dcm2niix)?
        .add_node(mrconvert)?
        .connect_input("primary", "dcm2niix", "in_dir")?
        .connect("dcm2niix", "converted", "mrconvert", "in_file")?
        .connect_output("preproc", "mrconvert", "out_file")?
        .build()
}

fn brain_extraction_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let options = ctx.options();
    ctx.create_pipeline()
        .desc("Removes non-brain tissue")
        .citation(citation::FSL)
        .input("preproc")?
        .output("brain")?
        .output("brain_mask")?
        .add_node(
            ToolNode::new("bet", interfaces::bet())
                .param("frac", options.float("bet_frac")?)
                .param("reduce_bias", options.bool("bet_reduce_bias")?)
                .wall_time(5),
        )?
        .connect_input("preproc", "bet", "in_file")?
        .connect_output("brain", "bet", "out_file")?
        .connect_output("brain_mask", "bet", "mask_file")?
        .build()
}

fn coregistration_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let options = ctx.options();
    ctx.create_pipeline()
        .desc("Registers the brain to the reference brain")
        .citation(citation::FSL)
        .input("brain")?
        .input("coreg_ref_brain")?
        .output("coreg_brain")?
        .output("coreg_matrix")?
        .add_node(
            ToolNode::new("flirt", interfaces::flirt())
                .param("dof", options.int("coreg_dof")?)
                .param("cost", options.str("coreg_cost")?)
                .wall_time(5),
        )?
        .connect_input("brain", "flirt", "in_file")?
        .connect_input("coreg_ref_brain", "flirt", "reference")?
        .connect_output("coreg_brain", "flirt", "out_file")?
        .connect_output("coreg_matrix", "flirt", "out_matrix_file")?
        .build()
}

fn qform_transform_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    ctx.create_pipeline()
        .desc("Resamples the brain into the reference space using the header transform")
        .citation(citation::FSL)
        .input("brain")?
        .input("coreg_ref_brain")?
        .output("qformed")?
        .output("qform_mat")?
        .add_node(
            ToolNode::new("flirt", interfaces::flirt())
                .param("apply_xfm", true)
                .param("uses_qform", true),
        )?
        .connect_input("brain", "flirt", "in_file")?
        .connect_input("coreg_ref_brain", "flirt", "reference")?
        .connect_output("qformed", "flirt", "out_file")?
        .connect_output("qform_mat", "flirt", "out_matrix_file")?
        .build()
}

/// Reads the header fields of `dicom`. A reference scan also writes its
/// identity motion matrices.
pub(super) fn header_info_pipeline(
    ctx: &PipelineContext<'_>,
    dicom: &str,
    reference: bool,
) -> Result<Pipeline, NiflowError> {
    let mut builder = ctx
        .create_pipeline()
        .desc("Extracts acquisition timing and phase encoding from the DICOM headers")
        .citation(citation::FSL)
        .input(dicom)?;
    for field in HEADER_FIELDS.iter().chain(&["dcm_info"]) {
        builder = builder.output(field)?;
    }
    if reference {
        builder = builder.output("motion_mats")?;
    }
    builder = builder
        .add_node(ToolNode::new("header_info", interfaces::dicom_header_info()))?
        .connect_input(dicom, "header_info", "dicom_folder")?;
    for field in HEADER_FIELDS.iter().chain(&["dcm_info"]) {
        builder = builder.connect_output(field, "header_info", field)?;
    }
    if reference {
        builder = builder.connect_output("motion_mats", "header_info", "ref_motion_mats")?;
    }
    builder.build()
}

/// Motion matrices from the coregistration and qform matrices, or
/// identities for the reference scan. `align` names per-volume alignment
/// matrices to fold in.
pub(super) fn motion_mats_pipeline(
    ctx: &PipelineContext<'_>,
    align: Option<&str>,
) -> Result<Pipeline, NiflowError> {
    let reference = ctx.options().bool("reference_scan")?;
    let mut builder = ctx
        .create_pipeline()
        .desc("Calculates one motion matrix per volume")
        .citation(citation::FSL)
        .output("motion_mats")?
        .add_node(
            ToolNode::new("motion_mats", interfaces::motion_mat_calculation())
                .param("reference", reference),
        )?;
    if reference {
        builder = builder
            .input("preproc")?
            .connect_input("preproc", "motion_mats", "ref_image")?;
    } else {
        builder = builder
            .input("coreg_matrix")?
            .input("qform_mat")?
            .connect_input("coreg_matrix", "motion_mats", "reg_mat")?
            .connect_input("qform_mat", "motion_mats", "qform_mat")?;
        if let Some(align) = align {
            builder = builder
                .input(align)?
                .connect_input(align, "motion_mats", "align_mats")?;
        }
    }
    builder
        .connect_output("motion_mats", "motion_mats", "motion_mats")?
        .build()
}

fn segmentation_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    ctx.create_pipeline()
        .desc("White matter segmentation")
        .citation(citation::FSL)
        .input("brain")?
        .output("wm_seg")?
        .add_node(
            ToolNode::new("fast", interfaces::fast())
                .param("img_type", ctx.options().int("segmentation_img_type")?)
                .wall_time(40),
        )?
        .connect_input("brain", "fast", "in_file")?
        .connect_output("wm_seg", "fast", "wm_pve")?
        .build()
}

fn mni_registration_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    let template = ctx.options().str("mni_template")?;
    if template.is_empty() {
        return Err(ConfigError::Missing {
            name: FSL_DIR_VAR.to_string(),
        }
        .into());
    }
    ctx.create_pipeline()
        .desc("Registers the brain to the MNI template")
        .citation(citation::FSL)
        .input("brain")?
        .output("mni_brain")?
        .output("mni_matrix")?
        .add_node(
            ToolNode::new("flirt", interfaces::flirt())
                .param("reference", template)
                .param("dof", 12),
        )?
        .connect_input("brain", "flirt", "in_file")?
        .connect_output("mni_brain", "flirt", "out_file")?
        .connect_output("mni_matrix", "flirt", "out_matrix_file")?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use crate::study::{InputMatch, Study};
    use crate::testing::{assert_error_code, assert_produced_by, assert_study_input, provided_study};
    use pretty_assertions::assert_eq;

    fn fsl_config() -> NiflowConfig {
        NiflowConfig::default().with_fsl_dir("/opt/fsl")
    }

    #[test]
    fn test_mri_registry() {
        let mri = mri_study().unwrap();
        assert_study_input(&mri, "primary");
        assert_produced_by(&mri, "brain", "brain_extraction_pipeline");
        assert_produced_by(&mri, "tr", "header_info_extraction_pipeline");
        assert_produced_by(&mri, "motion_mats", "motion_mats_pipeline");
        assert_eq!(
            mri.data_spec("tr").unwrap().kind(),
            crate::spec::DataKind::Field(ScalarType::Float)
        );
    }

    #[test]
    fn test_t2_overrides_segmentation_type() {
        let t2 = t2_study().unwrap();
        let study = provided_study(&t2, "subject").unwrap();
        let pipeline = study.pipeline("segmentation_pipeline").unwrap();
        assert_eq!(
            pipeline.nodes()[0].params().get("img_type"),
            Some(&OptionValue::Int(2))
        );
        assert!(t2.is_a("mri"));
    }

    #[test]
    fn test_motion_reference_redeclares_motion_mats() {
        let reference = motion_reference_t1_study(&fsl_config()).unwrap();
        assert_produced_by(&reference, "motion_mats", "header_info_extraction_pipeline");
        assert_produced_by(&reference, "wm_seg", "segmentation_pipeline");

        let study = provided_study(&reference, "subject").unwrap();
        let pipeline = study.pipeline("header_info_extraction_pipeline").unwrap();
        assert!(pipeline.outputs().iter().any(|spec| spec.name() == "motion_mats"));
        let graph = study.workflow(&["motion_mats"]).unwrap();
        assert_eq!(graph.execution_order(), vec!["header_info_extraction_pipeline"]);
    }

    #[test]
    fn test_motion_mats_of_reference_scan_need_no_coregistration() {
        let t1 = t1_study(&fsl_config()).unwrap();
        let study = Study::builder(t1, "subject")
            .input(InputMatch::dataset("primary", "t1_mprage", FileFormat::Dicom))
            .option("reference_scan", true)
            .build()
            .unwrap();
        let graph = study.workflow(&["motion_mats"]).unwrap();
        assert_eq!(
            graph.execution_order(),
            vec!["basic_preproc_pipeline", "motion_mats_pipeline"]
        );
    }

    #[test]
    fn test_preproc_resolution_regrids() {
        let reference = motion_reference_t2_study().unwrap();
        let study = provided_study(&reference, "subject").unwrap();
        let pipeline = study.pipeline("basic_preproc_pipeline").unwrap();
        let convert = pipeline
            .nodes()
            .iter()
            .find(|node| node.name() == "mrconvert")
            .unwrap();
        assert_eq!(
            convert.params().get("voxel_size"),
            Some(&OptionValue::Str("1".to_string()))
        );
    }

    #[test]
    fn test_mni_registration_needs_fsl() {
        let t1 = t1_study(&NiflowConfig::default()).unwrap();
        let study = provided_study(&t1, "subject").unwrap();
        let err = study.pipeline("mni_registration_pipeline").unwrap_err();
        assert!(matches!(err, NiflowError::Config(ConfigError::Missing { .. })));

        let t1 = t1_study(&fsl_config()).unwrap();
        let study = provided_study(&t1, "subject").unwrap();
        let pipeline = study.pipeline("mni_registration_pipeline").unwrap();
        assert_eq!(
            pipeline.nodes()[0].params().get("reference"),
            Some(&OptionValue::Str(
                "/opt/fsl/data/standard/MNI152_T1_2mm_brain.nii.gz".to_string()
            ))
        );
    }

    #[test]
    fn test_coregistration_requires_reference_brain() {
        let t1 = t1_study(&fsl_config()).unwrap();
        let study = Study::builder(t1, "subject")
            .input(InputMatch::dataset("primary", "t1_mprage", FileFormat::Dicom))
            .build()
            .unwrap();
        let err = study.workflow(&["coreg_brain"]).unwrap_err();
        assert_error_code(&err, codes::NO_PRODUCER);
    }
}
