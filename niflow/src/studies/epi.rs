//! Echo-planar imaging series, motion corrected and registered to a
//! structural reference with boundary-based registration.

use std::sync::Arc;

use super::{interfaces, mri};
use crate::errors::{NiflowError, SpecificationError};
use crate::formats::FileFormat;
use crate::pipeline::{citation, Pipeline, PipelineContext, ToolNode};
use crate::spec::DataSpec;
use crate::study::StudyDefinition;

/// The EPI study.
pub fn epi_study() -> Result<Arc<StudyDefinition>, SpecificationError> {
    StudyDefinition::builder("epi")
        .desc("Echo-planar imaging series")
        .extends(mri::mri_study()?)
        .data(
            DataSpec::dataset("coreg_ref_preproc", FileFormat::NiftiGz)
                .with_desc("Whole-head reference image"),
        )
        .data(
            DataSpec::dataset("coreg_ref_wmseg", FileFormat::NiftiGz)
                .with_desc("White matter segmentation of the reference"),
        )
        .data(DataSpec::dataset("moco", FileFormat::NiftiGz).produced_by("motion_correction_pipeline"))
        .data(
            DataSpec::dataset("moco_mats", FileFormat::MotionMats)
                .produced_by("motion_correction_pipeline"),
        )
        .data(DataSpec::dataset("moco_par", FileFormat::Par).produced_by("motion_correction_pipeline"))
        .pipeline("motion_correction_pipeline", motion_correction_pipeline)
        .pipeline("coregistration_pipeline", epi_reg_pipeline)
        .pipeline("motion_mats_pipeline", |ctx: &PipelineContext<'_>| {
            mri::motion_mats_pipeline(ctx, Some("moco_mats"))
        })
        .build()
}

fn motion_correction_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    ctx.create_pipeline()
        .desc("Realigns every volume of the series")
        .citation(citation::FSL)
        .input("preproc")?
        .output("moco")?
        .output("moco_mats")?
        .output("moco_par")?
        .add_node(ToolNode::new("mcflirt", interfaces::mcflirt()).wall_time(15))?
        .connect_input("preproc", "mcflirt", "in_file")?
        .connect_output("moco", "mcflirt", "out_file")?
        .connect_output("moco_mats", "mcflirt", "mat_dir")?
        .connect_output("moco_par", "mcflirt", "par_file")?
        .build()
}

fn epi_reg_pipeline(ctx: &PipelineContext<'_>) -> Result<Pipeline, NiflowError> {
    ctx.create_pipeline()
        .desc("Registers the EPI to the reference using its white matter boundary")
        .citation(citation::FSL)
        .input("brain")?
        .input("coreg_ref_preproc")?
        .input("coreg_ref_brain")?
        .input("coreg_ref_wmseg")?
        .output("coreg_brain")?
        .output("coreg_matrix")?
        .add_node(ToolNode::new("epi_reg", interfaces::epi_reg()).wall_time(20))?
        .connect_input("brain", "epi_reg", "epi")?
        .connect_input("coreg_ref_preproc", "epi_reg", "t1_head")?
        .connect_input("coreg_ref_brain", "epi_reg", "t1_brain")?
        .connect_input("coreg_ref_wmseg", "epi_reg", "wmseg")?
        .connect_output("coreg_brain", "epi_reg", "out_file")?
        .connect_output("coreg_matrix", "epi_reg", "epi2str_mat")?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_runs_before, assert_study_input, provided_study};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_epi_inherits_mri() {
        let epi = epi_study().unwrap();
        assert!(epi.is_a("mri"));
        assert_study_input(&epi, "coreg_ref_wmseg");
        assert_study_input(&epi, "coreg_ref_preproc");
        assert!(epi.has_pipeline("brain_extraction_pipeline"));
    }

    #[test]
    fn test_coregistration_uses_epi_reg() {
        let epi = epi_study().unwrap();
        let study = provided_study(&epi, "subject").unwrap();
        let pipeline = study.pipeline("coregistration_pipeline").unwrap();
        assert_eq!(pipeline.nodes()[0].interface().id(), "epi_reg");
        assert_eq!(pipeline.inputs().len(), 4);
    }

    #[test]
    fn test_motion_mats_fold_in_volume_alignment() {
        let epi = epi_study().unwrap();
        let study = provided_study(&epi, "subject").unwrap();
        let graph = study.workflow(&["motion_mats"]).unwrap();
        assert_runs_before(&graph, "motion_correction_pipeline", "motion_mats_pipeline");
        assert_runs_before(&graph, "coregistration_pipeline", "motion_mats_pipeline");
        let pipeline = graph.pipeline("motion_mats_pipeline").unwrap();
        let inputs: Vec<&str> = pipeline.input_names().collect();
        assert_eq!(inputs, vec!["coreg_matrix", "qform_mat", "moco_mats"]);
    }
}
