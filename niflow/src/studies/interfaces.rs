//! Interfaces of the external tools and engine builtins used by the catalog.
//!
//! Command interfaces carry the command line of the wrapped binary.
//! Builtins are operations the workflow engine implements itself (merging
//! lists, reading DICOM headers, motion bookkeeping).

use crate::pipeline::citation::{self, DCM2NIIX_REQ, FSL_REQ, MRTRIX_REQ};
use crate::pipeline::{Arg, ToolInterface};

/// DICOM to gzipped NIfTI conversion.
#[must_use]
pub fn dcm2niix() -> ToolInterface {
    ToolInterface::command("dcm2niix", "dcm2niix")
        .input("in_dir")
        .output("converted")
        .arg(Arg::literal("-z"))
        .arg(Arg::literal("y"))
        .arg(Arg::output_flag("-o", "converted"))
        .arg(Arg::input("in_dir"))
        .requires(DCM2NIIX_REQ)
        .cites(citation::DCM2NIIX)
}

/// MRtrix format conversion, optionally regridding to `voxel_size`.
#[must_use]
pub fn mrconvert() -> ToolInterface {
    ToolInterface::command("mrconvert", "mrconvert")
        .input("in_file")
        .output("out_file")
        .arg(Arg::input("in_file"))
        .arg(Arg::param("-vox", "voxel_size"))
        .arg(Arg::output("out_file"))
        .requires(MRTRIX_REQ)
        .cites(citation::MRTRIX)
}

/// Concatenates two images along the volume axis.
#[must_use]
pub fn mrcat() -> ToolInterface {
    ToolInterface::command("mrcat", "mrcat")
        .input("first")
        .input("second")
        .output("out_file")
        .arg(Arg::literal("-axis"))
        .arg(Arg::literal("3"))
        .arg(Arg::input("first"))
        .arg(Arg::input("second"))
        .arg(Arg::output("out_file"))
        .requires(MRTRIX_REQ)
        .cites(citation::MRTRIX)
}

/// FSL brain extraction.
#[must_use]
pub fn bet() -> ToolInterface {
    ToolInterface::command("bet", "bet")
        .input("in_file")
        .output("out_file")
        .output("mask_file")
        .arg(Arg::input("in_file"))
        .arg(Arg::output("out_file"))
        .arg(Arg::literal("-m"))
        .arg(Arg::param("-f", "frac"))
        .arg(Arg::param("-B", "reduce_bias"))
        .requires(FSL_REQ)
        .cites(citation::BET)
}

/// FSL linear registration.
#[must_use]
pub fn flirt() -> ToolInterface {
    ToolInterface::command("flirt", "flirt")
        .input("in_file")
        .input("reference")
        .optional_input("in_matrix_file")
        .output("out_file")
        .output("out_matrix_file")
        .arg(Arg::input_flag("-in", "in_file"))
        .arg(Arg::input_flag("-ref", "reference"))
        .arg(Arg::input_flag("-init", "in_matrix_file"))
        .arg(Arg::output_flag("-out", "out_file"))
        .arg(Arg::output_flag("-omat", "out_matrix_file"))
        .arg(Arg::param("-dof", "dof"))
        .arg(Arg::param("-cost", "cost"))
        .arg(Arg::param("-applyxfm", "apply_xfm"))
        .arg(Arg::param("-usesqform", "uses_qform"))
        .requires(FSL_REQ)
        .cites(citation::FLIRT)
}

/// FSL motion correction of a 4D series.
#[must_use]
pub fn mcflirt() -> ToolInterface {
    ToolInterface::command("mcflirt", "mcflirt")
        .input("in_file")
        .output("out_file")
        .output("mat_dir")
        .output("par_file")
        .arg(Arg::input_flag("-in", "in_file"))
        .arg(Arg::output_flag("-out", "out_file"))
        .arg(Arg::literal("-mats"))
        .arg(Arg::literal("-plots"))
        .requires(FSL_REQ)
        .cites(citation::FLIRT)
}

/// FSL tissue segmentation. `img_type` is 1 for T1, 2 for T2 images.
#[must_use]
pub fn fast() -> ToolInterface {
    ToolInterface::command("fast", "fast")
        .input("in_file")
        .output("wm_pve")
        .arg(Arg::param("-t", "img_type"))
        .arg(Arg::literal("-n"))
        .arg(Arg::literal("3"))
        .arg(Arg::output_flag("-o", "wm_pve"))
        .arg(Arg::input("in_file"))
        .requires(FSL_REQ)
        .cites(citation::FAST)
}

/// Boundary-based registration of an EPI to a structural image.
#[must_use]
pub fn epi_reg() -> ToolInterface {
    ToolInterface::command("epi_reg", "epi_reg")
        .input("epi")
        .input("t1_head")
        .input("t1_brain")
        .optional_input("wmseg")
        .output("out_file")
        .output("epi2str_mat")
        .arg(Arg::input_flag("--epi", "epi"))
        .arg(Arg::input_flag("--t1", "t1_head"))
        .arg(Arg::input_flag("--t1brain", "t1_brain"))
        .arg(Arg::input_flag("--wmseg", "wmseg"))
        .arg(Arg::output_flag("--out", "out_file"))
        .requires(FSL_REQ)
        .cites(citation::EPI_REG)
}

/// MRtrix diffusion preprocessing wrapping FSL's eddy and topup.
#[must_use]
pub fn dwipreproc() -> ToolInterface {
    ToolInterface::command("dwipreproc", "dwipreproc")
        .input("in_file")
        .optional_input("se_epi")
        .output("out_file")
        .arg(Arg::input("in_file"))
        .arg(Arg::output("out_file"))
        .arg(Arg::param("-pe_dir", "pe_dir"))
        .arg(Arg::param("-rpe_none", "rpe_none"))
        .arg(Arg::param("-rpe_pair", "rpe_pair"))
        .arg(Arg::input_flag("-se_epi", "se_epi"))
        .requires(MRTRIX_REQ)
        .requires(FSL_REQ)
        .cites(citation::MRTRIX)
        .cites(citation::EDDY)
}

/// Gathers `inputs` values into one list on port `out`.
#[must_use]
pub fn merge(inputs: usize) -> ToolInterface {
    (1..=inputs)
        .fold(ToolInterface::builtin("merge"), |interface, i| {
            interface.input(format!("in{i}"))
        })
        .output("out")
}

/// Reads acquisition timing and phase encoding from DICOM headers.
#[must_use]
pub fn dicom_header_info() -> ToolInterface {
    ToolInterface::builtin("dicom_header_info")
        .input("dicom_folder")
        .output("tr")
        .output("start_time")
        .output("real_duration")
        .output("tot_duration")
        .output("ped")
        .output("pe_angle")
        .output("dcm_info")
        .output("ref_motion_mats")
}

/// Composes registration, qform and per-volume alignment matrices into
/// one motion matrix per volume. A reference scan yields identities.
#[must_use]
pub fn motion_mat_calculation() -> ToolInterface {
    ToolInterface::builtin("motion_mat_calculation")
        .optional_input("reg_mat")
        .optional_input("qform_mat")
        .optional_input("align_mats")
        .optional_input("ref_image")
        .output("motion_mats")
}

/// Mean displacement of every volume from the reference.
#[must_use]
pub fn mean_displacement_calculation() -> ToolInterface {
    ToolInterface::builtin("mean_displacement_calculation")
        .input("motion_mats")
        .input("trs")
        .input("start_times")
        .input("real_durations")
        .input("reference")
        .output("mean_displacement")
        .output("mean_displacement_rc")
        .output("mean_displacement_consecutive")
        .output("start_times")
        .output("motion_parameters_rc")
        .output("motion_parameters")
        .output("offset_indexes")
        .output("mats4average")
}

/// Splits the acquisition into frames wherever motion exceeds a threshold.
#[must_use]
pub fn motion_framing() -> ToolInterface {
    ToolInterface::builtin("motion_framing")
        .input("mean_displacement")
        .input("mean_displacement_consec")
        .input("start_times")
        .optional_input("pet_data_dir")
        .input("motion_threshold")
        .input("temporal_threshold")
        .output("frame_start_times")
        .output("frame_vol_numbers")
        .output("timestamps_dir")
}

/// Plots mean displacement against real clock time.
#[must_use]
pub fn plot_mean_displacement() -> ToolInterface {
    ToolInterface::builtin("plot_mean_displacement_rc")
        .input("mean_disp_rc")
        .input("false_indexes")
        .input("frame_start_times")
        .input("framing")
        .output("mean_disp_plot")
}

/// Averages the transformation matrices within each frame.
#[must_use]
pub fn affine_mat_averaging() -> ToolInterface {
    ToolInterface::builtin("affine_mat_averaging")
        .input("frame_vol_numbers")
        .input("all_mats4average")
        .output("average_mats")
}

/// Duration correction factors for averaging PET frames.
#[must_use]
pub fn pet_correction_factor() -> ToolInterface {
    ToolInterface::builtin("pet_correction_factor")
        .input("timestamps")
        .output("corr_factors")
}

/// Aligns every frame, and optionally the attenuation map, to the
/// reference position.
#[must_use]
pub fn frame_align2reference() -> ToolInterface {
    ToolInterface::builtin("frame_align2reference")
        .input("average_mats")
        .input("ute_regmat")
        .input("ute_qform_mat")
        .optional_input("umap")
        .input("pct")
        .input("fixed_binning")
        .output("frame2reference_mats")
        .output("umaps_align2ref")
        .requires(FSL_REQ)
}

/// Writes a scanner-importable MoCo series from motion parameters.
#[must_use]
pub fn create_moco_series() -> ToolInterface {
    ToolInterface::builtin("create_moco_series")
        .input("start_times")
        .input("motion_par")
        .input("moco_template")
        .output("modified_moco")
}

/// Copies a list of files into one directory.
#[must_use]
pub fn copy_to_dir() -> ToolInterface {
    ToolInterface::builtin("copy_to_dir")
        .input("in_files")
        .output("out_dir")
}
