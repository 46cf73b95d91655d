//! Built-in neuroimaging studies.
//!
//! The MRI base and its T1, T2, EPI and DWI refinements, the motion
//! reference variants, and the composite motion detection study that
//! embeds one sub-study per scan of a PET-MR session.

pub mod dwi;
pub mod epi;
pub mod interfaces;
pub mod motion_detection;
pub mod mri;

use std::sync::Arc;

use crate::config::NiflowConfig;
use crate::errors::{NiflowError, SpecificationError};
use crate::study::StudyDefinition;

pub use dwi::{assign_dwi_scans, dwi_study, DwiAssignment, DwiGroup, DwiRole, DwiScan};
pub use epi::epi_study;
pub use motion_detection::{
    create_motion_detection_study, motion_detection_base, MotionDetectionScans,
    MotionDetectionSetup, ReferenceType,
};
pub use mri::{
    motion_reference_t1_study, motion_reference_t2_study, mri_study, t1_study, t2_study,
};

/// Builds catalog studies against one configuration.
#[derive(Debug, Clone, Default)]
pub struct StudyCatalog {
    config: NiflowConfig,
}

impl StudyCatalog {
    /// Creates a catalog resolving atlases and reference data from `config`.
    #[must_use]
    pub const fn new(config: NiflowConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &NiflowConfig {
        &self.config
    }

    /// The MRI base study.
    pub fn mri(&self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        mri_study()
    }

    /// The T1-weighted study.
    pub fn t1(&self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        t1_study(&self.config)
    }

    /// The T2-weighted study.
    pub fn t2(&self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        t2_study()
    }

    /// A T1 motion reference.
    pub fn motion_reference_t1(&self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        motion_reference_t1_study(&self.config)
    }

    /// A T2 motion reference.
    pub fn motion_reference_t2(&self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        motion_reference_t2_study()
    }

    /// The EPI study.
    pub fn epi(&self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        epi_study()
    }

    /// The DWI study.
    pub fn dwi(&self) -> Result<Arc<StudyDefinition>, SpecificationError> {
        dwi_study()
    }

    /// Composes a motion detection study over `scans`.
    pub fn motion_detection(
        &self,
        name: &str,
        scans: &MotionDetectionScans,
    ) -> Result<MotionDetectionSetup, NiflowError> {
        create_motion_detection_study(&self.config, name, scans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalog_studies_compose() {
        let catalog = StudyCatalog::new(NiflowConfig::default().with_fsl_dir("/opt/fsl"));
        let names: Vec<String> = [
            catalog.mri(),
            catalog.t1(),
            catalog.t2(),
            catalog.motion_reference_t1(),
            catalog.motion_reference_t2(),
            catalog.epi(),
            catalog.dwi(),
        ]
        .into_iter()
        .map(|study| study.unwrap().name().to_string())
        .collect();
        assert_eq!(
            names,
            vec![
                "mri",
                "t1",
                "t2",
                "motion_reference_t1",
                "motion_reference_t2",
                "epi",
                "dwi"
            ]
        );
    }

    #[test]
    fn test_every_derived_study_is_an_mri() {
        let catalog = StudyCatalog::default();
        for study in [catalog.t1(), catalog.t2(), catalog.epi(), catalog.dwi()] {
            assert!(study.unwrap().is_a("mri"));
        }
    }
}
