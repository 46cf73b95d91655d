//! Bibliographic citations and software requirements of tool nodes.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A reference to cite when a pipeline's results are published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    /// Short key, e.g. "fsl".
    pub key: Cow<'static, str>,
    /// Authors and title.
    pub title: Cow<'static, str>,
    /// Journal or venue.
    pub venue: Cow<'static, str>,
    /// Publication year.
    pub year: u16,
}

impl Citation {
    /// Creates a citation.
    #[must_use]
    pub fn new(
        key: impl Into<Cow<'static, str>>,
        title: impl Into<Cow<'static, str>>,
        venue: impl Into<Cow<'static, str>>,
        year: u16,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            venue: venue.into(),
            year,
        }
    }
}

/// The FSL software library.
pub const FSL: Citation = Citation {
    key: Cow::Borrowed("fsl"),
    title: Cow::Borrowed("Jenkinson M, Beckmann CF, Behrens TE, Woolrich MW, Smith SM. FSL"),
    venue: Cow::Borrowed("NeuroImage 62:782-90"),
    year: 2012,
};

/// BET brain extraction.
pub const BET: Citation = Citation {
    key: Cow::Borrowed("bet"),
    title: Cow::Borrowed("Smith SM. Fast robust automated brain extraction"),
    venue: Cow::Borrowed("Human Brain Mapping 17(3):143-155"),
    year: 2002,
};

/// FLIRT linear registration.
pub const FLIRT: Citation = Citation {
    key: Cow::Borrowed("flirt"),
    title: Cow::Borrowed(
        "Jenkinson M, Bannister P, Brady JM, Smith SM. Improved optimisation for the robust \
         and accurate linear registration and motion correction of brain images",
    ),
    venue: Cow::Borrowed("NeuroImage 17(2):825-841"),
    year: 2002,
};

/// FAST tissue segmentation.
pub const FAST: Citation = Citation {
    key: Cow::Borrowed("fast"),
    title: Cow::Borrowed(
        "Zhang Y, Brady M, Smith S. Segmentation of brain MR images through a hidden Markov \
         random field model and the expectation-maximization algorithm",
    ),
    venue: Cow::Borrowed("IEEE Trans Med Imag 20(1):45-57"),
    year: 2001,
};

/// Boundary-based registration used by `epi_reg`.
pub const EPI_REG: Citation = Citation {
    key: Cow::Borrowed("bbr"),
    title: Cow::Borrowed(
        "Greve DN, Fischl B. Accurate and robust brain image alignment using boundary-based \
         registration",
    ),
    venue: Cow::Borrowed("NeuroImage 48(1):63-72"),
    year: 2009,
};

/// The MRtrix toolbox.
pub const MRTRIX: Citation = Citation {
    key: Cow::Borrowed("mrtrix"),
    title: Cow::Borrowed("Tournier JD, Calamante F, Connelly A. MRtrix: Diffusion tractography in crossing fiber regions"),
    venue: Cow::Borrowed("Int J Imaging Syst Technol 22:53-66"),
    year: 2012,
};

/// Eddy current and motion correction.
pub const EDDY: Citation = Citation {
    key: Cow::Borrowed("eddy"),
    title: Cow::Borrowed(
        "Andersson JLR, Sotiropoulos SN. An integrated approach to correction for \
         off-resonance effects and subject movement in diffusion MR imaging",
    ),
    venue: Cow::Borrowed("NeuroImage 125:1063-1078"),
    year: 2016,
};

/// DICOM to NIfTI conversion.
pub const DCM2NIIX: Citation = Citation {
    key: Cow::Borrowed("dcm2niix"),
    title: Cow::Borrowed(
        "Li X, Morgan PS, Ashburner J, Smith J, Rorden C. The first step for neuroimaging \
         data analysis: DICOM to NIfTI conversion",
    ),
    venue: Cow::Borrowed("J Neurosci Methods 264:47-56"),
    year: 2016,
};

/// An external software package a tool node needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Package name.
    pub name: Cow<'static, str>,
    /// Minimum version.
    pub min_version: Option<Cow<'static, str>>,
}

impl Requirement {
    /// Creates a requirement.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, min_version: Option<&'static str>) -> Self {
        Self {
            name: name.into(),
            min_version: min_version.map(Cow::Borrowed),
        }
    }
}

/// FSL.
pub const FSL_REQ: Requirement = Requirement {
    name: Cow::Borrowed("fsl"),
    min_version: Some(Cow::Borrowed("5.0.9")),
};

/// MRtrix 3.
pub const MRTRIX_REQ: Requirement = Requirement {
    name: Cow::Borrowed("mrtrix"),
    min_version: Some(Cow::Borrowed("3.0")),
};

/// dcm2niix.
pub const DCM2NIIX_REQ: Requirement = Requirement {
    name: Cow::Borrowed("dcm2niix"),
    min_version: Some(Cow::Borrowed("1.0.20170130")),
};
