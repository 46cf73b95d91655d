//! Framework configuration and reference data locations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::ConfigError;
use crate::observability::{LogFormat, LoggingConfig};

/// Environment variable naming the scratch directory.
pub const WORK_DIR_VAR: &str = "NIFLOW_WORK_DIR";
/// Environment variable naming the FSL installation.
pub const FSL_DIR_VAR: &str = "FSLDIR";
/// Environment variable naming extra reference data.
pub const REFERENCE_DATA_VAR: &str = "NIFLOW_REFERENCE_DATA";
/// Environment variable holding the log filter directive.
pub const LOG_VAR: &str = "NIFLOW_LOG";
/// Environment variable holding the log format.
pub const LOG_FORMAT_VAR: &str = "NIFLOW_LOG_FORMAT";

/// Framework configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NiflowConfig {
    /// Scratch directory for engines.
    pub work_dir: PathBuf,
    /// FSL installation root.
    pub fsl_dir: Option<PathBuf>,
    /// Directory with additional reference data.
    pub reference_data_dir: Option<PathBuf>,
    /// Wall time assigned to tool nodes that do not declare one.
    pub default_wall_time_mins: u32,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for NiflowConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("niflow"),
            fsl_dir: None,
            reference_data_dir: None,
            default_wall_time_mins: 20,
            logging: LoggingConfig::default(),
        }
    }
}

impl NiflowConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(dir) = lookup(WORK_DIR_VAR) {
            config.work_dir = PathBuf::from(dir);
        }
        config.fsl_dir = lookup(FSL_DIR_VAR).filter(|d| !d.is_empty()).map(PathBuf::from);
        config.reference_data_dir = lookup(REFERENCE_DATA_VAR)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);
        if let Some(filter) = lookup(LOG_VAR) {
            config.logging.filter = filter;
        }
        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            config.logging.format = LogFormat::from_str(&format).map_err(|_| {
                ConfigError::InvalidValue {
                    name: LOG_FORMAT_VAR.to_string(),
                    value: format.clone(),
                }
            })?;
        }
        Ok(config)
    }

    /// Sets the FSL installation root.
    #[must_use]
    pub fn with_fsl_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fsl_dir = Some(dir.into());
        self
    }

    /// Returns FSL's standard-space data directory.
    pub fn fsl_standard_dir(&self) -> Result<PathBuf, ConfigError> {
        self.fsl_dir
            .as_ref()
            .map(|dir| dir.join("data").join("standard"))
            .ok_or_else(|| ConfigError::Missing {
                name: FSL_DIR_VAR.to_string(),
            })
    }

    /// Returns the path of a reference atlas image.
    ///
    /// # Errors
    ///
    /// Fails if FSL is not configured or the image does not exist at
    /// the requested resolution.
    pub fn atlas_path(
        &self,
        atlas: Atlas,
        image: AtlasImage,
        resolution: Resolution,
    ) -> Result<PathBuf, ConfigError> {
        if image == AtlasImage::MaskDilated && resolution != Resolution::TwoMm {
            return Err(ConfigError::UnavailableAtlas {
                atlas: atlas.to_string(),
                image: image.to_string(),
                resolution: resolution.to_string(),
            });
        }
        let file = format!("{}_T1_{resolution}{}", atlas.prefix(), image.suffix());
        Ok(self.fsl_standard_dir()?.join(file))
    }
}

/// A reference atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Atlas {
    /// MNI ICBM 152 non-linear 6th generation symmetric average brain.
    Mni152,
}

impl Atlas {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Mni152 => "MNI152",
        }
    }
}

impl fmt::Display for Atlas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Which image of an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtlasImage {
    /// The whole-head template.
    Image,
    /// Brain mask.
    Mask,
    /// Dilated brain mask.
    MaskDilated,
    /// Brain-extracted template.
    Masked,
}

impl AtlasImage {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Image => ".nii.gz",
            Self::Mask => "_brain_mask.nii.gz",
            Self::MaskDilated => "_brain_mask_dil.nii.gz",
            Self::Masked => "_brain.nii.gz",
        }
    }
}

impl fmt::Display for AtlasImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Mask => write!(f, "mask"),
            Self::MaskDilated => write!(f, "dilated mask"),
            Self::Masked => write!(f, "masked image"),
        }
    }
}

/// Atlas voxel resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 0.5mm isotropic.
    #[serde(rename = "0.5mm")]
    HalfMm,
    /// 1mm isotropic.
    #[serde(rename = "1mm")]
    OneMm,
    /// 2mm isotropic.
    #[serde(rename = "2mm")]
    TwoMm,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfMm => write!(f, "0.5mm"),
            Self::OneMm => write!(f, "1mm"),
            Self::TwoMm => write!(f, "2mm"),
        }
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.5mm" => Ok(Self::HalfMm),
            "1mm" => Ok(Self::OneMm),
            "2mm" => Ok(Self::TwoMm),
            _ => Err(ConfigError::InvalidValue {
                name: "resolution".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = NiflowConfig::from_lookup(lookup(&[
            (WORK_DIR_VAR, "/scratch/niflow"),
            (FSL_DIR_VAR, "/opt/fsl"),
            (LOG_VAR, "niflow=debug"),
            (LOG_FORMAT_VAR, "json"),
        ]))
        .unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/scratch/niflow"));
        assert_eq!(config.fsl_dir, Some(PathBuf::from("/opt/fsl")));
        assert_eq!(config.reference_data_dir, None);
        assert_eq!(config.logging.filter, "niflow=debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let err = NiflowConfig::from_lookup(lookup(&[(LOG_FORMAT_VAR, "xml")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: LOG_FORMAT_VAR.to_string(),
                value: "xml".to_string(),
            }
        );
    }

    #[test]
    fn test_atlas_paths() {
        let config = NiflowConfig::default().with_fsl_dir("/opt/fsl");
        assert_eq!(
            config
                .atlas_path(Atlas::Mni152, AtlasImage::Mask, Resolution::OneMm)
                .unwrap(),
            PathBuf::from("/opt/fsl/data/standard/MNI152_T1_1mm_brain_mask.nii.gz")
        );
        assert_eq!(
            config
                .atlas_path(Atlas::Mni152, AtlasImage::MaskDilated, Resolution::TwoMm)
                .unwrap(),
            PathBuf::from("/opt/fsl/data/standard/MNI152_T1_2mm_brain_mask_dil.nii.gz")
        );
        assert_eq!(
            config
                .atlas_path(Atlas::Mni152, AtlasImage::Image, Resolution::HalfMm)
                .unwrap(),
            PathBuf::from("/opt/fsl/data/standard/MNI152_T1_0.5mm.nii.gz")
        );
    }

    #[test]
    fn test_dilated_mask_only_at_2mm() {
        let config = NiflowConfig::default().with_fsl_dir("/opt/fsl");
        let err = config
            .atlas_path(Atlas::Mni152, AtlasImage::MaskDilated, Resolution::OneMm)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnavailableAtlas { .. }));
    }

    #[test]
    fn test_atlas_requires_fsl() {
        let err = NiflowConfig::default()
            .atlas_path(Atlas::Mni152, AtlasImage::Masked, Resolution::TwoMm)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                name: FSL_DIR_VAR.to_string()
            }
        );
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!("2mm".parse::<Resolution>().unwrap(), Resolution::TwoMm);
        assert!("3mm".parse::<Resolution>().is_err());
    }
}
