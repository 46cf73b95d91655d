//! Recognised file formats and scalar field types.
//!
//! Formats are opaque tags: they type-check spec connections and never
//! describe how to parse file contents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// File formats a dataset can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Uncompressed NIfTI volume.
    Nifti,
    /// Gzip-compressed NIfTI volume.
    NiftiGz,
    /// Plain text.
    Text,
    /// Affine transform matrix as text.
    TextMatrix,
    /// Motion parameter text file.
    Par,
    /// Directory bundle.
    Directory,
    /// Zip archive.
    Zip,
    /// PNG raster image.
    Png,
    /// GIF raster image.
    Gif,
    /// Directory of DICOM files.
    Dicom,
    /// Directory of per-volume motion matrices.
    MotionMats,
    /// R data file.
    #[serde(rename = "rdata")]
    RData,
}

impl FileFormat {
    /// All formats, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Nifti,
        Self::NiftiGz,
        Self::Text,
        Self::TextMatrix,
        Self::Par,
        Self::Directory,
        Self::Zip,
        Self::Png,
        Self::Gif,
        Self::Dicom,
        Self::MotionMats,
        Self::RData,
    ];

    /// Returns the format name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nifti => "nifti",
            Self::NiftiGz => "nifti_gz",
            Self::Text => "text",
            Self::TextMatrix => "text_matrix",
            Self::Par => "par",
            Self::Directory => "directory",
            Self::Zip => "zip",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Dicom => "dicom",
            Self::MotionMats => "motion_mats",
            Self::RData => "rdata",
        }
    }

    /// Returns the file extension, `None` for directory formats.
    #[must_use]
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Nifti => Some(".nii"),
            Self::NiftiGz => Some(".nii.gz"),
            Self::Text => Some(".txt"),
            Self::TextMatrix => Some(".mat"),
            Self::Par => Some(".par"),
            Self::Zip => Some(".zip"),
            Self::Png => Some(".png"),
            Self::Gif => Some(".gif"),
            Self::RData => Some(".RData"),
            Self::Directory | Self::Dicom | Self::MotionMats => None,
        }
    }

    /// Returns true if datasets of this format are directories.
    #[must_use]
    pub const fn is_directory(self) -> bool {
        self.extension().is_none()
    }

    /// Looks up a file format by extension (including the leading dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == Some(ext))
    }

    /// Guesses the format of a file path from its extension.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let (_, ext) = split_extension(path);
        ext.and_then(Self::from_extension)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value types of scalar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Floating point.
    Float,
    /// Integer.
    Int,
    /// String.
    Str,
    /// Boolean.
    Bool,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Str => "str",
            Self::Bool => "bool",
        })
    }
}

const COMPOUND_EXTENSIONS: [&str; 2] = [".nii.gz", ".tar.gz"];

/// Splits a file name into stem and extension, keeping compound
/// extensions such as `.nii.gz` together.
#[must_use]
pub fn split_extension(path: &str) -> (&str, Option<&str>) {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    let file = &path[file_start..];
    if let Some(ext) = COMPOUND_EXTENSIONS.iter().find(|ext| file.ends_with(*ext)) {
        let split = path.len() - ext.len();
        if split > file_start {
            return (&path[..split], Some(&path[split..]));
        }
    }
    match file.rfind('.') {
        Some(dot) if dot > 0 => {
            let split = file_start + dot;
            (&path[..split], Some(&path[split..]))
        }
        _ => (path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_compound_extension() {
        assert_eq!(split_extension("scan/t1.nii.gz"), ("scan/t1", Some(".nii.gz")));
        assert_eq!(split_extension("mats.tar.gz"), ("mats", Some(".tar.gz")));
    }

    #[test]
    fn test_split_simple_and_missing_extension() {
        assert_eq!(split_extension("dir.v2/md.txt"), ("dir.v2/md", Some(".txt")));
        assert_eq!(split_extension("dir.v2/dicoms"), ("dir.v2/dicoms", None));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path("brain.nii.gz"), Some(FileFormat::NiftiGz));
        assert_eq!(FileFormat::from_path("brain.nii"), Some(FileFormat::Nifti));
        assert_eq!(FileFormat::from_path("plot.png"), Some(FileFormat::Png));
        assert_eq!(FileFormat::from_path("unknown.xyz"), None);
    }

    #[test]
    fn test_directory_formats() {
        assert!(FileFormat::Dicom.is_directory());
        assert!(FileFormat::MotionMats.is_directory());
        assert!(!FileFormat::NiftiGz.is_directory());
    }

    #[test]
    fn test_serde_names_match_display() {
        for format in FileFormat::ALL {
            let json = serde_json::to_string(&format).unwrap();
            assert_eq!(json, format!("\"{format}\""));
        }
    }
}
