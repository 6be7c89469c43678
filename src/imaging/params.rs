//! Parameter types for encode operations.
//!
//! These types describe *what* to encode, not *how*. They sit between the
//! sweep driver (which decides which candidates to try) and the
//! [`backend`](super::backend) (which does the codec work), and they own the
//! scratch naming convention so the driver and the report agree on where each
//! artifact lives.
//!
//! ## Scratch layout
//!
//! ```text
//! <scratch>/
//! ├── Image_jpeg/
//! │   ├── photo_jpeg_95.jpg
//! │   └── photo_jpeg_10.jpg
//! └── Image_png/
//!     ├── photo_compressed_level0.png
//!     └── photo_compressed_level9.png
//! ```

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default JPEG quality candidates, in sweep order.
pub const DEFAULT_JPEG_QUALITIES: [u8; 5] = [95, 75, 50, 25, 10];

/// Default PNG compression-level candidates, in sweep order.
pub const DEFAULT_PNG_LEVELS: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];

/// Encoding family of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Lossy; the parameter is a quality in 0–100.
    Jpeg,
    /// Lossless; the parameter is a zlib compression level in 0–9.
    Png,
}

impl Family {
    pub fn label(self) -> &'static str {
        match self {
            Family::Jpeg => "JPEG",
            Family::Png => "PNG",
        }
    }

    /// Name of the parameter as shown in tables and chart axes.
    pub fn parameter_name(self) -> &'static str {
        match self {
            Family::Jpeg => "Quality",
            Family::Png => "Level",
        }
    }

    /// Largest valid parameter value (the smallest is always 0).
    pub fn max_parameter(self) -> u8 {
        match self {
            Family::Jpeg => 100,
            Family::Png => 9,
        }
    }

    pub fn is_valid_parameter(self, value: u8) -> bool {
        value <= self.max_parameter()
    }

    pub fn default_candidates(self) -> Vec<u8> {
        match self {
            Family::Jpeg => DEFAULT_JPEG_QUALITIES.to_vec(),
            Family::Png => DEFAULT_PNG_LEVELS.to_vec(),
        }
    }

    /// Per-family scratch subdirectory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Family::Jpeg => "Image_jpeg",
            Family::Png => "Image_png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Family::Jpeg => "jpg",
            Family::Png => "png",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Family::Jpeg => image::ImageFormat::Jpeg,
            Family::Png => image::ImageFormat::Png,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single encoder setting: family plus scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodeParams {
    pub family: Family,
    pub value: u8,
}

impl EncodeParams {
    pub fn new(family: Family, value: u8) -> Self {
        Self { family, value }
    }

    pub fn jpeg(quality: u8) -> Self {
        Self::new(Family::Jpeg, quality)
    }

    pub fn png(level: u8) -> Self {
        Self::new(Family::Png, level)
    }

    pub fn is_valid(self) -> bool {
        self.family.is_valid_parameter(self.value)
    }

    /// Artifact filename for this setting, e.g. `photo_jpeg_75.jpg` or
    /// `photo_compressed_level9.png`.
    pub fn artifact_name(self, base_name: &str) -> String {
        match self.family {
            Family::Jpeg => format!("{}_jpeg_{}.jpg", base_name, self.value),
            Family::Png => format!("{}_compressed_level{}.png", base_name, self.value),
        }
    }
}

/// Full artifact path under a scratch root.
pub fn artifact_path(scratch_root: &Path, base_name: &str, params: EncodeParams) -> PathBuf {
    scratch_root
        .join(params.family.dir_name())
        .join(params.artifact_name(base_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_artifact_name_pattern() {
        assert_eq!(EncodeParams::jpeg(75).artifact_name("photo"), "photo_jpeg_75.jpg");
    }

    #[test]
    fn png_artifact_name_pattern() {
        assert_eq!(
            EncodeParams::png(9).artifact_name("photo"),
            "photo_compressed_level9.png"
        );
    }

    #[test]
    fn artifact_path_uses_family_dir() {
        let p = artifact_path(Path::new("/scratch"), "cat", EncodeParams::jpeg(10));
        assert_eq!(p, PathBuf::from("/scratch/Image_jpeg/cat_jpeg_10.jpg"));
        let p = artifact_path(Path::new("/scratch"), "cat", EncodeParams::png(0));
        assert_eq!(p, PathBuf::from("/scratch/Image_png/cat_compressed_level0.png"));
    }

    #[test]
    fn parameter_ranges() {
        assert!(EncodeParams::jpeg(0).is_valid());
        assert!(EncodeParams::jpeg(100).is_valid());
        assert!(!EncodeParams::jpeg(101).is_valid());
        assert!(EncodeParams::png(9).is_valid());
        assert!(!EncodeParams::png(10).is_valid());
    }

    #[test]
    fn default_candidates_are_valid() {
        for family in [Family::Jpeg, Family::Png] {
            let candidates = family.default_candidates();
            assert!(!candidates.is_empty());
            assert!(candidates.iter().all(|&v| family.is_valid_parameter(v)));
        }
        assert_eq!(Family::Jpeg.default_candidates(), vec![95, 75, 50, 25, 10]);
        assert_eq!(Family::Png.default_candidates().len(), 10);
    }
}
