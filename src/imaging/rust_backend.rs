//! Pure Rust codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode upload (any compiled-in format) | `image::load_from_memory` |
//! | Encode JPEG at quality q | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode PNG at level l | `image::codecs::png::PngEncoder` with `CompressionType::Level` |
//! | Decode artifact | `image::load_from_memory_with_format` |
//! | Optimise PNG losslessly | `oxipng::optimize_from_memory` |
//!
//! Both encoders are deterministic for a fixed grid and setting, which is
//! what makes repeated sweeps byte-identical.

use super::backend::{CodecBackend, CodecError};
use super::grid::{Channels, PixelGrid};
use super::params::{EncodeParams, Family};
use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// oxipng preset used for the optimised PNG size (0 fastest, 6 smallest).
pub const OXIPNG_PRESET: u8 = 4;

/// Codec backend using the `image` crate's JPEG and PNG codecs.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for RustCodec {
    fn encode(&self, grid: &PixelGrid, params: EncodeParams) -> Result<Vec<u8>, CodecError> {
        if !params.is_valid() {
            return Err(CodecError::ParameterOutOfRange {
                family: params.family,
                value: params.value,
                max: params.family.max_parameter(),
            });
        }

        let mut buffer = Vec::new();
        match params.family {
            Family::Jpeg => {
                // The encoder's quantisation tables divide by quality, so 0 maps to 1.
                let quality = params.value.max(1);
                JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality)
                    .write_image(
                        grid.samples(),
                        grid.width(),
                        grid.height(),
                        grid.color_type(),
                    )
                    .map_err(|e| CodecError::EncodeFailed(format!("JPEG q{}: {}", quality, e)))?;
            }
            Family::Png => {
                let compression = if params.value == 0 {
                    CompressionType::Uncompressed
                } else {
                    CompressionType::Level(params.value)
                };
                PngEncoder::new_with_quality(
                    Cursor::new(&mut buffer),
                    compression,
                    FilterType::Adaptive,
                )
                .write_image(
                    grid.samples(),
                    grid.width(),
                    grid.height(),
                    grid.color_type(),
                )
                .map_err(|e| {
                    CodecError::EncodeFailed(format!("PNG level {}: {}", params.value, e))
                })?;
            }
        }
        Ok(buffer)
    }

    fn decode(
        &self,
        bytes: &[u8],
        family: Family,
        channels: Channels,
    ) -> Result<PixelGrid, CodecError> {
        let img = image::load_from_memory_with_format(bytes, family.image_format())
            .map_err(|e| CodecError::DecodeFailed(format!("{}: {}", family, e)))?;
        Ok(PixelGrid::from_dynamic_as(img, channels))
    }

    fn optimize_png(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let options = oxipng::Options::from_preset(OXIPNG_PRESET);
        oxipng::optimize_from_memory(bytes, &options)
            .map_err(|e| CodecError::OptimizeFailed(e.to_string()))
    }
}

/// An image decoded from an uploaded file, with the facts the sweep needs.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub grid: PixelGrid,
    /// Size of the source file in bytes.
    pub original_size: u64,
    /// File stem used as the artifact base name.
    pub base_name: String,
    pub path: PathBuf,
}

/// Decode an in-memory upload into a grid.
pub fn decode_upload(bytes: &[u8]) -> Result<PixelGrid, CodecError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CodecError::DecodeFailed(format!("Unrecognised image data: {}", e)))?;
    Ok(PixelGrid::from_dynamic(img))
}

/// Read and decode an image file from disk.
pub fn load_image(path: &Path) -> Result<LoadedImage, CodecError> {
    let bytes = std::fs::read(path)?;
    let grid = decode_upload(&bytes).map_err(|e| match e {
        CodecError::DecodeFailed(msg) => {
            CodecError::DecodeFailed(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;
    let base_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(LoadedImage {
        grid,
        original_size: bytes.len() as u64,
        base_name,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient_luma, gradient_rgb, write_png};

    #[test]
    fn png_roundtrip_is_lossless_at_every_level() {
        let grid = PixelGrid::Rgb(gradient_rgb(16, 12));
        let codec = RustCodec::new();
        for level in 0..=9 {
            let bytes = codec.encode(&grid, EncodeParams::png(level)).unwrap();
            let decoded = codec.decode(&bytes, Family::Png, Channels::Rgb).unwrap();
            assert_eq!(decoded, grid, "level {level} was not lossless");
        }
    }

    #[test]
    fn uncompressed_png_is_larger_than_level_nine() {
        let grid = PixelGrid::Luma(gradient_luma(64, 64));
        let codec = RustCodec::new();
        let stored = codec.encode(&grid, EncodeParams::png(0)).unwrap();
        let best = codec.encode(&grid, EncodeParams::png(9)).unwrap();
        assert!(stored.len() > best.len());
    }

    #[test]
    fn jpeg_decodes_to_requested_layout() {
        let grid = PixelGrid::Luma(gradient_luma(32, 24));
        let codec = RustCodec::new();
        let bytes = codec.encode(&grid, EncodeParams::jpeg(80)).unwrap();
        let decoded = codec.decode(&bytes, Family::Jpeg, Channels::Luma).unwrap();
        assert_eq!(decoded.shape(), grid.shape());
    }

    #[test]
    fn jpeg_quality_zero_is_accepted() {
        let grid = PixelGrid::Rgb(gradient_rgb(16, 16));
        let bytes = RustCodec::new().encode(&grid, EncodeParams::jpeg(0)).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn jpeg_encoding_is_deterministic() {
        let grid = PixelGrid::Rgb(gradient_rgb(40, 30));
        let codec = RustCodec::new();
        let a = codec.encode(&grid, EncodeParams::jpeg(50)).unwrap();
        let b = codec.encode(&grid, EncodeParams::jpeg(50)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_parameter_rejected() {
        let grid = PixelGrid::Rgb(gradient_rgb(8, 8));
        let codec = RustCodec::new();
        assert!(matches!(
            codec.encode(&grid, EncodeParams::jpeg(101)),
            Err(CodecError::ParameterOutOfRange { value: 101, .. })
        ));
        assert!(matches!(
            codec.encode(&grid, EncodeParams::png(10)),
            Err(CodecError::ParameterOutOfRange { max: 9, .. })
        ));
    }

    #[test]
    fn optimized_png_is_lossless_and_no_larger() {
        let grid = PixelGrid::Luma(gradient_luma(48, 32));
        let codec = RustCodec::new();
        let stored = codec.encode(&grid, EncodeParams::png(0)).unwrap();
        let optimized = codec.optimize_png(&stored).unwrap();
        assert!(optimized.len() < stored.len());
        let decoded = codec.decode(&optimized, Family::Png, Channels::Luma).unwrap();
        assert_eq!(decoded, grid);
    }

    #[test]
    fn optimize_png_rejects_garbage() {
        let result = RustCodec::new().optimize_png(b"not a png");
        assert!(matches!(result, Err(CodecError::OptimizeFailed(_))));
    }

    #[test]
    fn decode_garbage_fails() {
        let result = RustCodec::new().decode(b"not an image", Family::Jpeg, Channels::Rgb);
        assert!(matches!(result, Err(CodecError::DecodeFailed(_))));
    }

    #[test]
    fn load_image_reports_size_and_stem() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sample.png");
        write_png(&path, &PixelGrid::Rgb(gradient_rgb(10, 10)));

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.base_name, "sample");
        assert_eq!(loaded.original_size, std::fs::metadata(&path).unwrap().len());
        assert!(loaded.grid.is_color());
    }

    #[test]
    fn load_image_missing_file_errors() {
        assert!(matches!(
            load_image(Path::new("/nonexistent/photo.jpg")),
            Err(CodecError::Io(_))
        ));
    }
}
