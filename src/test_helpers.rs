//! Shared test utilities for the dip-lab test suite.
//!
//! Synthetic images with known structure, so tests never depend on fixture
//! files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let grid = PixelGrid::Rgb(gradient_rgb(32, 32));
//! let tmp = tempfile::TempDir::new().unwrap();
//! write_png(&tmp.path().join("in.png"), &grid);
//! ```

use crate::imaging::{CodecBackend, EncodeParams, PixelGrid, RustCodec};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::path::Path;

// =========================================================================
// Synthetic grids
// =========================================================================

/// Single-channel image with a diagonal ramp that wraps, so every window
/// has variance.
pub fn gradient_luma(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]))
}

/// Three-channel image with a different ramp per channel.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 5) % 256) as u8,
            ((y * 9) % 256) as u8,
            (((x + y) * 3) % 256) as u8,
        ])
    })
}

/// Every pixel set to `value` in all three channels.
pub fn uniform_rgb(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

/// White canvas with a black filled rectangle covering
/// `[x0, x1) × [y0, y1)`.
pub fn rect_on_white(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

// =========================================================================
// Files
// =========================================================================

/// Write a grid as a PNG file. Panics on failure.
pub fn write_png(path: &Path, grid: &PixelGrid) {
    let bytes = RustCodec::new()
        .encode(grid, EncodeParams::png(6))
        .unwrap_or_else(|e| panic!("encoding {} failed: {e}", path.display()));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}
