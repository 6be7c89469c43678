//! In-memory pixel grids.
//!
//! A [`PixelGrid`] is an 8-bit image that is either single-channel (luma) or
//! three-channel (RGB). Alpha is dropped at decode time. The layout is fixed
//! when the grid is built; transforms produce new grids.

use image::{DynamicImage, ExtendedColorType, GrayImage, RgbImage};
use serde::Serialize;
use std::fmt;

/// Channel layout of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channels {
    Luma,
    Rgb,
}

impl Channels {
    pub fn count(self) -> u8 {
        match self {
            Channels::Luma => 1,
            Channels::Rgb => 3,
        }
    }
}

/// Height × width × channels, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Shape {
    pub height: u32,
    pub width: u32,
    pub channels: u8,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PixelGrid {
    Luma(GrayImage),
    Rgb(RgbImage),
}

impl PixelGrid {
    /// Build a grid from a decoded image, keeping color only if the source
    /// has it.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        if img.color().has_color() {
            PixelGrid::Rgb(img.into_rgb8())
        } else {
            PixelGrid::Luma(img.into_luma8())
        }
    }

    /// Build a grid from a decoded image, forcing the given layout.
    pub fn from_dynamic_as(img: DynamicImage, channels: Channels) -> Self {
        match channels {
            Channels::Luma => PixelGrid::Luma(img.into_luma8()),
            Channels::Rgb => PixelGrid::Rgb(img.into_rgb8()),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            PixelGrid::Luma(img) => img.width(),
            PixelGrid::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            PixelGrid::Luma(img) => img.height(),
            PixelGrid::Rgb(img) => img.height(),
        }
    }

    pub fn channels(&self) -> Channels {
        match self {
            PixelGrid::Luma(_) => Channels::Luma,
            PixelGrid::Rgb(_) => Channels::Rgb,
        }
    }

    pub fn is_color(&self) -> bool {
        self.channels() == Channels::Rgb
    }

    pub fn shape(&self) -> Shape {
        Shape {
            height: self.height(),
            width: self.width(),
            channels: self.channels().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Interleaved samples, row-major.
    pub fn samples(&self) -> &[u8] {
        match self {
            PixelGrid::Luma(img) => img.as_raw(),
            PixelGrid::Rgb(img) => img.as_raw(),
        }
    }

    pub fn color_type(&self) -> ExtendedColorType {
        match self {
            PixelGrid::Luma(_) => ExtendedColorType::L8,
            PixelGrid::Rgb(_) => ExtendedColorType::Rgb8,
        }
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            PixelGrid::Luma(img) => DynamicImage::ImageLuma8(img.clone()),
            PixelGrid::Rgb(img) => DynamicImage::ImageRgb8(img.clone()),
        }
    }

    /// RGB view of the grid; luma grids are expanded to three equal channels.
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            PixelGrid::Luma(img) => DynamicImage::ImageLuma8(img.clone()).into_rgb8(),
            PixelGrid::Rgb(img) => img.clone(),
        }
    }
}
