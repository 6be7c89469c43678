//! Spatial and frequency-domain filtering.
//!
//! Spatial operations keep the input's color layout; frequency-domain
//! operations work on the luma channel and return a normalised grayscale
//! image.
//!
//! ## Frequency layout
//!
//! The 2-D transform is computed row-wise then column-wise with `rustfft`.
//! Displayed spectra are quadrant-shifted so the DC term sits at
//! `(width/2, height/2)`.

use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage, imageops};
use imageproc::filter::{filter3x3, gaussian_blur_f32};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// σ matching a 5×5 Gaussian with automatic sigma.
pub const LOW_PASS_SIGMA: f32 = 1.1;

/// σ matching a 9×9 Gaussian with automatic sigma.
pub const WIDE_SIGMA: f32 = 1.7;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("Cannot filter an empty image")]
    EmptyImage,
    #[error("Unknown kernel '{0}' (expected average, sharpen or edge)")]
    UnknownKernel(String),
    #[error("Unknown filter '{0}' (expected low, high or band)")]
    UnknownFilter(String),
    #[error("Padding of {padding}px around a {width}x{height} image is too large")]
    PaddingTooLarge { padding: u32, width: u32, height: u32 },
}

// =========================================================================
// Convolution
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Average,
    Sharpen,
    Edge,
}

impl Kernel {
    /// Row-major 3×3 weights.
    pub fn weights(self) -> [f32; 9] {
        match self {
            Kernel::Average => [1.0 / 9.0; 9],
            Kernel::Sharpen => SHARPEN,
            Kernel::Edge => [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kernel::Average => "average",
            Kernel::Sharpen => "sharpen",
            Kernel::Edge => "edge",
        }
    }
}

const SHARPEN: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kernel {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" => Ok(Kernel::Average),
            "sharpen" => Ok(Kernel::Sharpen),
            "edge" => Ok(Kernel::Edge),
            _ => Err(FilterError::UnknownKernel(s.to_string())),
        }
    }
}

fn ensure_not_empty<I: GenericImageView>(img: &I) -> Result<(), FilterError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(FilterError::EmptyImage);
    }
    Ok(())
}

/// Convolve every channel with a 3×3 kernel; results are clamped to 0..=255.
pub fn convolve(img: &RgbImage, kernel: Kernel) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    Ok(filter3x3::<_, f32, u8>(img, &kernel.weights()))
}

/// Surround the image with a black border `padding` pixels wide.
pub fn zero_pad(img: &RgbImage, padding: u32) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    let too_large = || FilterError::PaddingTooLarge {
        padding,
        width: img.width(),
        height: img.height(),
    };
    let border = padding.checked_mul(2).ok_or_else(too_large)?;
    let width = img.width().checked_add(border).ok_or_else(too_large)?;
    let height = img.height().checked_add(border).ok_or_else(too_large)?;
    // The buffer length must fit in usize as well.
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(too_large)?;
    let mut out = RgbImage::new(width, height);
    imageops::replace(&mut out, img, i64::from(padding), i64::from(padding));
    Ok(out)
}

// =========================================================================
// Low / high / band
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Low,
    High,
    Band,
}

impl FromStr for FilterKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(FilterKind::Low),
            "high" => Ok(FilterKind::High),
            "band" => Ok(FilterKind::Band),
            _ => Err(FilterError::UnknownFilter(s.to_string())),
        }
    }
}

/// Low pass is a Gaussian blur, high pass the sharpening kernel, band pass a
/// difference of Gaussians re-centred on mid gray.
pub fn apply_filter(img: &RgbImage, kind: FilterKind) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    let out = match kind {
        FilterKind::Low => gaussian_blur_f32(img, LOW_PASS_SIGMA),
        FilterKind::High => filter3x3::<_, f32, u8>(img, &SHARPEN),
        FilterKind::Band => {
            let narrow = gaussian_blur_f32(img, LOW_PASS_SIGMA);
            let wide = gaussian_blur_f32(img, WIDE_SIGMA);
            RgbImage::from_fn(img.width(), img.height(), |x, y| {
                let a = narrow.get_pixel(x, y).0;
                let b = wide.get_pixel(x, y).0;
                Rgb([0, 1, 2].map(|c| {
                    (i16::from(a[c]) - i16::from(b[c]) + 128).clamp(0, 255) as u8
                }))
            })
        }
    };
    Ok(out)
}

// =========================================================================
// Frequency domain
// =========================================================================

/// Row-major complex spectrum of a grayscale image.
struct Spectrum {
    width: usize,
    height: usize,
    data: Vec<Complex<f64>>,
}

impl Spectrum {
    fn forward(gray: &GrayImage) -> Self {
        let width = gray.width() as usize;
        let height = gray.height() as usize;
        let data = gray
            .pixels()
            .map(|p| Complex::new(f64::from(p.0[0]), 0.0))
            .collect();
        let mut spectrum = Self {
            width,
            height,
            data,
        };
        spectrum.transform(false);
        spectrum
    }

    /// Inverse transform in place, including the 1/N scaling.
    fn inverse(&mut self) {
        self.transform(true);
        let scale = 1.0 / (self.width * self.height) as f64;
        for v in &mut self.data {
            *v *= scale;
        }
    }

    fn transform(&mut self, inverse: bool) {
        let mut planner = FftPlanner::<f64>::new();
        let (row_fft, col_fft) = if inverse {
            (
                planner.plan_fft_inverse(self.width),
                planner.plan_fft_inverse(self.height),
            )
        } else {
            (
                planner.plan_fft_forward(self.width),
                planner.plan_fft_forward(self.height),
            )
        };

        for row in self.data.chunks_exact_mut(self.width) {
            row_fft.process(row);
        }

        let mut column = vec![Complex::new(0.0, 0.0); self.height];
        for x in 0..self.width {
            for (y, v) in column.iter_mut().enumerate() {
                *v = self.data[y * self.width + x];
            }
            col_fft.process(&mut column);
            for (y, v) in column.iter().enumerate() {
                self.data[y * self.width + x] = *v;
            }
        }
    }

    /// Value at shifted coordinates, where DC sits at `(width/2, height/2)`.
    fn shifted(&self, sx: usize, sy: usize) -> Complex<f64> {
        let x = (sx + self.width - self.width / 2) % self.width;
        let y = (sy + self.height - self.height / 2) % self.height;
        self.data[y * self.width + x]
    }

    /// Shifted coordinates of an unshifted index.
    fn shift_of(&self, x: usize, y: usize) -> (usize, usize) {
        (
            (x + self.width / 2) % self.width,
            (y + self.height / 2) % self.height,
        )
    }
}

/// Min-max normalise a row-major plane into a grayscale image.
fn normalise(values: &[f64], width: u32, height: u32) -> GrayImage {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    GrayImage::from_fn(width, height, |x, y| {
        let v = values[(y * width + x) as usize];
        // Anything flatter than this is FFT round-off, not signal.
        let scaled = if span > 1e-6 {
            (v - lo) / span * 255.0
        } else {
            0.0
        };
        Luma([scaled.round().clamp(0.0, 255.0) as u8])
    })
}

/// Log-magnitude spectrum `20·ln(1 + |F|)` of the luma channel, centred and
/// normalised to 0..=255.
pub fn magnitude_spectrum(img: &RgbImage) -> Result<GrayImage, FilterError> {
    ensure_not_empty(img)?;
    let gray = imageops::grayscale(img);
    let spectrum = Spectrum::forward(&gray);
    let (w, h) = (spectrum.width, spectrum.height);

    let mut values = Vec::with_capacity(w * h);
    for sy in 0..h {
        for sx in 0..w {
            values.push(20.0 * spectrum.shifted(sx, sy).norm().ln_1p());
        }
    }
    tracing::debug!(width = w, height = h, "computed magnitude spectrum");
    Ok(normalise(&values, gray.width(), gray.height()))
}

/// Zero a `2r×2r` square around the centred DC term, transform back, and
/// return the normalised magnitude.
pub fn reduce_periodic_noise(img: &RgbImage, radius: u32) -> Result<GrayImage, FilterError> {
    ensure_not_empty(img)?;
    let gray = imageops::grayscale(img);
    let mut spectrum = Spectrum::forward(&gray);
    let (w, h) = (spectrum.width, spectrum.height);
    let r = radius as usize;

    let (cx, cy) = (w / 2, h / 2);
    let x_band = cx.saturating_sub(r)..(cx + r).min(w);
    let y_band = cy.saturating_sub(r)..(cy + r).min(h);

    let mut zeroed = 0usize;
    for y in 0..h {
        for x in 0..w {
            let (sx, sy) = spectrum.shift_of(x, y);
            if x_band.contains(&sx) && y_band.contains(&sy) {
                spectrum.data[y * w + x] = Complex::new(0.0, 0.0);
                zeroed += 1;
            }
        }
    }
    tracing::debug!(radius, zeroed, "masked centre of spectrum");

    spectrum.inverse();
    let values: Vec<f64> = spectrum.data.iter().map(|v| v.norm()).collect();
    Ok(normalise(&values, gray.width(), gray.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient_rgb, uniform_rgb};

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn kernel_names_parse() {
        assert_eq!("Average".parse::<Kernel>().unwrap(), Kernel::Average);
        assert_eq!("sharpen".parse::<Kernel>().unwrap(), Kernel::Sharpen);
        assert_eq!("edge".parse::<Kernel>().unwrap(), Kernel::Edge);
        assert!(matches!(
            "sobel".parse::<Kernel>(),
            Err(FilterError::UnknownKernel(_))
        ));
    }

    #[test]
    fn filter_names_parse() {
        assert_eq!("band".parse::<FilterKind>().unwrap(), FilterKind::Band);
        assert!("notch".parse::<FilterKind>().is_err());
    }

    // =========================================================================
    // Spatial
    // =========================================================================

    #[test]
    fn kernels_that_sum_to_one_keep_flat_images() {
        let img = uniform_rgb(9, 9, 100);
        for kernel in [Kernel::Average, Kernel::Sharpen] {
            let out = convolve(&img, kernel).unwrap();
            let v = out.get_pixel(4, 4).0[0];
            assert!((99..=100).contains(&v), "{kernel}: {v}");
        }
    }

    #[test]
    fn edge_kernel_zeroes_flat_regions() {
        let out = convolve(&uniform_rgb(9, 9, 100), Kernel::Edge).unwrap();
        assert_eq!(out.get_pixel(4, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn zero_pad_adds_black_border() {
        let img = uniform_rgb(4, 3, 200);
        let out = zero_pad(&img, 5).unwrap();
        assert_eq!(out.dimensions(), (14, 13));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(4, 4), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(5, 5), &Rgb([200, 200, 200]));
        assert_eq!(out.get_pixel(8, 7), &Rgb([200, 200, 200]));
        assert_eq!(out.get_pixel(9, 8), &Rgb([0, 0, 0]));
    }

    #[test]
    fn zero_pad_rejects_overflowing_padding() {
        let img = uniform_rgb(4, 3, 200);
        assert_eq!(
            zero_pad(&img, u32::MAX / 2 + 1),
            Err(FilterError::PaddingTooLarge {
                padding: u32::MAX / 2 + 1,
                width: 4,
                height: 3
            })
        );
        assert!(matches!(
            zero_pad(&img, u32::MAX / 2 - 1),
            Err(FilterError::PaddingTooLarge { .. })
        ));
    }

    #[test]
    fn zero_padding_of_zero_is_identity() {
        let img = gradient_rgb(6, 6);
        assert_eq!(zero_pad(&img, 0).unwrap(), img);
    }

    #[test]
    fn low_pass_smooths_a_step() {
        let img = RgbImage::from_fn(20, 20, |x, _| {
            if x < 10 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let out = apply_filter(&img, FilterKind::Low).unwrap();
        let edge = out.get_pixel(10, 10).0[0];
        assert!(edge > 0 && edge < 255);
    }

    #[test]
    fn band_pass_of_flat_image_is_mid_gray() {
        let out = apply_filter(&uniform_rgb(12, 12, 90), FilterKind::Band).unwrap();
        let v = out.get_pixel(6, 6).0[0];
        assert!((127..=129).contains(&v), "{v}");
    }

    #[test]
    fn filters_preserve_dimensions() {
        let img = gradient_rgb(17, 11);
        for kind in [FilterKind::Low, FilterKind::High, FilterKind::Band] {
            assert_eq!(apply_filter(&img, kind).unwrap().dimensions(), (17, 11));
        }
    }

    #[test]
    fn empty_image_rejected() {
        let empty = RgbImage::new(0, 0);
        assert_eq!(convolve(&empty, Kernel::Edge), Err(FilterError::EmptyImage));
        assert_eq!(magnitude_spectrum(&empty), Err(FilterError::EmptyImage));
    }

    // =========================================================================
    // Frequency domain
    // =========================================================================

    #[test]
    fn spectrum_of_flat_image_peaks_at_centre() {
        let out = magnitude_spectrum(&uniform_rgb(8, 6, 50)).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.get_pixel(4, 3).0[0], 255);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn forward_then_inverse_restores_image() {
        let gray = imageops::grayscale(&gradient_rgb(10, 7));
        let mut spectrum = Spectrum::forward(&gray);
        spectrum.inverse();
        for (v, p) in spectrum.data.iter().zip(gray.pixels()) {
            assert!((v.re - f64::from(p.0[0])).abs() < 1e-6);
            assert!(v.im.abs() < 1e-6);
        }
    }

    #[test]
    fn noise_reduction_removes_flat_component() {
        let out = reduce_periodic_noise(&uniform_rgb(16, 16, 120), 2).unwrap();
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn noise_reduction_radius_is_clamped() {
        let out = reduce_periodic_noise(&gradient_rgb(10, 10), 500).unwrap();
        assert_eq!(out.dimensions(), (10, 10));
    }
}
