//! Fidelity metrics between a reference grid and its reconstruction.
//!
//! - **PSNR**: `20·log10(255 / √MSE)` over every sample. Bit-identical grids
//!   short-circuit to `f64::INFINITY` so a zero MSE is never divided by.
//! - **SSIM**: structural similarity with a uniform `w×w` window, constants
//!   `K1 = 0.01`, `K2 = 0.03`, data range taken from the reference
//!   (`max − min`) and sample-covariance normalisation `N/(N−1)`. The mean is
//!   taken over pixels whose window lies entirely inside the image; RGB grids
//!   average the per-channel scores.
//!
//! Window sums come from summed-area tables, so each channel costs O(H·W)
//! regardless of window size.

use crate::imaging::{PixelGrid, Shape};
use thiserror::Error;

/// Largest window the sweep ever asks for.
pub const MAX_SSIM_WINDOW: usize = 7;

/// Smallest window SSIM is defined for.
pub const MIN_SSIM_WINDOW: usize = 3;

const PEAK: f64 = 255.0;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Shape mismatch: reference is {reference}, candidate is {candidate}")]
    ShapeMismatch { reference: Shape, candidate: Shape },
    #[error("SSIM window {0} must be odd and at least 3")]
    InvalidWindow(usize),
    #[error("SSIM window {window} exceeds image extent {height}x{width}")]
    WindowExceedsImage {
        window: usize,
        height: u32,
        width: u32,
    },
    #[error("Reference has zero data range; SSIM is undefined for uniform images")]
    ZeroDataRange,
}

/// SSIM window for an image: the largest odd number not exceeding 7 or the
/// smaller dimension, floored at 3.
///
/// For images smaller than 3 in either dimension the floor wins and
/// [`ssim`] reports [`MetricError::WindowExceedsImage`].
pub fn ssim_window(height: u32, width: u32) -> usize {
    let min_dim = height.min(width) as usize;
    let odd = if min_dim % 2 == 1 {
        min_dim
    } else {
        min_dim.saturating_sub(1)
    };
    odd.min(MAX_SSIM_WINDOW).max(MIN_SSIM_WINDOW)
}

fn check_shapes(reference: &PixelGrid, candidate: &PixelGrid) -> Result<(), MetricError> {
    if reference.shape() != candidate.shape() {
        return Err(MetricError::ShapeMismatch {
            reference: reference.shape(),
            candidate: candidate.shape(),
        });
    }
    Ok(())
}

/// Mean squared error over all samples.
pub fn mse(reference: &PixelGrid, candidate: &PixelGrid) -> Result<f64, MetricError> {
    check_shapes(reference, candidate)?;
    let a = reference.samples();
    let b = candidate.samples();
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    Ok(sum / a.len() as f64)
}

/// Peak signal-to-noise ratio in dB; infinite for identical grids.
pub fn psnr(reference: &PixelGrid, candidate: &PixelGrid) -> Result<f64, MetricError> {
    check_shapes(reference, candidate)?;
    if reference.samples() == candidate.samples() {
        return Ok(f64::INFINITY);
    }
    let mse = mse(reference, candidate)?;
    Ok(20.0 * (PEAK / mse.sqrt()).log10())
}

/// Mean structural similarity using a `window×window` uniform filter.
pub fn ssim(
    reference: &PixelGrid,
    candidate: &PixelGrid,
    window: usize,
) -> Result<f64, MetricError> {
    check_shapes(reference, candidate)?;
    if window < MIN_SSIM_WINDOW || window % 2 == 0 {
        return Err(MetricError::InvalidWindow(window));
    }
    let height = reference.height();
    let width = reference.width();
    if window > height as usize || window > width as usize {
        return Err(MetricError::WindowExceedsImage {
            window,
            height,
            width,
        });
    }

    let samples = reference.samples();
    let (lo, hi) = samples
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let data_range = (hi as f64) - (lo as f64);
    if data_range == 0.0 {
        return Err(MetricError::ZeroDataRange);
    }

    let channels = reference.channels().count() as usize;
    let total: f64 = (0..channels)
        .map(|c| {
            channel_ssim(
                samples,
                candidate.samples(),
                width as usize,
                height as usize,
                channels,
                c,
                window,
                data_range,
            )
        })
        .sum();
    Ok(total / channels as f64)
}

/// Summed-area table with a zero row and column prepended.
struct Integral {
    stride: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(x, y);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over `[x0, x1) × [y0, y1)`.
    fn window(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let s = self.stride;
        self.sums[y1 * s + x1] - self.sums[y0 * s + x1] - self.sums[y1 * s + x0]
            + self.sums[y0 * s + x0]
    }
}

#[allow(clippy::too_many_arguments)]
fn channel_ssim(
    a: &[u8],
    b: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    channel: usize,
    window: usize,
    data_range: f64,
) -> f64 {
    let at = |buf: &[u8], x: usize, y: usize| buf[(y * width + x) * channels + channel] as f64;

    let sx = Integral::build(width, height, |x, y| at(a, x, y));
    let sy = Integral::build(width, height, |x, y| at(b, x, y));
    let sxx = Integral::build(width, height, |x, y| at(a, x, y).powi(2));
    let syy = Integral::build(width, height, |x, y| at(b, x, y).powi(2));
    let sxy = Integral::build(width, height, |x, y| at(a, x, y) * at(b, x, y));

    let n = (window * window) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * data_range).powi(2);
    let c2 = (K2 * data_range).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for y0 in 0..=(height - window) {
        for x0 in 0..=(width - window) {
            let (x1, y1) = (x0 + window, y0 + window);
            let ux = sx.window(x0, y0, x1, y1) / n;
            let uy = sy.window(x0, y0, x1, y1) / n;
            let uxx = sxx.window(x0, y0, x1, y1) / n;
            let uyy = syy.window(x0, y0, x1, y1) / n;
            let uxy = sxy.window(x0, y0, x1, y1) / n;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }
    total / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient_luma, gradient_rgb, uniform_rgb};
    use image::{GrayImage, Luma};

    // =========================================================================
    // Window size
    // =========================================================================

    #[test]
    fn window_caps_at_seven() {
        assert_eq!(ssim_window(100, 100), 7);
        assert_eq!(ssim_window(8, 8), 7);
        assert_eq!(ssim_window(7, 500), 7);
    }

    #[test]
    fn window_uses_largest_odd_below_small_dimension() {
        assert_eq!(ssim_window(6, 100), 5);
        assert_eq!(ssim_window(100, 5), 5);
        assert_eq!(ssim_window(4, 4), 3);
        assert_eq!(ssim_window(3, 3), 3);
    }

    #[test]
    fn window_floors_at_three() {
        assert_eq!(ssim_window(2, 2), 3);
        assert_eq!(ssim_window(1, 40), 3);
    }

    #[test]
    fn window_is_odd_and_within_bounds() {
        for h in 3..40 {
            for w in 3..40 {
                let win = ssim_window(h, w);
                assert_eq!(win % 2, 1);
                assert!(win >= 3);
                assert!(win <= h.min(w) as usize);
            }
        }
    }

    // =========================================================================
    // PSNR
    // =========================================================================

    #[test]
    fn psnr_identical_is_infinite() {
        let grid = PixelGrid::Rgb(gradient_rgb(10, 10));
        assert_eq!(psnr(&grid, &grid.clone()).unwrap(), f64::INFINITY);
    }

    #[test]
    fn psnr_matches_closed_form() {
        let a = PixelGrid::Luma(GrayImage::from_pixel(4, 4, Luma([100])));
        let b = PixelGrid::Luma(GrayImage::from_pixel(4, 4, Luma([110])));
        // MSE = 100 → 20·log10(255/10)
        let expected = 20.0 * (25.5f64).log10();
        assert!((psnr(&a, &b).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn psnr_rejects_shape_mismatch() {
        let a = PixelGrid::Luma(GrayImage::new(4, 4));
        let b = PixelGrid::Luma(GrayImage::new(4, 5));
        assert!(matches!(
            psnr(&a, &b),
            Err(MetricError::ShapeMismatch { .. })
        ));
    }

    // =========================================================================
    // SSIM
    // =========================================================================

    #[test]
    fn ssim_identical_is_one() {
        let grid = PixelGrid::Rgb(gradient_rgb(20, 16));
        let score = ssim(&grid, &grid.clone(), 7).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ssim_on_eight_by_eight_with_window_seven() {
        let grid = PixelGrid::Luma(gradient_luma(8, 8));
        let score = ssim(&grid, &grid.clone(), ssim_window(8, 8)).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ssim_drops_with_distortion() {
        let reference = PixelGrid::Luma(gradient_luma(32, 32));
        let mut noisy = gradient_luma(32, 32);
        for (x, y, p) in noisy.enumerate_pixels_mut() {
            if (x + y) % 2 == 0 {
                p.0[0] = p.0[0].saturating_add(40);
            }
        }
        let score = ssim(&reference, &PixelGrid::Luma(noisy), 7).unwrap();
        assert!(score < 0.95);
        assert!(score > -1.0);
    }

    #[test]
    fn ssim_uniform_reference_is_domain_error() {
        let grid = PixelGrid::Rgb(uniform_rgb(10, 10, 128));
        assert_eq!(
            ssim(&grid, &grid.clone(), 7),
            Err(MetricError::ZeroDataRange)
        );
    }

    #[test]
    fn ssim_window_larger_than_image_is_domain_error() {
        let grid = PixelGrid::Luma(gradient_luma(2, 2));
        assert!(matches!(
            ssim(&grid, &grid.clone(), ssim_window(2, 2)),
            Err(MetricError::WindowExceedsImage { window: 3, .. })
        ));
    }

    #[test]
    fn ssim_rejects_even_window() {
        let grid = PixelGrid::Luma(gradient_luma(10, 10));
        assert_eq!(
            ssim(&grid, &grid.clone(), 4),
            Err(MetricError::InvalidWindow(4))
        );
    }
}
