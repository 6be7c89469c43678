//! Edge and shape analysis: Canny edges, Freeman chain code of the largest
//! outer contour, and integral projections of a binarised image.

use image::{GrayImage, Luma, Rgb, RgbImage, imageops};
use imageproc::contours::find_contours;
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point;
use thiserror::Error;

/// Binarisation threshold for chain-code extraction.
pub const DEFAULT_CHAIN_THRESHOLD: u8 = 127;

/// Line width used when wrapping a chain code for display.
pub const CHAIN_LINE_WIDTH: usize = 70;

/// Blur applied before Canny; matches a 5×5 Gaussian.
const EDGE_BLUR_SIGMA: f32 = 1.1;

const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

#[derive(Error, Debug, PartialEq)]
pub enum AnalysisError {
    #[error("Cannot analyse an empty image")]
    EmptyImage,
    #[error("Low threshold {low} is above high threshold {high}")]
    InvalidThresholds { low: f32, high: f32 },
}

fn ensure_not_empty(img: &RgbImage) -> Result<(), AnalysisError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(AnalysisError::EmptyImage);
    }
    Ok(())
}

// =========================================================================
// Edges
// =========================================================================

#[derive(Debug, Clone)]
pub struct EdgeResult {
    /// Grayscale input after smoothing.
    pub blurred: GrayImage,
    /// 255 on edge pixels, 0 elsewhere.
    pub edges: GrayImage,
}

pub fn detect_edges(img: &RgbImage, low: f32, high: f32) -> Result<EdgeResult, AnalysisError> {
    ensure_not_empty(img)?;
    if low > high {
        return Err(AnalysisError::InvalidThresholds { low, high });
    }
    let blurred = gaussian_blur_f32(&imageops::grayscale(img), EDGE_BLUR_SIGMA);
    let edges = canny(&blurred, low, high);
    tracing::debug!(
        low,
        high,
        edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count(),
        "ran Canny"
    );
    Ok(EdgeResult { blurred, edges })
}

// =========================================================================
// Freeman chain code
// =========================================================================

#[derive(Debug, Clone)]
pub struct ChainCodeResult {
    pub gray: GrayImage,
    /// Inverse binary: dark pixels become 255.
    pub binary: GrayImage,
    /// Grayscale input with the largest contour drawn in green.
    pub overlay: RgbImage,
    /// Number of outer contours found.
    pub contour_count: usize,
    pub code: Vec<u8>,
}

/// Inverse binary threshold: pixels at or below `threshold` become 255.
fn binarize_inverse(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] <= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Twice the signed area enclosed by a closed polygon.
fn shoelace(points: &[Point<i32>]) -> i64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
        })
        .sum()
}

/// Direction code of a step, from the signs of its x and y components.
///
/// ```text
/// 5 6 7
/// 4 · 0      (y grows downwards)
/// 3 2 1
/// ```
fn direction(dx: i32, dy: i32) -> Option<u8> {
    match (dx.signum(), dy.signum()) {
        (1, 0) => Some(0),
        (1, 1) => Some(1),
        (0, 1) => Some(2),
        (-1, 1) => Some(3),
        (-1, 0) => Some(4),
        (-1, -1) => Some(5),
        (0, -1) => Some(6),
        (1, -1) => Some(7),
        _ => None,
    }
}

/// 8-direction chain code of a closed contour. Zero-length steps are skipped.
pub fn chain_code(points: &[Point<i32>]) -> Vec<u8> {
    if points.len() < 2 {
        return Vec::new();
    }
    (0..points.len())
        .filter_map(|i| {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            direction(b.x - a.x, b.y - a.y)
        })
        .collect()
}

pub fn freeman_chain(img: &RgbImage, threshold: u8) -> Result<ChainCodeResult, AnalysisError> {
    ensure_not_empty(img)?;
    let gray = imageops::grayscale(img);
    let binary = binarize_inverse(&gray, threshold);

    let outer: Vec<_> = find_contours::<i32>(&binary)
        .into_iter()
        .filter(|c| c.parent.is_none())
        .collect();

    let mut largest: Option<&[Point<i32>]> = None;
    let mut largest_area = -1;
    for contour in &outer {
        let area = shoelace(&contour.points).abs();
        if area > largest_area {
            largest_area = area;
            largest = Some(&contour.points);
        }
    }

    let mut overlay = image::DynamicImage::ImageLuma8(gray.clone()).into_rgb8();
    let code = match largest {
        Some(points) => {
            for p in points {
                overlay.put_pixel(p.x as u32, p.y as u32, CONTOUR_COLOR);
            }
            chain_code(points)
        }
        None => Vec::new(),
    };

    tracing::debug!(
        threshold,
        contours = outer.len(),
        code_length = code.len(),
        "extracted chain code"
    );
    Ok(ChainCodeResult {
        gray,
        binary,
        overlay,
        contour_count: outer.len(),
        code,
    })
}

/// Comma-separated chain code, wrapped so no line exceeds `max_line` where
/// possible.
pub fn wrap_chain_code(code: &[u8], max_line: usize) -> String {
    let mut out = String::new();
    let mut line_len = 0;
    for (i, c) in code.iter().enumerate() {
        let item = if i + 1 < code.len() {
            format!("{}, ", c)
        } else {
            c.to_string()
        };
        if line_len + item.len() > max_line {
            out.push('\n');
            line_len = 0;
        }
        line_len += item.len();
        out.push_str(&item);
    }
    out
}

// =========================================================================
// Integral projection
// =========================================================================

#[derive(Debug, Clone)]
pub struct Projection {
    /// Otsu level used for binarisation.
    pub threshold: u8,
    /// Inverse binary image, 255 for foreground.
    pub binary: GrayImage,
    /// Foreground count per column; length is the image width.
    pub horizontal: Vec<u32>,
    /// Foreground count per row; length is the image height.
    pub vertical: Vec<u32>,
}

pub fn integral_projection(img: &RgbImage) -> Result<Projection, AnalysisError> {
    ensure_not_empty(img)?;
    let gray = imageops::grayscale(img);
    let threshold = otsu_level(&gray);
    let binary = binarize_inverse(&gray, threshold);

    let mut horizontal = vec![0u32; binary.width() as usize];
    let mut vertical = vec![0u32; binary.height() as usize];
    for (x, y, p) in binary.enumerate_pixels() {
        if p.0[0] > 0 {
            horizontal[x as usize] += 1;
            vertical[y as usize] += 1;
        }
    }
    tracing::debug!(threshold, "computed integral projections");
    Ok(Projection {
        threshold,
        binary,
        horizontal,
        vertical,
    })
}

/// Two-column CSV of one projection: position, foreground count.
pub fn projection_csv(header: &str, values: &[u32]) -> String {
    let mut csv = format!("{},count\n", header);
    for (i, v) in values.iter().enumerate() {
        csv.push_str(&format!("{},{}\n", i, v));
    }
    csv
}
