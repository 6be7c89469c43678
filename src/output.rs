//! CLI output formatting for every command.
//!
//! # Result-First Display
//!
//! Each command prints what it measured or produced first, with file paths as
//! indented secondary lines. Tables are plain fixed-width text so they read
//! the same in a terminal and in a captured log.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! JPEG (100x100x3, original 29.30 KB, SSIM window 7)
//!   Quality   Size KB    Opt KB   Ratio     PSNR dB     SSIM  Identical
//!        95      2.10         -   13.95       46.12   0.9987  no
//!        10      0.86         -   34.07       33.40   0.9512  no
//!
//! Sweeps: 2 swept
//! Report → scratch/report.html
//! Results → scratch/results.json
//! ```
//!
//! ## Analyze
//!
//! ```text
//! Edges: 1532 edge pixels
//! Chain code: 1 contour, 212 steps
//!     0, 0, 0, 7, 6, ...
//! Projection: Otsu level 118
//!     Wrote out/edges.png
//! ```
//!
//! ## Capture
//!
//! ```text
//! 001/020 saved dataset/ana/ana_0.jpg (64x64 at 120,40)
//!         no face
//! Captured 20 images for ana → dataset/ana
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::analysis::{ChainCodeResult, EdgeResult, Projection};
use crate::cache::CacheStats;
use crate::capture::CaptureEvent;
use crate::color::ColorSpace;
use crate::sweep::{SweepResultSet, SweepRow};
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// PSNR in dB with two decimals, or `Infinity` for bit-identical round trips.
pub fn format_psnr(psnr: f64) -> String {
    if psnr.is_infinite() {
        "Infinity".to_string()
    } else {
        format!("{:.2}", psnr)
    }
}

/// SSIM with four decimals, or `-` when it could not be measured.
pub fn format_ssim(ssim: Option<f64>) -> String {
    match ssim {
        Some(v) => format!("{:.4}", v),
        None => "-".to_string(),
    }
}

/// Optimised size in KB with two decimals, or `-` for families without one.
pub fn format_optimized_kb(kb: Option<f64>) -> String {
    match kb {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn written_lines(paths: &[PathBuf], depth: usize) -> Vec<String> {
    paths
        .iter()
        .map(|p| format!("{}Wrote {}", indent(depth), p.display()))
        .collect()
}

// ============================================================================
// Compress
// ============================================================================

fn format_row(row: &SweepRow) -> String {
    format!(
        "  {:>7}  {:>8.2}  {:>8}  {:>6.2}  {:>10}  {:>7}  {}",
        row.parameter,
        row.encoded_kb(),
        format_optimized_kb(row.optimized_kb()),
        row.compression_ratio,
        format_psnr(row.psnr),
        format_ssim(row.ssim),
        yes_no(row.identical)
    )
}

/// Format one family's results table.
///
/// A heading with the family and the facts the rows were measured against,
/// a column header, then one line per surviving candidate in sweep order.
pub fn format_sweep_table(results: &SweepResultSet) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}, original {:.2} KB, SSIM window {})",
        results.family,
        results.shape,
        results.original_kb(),
        results.ssim_window
    )];
    lines.push(format!(
        "  {:>7}  {:>8}  {:>8}  {:>6}  {:>10}  {:>7}  {}",
        results.family.parameter_name(),
        "Size KB",
        "Opt KB",
        "Ratio",
        "PSNR dB",
        "SSIM",
        "Identical"
    ));
    if results.rows.is_empty() {
        lines.push(format!("{}no candidate survived", indent(1)));
    }
    lines.extend(results.rows.iter().map(format_row));
    lines
}

/// Format the full compress run: both tables, cache stats and written files.
pub fn format_compress_output(
    sets: &[SweepResultSet],
    stats: &CacheStats,
    report: &Path,
    json: &Path,
) -> Vec<String> {
    let mut lines = Vec::new();
    for set in sets {
        lines.extend(format_sweep_table(set));
        lines.push(String::new());
    }
    lines.push(format!("Sweeps: {}", stats));
    lines.push(format!("Report \u{2192} {}", report.display()));
    lines.push(format!("Results \u{2192} {}", json.display()));
    lines
}

/// Print compress output to stdout.
pub fn print_compress_output(
    sets: &[SweepResultSet],
    stats: &CacheStats,
    report: &Path,
    json: &Path,
) {
    for line in format_compress_output(sets, stats, report, json) {
        println!("{}", line);
    }
}

// ============================================================================
// Convert / filter
// ============================================================================

/// Format conversion output: the space, its channel labels, written files.
pub fn format_conversion_output(space: ColorSpace, written: &[PathBuf]) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        space,
        space.channel_labels().join(", ")
    )];
    lines.extend(written_lines(written, 1));
    lines
}

pub fn print_conversion_output(space: ColorSpace, written: &[PathBuf]) {
    for line in format_conversion_output(space, written) {
        println!("{}", line);
    }
}

/// One line per filter run: `<operation> → <file>`.
pub fn format_filter_output(operation: &str, out: &Path) -> Vec<String> {
    vec![format!("{} \u{2192} {}", operation, out.display())]
}

pub fn print_filter_output(operation: &str, out: &Path) {
    for line in format_filter_output(operation, out) {
        println!("{}", line);
    }
}

// ============================================================================
// Analyze
// ============================================================================

/// Everything the analyze command produced, borrowed for display.
pub struct AnalysisSummary<'a> {
    pub edges: &'a EdgeResult,
    pub chain: &'a ChainCodeResult,
    /// Chain code already wrapped for display.
    pub wrapped_code: &'a str,
    pub projection: &'a Projection,
    pub written: &'a [PathBuf],
}

pub fn format_analysis_output(summary: &AnalysisSummary<'_>) -> Vec<String> {
    let edge_pixels = summary.edges.edges.pixels().filter(|p| p.0[0] > 0).count();
    let mut lines = vec![format!("Edges: {} edge pixels", edge_pixels)];

    let chain = summary.chain;
    if chain.contour_count == 0 {
        lines.push("Chain code: no contour found".to_string());
    } else {
        lines.push(format!(
            "Chain code: {} contour{}, {} steps",
            chain.contour_count,
            if chain.contour_count == 1 { "" } else { "s" },
            chain.code.len()
        ));
        lines.extend(
            summary
                .wrapped_code
                .lines()
                .map(|l| format!("{}{}", indent(1), l)),
        );
    }

    lines.push(format!(
        "Projection: Otsu level {}",
        summary.projection.threshold
    ));
    lines.extend(written_lines(summary.written, 1));
    lines
}

pub fn print_analysis_output(summary: &AnalysisSummary<'_>) {
    for line in format_analysis_output(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Format a single capture progress event.
///
/// Saves lead with a 1-based `NNN/MMM` counter; frames without a face are
/// indented under the last save so progress stays readable.
pub fn format_capture_event(event: &CaptureEvent, max_images: u32) -> Vec<String> {
    match event {
        CaptureEvent::Saved { index, path, face } => vec![format!(
            "{:0>3}/{:0>3} saved {} ({}x{} at {},{})",
            index + 1,
            max_images,
            path.display(),
            face.width,
            face.height,
            face.x,
            face.y
        )],
        CaptureEvent::NoFace => vec![format!("{}no face", indent(2))],
        CaptureEvent::FrameUnavailable => vec!["Camera stopped delivering frames".to_string()],
    }
}

pub fn print_capture_event(event: &CaptureEvent, max_images: u32) {
    for line in format_capture_event(event, max_images) {
        println!("{}", line);
    }
}

pub fn format_capture_summary(name: &str, saved: u32, dir: &Path) -> Vec<String> {
    vec![format!(
        "Captured {} image{} for {} \u{2192} {}",
        saved,
        if saved == 1 { "" } else { "s" },
        name,
        dir.display()
    )]
}

pub fn print_capture_summary(name: &str, saved: u32, dir: &Path) {
    for line in format_capture_summary(name, saved, dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
