//! HTML report and JSON export for a compression run.
//!
//! ## Report Layout
//!
//! One self-contained `report.html` in the scratch directory:
//!
//! - **Comparison**: the original next to JPEG q95, JPEG q10 and PNG level 9.
//!   Artifacts are located with [`artifact_path`], the same naming the sweep
//!   writes with, and shown only when the file exists.
//! - **Tables**: one results table per family.
//! - **Charts**: per family, parameter against size, PSNR and SSIM as inline
//!   SVG line charts, plus one bar chart of every size with the original first.
//!   PNG sizes in the charts are the optimised ones.
//!
//! ```text
//! scratch/
//! ├── report.html
//! ├── results.json
//! ├── Image_jpeg/photo_jpeg_95.jpg
//! └── Image_png/photo_compressed_level9.png
//! ```
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Charts are drawn with `plotters` into SVG strings and embedded verbatim.
//! The stylesheet is embedded at compile time from `static/report.css`.

use crate::imaging::{EncodeParams, Family, artifact_path};
use crate::output::{format_optimized_kb, format_psnr, format_ssim};
use crate::sweep::SweepResultSet;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::Serialize;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Chart rendering failed: {0}")]
    Chart(String),
}

const CSS: &str = include_str!("../static/report.css");

/// Infinite PSNR has no place on an axis; it is drawn at this height.
pub const PSNR_CHART_CAP: f64 = 100.0;

const CHART_SIZE: (u32, u32) = (360, 240);
const BAR_CHART_SIZE: (u32, u32) = (720, 280);

const JPEG_COLOR: RGBColor = RGBColor(207, 74, 27);
const PNG_COLOR: RGBColor = RGBColor(27, 106, 201);
const ORIGINAL_COLOR: RGBColor = RGBColor(101, 109, 118);

/// Everything a report is built from.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub base_name: &'a str,
    /// The uploaded source file.
    pub original: &'a Path,
    pub scratch_root: &'a Path,
    pub sets: &'a [SweepResultSet],
}

/// One image in the side-by-side comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonImage {
    pub caption: String,
    /// `src` attribute, relative to the report for artifacts.
    pub src: String,
}

/// The fixed comparison candidates: `(caption, params)`.
fn comparison_params() -> [(&'static str, EncodeParams); 3] {
    [
        ("JPEG quality 95", EncodeParams::jpeg(95)),
        ("JPEG quality 10", EncodeParams::jpeg(10)),
        ("PNG level 9", EncodeParams::png(9)),
    ]
}

/// Collect the comparison images that exist on disk.
pub fn comparison_images(
    scratch_root: &Path,
    base_name: &str,
    original: &Path,
) -> Vec<ComparisonImage> {
    let mut images = Vec::new();
    if original.is_file() {
        let absolute = fs::canonicalize(original).unwrap_or_else(|_| original.to_path_buf());
        images.push(ComparisonImage {
            caption: "Original".to_string(),
            src: absolute.display().to_string(),
        });
    }
    for (caption, params) in comparison_params() {
        if artifact_path(scratch_root, base_name, params).is_file() {
            images.push(ComparisonImage {
                caption: caption.to_string(),
                src: format!(
                    "{}/{}",
                    params.family.dir_name(),
                    params.artifact_name(base_name)
                ),
            });
        }
    }
    images
}

/// PSNR value as plotted.
pub fn chart_psnr(psnr: f64) -> f64 {
    if psnr.is_infinite() {
        PSNR_CHART_CAP
    } else {
        psnr
    }
}

fn family_color(family: Family) -> RGBColor {
    match family {
        Family::Jpeg => JPEG_COLOR,
        Family::Png => PNG_COLOR,
    }
}

fn chart_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Chart(e.to_string())
}

// ============================================================================
// Charts
// ============================================================================

/// Axis range over `values`, widened by one unit each way when flat.
fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if max - min < 1e-9 {
        return (min - 1.0)..(max + 1.0);
    }
    min..max
}

/// Single-series line chart with markers, rendered to an SVG string.
fn line_chart(
    title: &str,
    x_label: &str,
    color: RGBColor,
    points: &[(f64, f64)],
) -> Result<String, ReportError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 16))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(52)
            .build_cartesian_2d(
                value_range(points.iter().map(|p| p.0)),
                value_range(points.iter().map(|p| p.1)),
            )
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_desc(x_label)
            .x_labels(6)
            .y_labels(6)
            .draw()
            .map_err(chart_err)?;

        if !points.is_empty() {
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(chart_err)?;
            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))
                .map_err(chart_err)?;
        }
        root.present().map_err(chart_err)?;
    }
    Ok(svg)
}

/// Size, PSNR and SSIM charts for one family.
///
/// PNG sizes are plotted after lossless re-optimisation.
fn family_charts(set: &SweepResultSet) -> Result<Markup, ReportError> {
    let color = family_color(set.family);
    let x_label = set.family.parameter_name();
    let param = |p: u8| f64::from(p);
    let sizes: Vec<(f64, f64)> = set
        .rows
        .iter()
        .map(|r| (param(r.parameter), r.optimized_kb().unwrap_or(r.encoded_kb())))
        .collect();
    let psnr: Vec<(f64, f64)> = set
        .rows
        .iter()
        .map(|r| (param(r.parameter), chart_psnr(r.psnr)))
        .collect();
    let ssim: Vec<(f64, f64)> = set
        .rows
        .iter()
        .filter_map(|r| r.ssim.map(|s| (param(r.parameter), s)))
        .collect();

    let size_title = match set.family {
        Family::Jpeg => "JPEG size (KB)".to_string(),
        Family::Png => "PNG optimised size (KB)".to_string(),
    };
    let charts = [
        line_chart(&size_title, x_label, color, &sizes)?,
        line_chart(&format!("{} PSNR (dB)", set.family), x_label, color, &psnr)?,
        line_chart(&format!("{} SSIM", set.family), x_label, color, &ssim)?,
    ];
    Ok(html! {
        div.charts {
            @for svg in charts {
                figure.chart { (PreEscaped(svg)) }
            }
        }
    })
}

/// One bar of the size chart.
#[derive(Debug, Clone, PartialEq)]
struct Bar {
    label: String,
    kb: f64,
    color: RGBColor,
}

/// Bars in display order: the original, then every row of every family.
fn size_bars(sets: &[SweepResultSet]) -> Vec<Bar> {
    let mut bars = Vec::new();
    if let Some(first) = sets.first() {
        bars.push(Bar {
            label: "Original".to_string(),
            kb: first.original_kb(),
            color: ORIGINAL_COLOR,
        });
    }
    for set in sets {
        let prefix = match set.family {
            Family::Jpeg => "Q",
            Family::Png => "L",
        };
        bars.extend(set.rows.iter().map(|r| Bar {
            label: format!("{}{}", prefix, r.parameter),
            kb: r.optimized_kb().unwrap_or(r.encoded_kb()),
            color: family_color(set.family),
        }));
    }
    bars
}

fn bar_chart(bars: &[Bar]) -> Result<String, ReportError> {
    let top = bars.iter().map(|b| b.kb).fold(0.0_f64, f64::max);
    let top = if top > 0.0 { top * 1.15 } else { 1.0 };
    let slots = bars.len().max(1) as f64;
    let label_style = TextStyle::from(("sans-serif", 11).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, BAR_CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("File size (KB)", ("sans-serif", 16))
            .margin(12)
            .x_label_area_size(12)
            .y_label_area_size(52)
            .build_cartesian_2d(0.0..slots, 0.0..top)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(0)
            .y_labels(6)
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(bars.iter().enumerate().map(|(i, bar)| {
                let x = i as f64;
                Rectangle::new([(x + 0.1, 0.0), (x + 0.9, bar.kb)], bar.color.filled())
            }))
            .map_err(chart_err)?;
        chart
            .draw_series(bars.iter().enumerate().map(|(i, bar)| {
                Text::new(bar.label.clone(), (i as f64 + 0.5, bar.kb), label_style.clone())
            }))
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
    }
    Ok(svg)
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (CSS) }
            }
            body {
                (content)
            }
        }
    }
}

fn comparison_section(images: &[ComparisonImage]) -> Markup {
    html! {
        section.comparison {
            @for image in images {
                figure {
                    img src=(image.src) alt=(image.caption);
                    figcaption { (image.caption) }
                }
            }
        }
    }
}

fn results_table(set: &SweepResultSet) -> Markup {
    html! {
        table.results {
            thead {
                tr {
                    th { (set.family.parameter_name()) }
                    th { "Size (KB)" }
                    th { "Optimised (KB)" }
                    th { "Ratio" }
                    th { "PSNR (dB)" }
                    th { "SSIM" }
                    th { "Identical" }
                }
            }
            tbody {
                @for row in &set.rows {
                    tr class=[row.identical.then_some("identical")] {
                        td { (row.parameter) }
                        td { (format!("{:.2}", row.encoded_kb())) }
                        td { (format_optimized_kb(row.optimized_kb())) }
                        td { (format!("{:.2}", row.compression_ratio)) }
                        td { (format_psnr(row.psnr)) }
                        td { (format_ssim(row.ssim)) }
                        td { @if row.identical { "yes" } @else { "no" } }
                    }
                }
            }
        }
    }
}

fn family_section(set: &SweepResultSet) -> Result<Markup, ReportError> {
    let charts = family_charts(set)?;
    Ok(html! {
        section.family {
            h2 { (set.family) " compression" }
            p.meta {
                "Input " (set.shape) ", original " (format!("{:.2}", set.original_kb()))
                " KB, SSIM window " (set.ssim_window)
            }
            (results_table(set))
            (charts)
        }
    })
}

/// Render the full report page.
pub fn render_report(input: &ReportInput<'_>) -> Result<Markup, ReportError> {
    let images = comparison_images(input.scratch_root, input.base_name, input.original);
    let title = format!("Compression report: {}", input.base_name);
    let sections = input
        .sets
        .iter()
        .map(family_section)
        .collect::<Result<Vec<_>, _>>()?;
    let sizes = if input.sets.is_empty() {
        None
    } else {
        Some(bar_chart(&size_bars(input.sets))?)
    };
    let content = html! {
        h1 { (title) }
        p.meta { "Source: " (input.original.display()) }
        @if !images.is_empty() {
            h2 { "Comparison" }
            (comparison_section(&images))
        }
        @for section in sections {
            (section)
        }
        @if let Some(svg) = sizes {
            h2 { "Sizes" }
            div.charts { figure.chart { (PreEscaped(svg)) } }
        }
    };
    Ok(base_document(&title, content))
}

/// Write `report.html` into the scratch root and return its path.
pub fn write_report(input: &ReportInput<'_>) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(input.scratch_root)?;
    let path = input.scratch_root.join("report.html");
    fs::write(&path, render_report(input)?.into_string())?;
    tracing::info!(path = %path.display(), "wrote report");
    Ok(path)
}

#[derive(Serialize)]
struct ResultsDocument<'a> {
    image: &'a str,
    source: String,
    sweeps: &'a [SweepResultSet],
}

/// Write `results.json` (both result sets) into the scratch root.
pub fn write_results_json(input: &ReportInput<'_>) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(input.scratch_root)?;
    let doc = ResultsDocument {
        image: input.base_name,
        source: input.original.display().to_string(),
        sweeps: input.sets,
    };
    let path = input.scratch_root.join("results.json");
    fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
    tracing::info!(path = %path.display(), "wrote results");
    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================
