//! # dip-lab
//!
//! Classical digital image processing, one stateless pipeline per feature:
//! take an image, choose parameters, get results. Nothing is kept between
//! runs except the files written to a scratch or output directory.
//!
//! # Architecture: Independent Pipelines
//!
//! ```text
//! compress  image → JPEG sweep + PNG sweep → tables, report.html, results.json
//! convert   image → color space composite + three channel planes
//! filter    image → convolved / padded / filtered image or spectrum
//! analyze   image → Canny edges, Freeman chain code, integral projections
//! capture   frames → face crops in dataset/<name>/
//! ```
//!
//! Features never feed each other. The compression sweep is the largest of
//! them: for every candidate quality or level it encodes, writes the artifact,
//! reads it back, decodes it and measures PSNR and SSIM against the original.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pixel grids, encoder parameters, artifact naming, the `CodecBackend` trait |
//! | [`metrics`] | PSNR and windowed SSIM between two same-shaped grids |
//! | [`sweep`] | The quality sweep driver and its result rows |
//! | [`cache`] | Content-hash keyed memoization of whole sweeps |
//! | [`color`] | RGB to XYZ, Lab, YCbCr, YIQ, YUV, HSI and Luv with display planes |
//! | [`filters`] | 3x3 convolution, zero padding, low/high/band filters, FFT spectrum work |
//! | [`analysis`] | Edge detection, chain codes, integral projection |
//! | [`capture`] | Face-dataset capture loop over a frame source and a face detector |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting for every command |
//! | [`report`] | HTML report with inline SVG charts, and the JSON export |
//!
//! # Design Decisions
//!
//! ## Sizes Come From Disk
//!
//! A sweep row's encoded size is read from the artifact's file metadata after
//! it has been written, never from the in-memory buffer. The table then
//! describes exactly the files a user can open from the scratch directory.
//!
//! ## Failures Stay Local
//!
//! A candidate that cannot be encoded or decoded loses its row; the rest of
//! the sweep goes on. Only broken contracts (empty image, empty or
//! out-of-range candidates, an unusable scratch directory) fail a call.
//! Bit-identical round trips are not an error: their PSNR is `f64::INFINITY`.
//!
//! ## Codecs Behind a Trait
//!
//! All encoding and decoding goes through [`imaging::CodecBackend`]. The
//! production [`imaging::RustCodec`] uses the `image` crate, plus `oxipng`
//! for the optimised PNG size; tests swap in
//! a recording mock or a codec that fails on chosen parameters.

pub mod analysis;
pub mod cache;
pub mod capture;
pub mod color;
pub mod config;
pub mod filters;
pub mod imaging;
pub mod metrics;
pub mod output;
pub mod report;
pub mod sweep;

#[cfg(test)]
pub(crate) mod test_helpers;
