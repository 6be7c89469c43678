//! Compression quality sweep.
//!
//! For one input grid and one encoding [`Family`], the sweep encodes the grid
//! at every candidate parameter, writes each artifact to the scratch
//! directory, decodes it back, and measures fidelity against the original.
//!
//! ## Per-candidate steps
//!
//! ```text
//! encode → write <scratch>/<family dir>/<artifact> → size from file metadata
//!        → read back + decode → shape check → PSNR, SSIM, bit-identity
//!        → (PNG only) lossless re-optimisation size → row
//! ```
//!
//! The artifact on disk is always the encoder's own output, so
//! `encoded_size` matches its file metadata. The optimised PNG stream is
//! only measured, never written. When optimisation fails the row records the
//! unoptimised size instead.
//!
//! ## Failure policy
//!
//! Contract violations (empty grid, empty or out-of-range candidate list,
//! zero original size, unwritable scratch) fail the whole call with a
//! [`SweepError`]. Everything that can go wrong with a single candidate
//! (encode or decode failure, shape change after the round trip) only drops
//! that candidate's row. A metric domain error keeps the row and records the
//! SSIM as missing.
//!
//! ## Memoization
//!
//! [`run_sweep_cached`] consults a [`SweepCache`] keyed by image content,
//! family and candidate list before doing any work. The cache is an explicit
//! argument; nothing here holds global state.

use crate::cache::{self, SweepCache};
use crate::imaging::{
    CodecBackend, EncodeParams, Family, PixelGrid, RustCodec, Shape, artifact_path,
};
use crate::metrics;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Input image is empty ({width}x{height}); both dimensions must be at least 1")]
    EmptyImage { width: u32, height: u32 },
    #[error("No {0} candidates given; the candidate list must not be empty")]
    NoCandidates(Family),
    #[error("Invalid {family} parameter {value}: must be between 0 and {max}")]
    InvalidParameter { family: Family, value: u8, max: u8 },
    #[error("Original size is zero; compression ratios would be meaningless")]
    ZeroOriginalSize,
    #[error("Scratch location {path} is not usable: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything one sweep needs.
#[derive(Debug, Clone, Copy)]
pub struct SweepRequest<'a> {
    pub grid: &'a PixelGrid,
    /// Byte size of the uploaded source file.
    pub original_size: u64,
    /// Artifact base name, normally the upload's file stem.
    pub base_name: &'a str,
    pub family: Family,
    pub candidates: &'a [u8],
    pub scratch_root: &'a Path,
}

/// One surviving candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub parameter: u8,
    /// Size of the artifact on disk, in bytes.
    pub encoded_size: u64,
    /// PNG size after lossless re-optimisation; `None` for JPEG.
    pub optimized_size: Option<u64>,
    /// `original_size / encoded_size`.
    pub compression_ratio: f64,
    /// dB; `f64::INFINITY` when the round trip is bit-identical.
    #[serde(serialize_with = "serialize_psnr")]
    pub psnr: f64,
    /// `None` when SSIM is undefined for this input.
    pub ssim: Option<f64>,
    pub identical: bool,
    pub artifact: PathBuf,
}

impl SweepRow {
    pub fn encoded_kb(&self) -> f64 {
        self.encoded_size as f64 / 1024.0
    }

    pub fn optimized_kb(&self) -> Option<f64> {
        self.optimized_size.map(|size| size as f64 / 1024.0)
    }
}

/// Infinite PSNR has no JSON number; write it the way the tables show it.
fn serialize_psnr<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_infinite() {
        serializer.serialize_str("Infinity")
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Ordered rows for one family, plus the facts they were measured against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResultSet {
    pub family: Family,
    pub original_size: u64,
    pub shape: Shape,
    pub ssim_window: usize,
    pub rows: Vec<SweepRow>,
}

impl SweepResultSet {
    pub fn original_kb(&self) -> f64 {
        self.original_size as f64 / 1024.0
    }

    /// Row for a parameter value, if that candidate survived.
    pub fn row(&self, parameter: u8) -> Option<&SweepRow> {
        self.rows.iter().find(|r| r.parameter == parameter)
    }

    pub fn parameters(&self) -> Vec<u8> {
        self.rows.iter().map(|r| r.parameter).collect()
    }
}

/// Check the caller's side of the contract.
pub fn validate(request: &SweepRequest<'_>) -> Result<(), SweepError> {
    if request.grid.is_empty() {
        return Err(SweepError::EmptyImage {
            width: request.grid.width(),
            height: request.grid.height(),
        });
    }
    if request.candidates.is_empty() {
        return Err(SweepError::NoCandidates(request.family));
    }
    if let Some(&value) = request
        .candidates
        .iter()
        .find(|&&v| !request.family.is_valid_parameter(v))
    {
        return Err(SweepError::InvalidParameter {
            family: request.family,
            value,
            max: request.family.max_parameter(),
        });
    }
    if request.original_size == 0 {
        return Err(SweepError::ZeroOriginalSize);
    }
    Ok(())
}

/// Run a sweep with the default codec backend.
pub fn run_sweep(request: &SweepRequest<'_>) -> Result<SweepResultSet, SweepError> {
    run_sweep_with_backend(&RustCodec::new(), request)
}

/// Run a sweep using a specific backend (allows testing with a mock).
pub fn run_sweep_with_backend(
    backend: &impl CodecBackend,
    request: &SweepRequest<'_>,
) -> Result<SweepResultSet, SweepError> {
    validate(request)?;

    let family_dir = request.scratch_root.join(request.family.dir_name());
    fs::create_dir_all(&family_dir).map_err(|source| SweepError::Scratch {
        path: family_dir.clone(),
        source,
    })?;

    let shape = request.grid.shape();
    let window = metrics::ssim_window(shape.height, shape.width);
    tracing::info!(
        family = %request.family,
        candidates = request.candidates.len(),
        %shape,
        window,
        "starting sweep"
    );

    let mut rows = Vec::with_capacity(request.candidates.len());
    for &value in request.candidates {
        let params = EncodeParams::new(request.family, value);
        if let Some(row) = sweep_candidate(backend, request, params, window)? {
            rows.push(row);
        }
    }

    tracing::info!(
        family = %request.family,
        kept = rows.len(),
        skipped = request.candidates.len() - rows.len(),
        "sweep finished"
    );

    Ok(SweepResultSet {
        family: request.family,
        original_size: request.original_size,
        shape,
        ssim_window: window,
        rows,
    })
}

/// Run a sweep, answering from `cache` when the same image, family and
/// candidate list were swept before and the artifacts are unchanged on disk.
pub fn run_sweep_cached(
    backend: &impl CodecBackend,
    request: &SweepRequest<'_>,
    cache: &mut SweepCache,
) -> Result<SweepResultSet, SweepError> {
    validate(request)?;

    let key = cache::sweep_key(
        &cache::hash_grid(request.grid, request.original_size),
        request.family,
        request.candidates,
    );
    if let Some(hit) = cache.lookup(&key, request.scratch_root, request.base_name) {
        tracing::debug!(family = %request.family, "sweep answered from cache");
        return Ok(hit);
    }

    let results = run_sweep_with_backend(backend, request)?;
    cache.insert(key, results.clone());
    Ok(results)
}

/// Encode, persist, decode and measure one candidate.
///
/// Returns `Ok(None)` when the candidate is dropped; `Err` only for scratch
/// I/O failures.
fn sweep_candidate(
    backend: &impl CodecBackend,
    request: &SweepRequest<'_>,
    params: EncodeParams,
    window: usize,
) -> Result<Option<SweepRow>, SweepError> {
    let grid = request.grid;
    let path = artifact_path(request.scratch_root, request.base_name, params);

    let bytes = match backend.encode(grid, params) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(family = %params.family, value = params.value, error = %e, "encode failed; skipping candidate");
            return Ok(None);
        }
    };

    let scratch_err = |source| SweepError::Scratch {
        path: path.clone(),
        source,
    };
    fs::write(&path, &bytes).map_err(scratch_err)?;
    let encoded_size = fs::metadata(&path).map_err(scratch_err)?.len();
    let stored = fs::read(&path).map_err(scratch_err)?;

    let decoded = match backend.decode(&stored, params.family, grid.channels()) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(family = %params.family, value = params.value, error = %e, "decode failed; skipping candidate");
            return Ok(None);
        }
    };
    if decoded.shape() != grid.shape() {
        tracing::warn!(
            family = %params.family,
            value = params.value,
            expected = %grid.shape(),
            actual = %decoded.shape(),
            "shape changed after round trip; skipping candidate"
        );
        return Ok(None);
    }

    let identical = decoded == *grid;
    let psnr = if identical {
        f64::INFINITY
    } else {
        match metrics::psnr(grid, &decoded) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(value = params.value, error = %e, "PSNR failed; skipping candidate");
                return Ok(None);
            }
        }
    };
    let ssim = match metrics::ssim(grid, &decoded, window) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(value = params.value, error = %e, "SSIM undefined; recording as missing");
            None
        }
    };

    let optimized_size = match params.family {
        Family::Png => Some(optimized_png_size(backend, &stored, encoded_size, params.value)),
        Family::Jpeg => None,
    };

    let compression_ratio = if encoded_size > 0 {
        request.original_size as f64 / encoded_size as f64
    } else {
        f64::INFINITY
    };

    tracing::debug!(
        family = %params.family,
        value = params.value,
        encoded_size,
        ?optimized_size,
        psnr,
        ?ssim,
        identical,
        "candidate measured"
    );

    Ok(Some(SweepRow {
        parameter: params.value,
        encoded_size,
        optimized_size,
        compression_ratio,
        psnr,
        ssim,
        identical,
        artifact: path,
    }))
}

/// Length of the re-optimised PNG stream, or `encoded_size` when the
/// optimiser gives up.
fn optimized_png_size(
    backend: &impl CodecBackend,
    stored: &[u8],
    encoded_size: u64,
    value: u8,
) -> u64 {
    match backend.optimize_png(stored) {
        Ok(optimized) => optimized.len() as u64,
        Err(e) => {
            tracing::warn!(value, error = %e, "PNG optimisation failed; keeping unoptimised size");
            encoded_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{gradient_luma, gradient_rgb, uniform_rgb};
    use tempfile::TempDir;

    fn request<'a>(
        grid: &'a PixelGrid,
        family: Family,
        candidates: &'a [u8],
        scratch: &'a Path,
    ) -> SweepRequest<'a> {
        SweepRequest {
            grid,
            original_size: 30_000,
            base_name: "photo",
            family,
            candidates,
            scratch_root: scratch,
        }
    }

    // =========================================================================
    // Contract violations
    // =========================================================================

    #[test]
    fn empty_grid_rejected() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(image::RgbImage::new(0, 10));
        let err = run_sweep(&request(&grid, Family::Jpeg, &[95], tmp.path())).unwrap_err();
        assert!(matches!(err, SweepError::EmptyImage { width: 0, .. }));
    }

    #[test]
    fn empty_candidates_rejected() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(8, 8));
        let err = run_sweep(&request(&grid, Family::Png, &[], tmp.path())).unwrap_err();
        assert!(matches!(err, SweepError::NoCandidates(Family::Png)));
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn out_of_range_candidate_rejected() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(8, 8));
        let err = run_sweep(&request(&grid, Family::Png, &[3, 12], tmp.path())).unwrap_err();
        assert!(matches!(
            err,
            SweepError::InvalidParameter {
                family: Family::Png,
                value: 12,
                max: 9
            }
        ));
    }

    #[test]
    fn zero_original_size_rejected() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(8, 8));
        let mut req = request(&grid, Family::Jpeg, &[95], tmp.path());
        req.original_size = 0;
        assert!(matches!(run_sweep(&req), Err(SweepError::ZeroOriginalSize)));
    }

    #[test]
    fn unwritable_scratch_rejected() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the scratch directory should be.
        let blocker = tmp.path().join("scratch");
        fs::write(&blocker, "not a directory").unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(8, 8));
        let err = run_sweep(&request(&grid, Family::Jpeg, &[95], &blocker)).unwrap_err();
        assert!(matches!(err, SweepError::Scratch { .. }));
    }

    #[test]
    fn validation_happens_before_any_encoding() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(8, 8));
        let backend = MockBackend::new();
        let result =
            run_sweep_with_backend(&backend, &request(&grid, Family::Jpeg, &[50, 200], tmp.path()));
        assert!(result.is_err());
        assert!(backend.get_operations().is_empty());
    }

    // =========================================================================
    // Rows
    // =========================================================================

    #[test]
    fn rows_follow_candidate_order() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(24, 24));
        let candidates = [10, 95, 50];
        let results = run_sweep(&request(&grid, Family::Jpeg, &candidates, tmp.path())).unwrap();
        assert_eq!(results.parameters(), vec![10, 95, 50]);
    }

    #[test]
    fn encoded_size_is_read_from_artifact() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(24, 24));
        let results = run_sweep(&request(&grid, Family::Jpeg, &[75], tmp.path())).unwrap();
        let row = &results.rows[0];
        assert_eq!(row.artifact, tmp.path().join("Image_jpeg/photo_jpeg_75.jpg"));
        assert_eq!(fs::metadata(&row.artifact).unwrap().len(), row.encoded_size);
    }

    #[test]
    fn ratio_is_original_over_encoded() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(32, 32));
        let results =
            run_sweep(&request(&grid, Family::Png, &[0, 5, 9], tmp.path())).unwrap();
        for row in &results.rows {
            let expected = 30_000.0 / row.encoded_size as f64;
            assert!((row.compression_ratio - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn png_rows_are_identical_with_infinite_psnr() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Luma(gradient_luma(8, 8));
        let results = run_sweep(&request(
            &grid,
            Family::Png,
            &Family::Png.default_candidates(),
            tmp.path(),
        ))
        .unwrap();
        assert_eq!(results.rows.len(), 10);
        assert_eq!(results.ssim_window, 7);
        for row in &results.rows {
            assert!(row.identical);
            assert_eq!(row.psnr, f64::INFINITY);
            assert!((row.ssim.unwrap() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn lossy_rows_are_finite_and_not_identical() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(48, 48));
        let results = run_sweep(&request(&grid, Family::Jpeg, &[10], tmp.path())).unwrap();
        let row = &results.rows[0];
        assert!(!row.identical);
        assert!(row.psnr.is_finite());
        assert!(row.ssim.is_some());
    }

    #[test]
    fn uniform_image_records_missing_ssim() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(uniform_rgb(16, 16, 100));
        let results = run_sweep(&request(&grid, Family::Png, &[6], tmp.path())).unwrap();
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.rows[0].ssim, None);
    }

    #[test]
    fn tiny_image_keeps_row_without_ssim() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Luma(gradient_luma(2, 2));
        let results = run_sweep(&request(&grid, Family::Png, &[9], tmp.path())).unwrap();
        assert_eq!(results.ssim_window, 3);
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.rows[0].ssim, None);
    }

    #[test]
    fn png_rows_record_optimized_size() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Luma(gradient_luma(32, 32));
        let results = run_sweep(&request(&grid, Family::Png, &[0, 9], tmp.path())).unwrap();
        for row in &results.rows {
            let optimized = row.optimized_size.unwrap();
            assert!(optimized <= row.encoded_size);
            // The artifact keeps the encoder's own bytes.
            assert_eq!(fs::metadata(&row.artifact).unwrap().len(), row.encoded_size);
        }
        let stored = results.row(0).unwrap();
        assert!(stored.optimized_size.unwrap() < stored.encoded_size);
    }

    #[test]
    fn jpeg_rows_have_no_optimized_size() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(16, 16));
        let backend = MockBackend::new();
        let results =
            run_sweep_with_backend(&backend, &request(&grid, Family::Jpeg, &[75], tmp.path()))
                .unwrap();
        assert_eq!(results.rows[0].optimized_size, None);
        assert!(!backend.get_operations().contains(&RecordedOp::OptimizePng));
    }

    // =========================================================================
    // Per-candidate failures
    // =========================================================================

    #[test]
    fn optimize_failure_falls_back_to_encoded_size() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Luma(gradient_luma(16, 16));
        let backend = MockBackend::failing_optimize();
        let results =
            run_sweep_with_backend(&backend, &request(&grid, Family::Png, &[0, 6], tmp.path()))
                .unwrap();
        assert_eq!(results.parameters(), vec![0, 6]);
        for row in &results.rows {
            assert_eq!(row.optimized_size, Some(row.encoded_size));
        }
    }

    #[test]
    fn encode_failure_drops_only_that_row() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(16, 16));
        let backend = MockBackend::failing_encode(&[50]);
        let results = run_sweep_with_backend(
            &backend,
            &request(&grid, Family::Jpeg, &[95, 75, 50, 25, 10], tmp.path()),
        )
        .unwrap();
        assert_eq!(results.parameters(), vec![95, 75, 25, 10]);
        assert!(!tmp.path().join("Image_jpeg/photo_jpeg_50.jpg").exists());
    }

    #[test]
    fn decode_failure_drops_only_that_row() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Luma(gradient_luma(16, 16));
        let backend = MockBackend::failing_decode(&[4]);
        let results =
            run_sweep_with_backend(&backend, &request(&grid, Family::Png, &[3, 4, 5], tmp.path()))
                .unwrap();
        assert_eq!(results.parameters(), vec![3, 5]);
        // The artifact was still written before decoding failed.
        assert!(
            tmp.path()
                .join("Image_png/photo_compressed_level4.png")
                .exists()
        );
    }

    #[test]
    fn decode_uses_input_layout() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Luma(gradient_luma(16, 16));
        let backend = MockBackend::new();
        run_sweep_with_backend(&backend, &request(&grid, Family::Jpeg, &[80], tmp.path()))
            .unwrap();
        assert!(backend.get_operations().contains(&RecordedOp::Decode {
            family: Family::Jpeg,
            channels: crate::imaging::Channels::Luma,
        }));
    }

    // =========================================================================
    // Determinism and caching
    // =========================================================================

    #[test]
    fn repeated_sweeps_are_identical_apart_from_paths() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(32, 20));
        let first = run_sweep(&request(&grid, Family::Jpeg, &[95, 50, 10], a.path())).unwrap();
        let second = run_sweep(&request(&grid, Family::Jpeg, &[95, 50, 10], b.path())).unwrap();

        for (x, y) in first.rows.iter().zip(&second.rows) {
            assert_eq!(x.encoded_size, y.encoded_size);
            assert_eq!(x.psnr, y.psnr);
            assert_eq!(x.ssim, y.ssim);
            assert_eq!(fs::read(&x.artifact).unwrap(), fs::read(&y.artifact).unwrap());
        }
    }

    #[test]
    fn cached_sweep_skips_codec_on_hit() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(16, 16));
        let mut cache = SweepCache::new();
        let req = request(&grid, Family::Jpeg, &[95, 10], tmp.path());

        let first_backend = MockBackend::new();
        let first = run_sweep_cached(&first_backend, &req, &mut cache).unwrap();
        assert!(!first_backend.get_operations().is_empty());

        let second_backend = MockBackend::new();
        let second = run_sweep_cached(&second_backend, &req, &mut cache).unwrap();
        assert!(second_backend.get_operations().is_empty());
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn cached_sweep_reruns_when_candidates_change() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(16, 16));
        let mut cache = SweepCache::new();
        let backend = MockBackend::new();
        run_sweep_cached(&backend, &request(&grid, Family::Jpeg, &[95], tmp.path()), &mut cache)
            .unwrap();
        let results = run_sweep_cached(
            &backend,
            &request(&grid, Family::Jpeg, &[95, 10], tmp.path()),
            &mut cache,
        )
        .unwrap();
        assert_eq!(results.rows.len(), 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn cached_sweep_reruns_when_artifacts_deleted() {
        let tmp = TempDir::new().unwrap();
        let grid = PixelGrid::Rgb(gradient_rgb(16, 16));
        let mut cache = SweepCache::new();
        let req = request(&grid, Family::Png, &[1], tmp.path());
        let backend = MockBackend::new();
        let first = run_sweep_cached(&backend, &req, &mut cache).unwrap();
        fs::remove_file(&first.rows[0].artifact).unwrap();

        let second = run_sweep_cached(&backend, &req, &mut cache).unwrap();
        assert!(second.rows[0].artifact.exists());
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn cached_sweep_misses_after_same_name_sweep_overwrites_artifacts() {
        let tmp = TempDir::new().unwrap();
        let first_image = PixelGrid::Rgb(gradient_rgb(48, 48));
        let second_image = PixelGrid::Rgb(uniform_rgb(48, 48, 200));
        let candidates = [95, 50, 10];
        let mut cache = SweepCache::new();
        let backend = MockBackend::new();

        // Both images share the base name "photo" and the scratch root.
        let first_req = request(&first_image, Family::Jpeg, &candidates, tmp.path());
        let second_req = request(&second_image, Family::Jpeg, &candidates, tmp.path());
        run_sweep_cached(&backend, &first_req, &mut cache).unwrap();
        run_sweep_cached(&backend, &second_req, &mut cache).unwrap();
        let again = run_sweep_cached(&backend, &first_req, &mut cache).unwrap();

        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 3);
        assert_eq!(cache.stats().to_string(), "3 swept");
        for row in &again.rows {
            assert_eq!(fs::metadata(&row.artifact).unwrap().len(), row.encoded_size);
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn infinite_psnr_serializes_as_string() {
        let row = SweepRow {
            parameter: 9,
            encoded_size: 100,
            optimized_size: Some(80),
            compression_ratio: 3.0,
            psnr: f64::INFINITY,
            ssim: Some(1.0),
            identical: true,
            artifact: PathBuf::from("x.png"),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["psnr"], "Infinity");
        assert_eq!(json["ssim"], 1.0);
        assert_eq!(json["optimized_size"], 80);
    }

    #[test]
    fn finite_psnr_serializes_as_number() {
        let row = SweepRow {
            parameter: 50,
            encoded_size: 100,
            optimized_size: None,
            compression_ratio: 3.0,
            psnr: 31.5,
            ssim: None,
            identical: false,
            artifact: PathBuf::from("x.jpg"),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["psnr"], 31.5);
        assert!(json["ssim"].is_null());
        assert!(json["optimized_size"].is_null());
    }
}
