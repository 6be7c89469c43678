//! Lab configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user file passed with `--config` overrides only the keys
//! it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! jpeg_qualities = [95, 75, 50, 25, 10]   # JPEG sweep candidates (0-100)
//! png_levels = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]  # PNG sweep candidates (0-9)
//! scratch_dir = "scratch"                 # Where artifacts are written
//!
//! [filters]
//! padding = 20             # Zero-padding width in pixels
//! noise_radius = 30        # Half-size of the masked spectrum square
//!
//! [analysis]
//! canny_low = 50.0
//! canny_high = 150.0
//! chain_threshold = 127    # Binarisation level for chain codes
//!
//! [capture]
//! dataset_dir = "dataset"
//! model_path = "seeta_fd_frontal_v1.0.bin"
//! max_images = 20
//! max_attempts = 200
//! poll_delay_ms = 100
//! min_face_size = 30
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [compression]
//! jpeg_qualities = [90, 60, 30]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::capture::DetectorSettings;
use crate::imaging::{DEFAULT_JPEG_QUALITIES, DEFAULT_PNG_LEVELS, Family};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Lab configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabConfig {
    /// Quality sweep candidates and scratch location.
    pub compression: CompressionConfig,
    /// Padding and noise-reduction settings.
    pub filters: FiltersConfig,
    /// Edge and contour thresholds.
    pub analysis: AnalysisConfig,
    /// Face capture settings.
    pub capture: CaptureConfig,
}

impl LabConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_candidates(Family::Jpeg, &self.compression.jpeg_qualities, "jpeg_qualities")?;
        check_candidates(Family::Png, &self.compression.png_levels, "png_levels")?;
        if self.compression.scratch_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "compression.scratch_dir must not be empty".into(),
            ));
        }
        let a = &self.analysis;
        if a.canny_low < 0.0 || a.canny_high < 0.0 {
            return Err(ConfigError::Validation(
                "analysis.canny_low and canny_high must not be negative".into(),
            ));
        }
        if a.canny_low > a.canny_high {
            return Err(ConfigError::Validation(format!(
                "analysis.canny_low ({}) must not exceed canny_high ({})",
                a.canny_low, a.canny_high
            )));
        }
        if self.capture.max_images == 0 {
            return Err(ConfigError::Validation(
                "capture.max_images must be at least 1".into(),
            ));
        }
        if self.capture.max_attempts < self.capture.max_images {
            return Err(ConfigError::Validation(
                "capture.max_attempts must be at least max_images".into(),
            ));
        }
        Ok(())
    }
}

fn check_candidates(family: Family, values: &[u8], key: &str) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::Validation(format!(
            "compression.{} must not be empty",
            key
        )));
    }
    if let Some(bad) = values.iter().find(|&&v| !family.is_valid_parameter(v)) {
        return Err(ConfigError::Validation(format!(
            "compression.{} value {} is out of range 0-{}",
            key,
            bad,
            family.max_parameter()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    pub jpeg_qualities: Vec<u8>,
    pub png_levels: Vec<u8>,
    pub scratch_dir: String,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            jpeg_qualities: DEFAULT_JPEG_QUALITIES.to_vec(),
            png_levels: DEFAULT_PNG_LEVELS.to_vec(),
            scratch_dir: "scratch".to_string(),
        }
    }
}

impl CompressionConfig {
    pub fn candidates(&self, family: Family) -> &[u8] {
        match family {
            Family::Jpeg => &self.jpeg_qualities,
            Family::Png => &self.png_levels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiltersConfig {
    pub padding: u32,
    pub noise_radius: u32,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            padding: 20,
            noise_radius: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    pub chain_threshold: u8,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            chain_threshold: crate::analysis::DEFAULT_CHAIN_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub dataset_dir: String,
    /// SeetaFace frontal model file.
    pub model_path: String,
    pub max_images: u32,
    /// Frames to look at before giving up.
    pub max_attempts: u32,
    pub poll_delay_ms: u64,
    pub min_face_size: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dataset_dir: "dataset".to_string(),
            model_path: "seeta_fd_frontal_v1.0.bin".to_string(),
            max_images: 20,
            max_attempts: 200,
            poll_delay_ms: 100,
            min_face_size: 30,
        }
    }
}

impl CaptureConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            min_face_size: self.min_face_size,
            ..DetectorSettings::default()
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(LabConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<LabConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: LabConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config.
///
/// With no path, the stock defaults are used. A given path must exist; its
/// values are merged over the defaults, unknown keys are rejected, and the
/// result is validated.
pub fn load_config(path: Option<&Path>) -> Result<LabConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    let config = resolve_config(base, overlay)?;
    tracing::debug!(path = ?path, "loaded config");
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# dip-lab Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with `dip-lab --config config.toml <command>`.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Compression quality sweep
# ---------------------------------------------------------------------------
[compression]
# JPEG qualities to try, in order (0 = worst, 100 = best).
jpeg_qualities = [95, 75, 50, 25, 10]

# PNG zlib levels to try, in order (0 = stored, 9 = smallest).
png_levels = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]

# Directory for encoded artifacts, report.html and results.json.
# Artifacts land in Image_jpeg/ and Image_png/ below it.
scratch_dir = "scratch"

# ---------------------------------------------------------------------------
# Filters
# ---------------------------------------------------------------------------
[filters]
# Width of the black border added by `filter pad`.
padding = 20

# Half-size of the square zeroed around the spectrum centre by
# `filter denoise`.
noise_radius = 30

# ---------------------------------------------------------------------------
# Analysis
# ---------------------------------------------------------------------------
[analysis]
# Canny hysteresis thresholds.
canny_low = 50.0
canny_high = 150.0

# Pixels at or below this level count as shape when tracing chain codes.
chain_threshold = 127

# ---------------------------------------------------------------------------
# Face capture
# ---------------------------------------------------------------------------
[capture]
# One sub-folder per person is created here.
dataset_dir = "dataset"

# SeetaFace frontal face model used by the detector.
model_path = "seeta_fd_frontal_v1.0.bin"

# Face crops to collect per person.
max_images = 20

# Frames to inspect before giving up.
max_attempts = 200

# Pause between frames, in milliseconds.
poll_delay_ms = 100

# Smallest face, in pixels, the detector looks for.
min_face_size = 30
"##
}
