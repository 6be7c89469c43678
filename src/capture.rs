//! Face-dataset capture.
//!
//! A [`CaptureSession`] pulls frames from a [`FrameSource`], runs a
//! [`FaceDetector`] on each, and saves the first face of every frame as
//! `<dataset>/<name>/<name>_<index>.jpg` until enough crops are collected.
//!
//! The session is an iterator of [`CaptureEvent`]s so callers can report
//! progress as it happens:
//!
//! ```text
//! Saved 0 → NoFace → Saved 1 → ... → Saved max_images-1   (done)
//! Saved 0 → FrameUnavailable                               (source ran dry)
//! ```
//!
//! [`DirectoryFrames`] replays image files from a directory in name order and
//! stands in for a camera. [`RustfaceDetector`] wraps the SeetaFace cascade
//! from `rustface`; it needs a model file on disk.

use image::{GrayImage, RgbImage, imageops};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No frames available from {0}")]
    DeviceUnavailable(PathBuf),
    #[error("'{0}' already exists in the dataset; choose another name")]
    PersonExists(String),
    #[error("Invalid person name '{0}': must be non-empty and contain no path separators")]
    InvalidName(String),
    #[error("Failed to load face model: {0}")]
    Model(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not save face crop: {0}")]
    Image(#[from] image::ImageError),
}

// =========================================================================
// Frames
// =========================================================================

/// Source of video frames.
pub trait FrameSource {
    /// Next frame, or `None` once the source fails or runs out.
    fn next_frame(&mut self) -> Option<RgbImage>;
}

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Replays the image files of a directory, sorted by file name.
#[derive(Debug)]
pub struct DirectoryFrames {
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectoryFrames {
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        if !dir.is_dir() {
            return Err(CaptureError::DeviceUnavailable(dir.to_path_buf()));
        }
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(CaptureError::DeviceUnavailable(dir.to_path_buf()));
        }
        tracing::debug!(dir = %dir.display(), frames = files.len(), "opened frame directory");
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectoryFrames {
    fn next_frame(&mut self) -> Option<RgbImage> {
        let path = self.files.get(self.next)?;
        self.next += 1;
        match image::open(path) {
            Ok(img) => Some(img.into_rgb8()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read frame");
                None
            }
        }
    }
}

// =========================================================================
// Faces
// =========================================================================

/// Axis-aligned face box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    /// Box from detector coordinates, which may start left of or above the
    /// frame. The part outside is cut off so the far edges stay where the
    /// detector put them.
    pub fn from_detection(x: i32, y: i32, width: u32, height: u32) -> FaceBox {
        let clip_x = x.min(0).unsigned_abs();
        let clip_y = y.min(0).unsigned_abs();
        FaceBox {
            x: x.max(0).unsigned_abs(),
            y: y.max(0).unsigned_abs(),
            width: width.saturating_sub(clip_x),
            height: height.saturating_sub(clip_y),
        }
    }

    /// The box restricted to a `width × height` frame, or `None` if nothing
    /// of it is inside.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<FaceBox> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        (w > 0 && h > 0).then_some(FaceBox {
            x: self.x,
            y: self.y,
            width: w,
            height: h,
        })
    }
}

pub trait FaceDetector {
    /// Faces in a grayscale frame, most confident first.
    fn detect(&mut self, frame: &GrayImage) -> Vec<FaceBox>;
}

/// Detector tuning for [`RustfaceDetector`].
#[derive(Debug, Clone, Copy)]
pub struct DetectorSettings {
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub window_step: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_face_size: 30,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            window_step: 4,
        }
    }
}

/// SeetaFace cascade detector.
pub struct RustfaceDetector {
    inner: Box<dyn rustface::Detector>,
}

impl RustfaceDetector {
    pub fn load(model_path: &Path, settings: DetectorSettings) -> Result<Self, CaptureError> {
        let path = model_path
            .to_str()
            .ok_or_else(|| CaptureError::Model(format!("{} is not UTF-8", model_path.display())))?;
        let mut inner = rustface::create_detector(path)
            .map_err(|e| CaptureError::Model(format!("{}: {}", model_path.display(), e)))?;
        inner.set_min_face_size(settings.min_face_size);
        inner.set_score_thresh(settings.score_threshold);
        inner.set_pyramid_scale_factor(settings.pyramid_scale_factor);
        inner.set_slide_window_step(settings.window_step, settings.window_step);
        Ok(Self { inner })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&mut self, frame: &GrayImage) -> Vec<FaceBox> {
        let data = rustface::ImageData::new(frame.as_raw(), frame.width(), frame.height());
        let mut faces = self.inner.detect(&data);
        faces.sort_by(|a, b| b.score().total_cmp(&a.score()));
        faces
            .iter()
            .map(|f| {
                let b = f.bbox();
                FaceBox::from_detection(b.x(), b.y(), b.width(), b.height())
            })
            .filter(|face| face.width > 0 && face.height > 0)
            .collect()
    }
}

// =========================================================================
// Session
// =========================================================================

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub dataset_dir: PathBuf,
    pub max_images: u32,
    pub max_attempts: u32,
    pub poll_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A face crop was written.
    Saved {
        index: u32,
        path: PathBuf,
        face: FaceBox,
    },
    /// The frame had no face.
    NoFace,
    /// The source stopped delivering frames; the session ends.
    FrameUnavailable,
}

fn validate_name(name: &str) -> Result<(), CaptureError> {
    let invalid = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if invalid {
        return Err(CaptureError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub struct CaptureSession<S, D> {
    source: S,
    detector: D,
    name: String,
    person_dir: PathBuf,
    settings: CaptureSettings,
    saved: u32,
    attempts: u32,
    finished: bool,
}

impl<S: FrameSource, D: FaceDetector> CaptureSession<S, D> {
    /// Validate the name and create its dataset folder.
    ///
    /// Fails if the folder already exists, so an earlier capture is never
    /// mixed with a new one.
    pub fn start(
        name: &str,
        settings: CaptureSettings,
        source: S,
        detector: D,
    ) -> Result<Self, CaptureError> {
        validate_name(name)?;
        fs::create_dir_all(&settings.dataset_dir)?;
        let person_dir = settings.dataset_dir.join(name);
        if person_dir.exists() {
            return Err(CaptureError::PersonExists(name.to_string()));
        }
        fs::create_dir(&person_dir)?;
        tracing::info!(name, dir = %person_dir.display(), "started capture");
        Ok(Self {
            source,
            detector,
            name: name.to_string(),
            person_dir,
            settings,
            saved: 0,
            attempts: 0,
            finished: false,
        })
    }

    pub fn person_dir(&self) -> &Path {
        &self.person_dir
    }

    pub fn saved(&self) -> u32 {
        self.saved
    }

    pub fn max_images(&self) -> u32 {
        self.settings.max_images
    }

    fn save_face(&mut self, frame: &RgbImage, face: FaceBox) -> Result<CaptureEvent, CaptureError> {
        let crop = imageops::crop_imm(frame, face.x, face.y, face.width, face.height).to_image();
        let index = self.saved;
        let path = self.person_dir.join(format!("{}_{}.jpg", self.name, index));
        crop.save(&path)?;
        self.saved += 1;
        tracing::debug!(index, path = %path.display(), "saved face");
        Ok(CaptureEvent::Saved { index, path, face })
    }
}

impl<S: FrameSource, D: FaceDetector> Iterator for CaptureSession<S, D> {
    type Item = Result<CaptureEvent, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished
            || self.saved >= self.settings.max_images
            || self.attempts >= self.settings.max_attempts
        {
            return None;
        }
        if self.attempts > 0 && !self.settings.poll_delay.is_zero() {
            std::thread::sleep(self.settings.poll_delay);
        }
        self.attempts += 1;

        let Some(frame) = self.source.next_frame() else {
            self.finished = true;
            tracing::warn!(saved = self.saved, "frame source stopped");
            return Some(Ok(CaptureEvent::FrameUnavailable));
        };

        let gray = imageops::grayscale(&frame);
        let first = self
            .detector
            .detect(&gray)
            .into_iter()
            .find_map(|f| f.clamp_to(frame.width(), frame.height()));
        let Some(face) = first else {
            return Some(Ok(CaptureEvent::NoFace));
        };

        let result = self.save_face(&frame, face);
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}
