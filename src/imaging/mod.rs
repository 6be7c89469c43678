//! Image I/O: pixel grids and the codec adapter.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode upload** | `image::load_from_memory` |
//! | **Encode JPEG** | `JpegEncoder::new_with_quality` |
//! | **Encode PNG** | `PngEncoder::new_with_quality` + `CompressionType::Level` |
//! | **Decode artifact** | `image::load_from_memory_with_format` |
//!
//! The module is split into:
//! - **Grid**: [`PixelGrid`] and its [`Shape`]
//! - **Parameters**: [`Family`], [`EncodeParams`] and the scratch naming scheme
//! - **Backend**: [`CodecBackend`] trait + [`RustCodec`]

pub mod backend;
mod grid;
mod params;
pub mod rust_backend;

pub use backend::{CodecBackend, CodecError};
pub use grid::{Channels, PixelGrid, Shape};
pub use params::{
    DEFAULT_JPEG_QUALITIES, DEFAULT_PNG_LEVELS, EncodeParams, Family, artifact_path,
};
pub use rust_backend::{LoadedImage, RustCodec, decode_upload, load_image};
