//! Codec backend trait and shared error type.
//!
//! The [`CodecBackend`] trait defines the operations the sweep needs: encode
//! a grid at one setting, decode bytes back into a grid with a requested
//! channel layout, and losslessly re-optimise an encoded PNG.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), backed by the `image` crate.
//! Tests swap in backends that record calls or fail on chosen settings.

use super::grid::{Channels, PixelGrid};
use super::params::{EncodeParams, Family};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{family} parameter {value} is out of range 0-{max}")]
    ParameterOutOfRange { family: Family, value: u8, max: u8 },
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
    #[error("Decoding failed: {0}")]
    DecodeFailed(String),
    #[error("PNG optimisation failed: {0}")]
    OptimizeFailed(String),
}

/// Trait for codec backends.
pub trait CodecBackend {
    /// Encode a grid at one setting, returning the encoded bytes.
    fn encode(&self, grid: &PixelGrid, params: EncodeParams) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes of the given family into a grid with the given layout.
    fn decode(
        &self,
        bytes: &[u8],
        family: Family,
        channels: Channels,
    ) -> Result<PixelGrid, CodecError>;

    /// Losslessly re-compress an encoded PNG, returning the smaller stream.
    fn optimize_png(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
}
