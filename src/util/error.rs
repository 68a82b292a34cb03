//! Error types for dpmatch.

use thiserror::Error;

/// Result alias for dpmatch operations.
pub type Result<T> = std::result::Result<T, DpmError>;

/// Errors that can occur while building pyramids, matching or suppressing.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DpmError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is shorter than one row of interleaved pixels.
    #[error("invalid stride {stride} for rows of {row_len} elements")]
    InvalidStride { row_len: usize, stride: usize },
    /// Backing buffer is shorter than the declared layout.
    #[error("buffer too small: needed {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A model component does not fit the pyramid it is matched against.
    #[error("component {component} does not fit the pyramid: {reason}")]
    PyramidLevelMismatch {
        component: usize,
        reason: &'static str,
    },
    /// The model violates a structural invariant.
    #[error("invalid model: {reason}")]
    InvalidModel { reason: String },
    /// A model source could not be read or decoded.
    #[error("failed to load model from {source_name}: {reason}")]
    LoadFailure { source_name: String, reason: String },
    /// Image decoding failed.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}
