//! Error types for pigment

use thiserror::Error;

/// Result type for pigment operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pigment operations
///
/// The conversion cache is transparent to failures: whatever the color
/// space's transform constructor reports is handed back unchanged.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to parse ICC profile
    #[error("Profile parse error: {0}")]
    ProfileParse(String),

    /// Transform creation or execution failed inside the color engine
    #[error("Transform error: {0}")]
    Transform(String),

    /// The pair of color spaces cannot be converted directly
    #[error("Unsupported conversion: {src} -> {dst}")]
    UnsupportedConversion { src: String, dst: String },

    /// The color space has no matching optimized pixel layout
    #[error("Unsupported pixel layout: {0}")]
    UnsupportedLayout(String),

    /// Scaler requested with an unusable channel count
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    /// Buffer size mismatch
    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}
