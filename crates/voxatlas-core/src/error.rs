//! Error types for voxatlas.

use thiserror::Error;

use crate::axis::ViewAxis;

/// The main error type for voxatlas operations.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// Payload length does not match the expected texel count.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Slice index outside the valid depth of the requested axis.
    #[error("slice {index} out of range for {axis} axis (depth {depth})")]
    OutOfRange {
        axis: ViewAxis,
        index: u32,
        depth: u32,
    },

    /// No atlas has been loaded yet. Recoverable: retry once loading completes.
    #[error("no atlas available - load a volume first")]
    NoAtlasAvailable,

    /// One of the voxel-count dimensions is zero.
    #[error("invalid voxel count {0:?}: every dimension must be non-zero")]
    InvalidVoxelCount([u32; 3]),

    /// Component count outside `1..=4`.
    #[error("invalid component count {0}: expected 1 to 4")]
    InvalidComponents(u32),

    /// No render consumer is registered at the given index.
    #[error("render consumer {0} not registered")]
    UnknownConsumer(usize),

    /// A render backend operation failed.
    #[error("render error: {0}")]
    RenderError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for voxatlas operations.
pub type Result<T> = std::result::Result<T, AtlasError>;
