//! Rendering error types.

use thiserror::Error;
use voxatlas_core::AtlasError;

/// Errors that can occur in a render surface.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// The sample type and component count have no texture format.
    #[error("no texture format for {components} x {sample}")]
    UnsupportedFormat {
        components: u32,
        sample: &'static str,
    },

    /// The atlas does not fit in a single texture on this device.
    #[error("atlas of {width}x{height} exceeds the device limit of {max}")]
    TextureTooLarge { width: u32, height: u32, max: u32 },

    /// Uploaded data does not match the surface or region size.
    #[error("surface data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Mapping the read-back buffer failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for AtlasError {
    fn from(err: RenderError) -> Self {
        AtlasError::RenderError(err.to_string())
    }
}
