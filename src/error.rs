use thiserror::Error;

use crate::geometry::{Rect, Size};
use crate::gpu::ShaderKind;

/// Degenerate transforms that cannot be inverted.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum TransformError {
    #[error("transform is not invertible (determinant {determinant})")]
    Singular { determinant: f32 },
}

/// Invalid texture frames.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum TextureError {
    #[error("texture frame {frame:?} has zero area")]
    ZeroAreaFrame { frame: Rect<f32> },
    #[error("texture frame {frame:?} exceeds base texture size {base:?}")]
    FrameOutOfBounds { frame: Rect<f32>, base: Size<f32> },
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("pixel buffer holds {actual} bytes but {width}x{height} RGBA needs {expected}")]
    PixelLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum FontError {
    #[error("font `{0}` is already loaded")]
    AlreadyLoaded(String),
    #[error("failed to open font face `{source_name}`")]
    Load {
        source_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to build the {kind:?} program: {message}")]
    ProgramCreation { kind: ShaderKind, message: String },
    #[error("no compatible GPU adapter is available")]
    AdapterUnavailable,
    #[error("failed to request a GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to create a surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to acquire the next surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("the surface supports no texture format on this adapter")]
    IncompatibleSurface,
    #[error("pixel readback is only available on offscreen backends")]
    NotOffscreen,
    #[error("failed to read back pixels: {0}")]
    Readback(String),
}
