//! The GPU collaborator seen by the scene graph and the batch renderers.
//!
//! [`GpuBackend`] mirrors a classic bind-and-draw API: buffers and textures are created and
//! uploaded through opaque ids, a program is bound together with a projection and a vertex
//! layout, and indexed draws consume whatever is bound. [`WgpuBackend`] implements it on top of
//! wgpu; [`RecordingBackend`] keeps everything on the CPU and records the calls.

use smallvec::SmallVec;
use std::fmt;

use crate::context::ContextId;
use crate::error::BackendError;
use crate::matrix::Matrix3;

pub mod recording;
pub mod wgpu_backend;

pub use recording::{DrawCall, GpuCall, RecordingBackend};
pub use wgpu_backend::WgpuBackend;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

resource_id!(
    /// A backend buffer handle.
    BufferId
);
resource_id!(
    /// A backend texture handle.
    TextureId
);
resource_id!(
    /// A backend program handle.
    ProgramId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// How often a buffer's contents are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Rgba8Srgb,
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleMode {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// The built-in programs. Each batch renderer uses exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Sprite,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// `src * src_alpha + dst * (1 - src_alpha)`.
    #[default]
    Normal,
    /// `src + dst * (1 - src_alpha)` for premultiplied sources.
    Premultiplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
    /// Four bytes normalized to `[0.0, 1.0]`.
    Unorm8x4,
}

impl AttributeFormat {
    pub fn size(&self) -> u32 {
        match self {
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
            AttributeFormat::Unorm8x4 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub offset: u32,
}

/// Interleaved vertex layout with a fixed stride.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: SmallVec<[VertexAttribute; 4]>,
}

impl VertexLayout {
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            attributes: SmallVec::new(),
        }
    }

    pub fn with_attribute(mut self, location: u32, format: AttributeFormat, offset: u32) -> Self {
        self.attributes.push(VertexAttribute {
            location,
            format,
            offset,
        });
        self
    }
}

/// The GPU resources and state the renderer drives.
///
/// The trait is object safe. All methods are expected to be called on the thread that owns
/// the backend, with its context current.
pub trait GpuBackend {
    fn context_id(&self) -> ContextId;

    /// Called before anything is recorded for a frame.
    fn begin_frame(&mut self) {}

    /// Called after the last draw of a frame. Backends that defer work submit it here.
    fn end_frame(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// The default output changed size. Surface-backed backends reconfigure here.
    fn resize_output(&mut self, _width: u32, _height: u32) {}

    fn create_buffer(&mut self, kind: BufferKind, usage: BufferUsage) -> BufferId;
    /// Replaces the whole contents of `buffer`.
    fn upload_buffer(&mut self, buffer: BufferId, bytes: &[u8]);
    /// Overwrites `bytes.len()` bytes starting at `offset`, growing the buffer if needed.
    fn upload_buffer_sub(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]);
    fn bind_buffer(&mut self, buffer: BufferId);
    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_texture(&mut self, format: TextureFormat) -> TextureId;
    fn bind_texture(&mut self, texture: TextureId, unit: Option<u32>);
    /// Uploads tightly packed RGBA8 pixels, (re)allocating the texture at `width` x `height`.
    fn upload_texture(&mut self, texture: TextureId, pixels: &[u8], width: u32, height: u32);
    fn set_texture_filter(&mut self, texture: TextureId, min: ScaleMode, mag: ScaleMode);
    fn set_texture_wrap(&mut self, texture: TextureId, wrap: WrapMode);
    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)>;
    fn destroy_texture(&mut self, texture: TextureId);
    /// Allocates `texture` as a renderable surface of the given size. Contents are undefined.
    fn resize_render_texture(&mut self, texture: TextureId, width: u32, height: u32);

    fn create_program(&mut self, kind: ShaderKind) -> Result<ProgramId, BackendError>;
    fn use_program(&mut self, program: ProgramId);
    fn set_projection(&mut self, program: ProgramId, projection: &Matrix3);
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;
    fn set_vertex_layout(&mut self, layout: &VertexLayout);

    /// `None` targets the backend's default output.
    fn set_render_target(&mut self, target: Option<TextureId>);
    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);
    fn set_blend(&mut self, blend: BlendMode);
    fn clear(&mut self, color: [f32; 4]);
    /// Draws `index_count` `u16` indices starting at `first_index` from the bound index buffer.
    fn draw_indexed(&mut self, index_count: u32, first_index: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_builder_keeps_attribute_order() {
        let layout = VertexLayout::new(20)
            .with_attribute(0, AttributeFormat::Float32x2, 0)
            .with_attribute(2, AttributeFormat::Unorm8x4, 16);

        assert_eq!(layout.stride, 20);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[1].location, 2);
        assert_eq!(layout.attributes[1].format.size(), 4);
    }

    #[test]
    fn resource_ids_display_their_raw_value() {
        assert_eq!(TextureId(42).to_string(), "42");
        assert_eq!(BufferId(7).to_string(), "7");
    }
}
