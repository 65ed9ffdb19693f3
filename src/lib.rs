pub use wgpu;

pub mod batch;
pub mod color;
pub mod context;
pub mod decoded_image;
pub mod error;
pub mod font;
pub mod geometry;
pub mod gpu;
pub mod matrix;
pub mod node;
pub mod render_target;
pub mod renderer;
pub mod shaders;
pub mod texture;
pub mod trig;

pub use batch::{BatchCounts, RendererKind, BATCH_SIZE};
pub use color::{ColorRGB, ColorRGBA};
pub use decoded_image::DecodedImage;
pub use error::{BackendError, FontError, ImageLoadError, TextureError, TransformError};
pub use font::{FontManager, GlyphRasterizer, RasterizedGlyph};
pub use geometry::{Point, Rect, Size};
pub use gpu::{GpuBackend, RecordingBackend, WgpuBackend};
pub use matrix::Matrix3;
pub use node::{NodeRef, NodeType};
pub use render_target::RenderTarget;
pub use renderer::{Renderer, RendererSettings};
pub use texture::{BaseTexture, Texture};
