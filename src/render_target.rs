//! Where a frame is drawn: the backend's default output or an offscreen texture.

use crate::color::ColorRGBA;
use crate::context::ContextGuard;
use crate::geometry::{Point, Rect, Size};
use crate::gpu::{GpuBackend, ScaleMode, TextureFormat, TextureId};
use crate::matrix::Matrix3;

/// Side of the backing texture a nested target starts with.
const INITIAL_TEXTURE_SIDE: u32 = 100;

#[derive(Debug)]
pub struct RenderTarget {
    /// Drawn area in logical units.
    frame: Rect<f32>,
    resolution: f32,
    projection: Matrix3,
    /// Applied after the projection on activation.
    transform: Option<Matrix3>,
    scale_mode: ScaleMode,
    root: bool,
    texture: Option<TextureId>,
}

impl RenderTarget {
    /// The backend's default output.
    pub fn root(resolution: f32) -> Self {
        Self::with_texture(None, resolution, true)
    }

    /// An offscreen target backed by its own texture.
    pub fn offscreen<B: GpuBackend + ?Sized>(backend: &mut B, resolution: f32) -> Self {
        let _guard = ContextGuard::acquire(backend.context_id());
        let texture = backend.create_texture(TextureFormat::Rgba8);
        backend.resize_render_texture(texture, INITIAL_TEXTURE_SIDE, INITIAL_TEXTURE_SIDE);
        Self::with_texture(Some(texture), resolution, false)
    }

    fn with_texture(texture: Option<TextureId>, resolution: f32, root: bool) -> Self {
        let frame = Rect::new(0.0, 0.0, 1.0, 1.0);
        Self {
            frame,
            resolution,
            projection: Matrix3::to_clip_space(frame.size, frame.origin, root),
            transform: None,
            scale_mode: ScaleMode::default(),
            root,
            texture,
        }
    }

    pub fn frame(&self) -> Rect<f32> {
        self.frame
    }

    pub fn size(&self) -> Size<f32> {
        self.frame.size
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn projection(&self) -> Matrix3 {
        self.projection
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.scale_mode
    }

    pub fn set_scale_mode(&mut self, scale_mode: ScaleMode) {
        self.scale_mode = scale_mode;
    }

    pub fn transform(&self) -> Option<Matrix3> {
        self.transform
    }

    /// Extra transform applied after the projection, e.g. to flip or offset the output.
    pub fn set_transform(&mut self, transform: Option<Matrix3>) {
        self.transform = transform;
    }

    /// Makes this the target of subsequent draws and installs its projection and viewport.
    pub fn activate<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        let _guard = ContextGuard::acquire(backend.context_id());
        backend.set_render_target(self.texture);

        self.calculate_projection(self.frame, None);
        if let Some(transform) = self.transform {
            self.projection = self.projection * transform;
        }

        backend.set_viewport(
            self.frame.origin.x as u32,
            self.frame.origin.y as u32,
            (self.frame.size.width * self.resolution) as u32,
            (self.frame.size.height * self.resolution) as u32,
        );
    }

    /// Projects `destination` onto clip space, reading from `source_origin` (the destination's
    /// own origin when `None`).
    pub fn calculate_projection(
        &mut self,
        destination: Rect<f32>,
        source_origin: Option<Point<f32>>,
    ) {
        let source_origin = source_origin.unwrap_or(destination.origin);
        self.projection = Matrix3::to_clip_space(destination.size, source_origin, self.root);
    }

    /// Resizes the drawn area to `size` logical units. A nested target's texture is resized
    /// to `size * resolution` pixels.
    pub fn resize<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, size: Size<f32>) {
        if self.frame.size == size {
            return;
        }

        self.frame.size = size;
        if let Some(texture) = self.texture {
            let _guard = ContextGuard::acquire(backend.context_id());
            backend.resize_render_texture(
                texture,
                (size.width * self.resolution) as u32,
                (size.height * self.resolution) as u32,
            );
        }
        self.calculate_projection(self.frame, None);
    }

    /// Clears whatever target is current.
    pub fn clear<B: GpuBackend + ?Sized>(&self, backend: &mut B, color: ColorRGBA) {
        let _guard = ContextGuard::acquire(backend.context_id());
        backend.clear(color.to_array());
    }

    /// Releases the backing texture of a nested target.
    pub fn destroy<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(texture) = self.texture.take() {
            let _guard = ContextGuard::acquire(backend.context_id());
            backend.destroy_texture(texture);
        }
    }
}
