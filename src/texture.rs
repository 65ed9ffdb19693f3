//! Shared pixel sources and the rectangular views sprites draw from.

use ahash::{HashMap, HashMapExt};
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{ContextGuard, ContextId};
use crate::decoded_image::DecodedImage;
use crate::error::TextureError;
use crate::geometry::{Point, Rect, Size};
use crate::gpu::{GpuBackend, ScaleMode, TextureFormat, TextureId, WrapMode};

/// Decoded pixels shared by every [`Texture`] that views them.
///
/// GPU copies are created lazily, one per rendering context, the first time a backend asks for
/// them. They live until [`BaseTexture::release_gpu_textures`] is called for that backend.
#[derive(Debug)]
pub struct BaseTexture {
    image: DecodedImage,
    resolution: f32,
    scale_mode: ScaleMode,
    wrap_mode: Option<WrapMode>,
    gpu_textures: RefCell<HashMap<ContextId, TextureId>>,
}

impl BaseTexture {
    pub fn new(image: DecodedImage) -> Self {
        Self {
            image,
            resolution: 1.0,
            scale_mode: ScaleMode::default(),
            wrap_mode: None,
            gpu_textures: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_scale_mode(mut self, scale_mode: ScaleMode) -> Self {
        self.scale_mode = scale_mode;
        self
    }

    /// Pixels per logical unit. Non-positive values are ignored.
    pub fn with_resolution(mut self, resolution: f32) -> Self {
        if resolution > 0.0 {
            self.resolution = resolution;
        }
        self
    }

    /// Forces a wrap mode instead of deriving it from the image dimensions.
    pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
        self.wrap_mode = Some(wrap_mode);
        self
    }

    pub fn image(&self) -> &DecodedImage {
        &self.image
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.scale_mode
    }

    /// Logical size: pixel dimensions divided by the resolution.
    pub fn size(&self) -> Size<f32> {
        Size::new(
            self.image.width() as f32 / self.resolution,
            self.image.height() as f32 / self.resolution,
        )
    }

    pub fn pixel_size(&self) -> Size<u32> {
        Size::new(self.image.width(), self.image.height())
    }

    pub fn has_loaded(&self) -> bool {
        !self.image.is_empty()
    }

    pub fn is_power_of_two(&self) -> bool {
        self.image.width().is_power_of_two() && self.image.height().is_power_of_two()
    }

    /// The wrap mode used on upload: the forced one, else `Repeat` for power-of-two images.
    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap_mode.unwrap_or(if self.is_power_of_two() {
            WrapMode::Repeat
        } else {
            WrapMode::ClampToEdge
        })
    }

    /// The GPU texture for `backend`'s context, uploading the pixels on first use.
    pub fn gpu_texture<B: GpuBackend + ?Sized>(&self, backend: &mut B) -> TextureId {
        let context = backend.context_id();
        if let Some(texture) = self.gpu_texture_for(context) {
            return texture;
        }

        let _guard = ContextGuard::acquire(context);
        let texture = backend.create_texture(TextureFormat::Rgba8);
        backend.upload_texture(
            texture,
            self.image.pixels(),
            self.image.width(),
            self.image.height(),
        );
        backend.set_texture_filter(texture, self.scale_mode, self.scale_mode);
        backend.set_texture_wrap(texture, self.wrap_mode());

        self.gpu_textures.borrow_mut().insert(context, texture);
        texture
    }

    pub fn gpu_texture_for(&self, context: ContextId) -> Option<TextureId> {
        self.gpu_textures.borrow().get(&context).copied()
    }

    /// Destroys the GPU copy held for `backend`'s context, if any.
    pub fn release_gpu_textures<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        let context = backend.context_id();
        let removed = self.gpu_textures.borrow_mut().remove(&context);
        if let Some(texture) = removed {
            let _guard = ContextGuard::acquire(context);
            backend.destroy_texture(texture);
        }
    }
}

/// Texture coordinates of a frame's four corners, clockwise from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureUvs {
    pub p0: Point<f32>,
    pub p1: Point<f32>,
    pub p2: Point<f32>,
    pub p3: Point<f32>,
}

impl TextureUvs {
    fn from_frame(frame: &Rect<f32>, base: Size<f32>) -> Self {
        let left = frame.origin.x / base.width;
        let top = frame.origin.y / base.height;
        let right = frame.max_x() / base.width;
        let bottom = frame.max_y() / base.height;

        Self {
            p0: Point::new(left, top),
            p1: Point::new(right, top),
            p2: Point::new(right, bottom),
            p3: Point::new(left, bottom),
        }
    }

    pub fn corners(&self) -> [Point<f32>; 4] {
        [self.p0, self.p1, self.p2, self.p3]
    }
}

/// A rectangular view into a [`BaseTexture`].
#[derive(Debug, Clone)]
pub struct Texture {
    base: Rc<BaseTexture>,
    frame: Rect<f32>,
    orig: Rect<f32>,
    uvs: TextureUvs,
}

impl Texture {
    /// A view of `frame` within `base`, or of the whole base when `frame` is `None`.
    pub fn new(base: Rc<BaseTexture>, frame: Option<Rect<f32>>) -> Result<Self, TextureError> {
        let frame = frame.unwrap_or_else(|| Rect::from_origin_size(Point::default(), base.size()));
        let mut texture = Self {
            base,
            frame: Rect::default(),
            orig: Rect::default(),
            uvs: TextureUvs::default(),
        };
        texture.set_frame(frame)?;
        Ok(texture)
    }

    pub fn from_image(image: DecodedImage) -> Result<Self, TextureError> {
        Self::new(Rc::new(BaseTexture::new(image)), None)
    }

    /// A texture over an empty base. Not valid for rendering.
    pub fn empty() -> Self {
        Self {
            base: Rc::new(BaseTexture::new(DecodedImage::empty())),
            frame: Rect::default(),
            orig: Rect::default(),
            uvs: TextureUvs::default(),
        }
    }

    /// Re-frames the view. On error the previous frame is kept.
    pub fn set_frame(&mut self, frame: Rect<f32>) -> Result<(), TextureError> {
        if frame.size.has_zero_area() {
            return Err(TextureError::ZeroAreaFrame { frame });
        }

        let base_size = self.base.size();
        if frame.origin.x < 0.0
            || frame.origin.y < 0.0
            || frame.max_x() > base_size.width
            || frame.max_y() > base_size.height
        {
            return Err(TextureError::FrameOutOfBounds {
                frame,
                base: base_size,
            });
        }

        self.frame = frame;
        self.orig = frame;
        self.uvs = TextureUvs::from_frame(&frame, base_size);
        Ok(())
    }

    pub fn base(&self) -> &Rc<BaseTexture> {
        &self.base
    }

    pub fn frame(&self) -> Rect<f32> {
        self.frame
    }

    pub fn orig(&self) -> Rect<f32> {
        self.orig
    }

    pub fn size(&self) -> Size<f32> {
        self.frame.size
    }

    pub fn uvs(&self) -> &TextureUvs {
        &self.uvs
    }

    /// Whether the view can be drawn: the base has pixels and the frame covers some of them.
    pub fn is_valid(&self) -> bool {
        self.base.has_loaded() && !self.frame.size.has_zero_area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, RecordingBackend};

    fn assert_approximately_equal(a: Point<f32>, b: Point<f32>) {
        assert!(
            (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6,
            "{a:?} != {b:?}"
        );
    }

    fn base(width: u32, height: u32) -> Rc<BaseTexture> {
        Rc::new(BaseTexture::new(DecodedImage::solid(
            width,
            height,
            [255, 255, 255, 255],
        )))
    }

    #[test]
    fn full_frame_uvs_cover_unit_square() {
        let texture = Texture::new(base(64, 32), None).unwrap();
        let uvs = texture.uvs();
        assert_approximately_equal(uvs.p0, Point::new(0.0, 0.0));
        assert_approximately_equal(uvs.p1, Point::new(1.0, 0.0));
        assert_approximately_equal(uvs.p2, Point::new(1.0, 1.0));
        assert_approximately_equal(uvs.p3, Point::new(0.0, 1.0));
        assert_eq!(texture.size(), Size::new(64.0, 32.0));
    }

    #[test]
    fn sub_frame_uvs_are_relative_to_base() {
        let texture = Texture::new(base(100, 50), Some(Rect::new(25.0, 10.0, 50.0, 20.0))).unwrap();
        let uvs = texture.uvs();
        assert_approximately_equal(uvs.p0, Point::new(0.25, 0.2));
        assert_approximately_equal(uvs.p2, Point::new(0.75, 0.6));
        assert_eq!(texture.orig(), texture.frame());
    }

    #[test]
    fn zero_area_frame_is_rejected() {
        let error = Texture::new(base(8, 8), Some(Rect::new(0.0, 0.0, 0.0, 4.0))).unwrap_err();
        assert!(matches!(error, TextureError::ZeroAreaFrame { .. }));
    }

    #[test]
    fn out_of_bounds_frame_is_rejected_and_keeps_previous_frame() {
        let mut texture = Texture::new(base(8, 8), None).unwrap();
        let error = texture
            .set_frame(Rect::new(4.0, 4.0, 8.0, 8.0))
            .unwrap_err();
        assert!(matches!(error, TextureError::FrameOutOfBounds { .. }));
        assert_eq!(texture.frame(), Rect::new(0.0, 0.0, 8.0, 8.0));
    }

    #[test]
    fn resolution_scales_logical_size() {
        let base = BaseTexture::new(DecodedImage::solid(64, 32, [0; 4])).with_resolution(2.0);
        assert_eq!(base.size(), Size::new(32.0, 16.0));
        assert_eq!(base.pixel_size(), Size::new(64, 32));
    }

    #[test]
    fn gpu_texture_is_uploaded_once_per_context() {
        let base = base(16, 16);
        let mut backend = RecordingBackend::new();

        let first = base.gpu_texture(&mut backend);
        let second = base.gpu_texture(&mut backend);
        assert_eq!(first, second);

        let uploads = backend
            .calls()
            .iter()
            .filter(|call| matches!(call, GpuCall::UploadTexture { .. }))
            .count();
        assert_eq!(uploads, 1);
        assert_eq!(backend.texture_wrap(first), Some(WrapMode::Repeat));

        let mut other = RecordingBackend::new();
        base.gpu_texture(&mut other);
        assert!(base.gpu_texture_for(other.context_id()).is_some());
    }

    #[test]
    fn non_power_of_two_clamps_unless_forced() {
        let clamped = base(10, 16);
        assert_eq!(clamped.wrap_mode(), WrapMode::ClampToEdge);

        let forced = BaseTexture::new(DecodedImage::solid(10, 16, [0; 4]))
            .with_wrap_mode(WrapMode::Repeat);
        assert_eq!(forced.wrap_mode(), WrapMode::Repeat);
    }

    #[test]
    fn release_destroys_the_context_texture() {
        let base = base(4, 4);
        let mut backend = RecordingBackend::new();
        base.gpu_texture(&mut backend);
        assert_eq!(backend.live_texture_count(), 1);

        base.release_gpu_textures(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(base.gpu_texture_for(backend.context_id()), None);
    }

    #[test]
    fn empty_texture_is_not_valid() {
        assert!(!Texture::empty().is_valid());
        assert!(Texture::new(base(1, 1), None).unwrap().is_valid());
    }
}
