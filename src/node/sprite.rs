use super::*;

use crate::geometry::Size;
use crate::texture::Texture;

fn extract_sign(value: f32) -> f32 {
    if value == 0.0 {
        0.0
    } else {
        value.signum()
    }
}

#[derive(Debug)]
pub(crate) struct SpriteData {
    pub(crate) texture: Texture,
    pub(crate) tint: u32,
    anchor: Point<f32>,
    /// Size last requested through `set_size`; zero components mean "not requested".
    requested_size: Size<f32>,
    /// World-space quad corners, clockwise from the top-left.
    pub(crate) vertices: [Point<f32>; 4],
    pub(crate) texture_dirty: bool,
}

impl SpriteData {
    /// Recomputes the world-space quad from the texture frame, the anchor and `world`.
    pub(crate) fn calculate_vertices(&mut self, world: &Matrix3) {
        let frame = self.texture.frame();
        let w0 = frame.size.width * (1.0 - self.anchor.x);
        let w1 = frame.size.width * -self.anchor.x;
        let h0 = frame.size.height * (1.0 - self.anchor.y);
        let h1 = frame.size.height * -self.anchor.y;

        self.vertices = [
            Point::new(w1, h1),
            Point::new(w0, h1),
            Point::new(w0, h0),
            Point::new(w1, h0),
        ]
        .map(|corner| world.transform_point(corner));
        self.texture_dirty = false;
    }
}

impl NodeRef {
    /// A sprite drawing `texture` with its top-left corner at the node origin.
    pub fn sprite(texture: Texture) -> Self {
        Self::from_kind(NodeKind::Sprite(SpriteData {
            texture,
            tint: 0xFFFFFF,
            anchor: Point::default(),
            requested_size: Size::default(),
            vertices: [Point::default(); 4],
            texture_dirty: true,
        }))
    }

    fn with_sprite<R>(&self, f: impl FnOnce(&SpriteData) -> R) -> R {
        match &self.0.borrow().kind {
            NodeKind::Sprite(sprite) => f(sprite),
            kind => panic!("expected a sprite, found a {:?} node", kind.node_type()),
        }
    }

    fn with_sprite_mut<R>(&self, f: impl FnOnce(&mut SpriteData) -> R) -> R {
        match &mut self.0.borrow_mut().kind {
            NodeKind::Sprite(sprite) => f(sprite),
            kind => panic!("expected a sprite, found a {:?} node", kind.node_type()),
        }
    }

    pub fn texture(&self) -> Texture {
        self.with_sprite(|sprite| sprite.texture.clone())
    }

    /// Swaps the texture. A texture viewing the same frame of the same base is ignored. When
    /// an explicit size was set, the scale is adjusted so the sprite keeps that size.
    pub fn set_texture(&self, texture: Texture) {
        let current = self.texture();
        if Rc::ptr_eq(current.base(), texture.base()) && current.frame() == texture.frame() {
            return;
        }

        let texture_size = texture.size();
        let requested = self.with_sprite_mut(|sprite| {
            sprite.texture = texture;
            sprite.texture_dirty = true;
            sprite.requested_size
        });

        let scale = self.scale();
        let mut new_scale = scale;
        if requested.width != 0.0 {
            new_scale.x = extract_sign(scale.x) * requested.width / texture_size.width;
        }
        if requested.height != 0.0 {
            new_scale.y = extract_sign(scale.y) * requested.height / texture_size.height;
        }
        self.set_scale(new_scale);
    }

    /// Packed `0xRRGGBB` tint multiplied with the texture.
    pub fn tint(&self) -> u32 {
        self.with_sprite(|sprite| sprite.tint)
    }

    pub fn set_tint(&self, tint: u32) {
        self.with_sprite_mut(|sprite| sprite.tint = tint & 0xFFFFFF);
    }

    /// Normalized anchor: `(0, 0)` puts the texture's top-left corner at the node origin,
    /// `(0.5, 0.5)` centers it.
    pub fn anchor(&self) -> Point<f32> {
        self.with_sprite(|sprite| sprite.anchor)
    }

    pub fn set_anchor(&self, anchor: Point<f32>) {
        self.with_sprite_mut(|sprite| {
            sprite.anchor = anchor;
            sprite.texture_dirty = true;
        });
    }

    /// Drawn size: the texture size times the absolute scale.
    pub fn size(&self) -> Size<f32> {
        let scale = self.scale();
        let texture_size = self.with_sprite(|sprite| sprite.texture.size());
        Size::new(
            scale.x.abs() * texture_size.width,
            scale.y.abs() * texture_size.height,
        )
    }

    /// Scales the sprite to `size`, keeping the sign of the current scale.
    pub fn set_size(&self, size: Size<f32>) {
        let texture_size = self.with_sprite_mut(|sprite| {
            sprite.requested_size = size;
            sprite.texture.size()
        });

        let scale = self.scale();
        self.set_scale(Point::new(
            extract_sign(scale.x) * size.width / texture_size.width,
            extract_sign(scale.y) * size.height / texture_size.height,
        ));
    }

    pub fn set_width(&self, width: f32) {
        let height = self.size().height;
        self.set_size(Size::new(width, height));
    }

    pub fn set_height(&self, height: f32) {
        let width = self.size().width;
        self.set_size(Size::new(width, height));
    }

    pub fn is_texture_dirty(&self) -> bool {
        self.with_sprite(|sprite| sprite.texture_dirty)
    }

    /// The sprite's quad in world space, recomputed first if stale.
    pub fn vertices(&self) -> [Point<f32>; 4] {
        self.refresh_sprite_vertices();
        self.with_sprite(|sprite| sprite.vertices)
    }

    pub(crate) fn refresh_sprite_vertices(&self) {
        let mut node = self.0.borrow_mut();
        let world = node.world_transform;
        if let NodeKind::Sprite(sprite) = &mut node.kind {
            if sprite.texture_dirty {
                sprite.calculate_vertices(&world);
            }
        }
    }

    pub(super) fn sprite_bounds(&self) -> Rect<i32> {
        Rect::enclosing(self.vertices())
    }
}

#[cfg(test)]
mod tests {
    use crate::decoded_image::DecodedImage;
    use crate::geometry::{Point, Rect, Size};
    use crate::node::NodeRef;
    use crate::texture::Texture;

    fn texture(width: u32, height: u32) -> Texture {
        Texture::from_image(DecodedImage::solid(width, height, [255; 4])).unwrap()
    }

    #[test]
    fn new_sprite_is_dirty_and_white() {
        let sprite = NodeRef::sprite(texture(4, 4));
        assert!(sprite.is_texture_dirty());
        assert_eq!(sprite.tint(), 0xFFFFFF);
    }

    #[test]
    fn vertices_follow_anchor_and_world_transform() {
        let sprite = NodeRef::sprite(texture(10, 20));
        sprite.set_anchor(Point::new(0.5, 0.5));
        sprite.set_position(Point::new(100.0, 100.0));
        sprite.update_transform(true);

        assert_eq!(
            sprite.vertices(),
            [
                Point::new(95.0, 90.0),
                Point::new(105.0, 90.0),
                Point::new(105.0, 110.0),
                Point::new(95.0, 110.0),
            ]
        );
        assert!(!sprite.is_texture_dirty());
    }

    #[test]
    fn state_changes_mark_vertices_dirty() {
        let sprite = NodeRef::sprite(texture(4, 4));
        sprite.vertices();
        assert!(!sprite.is_texture_dirty());

        sprite.set_alpha(0.5);
        assert!(sprite.is_texture_dirty());
        sprite.vertices();

        sprite.set_alpha(0.5);
        assert!(!sprite.is_texture_dirty());
    }

    #[test]
    fn world_transform_change_marks_vertices_dirty() {
        let root = NodeRef::container();
        let sprite = NodeRef::sprite(texture(4, 4));
        root.add_child(&sprite);
        root.update_transform(true);
        sprite.vertices();

        root.set_position(Point::new(10.0, 0.0));
        root.update_transform(true);
        assert!(sprite.is_texture_dirty());
        assert_eq!(sprite.bounds(), Rect::new(10, 0, 4, 4));
    }

    #[test]
    fn set_size_keeps_scale_sign() {
        let sprite = NodeRef::sprite(texture(10, 10));
        sprite.set_scale(Point::new(-1.0, 1.0));
        sprite.set_size(Size::new(30.0, 5.0));

        assert_eq!(sprite.scale(), Point::new(-3.0, 0.5));
        assert_eq!(sprite.size(), Size::new(30.0, 5.0));
    }

    #[test]
    fn set_texture_preserves_requested_size() {
        let sprite = NodeRef::sprite(texture(10, 10));
        sprite.set_size(Size::new(40.0, 40.0));
        sprite.set_texture(texture(20, 80));

        assert_eq!(sprite.scale(), Point::new(2.0, 0.5));
        assert!(sprite.is_texture_dirty());
    }

    #[test]
    fn setting_the_same_texture_is_ignored() {
        let original = texture(8, 8);
        let sprite = NodeRef::sprite(original.clone());
        sprite.vertices();
        let revision = sprite.revision();

        sprite.set_texture(original);
        assert!(!sprite.is_texture_dirty());
        assert_eq!(sprite.revision(), revision);
    }
}
