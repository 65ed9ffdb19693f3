use ahash::{HashSet, HashSetExt};

use super::*;

use crate::color::ColorRGB;
use crate::font::FontManager;
use crate::geometry::Size;
use crate::texture::BaseTexture;

/// Floats per glyph quad: four corners, two coordinates each.
pub(crate) const FLOATS_PER_GLYPH: usize = 8;

#[derive(Debug)]
pub(crate) struct TextData {
    content: String,
    font_name: String,
    pub(crate) color: ColorRGB,
    /// World-space glyph quads, [`FLOATS_PER_GLYPH`] floats per byte of `content`.
    pub(crate) vertex_data: Vec<f32>,
    /// Texture of each glyph, parallel to the bytes of `content`.
    pub(crate) glyph_textures: Vec<Option<Rc<BaseTexture>>>,
    /// Glyphs with nothing to draw.
    pub(crate) excluded: HashSet<usize>,
    pub(crate) dirty: bool,
}

impl TextData {
    pub(crate) fn is_excluded(&self, glyph: usize) -> bool {
        self.excluded.contains(&glyph)
    }

    pub(crate) fn glyph_count(&self) -> usize {
        self.glyph_textures.len()
    }

    pub(crate) fn visible_glyph_count(&self) -> usize {
        self.glyph_count() - self.excluded.len()
    }

    /// Indices of the glyphs that are drawn, in order.
    pub(crate) fn visible_glyphs(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.glyph_count()).filter(|glyph| !self.is_excluded(*glyph))
    }

    pub(crate) fn glyph_corners(&self, glyph: usize) -> [Point<f32>; 4] {
        let quad = &self.vertex_data[glyph * FLOATS_PER_GLYPH..(glyph + 1) * FLOATS_PER_GLYPH];
        [
            Point::new(quad[0], quad[1]),
            Point::new(quad[2], quad[3]),
            Point::new(quad[4], quad[5]),
            Point::new(quad[6], quad[7]),
        ]
    }

    fn clear_layout(&mut self) {
        self.vertex_data.clear();
        self.glyph_textures.clear();
        self.excluded.clear();
    }

    /// Lays the glyphs out along the baseline and maps them into world space.
    ///
    /// Returns false, leaving the text dirty and empty, when the font is not loaded.
    pub(crate) fn calculate_vertices(&mut self, world: &Matrix3, fonts: &FontManager) -> bool {
        let Some(font) = fonts.font(&self.font_name) else {
            tracing::warn!("Font `{}` is not loaded, text is not drawn", self.font_name);
            self.clear_layout();
            return false;
        };

        self.clear_layout();
        self.vertex_data.resize(self.content.len() * FLOATS_PER_GLYPH, 0.0);

        let mut cursor_x = 0.0;
        for (index, byte) in self.content.bytes().enumerate() {
            let glyph = font.glyph(byte);

            match &glyph.texture {
                Some(texture) if !glyph.is_empty() => {
                    let w1 = cursor_x + glyph.bearing.x as f32;
                    let w0 = w1 + glyph.size.width as f32;
                    let h1 = (font.descent() - glyph.bearing.y) as f32;
                    let h0 = h1 + glyph.size.height as f32;

                    let corners = [
                        Point::new(w1, h1),
                        Point::new(w0, h1),
                        Point::new(w0, h0),
                        Point::new(w1, h0),
                    ];
                    let quad = &mut self.vertex_data
                        [index * FLOATS_PER_GLYPH..(index + 1) * FLOATS_PER_GLYPH];
                    for (slot, corner) in quad.chunks_exact_mut(2).zip(corners) {
                        let corner = world.transform_point(corner);
                        slot[0] = corner.x;
                        slot[1] = corner.y;
                    }
                    self.glyph_textures.push(Some(texture.clone()));
                }
                _ => {
                    self.excluded.insert(index);
                    self.glyph_textures.push(None);
                }
            }

            cursor_x += (glyph.advance >> 6) as f32;
        }

        self.dirty = false;
        true
    }
}

impl NodeRef {
    /// A single line of text drawn with the font registered as `font_name`. Only the first 128
    /// character codes are covered; other bytes draw glyph 0.
    pub fn text(content: &str, font_name: &str) -> Self {
        Self::from_kind(NodeKind::Text(TextData {
            content: content.to_string(),
            font_name: font_name.to_string(),
            color: ColorRGB::BLACK,
            vertex_data: Vec::new(),
            glyph_textures: Vec::new(),
            excluded: HashSet::new(),
            dirty: true,
        }))
    }

    fn with_text<R>(&self, f: impl FnOnce(&TextData) -> R) -> R {
        match &self.0.borrow().kind {
            NodeKind::Text(text) => f(text),
            kind => panic!("expected a text, found a {:?} node", kind.node_type()),
        }
    }

    fn with_text_mut<R>(&self, f: impl FnOnce(&mut TextData) -> R) -> R {
        match &mut self.0.borrow_mut().kind {
            NodeKind::Text(text) => f(text),
            kind => panic!("expected a text, found a {:?} node", kind.node_type()),
        }
    }

    pub fn content(&self) -> String {
        self.with_text(|text| text.content.clone())
    }

    pub fn set_content(&self, content: &str) {
        self.with_text_mut(|text| {
            if text.content != content {
                text.content = content.to_string();
                text.dirty = true;
            }
        });
    }

    pub fn font_name(&self) -> String {
        self.with_text(|text| text.font_name.clone())
    }

    pub fn set_font_name(&self, font_name: &str) {
        self.with_text_mut(|text| {
            if text.font_name != font_name {
                text.font_name = font_name.to_string();
                text.dirty = true;
            }
        });
    }

    pub fn color(&self) -> ColorRGB {
        self.with_text(|text| text.color)
    }

    pub fn set_color(&self, color: ColorRGB) {
        self.with_text_mut(|text| text.color = color);
    }

    pub fn is_text_dirty(&self) -> bool {
        self.with_text(|text| text.dirty)
    }

    /// Width and height of the text in `fonts`, zero when its font is not loaded.
    pub fn text_size(&self, fonts: &FontManager) -> Size<u32> {
        self.with_text(|text| {
            fonts
                .font(&text.font_name)
                .map(|font| font.measure(text.content.as_bytes()))
                .unwrap_or_default()
        })
    }

    /// Re-lays out the glyphs if dirty. Returns whether the text has a valid layout.
    pub fn update_glyphs(&self, fonts: &FontManager) -> bool {
        let mut node = self.0.borrow_mut();
        let world = node.world_transform;
        match &mut node.kind {
            NodeKind::Text(text) if text.dirty => text.calculate_vertices(&world, fonts),
            NodeKind::Text(_) => true,
            kind => panic!("expected a text, found a {:?} node", kind.node_type()),
        }
    }

    /// World-space quads of the drawn glyphs, four corners each.
    pub fn glyph_quads(&self) -> Vec<[Point<f32>; 4]> {
        self.with_text(|text| {
            text.visible_glyphs()
                .map(|glyph| text.glyph_corners(glyph))
                .collect()
        })
    }

    /// Number of glyphs that produce a quad in the current layout.
    pub fn visible_glyph_count(&self) -> usize {
        self.with_text(TextData::visible_glyph_count)
    }

    /// Indices of the bytes that produce no quad.
    pub fn excluded_glyphs(&self) -> Vec<usize> {
        let mut excluded: Vec<usize> =
            self.with_text(|text| text.excluded.iter().copied().collect());
        excluded.sort_unstable();
        excluded
    }

    pub(super) fn text_bounds(&self) -> Rect<i32> {
        Rect::enclosing(self.glyph_quads().into_iter().flatten())
    }
}
