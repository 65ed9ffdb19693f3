//! Bitmap fonts rendered through a pluggable glyph rasterizer.
//!
//! Only the first 128 characters are rasterized. Each glyph becomes its own [`BaseTexture`]:
//! the rasterizer's coverage is expanded to white RGBA pixels with the coverage in alpha, so the
//! text program can tint them with the text color.

use ahash::{HashMap, HashMapExt};
use std::error::Error;
use std::rc::Rc;

use crate::decoded_image::DecodedImage;
use crate::error::FontError;
use crate::geometry::{Point, Size};
use crate::gpu::{ScaleMode, WrapMode};
use crate::texture::BaseTexture;

/// Number of character codes each font covers.
pub const GLYPH_COUNT: usize = 128;

/// A single glyph as produced by a [`GlyphRasterizer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterizedGlyph {
    pub width: u32,
    pub height: u32,
    /// One coverage byte per pixel, row by row.
    pub coverage: Vec<u8>,
    pub bearing_x: i32,
    pub bearing_y: i32,
    /// Horizontal advance in 1/64th of a pixel.
    pub advance_x: u32,
}

/// Opens font faces and turns characters into coverage bitmaps.
pub trait GlyphRasterizer {
    fn load_face(
        &mut self,
        source: &str,
        pixel_height: u32,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Rasterizes `character` from the loaded face. `None` when the face has no such glyph.
    fn rasterize(&mut self, character: char) -> Option<RasterizedGlyph>;
}

#[derive(Debug, Clone, Default)]
pub struct Glyph {
    /// `None` for glyphs without pixels, such as space.
    pub texture: Option<Rc<BaseTexture>>,
    pub size: Size<u32>,
    pub bearing: Point<i32>,
    /// Horizontal advance in 1/64th of a pixel.
    pub advance: u32,
}

impl Glyph {
    fn from_rasterized(glyph: RasterizedGlyph) -> Self {
        let size = Size::new(glyph.width, glyph.height);
        let texture = (!size.has_zero_area()).then(|| {
            let pixels = glyph
                .coverage
                .iter()
                .flat_map(|&coverage| [255, 255, 255, coverage])
                .collect();
            let image = DecodedImage::from_rgba(glyph.width, glyph.height, pixels)
                .unwrap_or_else(|_| DecodedImage::solid(glyph.width, glyph.height, [0; 4]));
            Rc::new(
                BaseTexture::new(image)
                    .with_scale_mode(ScaleMode::Linear)
                    .with_wrap_mode(WrapMode::ClampToEdge),
            )
        });

        Self {
            texture,
            size,
            bearing: Point::new(glyph.bearing_x, glyph.bearing_y),
            advance: glyph.advance_x,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.has_zero_area()
    }
}

/// A loaded font: one glyph per character code below [`GLYPH_COUNT`].
#[derive(Debug)]
pub struct Font {
    glyphs: Vec<Glyph>,
    descent: i32,
    pixel_height: u32,
}

impl Font {
    /// Glyph for `byte`. Codes outside the covered range fall back to glyph 0.
    pub fn glyph(&self, byte: u8) -> &Glyph {
        let index = if (byte as usize) < GLYPH_COUNT {
            byte as usize
        } else {
            0
        };
        &self.glyphs[index]
    }

    /// The largest bearing-y of any glyph. Text baselines sit this far below the text origin.
    pub fn descent(&self) -> i32 {
        self.descent
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    /// Width (sum of whole-pixel advances) and height (tallest glyph) of `text`.
    pub fn measure(&self, text: &[u8]) -> Size<u32> {
        text.iter().fold(Size::new(0, 0), |size, &byte| {
            let glyph = self.glyph(byte);
            Size::new(
                size.width + (glyph.advance >> 6),
                size.height.max(glyph.size.height),
            )
        })
    }
}

/// Fonts by name.
#[derive(Debug, Default)]
pub struct FontManager {
    fonts: HashMap<String, Rc<Font>>,
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
        }
    }

    /// Opens `source` with `rasterizer` and registers it under `name`.
    ///
    /// Fails without touching the manager when `name` is taken or the face cannot be opened.
    pub fn load_font(
        &mut self,
        rasterizer: &mut dyn GlyphRasterizer,
        source: &str,
        name: &str,
        pixel_height: u32,
    ) -> Result<Rc<Font>, FontError> {
        if self.fonts.contains_key(name) {
            return Err(FontError::AlreadyLoaded(name.to_string()));
        }

        rasterizer
            .load_face(source, pixel_height)
            .map_err(|source_error| FontError::Load {
                source_name: source.to_string(),
                source: source_error,
            })?;

        let glyphs: Vec<Glyph> = (0..GLYPH_COUNT as u8)
            .map(|byte| {
                rasterizer
                    .rasterize(char::from(byte))
                    .map(Glyph::from_rasterized)
                    .unwrap_or_default()
            })
            .collect();
        let descent = glyphs
            .iter()
            .map(|glyph| glyph.bearing.y)
            .max()
            .unwrap_or(0);

        tracing::debug!(
            "Loaded font `{name}` from {source} at {pixel_height}px, {} glyphs with pixels",
            glyphs.iter().filter(|glyph| !glyph.is_empty()).count()
        );

        let font = Rc::new(Font {
            glyphs,
            descent,
            pixel_height,
        });
        self.fonts.insert(name.to_string(), font.clone());
        Ok(font)
    }

    pub fn font(&self, name: &str) -> Option<Rc<Font>> {
        self.fonts.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fonts.contains_key(name)
    }

    /// Forgets `name`. Returns whether it was loaded.
    pub fn delete_font(&mut self, name: &str) -> bool {
        self.fonts.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn clear(&mut self) {
        self.fonts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Square glyphs whose size and bearing grow with the character code; space is empty.
    struct SquareRasterizer {
        fail: bool,
    }

    impl GlyphRasterizer for SquareRasterizer {
        fn load_face(
            &mut self,
            source: &str,
            _pixel_height: u32,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            if self.fail {
                Err(format!("cannot open {source}").into())
            } else {
                Ok(())
            }
        }

        fn rasterize(&mut self, character: char) -> Option<RasterizedGlyph> {
            match character {
                ' ' => Some(RasterizedGlyph {
                    advance_x: 4 << 6,
                    ..Default::default()
                }),
                'A'..='Z' => {
                    let side = character as u32 - 'A' as u32 + 1;
                    Some(RasterizedGlyph {
                        width: side,
                        height: side,
                        coverage: vec![200; (side * side) as usize],
                        bearing_x: 0,
                        bearing_y: side as i32,
                        advance_x: (side + 1) << 6,
                    })
                }
                _ => None,
            }
        }
    }

    fn load(manager: &mut FontManager, name: &str) -> Result<Rc<Font>, FontError> {
        manager.load_font(&mut SquareRasterizer { fail: false }, "square.ttf", name, 16)
    }

    #[test]
    fn descent_is_the_largest_bearing() {
        let mut manager = FontManager::new();
        let font = load(&mut manager, "square").unwrap();
        assert_eq!(font.descent(), 26);
    }

    #[test]
    fn glyph_coverage_becomes_white_rgba() {
        let mut manager = FontManager::new();
        let font = load(&mut manager, "square").unwrap();
        let glyph = font.glyph(b'B');
        let texture = glyph.texture.as_ref().unwrap();
        assert_eq!(&texture.image().pixels()[..4], &[255, 255, 255, 200]);
        assert_eq!(texture.wrap_mode(), WrapMode::ClampToEdge);
        assert!(font.glyph(b' ').texture.is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut manager = FontManager::new();
        load(&mut manager, "square").unwrap();
        assert!(matches!(
            load(&mut manager, "square"),
            Err(FontError::AlreadyLoaded(name)) if name == "square"
        ));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn failed_face_leaves_manager_unchanged() {
        let mut manager = FontManager::new();
        let result =
            manager.load_font(&mut SquareRasterizer { fail: true }, "broken.ttf", "broken", 16);
        assert!(matches!(result, Err(FontError::Load { .. })));
        assert!(manager.is_empty());
    }

    #[test]
    fn measure_sums_advances_and_takes_tallest_glyph() {
        let mut manager = FontManager::new();
        let font = load(&mut manager, "square").unwrap();
        // 'A' advances 2, ' ' advances 4, 'C' advances 4 and is 3 tall.
        assert_eq!(font.measure(b"A C"), Size::new(10, 3));
    }

    #[test]
    fn high_bytes_fall_back_to_glyph_zero() {
        let mut manager = FontManager::new();
        let font = load(&mut manager, "square").unwrap();
        assert!(font.glyph(200).is_empty());
        assert_eq!(font.glyph(200).advance, font.glyph(0).advance);
    }

    #[test]
    fn delete_and_clear_forget_fonts() {
        let mut manager = FontManager::new();
        load(&mut manager, "a").unwrap();
        load(&mut manager, "b").unwrap();
        assert!(manager.delete_font("a"));
        assert!(!manager.delete_font("a"));
        manager.clear();
        assert!(manager.font("b").is_none());
    }
}
