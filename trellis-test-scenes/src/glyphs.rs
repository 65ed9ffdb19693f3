use std::error::Error;

use trellis::{FontError, FontManager, GlyphRasterizer, RasterizedGlyph};

/// Name the block font is registered under by [`load_block_font`].
pub const BLOCK_FONT: &str = "block";

/// A rasterizer without font files: every printable ASCII character is a solid square of the
/// requested pixel height, advanced by one extra pixel. Space has no pixels.
#[derive(Debug, Default)]
pub struct BlockRasterizer {
    pixel_height: u32,
}

impl GlyphRasterizer for BlockRasterizer {
    fn load_face(
        &mut self,
        _source: &str,
        pixel_height: u32,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if pixel_height == 0 {
            return Err("block glyphs need a non-zero pixel height".into());
        }
        self.pixel_height = pixel_height;
        Ok(())
    }

    fn rasterize(&mut self, character: char) -> Option<RasterizedGlyph> {
        let side = self.pixel_height;
        let advance_x = (side + 1) << 6;
        if character == ' ' {
            return Some(RasterizedGlyph {
                advance_x,
                ..Default::default()
            });
        }

        character.is_ascii_graphic().then(|| RasterizedGlyph {
            width: side,
            height: side,
            coverage: vec![255; (side * side) as usize],
            bearing_x: 0,
            bearing_y: side as i32,
            advance_x,
        })
    }
}

/// Registers an 8 pixel [`BlockRasterizer`] font as [`BLOCK_FONT`].
pub fn load_block_font(fonts: &mut FontManager) -> Result<(), FontError> {
    fonts.load_font(&mut BlockRasterizer::default(), "builtin", BLOCK_FONT, 8)?;
    Ok(())
}
