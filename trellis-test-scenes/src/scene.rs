use std::rc::Rc;

use trellis::gpu::ScaleMode;
use trellis::{BaseTexture, ColorRGB, DecodedImage, NodeRef, Point, Size, Texture};

use crate::expectations::PixelExpectation;
use crate::glyphs::BLOCK_FONT;

// ── Grid layout constants ────────────────────────────────────────────────────

const TILE_SIZE: u32 = 40;
const COLUMNS: u32 = 4;
const ROWS: u32 = 2;

pub const CANVAS_WIDTH: u32 = TILE_SIZE * COLUMNS;
pub const CANVAS_HEIGHT: u32 = TILE_SIZE * ROWS;

/// Clear color the scene expects the renderer to use.
pub const BACKGROUND: ColorRGB = ColorRGB::WHITE;

/// Returns the pixel origin (top-left corner) of tile number `n` (1-based).
fn tile_origin(tile_number: u32) -> (f32, f32) {
    let index = tile_number - 1;
    let column = index % COLUMNS;
    let row = index / COLUMNS;
    ((column * TILE_SIZE) as f32, (row * TILE_SIZE) as f32)
}

/// Textures shared by every tile. Sprites drawn from the same base batch together.
struct SharedTextures {
    white: Texture,
    checkerboard: Texture,
}

impl SharedTextures {
    fn new() -> Self {
        let white = Texture::from_image(DecodedImage::solid(1, 1, [255, 255, 255, 255]))
            .expect("1x1 texture has a valid frame");

        // 2×2 checkerboard: red and blue, RGBA
        let red = [255, 0, 0, 255];
        let blue = [0, 0, 255, 255];
        let pixels = [red, blue, blue, red].concat();
        let image = DecodedImage::from_rgba(2, 2, pixels).expect("2x2 RGBA pixels");
        let checkerboard = Texture::new(
            Rc::new(BaseTexture::new(image).with_scale_mode(ScaleMode::Nearest)),
            None,
        )
        .expect("2x2 texture has a valid frame");

        Self {
            white,
            checkerboard,
        }
    }
}

fn solid_sprite(texture: &Texture, x: f32, y: f32, side: f32, tint: u32) -> NodeRef {
    let sprite = NodeRef::sprite(texture.clone());
    sprite.set_position(Point::new(x, y));
    sprite.set_size(Size::new(side, side));
    sprite.set_tint(tint);
    sprite
}

/// Builds the main test scene and returns its root together with the pixel expectations for
/// the rendered output.
///
/// Text tiles need [`BLOCK_FONT`](crate::BLOCK_FONT) loaded in the renderer's font manager,
/// and the frame has to be cleared with [`BACKGROUND`].
pub fn build_main_scene() -> (NodeRef, Vec<PixelExpectation>) {
    let root = NodeRef::container();
    let textures = SharedTextures::new();
    let mut expectations = Vec::new();

    expectations.extend(tile_01_solid_sprite(&root, &textures));
    expectations.extend(tile_02_paint_order(&root, &textures));
    expectations.extend(tile_03_half_alpha(&root, &textures));
    expectations.extend(tile_04_scaled_container(&root));
    expectations.extend(tile_05_hidden_container(&root, &textures));
    expectations.extend(tile_06_text(&root));
    expectations.extend(tile_07_sprite_text_sprite(&root, &textures));
    expectations.extend(tile_08_checkerboard(&root, &textures));

    (root, expectations)
}

// ── Sprites ──────────────────────────────────────────────────────────────────

fn tile_01_solid_sprite(root: &NodeRef, textures: &SharedTextures) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(1);
    root.add_child(&solid_sprite(
        &textures.white,
        ox + 10.0,
        oy + 10.0,
        20.0,
        0xDC3232,
    ));

    vec![
        PixelExpectation::opaque(ox as u32 + 20, oy as u32 + 20, 220, 50, 50, "t01_interior"),
        PixelExpectation::background(ox as u32 + 5, oy as u32 + 5, "t01_outside_is_bg"),
    ]
}

fn tile_02_paint_order(root: &NodeRef, textures: &SharedTextures) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(2);
    root.add_child(&solid_sprite(&textures.white, ox + 5.0, oy + 5.0, 20.0, 0xFF0000));
    root.add_child(&solid_sprite(
        &textures.white,
        ox + 15.0,
        oy + 15.0,
        20.0,
        0x00FF00,
    ));

    vec![
        PixelExpectation::opaque(ox as u32 + 8, oy as u32 + 8, 255, 0, 0, "t02_first_only"),
        PixelExpectation::opaque(ox as u32 + 20, oy as u32 + 20, 0, 255, 0, "t02_later_on_top"),
    ]
}

fn tile_03_half_alpha(root: &NodeRef, textures: &SharedTextures) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(3);
    let sprite = solid_sprite(&textures.white, ox + 10.0, oy + 10.0, 20.0, 0x000000);
    sprite.set_alpha(0.5);
    root.add_child(&sprite);

    vec![
        PixelExpectation::opaque(ox as u32 + 20, oy as u32 + 20, 127, 127, 127, "t03_blended")
            .with_tolerance(3),
    ]
}

fn tile_04_scaled_container(root: &NodeRef) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(4);
    let container = NodeRef::container();
    container.set_position(Point::new(ox + 10.0, oy + 10.0));
    container.set_scale(Point::new(2.0, 2.0));

    let blue = Texture::from_image(DecodedImage::solid(5, 5, [0, 0, 255, 255]))
        .expect("5x5 texture has a valid frame");
    let child = NodeRef::sprite(blue);
    child.set_position(Point::new(2.0, 2.0));
    container.add_child(&child);
    root.add_child(&container);

    // The container's scale doubles the child's quad but not the child's offset, so the child
    // covers (12..22, 12..22) inside the tile.
    vec![
        PixelExpectation::opaque(ox as u32 + 17, oy as u32 + 17, 0, 0, 255, "t04_scaled_child"),
        PixelExpectation::background(ox as u32 + 11, oy as u32 + 11, "t04_before_child"),
        PixelExpectation::background(ox as u32 + 24, oy as u32 + 24, "t04_past_scaled_edge"),
    ]
}

fn tile_05_hidden_container(root: &NodeRef, textures: &SharedTextures) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(5);
    let hidden = NodeRef::container();
    hidden.set_visible(false);
    hidden.add_child(&solid_sprite(
        &textures.white,
        ox + 10.0,
        oy + 10.0,
        20.0,
        0xFF0000,
    ));
    root.add_child(&hidden);

    vec![PixelExpectation::background(
        ox as u32 + 20,
        oy as u32 + 20,
        "t05_hidden_subtree_not_drawn",
    )]
}

// ── Text ─────────────────────────────────────────────────────────────────────

fn tile_06_text(root: &NodeRef) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(6);
    let text = NodeRef::text("II", BLOCK_FONT);
    text.set_position(Point::new(ox + 10.0, oy + 10.0));
    text.set_color(ColorRGB::new(0, 0, 200));
    root.add_child(&text);

    // Glyphs are 8×8 and advance 9 pixels: (10..18) and (19..27).
    vec![
        PixelExpectation::opaque(ox as u32 + 14, oy as u32 + 14, 0, 0, 200, "t06_first_glyph"),
        PixelExpectation::opaque(ox as u32 + 22, oy as u32 + 14, 0, 0, 200, "t06_second_glyph"),
        PixelExpectation::background(ox as u32 + 18, oy as u32 + 14, "t06_gap_between_glyphs"),
    ]
}

fn tile_07_sprite_text_sprite(root: &NodeRef, textures: &SharedTextures) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(7);
    root.add_child(&solid_sprite(&textures.white, ox + 5.0, oy + 5.0, 20.0, 0xFF0000));

    let text = NodeRef::text("I", BLOCK_FONT);
    text.set_position(Point::new(ox + 10.0, oy + 10.0));
    root.add_child(&text);

    root.add_child(&solid_sprite(&textures.white, ox + 12.0, oy + 12.0, 4.0, 0x00FF00));

    vec![
        PixelExpectation::opaque(ox as u32 + 22, oy as u32 + 22, 255, 0, 0, "t07_bottom_sprite"),
        PixelExpectation::opaque(ox as u32 + 11, oy as u32 + 11, 0, 0, 0, "t07_text_over_sprite"),
        PixelExpectation::opaque(ox as u32 + 13, oy as u32 + 13, 0, 255, 0, "t07_sprite_over_text"),
    ]
}

fn tile_08_checkerboard(root: &NodeRef, textures: &SharedTextures) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(8);
    root.add_child(&solid_sprite(
        &textures.checkerboard,
        ox + 10.0,
        oy + 10.0,
        20.0,
        0xFFFFFF,
    ));

    vec![
        PixelExpectation::opaque(ox as u32 + 14, oy as u32 + 14, 255, 0, 0, "t08_top_left"),
        PixelExpectation::opaque(ox as u32 + 25, oy as u32 + 14, 0, 0, 255, "t08_top_right"),
        PixelExpectation::opaque(ox as u32 + 14, oy as u32 + 25, 0, 0, 255, "t08_bottom_left"),
    ]
}
