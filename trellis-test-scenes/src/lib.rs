pub mod expectations;
pub mod glyphs;
pub mod scene;

pub use expectations::{check_pixels, PixelExpectation};
pub use glyphs::{load_block_font, BlockRasterizer, BLOCK_FONT};
pub use scene::{build_main_scene, BACKGROUND, CANVAS_HEIGHT, CANVAS_WIDTH};
