//! Pixel checks of the main test scene rendered by the wgpu backend into an offscreen texture.
//!
//! Skipped when no adapter is available.
//!
//! Run with:   cargo test --test visual_regression
use futures::executor::block_on;
use trellis::{NodeRef, Renderer, RendererSettings, Size, WgpuBackend};
use trellis_test_scenes::{
    build_main_scene, check_pixels, load_block_font, BACKGROUND, CANVAS_HEIGHT, CANVAS_WIDTH,
};

fn headless_renderer() -> Option<Renderer<WgpuBackend>> {
    let backend = block_on(WgpuBackend::try_new_headless(CANVAS_WIDTH, CANVAS_HEIGHT))?;
    let mut renderer = Renderer::new(
        backend,
        Size::new(CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32),
        RendererSettings::default().with_background_color(BACKGROUND),
    )
    .expect("built-in programs compile");
    load_block_font(renderer.fonts_mut()).expect("block font loads");
    Some(renderer)
}

#[test]
fn main_scene_pixel_expectations() {
    let Some(mut renderer) = headless_renderer() else {
        return;
    };

    let (root, expectations) = build_main_scene();
    renderer.render(&root).expect("frame submits");
    let pixels = renderer.backend_mut().read_pixels().expect("pixels read back");

    let failures = check_pixels(&pixels, CANVAS_WIDTH, CANVAS_HEIGHT, &expectations);
    if !failures.is_empty() {
        panic!(
            "{} pixel expectation(s) failed:\n{}",
            failures.len(),
            failures.join("\n"),
        );
    }
}

#[test]
fn empty_scene_is_cleared_to_background() {
    let Some(mut renderer) = headless_renderer() else {
        return;
    };

    renderer.render(&NodeRef::container()).expect("frame submits");
    let pixels = renderer.backend_mut().read_pixels().expect("pixels read back");

    assert_eq!(pixels.len(), (CANVAS_WIDTH * CANVAS_HEIGHT * 4) as usize);
    assert!(pixels
        .chunks_exact(4)
        .all(|pixel| pixel == [255, 255, 255, 255]));
}

#[test]
fn rendering_twice_gives_the_same_pixels() {
    let Some(mut renderer) = headless_renderer() else {
        return;
    };

    let (root, _) = build_main_scene();
    renderer.render(&root).expect("first frame submits");
    let first = renderer.backend_mut().read_pixels().expect("pixels read back");
    renderer.render(&root).expect("second frame submits");
    let second = renderer.backend_mut().read_pixels().expect("pixels read back");

    assert_eq!(first, second);
}
