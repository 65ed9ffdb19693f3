//! How scenes turn into draw calls, observed through the recording backend.
use trellis::batch::{SpriteVertex, TextVertex};
use trellis::{
    DecodedImage, NodeRef, Point, RecordingBackend, Renderer, RendererSettings, Size, Texture,
    BATCH_SIZE,
};
use trellis_test_scenes::{load_block_font, BLOCK_FONT};

fn renderer() -> Renderer<RecordingBackend> {
    let mut renderer = Renderer::new(
        RecordingBackend::new(),
        Size::new(200.0, 200.0),
        RendererSettings::default(),
    )
    .unwrap();
    load_block_font(renderer.fonts_mut()).unwrap();
    renderer
}

fn texture() -> Texture {
    Texture::from_image(DecodedImage::solid(4, 4, [255; 4])).unwrap()
}

fn sprite_at(texture: &Texture, x: f32, y: f32) -> NodeRef {
    let sprite = NodeRef::sprite(texture.clone());
    sprite.set_position(Point::new(x, y));
    sprite
}

#[test]
fn full_batch_flushes_before_the_next_sprite() {
    let mut renderer = renderer();
    let texture = texture();
    let root = NodeRef::container();
    for i in 0..=BATCH_SIZE {
        root.add_child(&sprite_at(&texture, (i % 50) as f32, 0.0));
    }

    renderer.render(&root).unwrap();

    let draws = renderer.backend().draw_calls();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].index_range(), 0..(6 * BATCH_SIZE) as u32);
    assert_eq!(draws[1].index_range(), 0..6);
    let total: u32 = draws.iter().map(|draw| draw.index_count).sum();
    assert_eq!(total, 6 * (BATCH_SIZE as u32 + 1));

    let counts = renderer.last_batch_counts();
    assert_eq!(counts.flushes, 2);
    assert_eq!(counts.quads, BATCH_SIZE as u32 + 1);
}

#[test]
fn invisible_sprite_leaves_no_gap_in_the_batch() {
    let mut renderer = renderer();
    let texture = texture();
    let root = NodeRef::container();
    let first = sprite_at(&texture, 0.0, 0.0);
    let hidden = sprite_at(&texture, 10.0, 0.0);
    hidden.set_visible(false);
    let last = sprite_at(&texture, 20.0, 5.0);
    root.add_child(&first);
    root.add_child(&hidden);
    root.add_child(&last);

    renderer.render(&root).unwrap();

    let draws = renderer.backend().draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].index_count, 12);
    assert_eq!(draws[0].vertex_range(), 0..8);

    let vertex = |index| bytemuck::pod_read_unaligned::<SpriteVertex>(draws[0].vertex_bytes(index));
    assert_eq!(vertex(0).position, [0.0, 0.0]);
    assert_eq!(vertex(4).position, [20.0, 5.0]);
}

#[test]
fn texture_change_splits_a_flush_into_runs() {
    let mut renderer = renderer();
    let (a, b) = (texture(), texture());
    let root = NodeRef::container();
    root.add_child(&sprite_at(&a, 0.0, 0.0));
    root.add_child(&sprite_at(&a, 4.0, 0.0));
    root.add_child(&sprite_at(&b, 8.0, 0.0));
    root.add_child(&sprite_at(&a, 12.0, 0.0));

    renderer.render(&root).unwrap();

    let draws = renderer.backend().draw_calls();
    let ranges: Vec<_> = draws.iter().map(|draw| draw.index_range()).collect();
    assert_eq!(ranges, vec![0..12, 12..18, 18..24]);
    assert_eq!(draws[0].texture, draws[2].texture);
    assert_ne!(draws[0].texture, draws[1].texture);
    assert_eq!(renderer.last_batch_counts().flushes, 1);
}

#[test]
fn interleaved_text_switches_renderers_in_paint_order() {
    let mut renderer = renderer();
    let texture = texture();
    let root = NodeRef::container();
    root.add_child(&sprite_at(&texture, 0.0, 0.0));
    let text = NodeRef::text("I", BLOCK_FONT);
    text.set_position(Point::new(30.0, 0.0));
    root.add_child(&text);
    root.add_child(&sprite_at(&texture, 60.0, 0.0));

    renderer.render(&root).unwrap();

    let draws = renderer.backend().draw_calls();
    assert_eq!(draws.len(), 3);
    assert_eq!(draws[0].program, draws[2].program);
    assert_ne!(draws[0].program, draws[1].program);
    assert_eq!(draws[1].vertex_stride as usize, TextVertex::STRIDE);

    let glyph = bytemuck::pod_read_unaligned::<TextVertex>(draws[1].vertex_bytes(0));
    assert_eq!(glyph.position[0], 30.0);
    assert_eq!(renderer.last_batch_counts().renderer_switches, 3);
}

#[test]
fn long_text_is_split_over_consecutive_batches() {
    let mut renderer = renderer();
    let root = NodeRef::container();
    root.add_child(&NodeRef::text(&"I".repeat(BATCH_SIZE + 3), BLOCK_FONT));

    renderer.render(&root).unwrap();

    let draws = renderer.backend().draw_calls();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].index_count, 6 * BATCH_SIZE as u32);
    assert_eq!(draws[1].index_count, 18);
    assert_eq!(renderer.last_batch_counts().quads, BATCH_SIZE as u32 + 3);
}

#[test]
fn spaces_produce_no_glyph_quads() {
    let mut renderer = renderer();
    let root = NodeRef::container();
    root.add_child(&NodeRef::text("I I", BLOCK_FONT));

    renderer.render(&root).unwrap();

    assert_eq!(renderer.last_batch_counts().quads, 2);
}
