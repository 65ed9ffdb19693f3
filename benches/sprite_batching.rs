use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis::{
    DecodedImage, NodeRef, Point, RecordingBackend, Renderer, RendererSettings, Size, Texture,
};

fn scene(sprites: usize, textures: &[Texture]) -> NodeRef {
    let root = NodeRef::container();
    for i in 0..sprites {
        let sprite = NodeRef::sprite(textures[i % textures.len()].clone());
        sprite.set_position(Point::new((i % 100) as f32 * 8.0, (i / 100) as f32 * 8.0));
        root.add_child(&sprite);
    }
    root
}

fn renderer() -> Renderer<RecordingBackend> {
    Renderer::new(
        RecordingBackend::new(),
        Size::new(800.0, 600.0),
        RendererSettings::default(),
    )
    .expect("recording programs never fail")
}

fn bench_sprite_batching(c: &mut Criterion) {
    let shared = [Texture::from_image(DecodedImage::solid(8, 8, [255; 4])).expect("valid frame")];
    let alternating = [
        Texture::from_image(DecodedImage::solid(8, 8, [255; 4])).expect("valid frame"),
        Texture::from_image(DecodedImage::solid(8, 8, [0, 0, 0, 255])).expect("valid frame"),
    ];

    let mut group = c.benchmark_group("sprite_batching");
    for sprites in [100, 1_000, 10_000] {
        for (name, textures) in [("shared_texture", &shared[..]), ("alternating", &alternating[..])] {
            let root = scene(sprites, textures);
            let mut renderer = renderer();

            group.bench_with_input(BenchmarkId::new(name, sprites), &root, |b, root| {
                b.iter(|| {
                    // Touch every sprite so vertices are recomputed each frame.
                    for child in root.children() {
                        let position = child.position();
                        child.set_position(Point::new(position.x + 1.0, position.y));
                    }
                    renderer.render(black_box(root)).expect("recording never fails");
                    renderer.backend_mut().clear_recording();
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_sprite_batching);
criterion_main!(benches);
