use bytemuck::{Pod, Zeroable};

use super::*;
use crate::color::pack_tint;
use crate::node::NodeKind;
use crate::shaders::{COLOR_ATTRIBUTE, POSITION_ATTRIBUTE, TEXTURE_COORD_ATTRIBUTE};

/// One sprite corner as the sprite program reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    /// Tint and alpha packed by [`pack_tint`], read as four normalized bytes.
    pub tint: u32,
}

impl SpriteVertex {
    pub const STRIDE: usize = std::mem::size_of::<SpriteVertex>();

    const ATTRIBUTES: [(&'static str, AttributeFormat, u32); 3] = [
        (POSITION_ATTRIBUTE, AttributeFormat::Float32x2, 0),
        (TEXTURE_COORD_ATTRIBUTE, AttributeFormat::Float32x2, 8),
        (COLOR_ATTRIBUTE, AttributeFormat::Unorm8x4, 16),
    ];
}

/// Batches textured, tinted sprite quads.
#[derive(Debug)]
pub struct SpriteBatch {
    buffers: QuadBuffers,
    vertices: Vec<SpriteVertex>,
    pending: Vec<NodeRef>,
}

impl SpriteBatch {
    /// Creates the program and buffers. Fails when the backend rejects the sprite program.
    pub fn new<B: GpuBackend + ?Sized>(backend: &mut B) -> Result<Self, BackendError> {
        Ok(Self {
            buffers: QuadBuffers::new(backend, ShaderKind::Sprite, SpriteVertex::STRIDE)?,
            vertices: Vec::with_capacity(BATCH_SIZE * VERTICES_PER_QUAD),
            pending: Vec::with_capacity(BATCH_SIZE),
        })
    }

    pub fn destroy<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        self.buffers.destroy(backend);
    }

    /// Writes the pending sprites' quads into `self.vertices` and groups them into runs.
    fn serialize(&mut self) -> SmallVec<[TextureRun; 8]> {
        self.vertices.clear();
        let mut runs = SmallVec::new();

        for node in &self.pending {
            let node = node.borrow();
            let NodeKind::Sprite(sprite) = &node.kind else {
                panic!("the sprite batch can only draw sprites");
            };

            let tint = pack_tint(sprite.tint, node.world_alpha);
            let uvs = sprite.texture.uvs().corners();
            self.vertices
                .extend(sprite.vertices.iter().zip(uvs).map(|(corner, uv)| SpriteVertex {
                    position: [corner.x, corner.y],
                    uv: [uv.x, uv.y],
                    tint,
                }));

            push_quad_texture(&mut runs, sprite.texture.base());
        }

        runs
    }
}

impl<B: GpuBackend + ?Sized> ObjectRenderer<B> for SpriteBatch {
    fn kind(&self) -> RendererKind {
        RendererKind::Sprite
    }

    fn start(&mut self, ctx: &mut BatchContext<'_, B>) {
        let _guard = ContextGuard::acquire(ctx.backend.context_id());
        self.buffers.bind(
            ctx.backend,
            SpriteVertex::STRIDE as u32,
            &SpriteVertex::ATTRIBUTES,
        );
    }

    fn flush(&mut self, ctx: &mut BatchContext<'_, B>) {
        if self.pending.is_empty() {
            return;
        }

        let _guard = ContextGuard::acquire(ctx.backend.context_id());
        let runs = self.serialize();

        self.buffers.prepare_draw(
            ctx.backend,
            bytemuck::cast_slice(&self.vertices),
            &ctx.projection,
        );
        let draws = self.buffers.draw_runs(ctx.backend, &runs);

        ctx.counts.flushes += 1;
        ctx.counts.draw_calls += draws;
        ctx.counts.quads += self.pending.len() as u32;
        self.pending.clear();
    }

    /// # Panics
    ///
    /// If `node` is not a sprite or its texture is not valid.
    fn render(&mut self, node: &NodeRef, ctx: &mut BatchContext<'_, B>) {
        if self.pending.len() >= BATCH_SIZE {
            self.flush(ctx);
        }

        {
            let node = node.borrow();
            let NodeKind::Sprite(sprite) = &node.kind else {
                panic!("the sprite batch can only draw sprites");
            };
            assert!(
                sprite.texture.is_valid(),
                "cannot render a sprite whose texture is not valid"
            );
        }

        self.pending.push(node.clone());
    }

    fn pending_quads(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoded_image::DecodedImage;
    use crate::geometry::Point;
    use crate::gpu::RecordingBackend;
    use crate::texture::Texture;

    fn sprite(texture: &Texture, x: f32) -> NodeRef {
        let sprite = NodeRef::sprite(texture.clone());
        sprite.set_position(Point::new(x, 0.0));
        sprite.update_transform(true);
        sprite.refresh_sprite_vertices();
        sprite
    }

    fn texture() -> Texture {
        Texture::from_image(DecodedImage::solid(2, 2, [255; 4])).unwrap()
    }

    #[test]
    fn vertex_layout_is_twenty_bytes() {
        assert_eq!(SpriteVertex::STRIDE, 20);
    }

    #[test]
    fn flush_without_pending_sprites_draws_nothing() {
        let mut backend = RecordingBackend::new();
        let mut batch = SpriteBatch::new(&mut backend).unwrap();
        let mut counts = BatchCounts::default();
        let mut ctx = BatchContext {
            backend: &mut backend,
            projection: Matrix3::IDENTITY,
            counts: &mut counts,
        };

        batch.start(&mut ctx);
        batch.flush(&mut ctx);
        assert!(backend.draw_calls().is_empty());
        assert_eq!(counts, BatchCounts::default());
    }

    #[test]
    fn alternating_textures_draw_one_run_each() {
        let mut backend = RecordingBackend::new();
        let mut batch = SpriteBatch::new(&mut backend).unwrap();
        let mut counts = BatchCounts::default();
        let (a, b) = (texture(), texture());
        let mut ctx = BatchContext {
            backend: &mut backend,
            projection: Matrix3::IDENTITY,
            counts: &mut counts,
        };

        batch.start(&mut ctx);
        for (index, texture) in [&a, &a, &b, &a].into_iter().enumerate() {
            batch.render(&sprite(texture, index as f32), &mut ctx);
        }
        batch.stop(&mut ctx);

        let ranges: Vec<_> = backend
            .draw_calls()
            .iter()
            .map(|draw| (draw.first_index, draw.index_count))
            .collect();
        assert_eq!(ranges, vec![(0, 12), (12, 6), (18, 6)]);
        assert_eq!(counts.quads, 4);
        assert_eq!(counts.flushes, 1);
    }

    #[test]
    fn serialized_vertices_carry_uvs_and_packed_tint() {
        let mut backend = RecordingBackend::new();
        let mut batch = SpriteBatch::new(&mut backend).unwrap();
        let mut counts = BatchCounts::default();
        let texture = texture();
        let node = sprite(&texture, 0.0);
        node.set_tint(0x112233);
        let mut ctx = BatchContext {
            backend: &mut backend,
            projection: Matrix3::IDENTITY,
            counts: &mut counts,
        };

        batch.start(&mut ctx);
        batch.render(&node, &mut ctx);
        batch.flush(&mut ctx);

        let draw = &backend.draw_calls()[0];
        let vertex: SpriteVertex = bytemuck::pod_read_unaligned(draw.vertex_bytes(2));
        assert_eq!(vertex.position, [2.0, 2.0]);
        assert_eq!(vertex.uv, [1.0, 1.0]);
        assert_eq!(vertex.tint, 0xFF332211);
    }

    #[test]
    #[should_panic(expected = "not valid")]
    fn rendering_an_invalid_texture_panics() {
        let mut backend = RecordingBackend::new();
        let mut batch = SpriteBatch::new(&mut backend).unwrap();
        let mut counts = BatchCounts::default();
        let mut ctx = BatchContext {
            backend: &mut backend,
            projection: Matrix3::IDENTITY,
            counts: &mut counts,
        };

        batch.render(&NodeRef::sprite(Texture::empty()), &mut ctx);
    }
}
