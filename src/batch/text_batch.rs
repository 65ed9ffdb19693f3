use bytemuck::{Pod, Zeroable};

use super::*;
use crate::node::NodeKind;
use crate::shaders::{COLOR_ATTRIBUTE, POSITION_ATTRIBUTE, TEXTURE_COORD_ATTRIBUTE};

/// Every glyph samples its whole texture.
const GLYPH_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// One glyph corner as the text program reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TextVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 3],
}

impl TextVertex {
    pub const STRIDE: usize = std::mem::size_of::<TextVertex>();

    const ATTRIBUTES: [(&'static str, AttributeFormat, u32); 3] = [
        (POSITION_ATTRIBUTE, AttributeFormat::Float32x2, 0),
        (TEXTURE_COORD_ATTRIBUTE, AttributeFormat::Float32x2, 8),
        (COLOR_ATTRIBUTE, AttributeFormat::Float32x3, 16),
    ];
}

/// A slice of one text's drawn glyphs: `count` glyphs starting at the `first` drawn glyph.
#[derive(Debug)]
struct PendingText {
    node: NodeRef,
    first: usize,
    count: usize,
}

/// Batches glyph quads. Every glyph has its own texture, so runs break wherever consecutive
/// glyphs differ.
#[derive(Debug)]
pub struct TextBatch {
    buffers: QuadBuffers,
    vertices: Vec<TextVertex>,
    pending: Vec<PendingText>,
    pending_glyphs: usize,
}

impl TextBatch {
    /// Creates the program and buffers. Fails when the backend rejects the text program.
    pub fn new<B: GpuBackend + ?Sized>(backend: &mut B) -> Result<Self, BackendError> {
        Ok(Self {
            buffers: QuadBuffers::new(backend, ShaderKind::Text, TextVertex::STRIDE)?,
            vertices: Vec::with_capacity(BATCH_SIZE * VERTICES_PER_QUAD),
            pending: Vec::new(),
            pending_glyphs: 0,
        })
    }

    pub fn destroy<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        self.buffers.destroy(backend);
    }

    fn serialize(&mut self) -> SmallVec<[TextureRun; 8]> {
        self.vertices.clear();
        let mut runs = SmallVec::new();

        for entry in &self.pending {
            let node = entry.node.borrow();
            let NodeKind::Text(text) = &node.kind else {
                panic!("the text batch can only draw texts");
            };

            let [r, g, b] = text.color.normalize();
            for glyph in text.visible_glyphs().skip(entry.first).take(entry.count) {
                let Some(texture) = &text.glyph_textures[glyph] else {
                    continue;
                };

                self.vertices.extend(
                    text.glyph_corners(glyph)
                        .into_iter()
                        .zip(GLYPH_UVS)
                        .map(|(corner, uv)| TextVertex {
                            position: [corner.x, corner.y],
                            uv,
                            color: [r, g, b],
                        }),
                );
                push_quad_texture(&mut runs, texture);
            }
        }

        runs
    }
}

impl<B: GpuBackend + ?Sized> ObjectRenderer<B> for TextBatch {
    fn kind(&self) -> RendererKind {
        RendererKind::Text
    }

    fn start(&mut self, ctx: &mut BatchContext<'_, B>) {
        let _guard = ContextGuard::acquire(ctx.backend.context_id());
        self.buffers
            .bind(ctx.backend, TextVertex::STRIDE as u32, &TextVertex::ATTRIBUTES);
    }

    fn flush(&mut self, ctx: &mut BatchContext<'_, B>) {
        if self.pending.is_empty() {
            self.pending_glyphs = 0;
            return;
        }

        let _guard = ContextGuard::acquire(ctx.backend.context_id());
        let runs = self.serialize();
        let quads = self.vertices.len() / VERTICES_PER_QUAD;

        self.buffers.prepare_draw(
            ctx.backend,
            bytemuck::cast_slice(&self.vertices),
            &ctx.projection,
        );
        let draws = self.buffers.draw_runs(ctx.backend, &runs);

        ctx.counts.flushes += 1;
        ctx.counts.draw_calls += draws;
        ctx.counts.quads += quads as u32;
        self.pending.clear();
        self.pending_glyphs = 0;
    }

    /// Queues the drawn glyphs of `node`. A text that does not fit in the current batch
    /// flushes it first; one with more than [`BATCH_SIZE`] glyphs is split over several
    /// consecutive batches.
    ///
    /// # Panics
    ///
    /// If `node` is not a text.
    fn render(&mut self, node: &NodeRef, ctx: &mut BatchContext<'_, B>) {
        let glyphs = {
            let borrowed = node.borrow();
            let NodeKind::Text(text) = &borrowed.kind else {
                panic!("the text batch can only draw texts");
            };
            text.visible_glyph_count()
        };
        if glyphs == 0 {
            return;
        }

        if self.pending_glyphs > 0 && self.pending_glyphs + glyphs > BATCH_SIZE {
            self.flush(ctx);
        }

        let mut first = 0;
        while first < glyphs {
            if self.pending_glyphs == BATCH_SIZE {
                self.flush(ctx);
            }

            let count = (glyphs - first).min(BATCH_SIZE - self.pending_glyphs);
            self.pending.push(PendingText {
                node: node.clone(),
                first,
                count,
            });
            self.pending_glyphs += count;
            first += count;
        }
    }

    fn pending_quads(&self) -> usize {
        self.pending_glyphs
    }
}
