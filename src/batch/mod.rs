//! Batch renderers turn submitted nodes into as few indexed draws as paint order allows.
//!
//! Each renderer owns a vertex buffer sized for [`BATCH_SIZE`] quads and a static index
//! buffer. Nodes are queued by [`ObjectRenderer::render`]; [`ObjectRenderer::flush`] writes
//! their quads into the vertex buffer and issues one draw per run of consecutive quads that
//! share a base texture.

use smallvec::SmallVec;
use std::rc::Rc;

use crate::context::ContextGuard;
use crate::error::BackendError;
use crate::gpu::{
    AttributeFormat, BlendMode, BufferId, BufferKind, BufferUsage, GpuBackend, ProgramId,
    ShaderKind, VertexLayout,
};
use crate::matrix::Matrix3;
use crate::node::NodeRef;
use crate::texture::BaseTexture;

mod sprite_batch;
mod text_batch;

pub use sprite_batch::{SpriteBatch, SpriteVertex};
pub use text_batch::{TextBatch, TextVertex};

/// Quads a renderer accumulates before it must flush.
pub const BATCH_SIZE: usize = 2000;

const INDICES_PER_QUAD: usize = 6;
const VERTICES_PER_QUAD: usize = 4;

/// Which batch renderer draws a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    Sprite,
    Text,
}

/// Per-frame batching statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    /// Flushes that had something to draw.
    pub flushes: u32,
    /// `draw_indexed` calls issued.
    pub draw_calls: u32,
    /// Quads drawn.
    pub quads: u32,
    /// Times the active batch renderer changed.
    pub renderer_switches: u32,
}

impl BatchCounts {
    pub fn accumulate(&mut self, other: &Self) {
        self.flushes += other.flushes;
        self.draw_calls += other.draw_calls;
        self.quads += other.quads;
        self.renderer_switches += other.renderer_switches;
    }
}

/// What a batch renderer needs from the orchestrator while it works.
pub struct BatchContext<'a, B: GpuBackend + ?Sized> {
    pub backend: &'a mut B,
    /// Projection of the active render target.
    pub projection: Matrix3,
    pub counts: &'a mut BatchCounts,
}

/// The protocol every batch renderer follows.
///
/// `start` runs once when the orchestrator switches to the renderer, `stop` when it switches
/// away. In between, `render` queues nodes and `flush` draws them.
pub trait ObjectRenderer<B: GpuBackend + ?Sized> {
    fn kind(&self) -> RendererKind;

    /// Binds buffers and program and installs the vertex layout.
    fn start(&mut self, ctx: &mut BatchContext<'_, B>);

    fn stop(&mut self, ctx: &mut BatchContext<'_, B>) {
        self.flush(ctx);
    }

    /// Draws everything queued. A no-op when nothing is.
    fn flush(&mut self, ctx: &mut BatchContext<'_, B>);

    /// Queues `node`, flushing first when the batch is full.
    fn render(&mut self, node: &NodeRef, ctx: &mut BatchContext<'_, B>);

    /// Quads queued and not yet drawn.
    fn pending_quads(&self) -> usize;
}

/// Index data for `quads` quads: quad `i` draws triangles `4i+{0,1,2}` and `4i+{0,2,3}`.
pub fn quad_indices(quads: usize) -> Vec<u16> {
    (0..quads)
        .flat_map(|quad| {
            let first = (quad * VERTICES_PER_QUAD) as u16;
            [first, first + 1, first + 2, first, first + 2, first + 3]
        })
        .collect()
}

/// A maximal run of consecutive quads sharing one base texture.
#[derive(Debug, Clone)]
pub(crate) struct TextureRun {
    pub(crate) texture: Rc<BaseTexture>,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

/// Extends the last run when `texture` is the same base texture, else opens a new run.
pub(crate) fn push_quad_texture(runs: &mut SmallVec<[TextureRun; 8]>, texture: &Rc<BaseTexture>) {
    if let Some(run) = runs.last_mut() {
        if Rc::ptr_eq(&run.texture, texture) {
            run.len += 1;
            return;
        }
    }

    let start = runs.last().map_or(0, |run| run.start + run.len);
    runs.push(TextureRun {
        texture: texture.clone(),
        start,
        len: 1,
    });
}

/// GPU objects shared by the quad-based batch renderers.
#[derive(Debug)]
pub(crate) struct QuadBuffers {
    pub(crate) vertex_buffer: BufferId,
    pub(crate) index_buffer: BufferId,
    pub(crate) program: ProgramId,
    shader: ShaderKind,
}

impl QuadBuffers {
    pub(crate) fn new<B: GpuBackend + ?Sized>(
        backend: &mut B,
        shader: ShaderKind,
        vertex_stride: usize,
    ) -> Result<Self, BackendError> {
        let _guard = ContextGuard::acquire(backend.context_id());

        let program = backend.create_program(shader)?;

        let index_buffer = backend.create_buffer(BufferKind::Index, BufferUsage::Static);
        backend.upload_buffer(
            index_buffer,
            bytemuck::cast_slice(&quad_indices(BATCH_SIZE)),
        );

        let vertex_buffer = backend.create_buffer(BufferKind::Vertex, BufferUsage::Dynamic);
        backend.upload_buffer(
            vertex_buffer,
            &vec![0; BATCH_SIZE * VERTICES_PER_QUAD * vertex_stride],
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            program,
            shader,
        })
    }

    /// Binds both buffers and the program, then installs a layout built from the program's
    /// attribute locations. Attributes the program does not know are left out.
    pub(crate) fn bind<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        stride: u32,
        attributes: &[(&str, AttributeFormat, u32)],
    ) {
        backend.bind_buffer(self.vertex_buffer);
        backend.bind_buffer(self.index_buffer);
        backend.use_program(self.program);

        let mut layout = VertexLayout::new(stride);
        for &(name, format, offset) in attributes {
            match backend.attribute_location(self.program, name) {
                Some(location) => layout = layout.with_attribute(location, format, offset),
                None => tracing::warn!(
                    "{:?} program has no attribute named `{name}`",
                    self.shader
                ),
            }
        }
        backend.set_vertex_layout(&layout);
    }

    /// Uploads the populated prefix of the vertex buffer and prepares blending and projection.
    pub(crate) fn prepare_draw<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        vertex_bytes: &[u8],
        projection: &Matrix3,
    ) {
        backend.upload_buffer_sub(self.vertex_buffer, 0, vertex_bytes);
        backend.set_blend(BlendMode::Normal);
        backend.use_program(self.program);
        backend.set_projection(self.program, projection);
    }

    /// One indexed draw per run, binding each run's texture first. Returns the draw count.
    pub(crate) fn draw_runs<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        runs: &[TextureRun],
    ) -> u32 {
        let mut draws = 0;
        for run in runs.iter().filter(|run| run.len > 0) {
            let texture = run.texture.gpu_texture(backend);
            backend.bind_texture(texture, None);
            backend.draw_indexed(
                (run.len * INDICES_PER_QUAD) as u32,
                (run.start * INDICES_PER_QUAD) as u32,
            );
            draws += 1;
        }
        draws
    }

    pub(crate) fn destroy<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        let _guard = ContextGuard::acquire(backend.context_id());
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}
