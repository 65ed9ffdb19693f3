//! [`GpuBackend`] on top of wgpu.
//!
//! The trait is a bind-and-draw API while wgpu wants whole render passes, so the backend keeps
//! CPU shadows of every buffer and records draws as commands. Each draw snapshots the vertex
//! bytes it reads into a per-frame arena and the current projection into a uniform slot;
//! [`GpuBackend::end_frame`] uploads both arenas, encodes the recorded passes and submits them.
//!
//! Draws are only submitted between [`GpuBackend::begin_frame`] and [`GpuBackend::end_frame`].

use ahash::{HashMap, HashMapExt};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;
use tracing::warn;

use super::*;

mod construction;
mod frame;
mod pipelines;
mod readback;
mod resources;

use pipelines::PipelineKey;

/// Bytes of one projection uniform: a `mat3x3<f32>` is three padded columns.
const PROJECTION_UNIFORM_SIZE: u64 = 48;

const PIPELINE_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(size) => size,
    None => panic!("pipeline cache size must be non-zero"),
};

/// Where the root render target lands.
enum Output {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        width: u32,
        height: u32,
    },
}

impl Output {
    fn format(&self) -> wgpu::TextureFormat {
        match self {
            Output::Surface { config, .. } => config.format,
            Output::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    fn size(&self) -> (u32, u32) {
        match self {
            Output::Surface { config, .. } => (config.width, config.height),
            Output::Offscreen { width, height, .. } => (*width, *height),
        }
    }
}

/// Format of headless outputs and of readbacks.
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// CPU copy of a backend buffer. Index buffers are mirrored to the GPU on upload; vertex
/// buffers reach the GPU through the frame's vertex arena.
struct ShadowBuffer {
    kind: BufferKind,
    data: Vec<u8>,
    gpu: Option<Arc<wgpu::Buffer>>,
    /// Arena offset and length of the snapshot taken since the last write.
    snapshot: Option<(u64, usize)>,
}

struct GpuTexture {
    format: TextureFormat,
    allocation: Option<TextureAllocation>,
    min_filter: ScaleMode,
    mag_filter: ScaleMode,
    wrap: WrapMode,
}

struct TextureAllocation {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct Program {
    kind: ShaderKind,
    projection: Matrix3,
    /// Uniform arena offset holding `projection` for the current frame.
    uniform_offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Viewport {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// A draw recorded during the frame, resolved to wgpu objects in `end_frame`.
struct DrawCommand {
    pipeline: PipelineKey,
    texture: TextureId,
    vertex_offset: u64,
    index_buffer: BufferId,
    indices: Range<u32>,
    uniform_offset: u32,
    viewport: Viewport,
}

struct RecordedPass {
    /// `None` is the output.
    target: Option<TextureId>,
    clear: Option<wgpu::Color>,
    draws: Vec<DrawCommand>,
}

/// Renders through wgpu into a window surface or a headless texture.
pub struct WgpuBackend {
    context: ContextId,
    #[allow(dead_code)]
    instance: wgpu::Instance,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    output: Output,
    uniform_alignment: u64,

    next_id: u64,
    buffers: HashMap<BufferId, ShadowBuffer>,
    textures: HashMap<TextureId, GpuTexture>,
    programs: HashMap<ProgramId, Program>,

    shader_modules: HashMap<ShaderKind, Arc<wgpu::ShaderModule>>,
    projection_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: LruCache<PipelineKey, Arc<wgpu::RenderPipeline>>,
    samplers: HashMap<(ScaleMode, ScaleMode, WrapMode), wgpu::Sampler>,
    texture_bind_groups: HashMap<TextureId, Arc<wgpu::BindGroup>>,

    bound_vertex_buffer: Option<BufferId>,
    bound_index_buffer: Option<BufferId>,
    bound_texture: Option<TextureId>,
    current_program: Option<ProgramId>,
    blend: BlendMode,
    layout: VertexLayout,
    render_target: Option<TextureId>,
    viewport: Viewport,

    passes: Vec<RecordedPass>,
    vertex_arena: Vec<u8>,
    uniform_arena: Vec<u8>,
    vertex_buffer: Option<wgpu::Buffer>,
    uniform_buffer: Option<wgpu::Buffer>,
    projection_bind_group: Option<wgpu::BindGroup>,
    readback_buffer: Option<wgpu::Buffer>,
}

impl WgpuBackend {
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Format of the output the root target is drawn into.
    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output.format()
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output.size()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn target_format(&self, target: Option<TextureId>) -> wgpu::TextureFormat {
        match target.and_then(|texture| self.textures.get(&texture)) {
            Some(texture) => resources::wgpu_texture_format(texture.format),
            None => self.output.format(),
        }
    }

    fn current_pass(&mut self) -> &mut RecordedPass {
        let target = self.render_target;
        if self.passes.last().is_none_or(|pass| pass.target != target) {
            self.passes.push(RecordedPass {
                target,
                clear: None,
                draws: Vec::new(),
            });
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }
}

impl GpuBackend for WgpuBackend {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn begin_frame(&mut self) {
        self.reset_frame();
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let submitted = self.submit_frame();
        self.reset_frame();
        submitted
    }

    fn resize_output(&mut self, width: u32, height: u32) {
        self.resize_output_to(width.max(1), height.max(1));
    }

    fn create_buffer(&mut self, kind: BufferKind, _usage: BufferUsage) -> BufferId {
        let buffer = BufferId(self.allocate_id());
        self.buffers.insert(
            buffer,
            ShadowBuffer {
                kind,
                data: Vec::new(),
                gpu: None,
                snapshot: None,
            },
        );
        buffer
    }

    fn upload_buffer(&mut self, buffer: BufferId, bytes: &[u8]) {
        let Some(shadow) = self.buffers.get_mut(&buffer) else {
            warn!("Upload to unknown buffer {buffer}");
            return;
        };
        shadow.data.clear();
        shadow.data.extend_from_slice(bytes);
        shadow.snapshot = None;
        self.sync_index_buffer(buffer);
    }

    fn upload_buffer_sub(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]) {
        let Some(shadow) = self.buffers.get_mut(&buffer) else {
            warn!("Upload to unknown buffer {buffer}");
            return;
        };
        let end = offset + bytes.len();
        if shadow.data.len() < end {
            shadow.data.resize(end, 0);
        }
        shadow.data[offset..end].copy_from_slice(bytes);
        shadow.snapshot = None;
        self.sync_index_buffer(buffer);
    }

    fn bind_buffer(&mut self, buffer: BufferId) {
        match self.buffers.get(&buffer).map(|shadow| shadow.kind) {
            Some(BufferKind::Vertex) => self.bound_vertex_buffer = Some(buffer),
            Some(BufferKind::Index) => self.bound_index_buffer = Some(buffer),
            None => warn!("Bind of unknown buffer {buffer}"),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(shadow) = self.buffers.remove(&buffer) {
            if let Some(gpu) = shadow.gpu {
                gpu.destroy();
            }
        }
        if self.bound_vertex_buffer == Some(buffer) {
            self.bound_vertex_buffer = None;
        }
        if self.bound_index_buffer == Some(buffer) {
            self.bound_index_buffer = None;
        }
    }

    fn create_texture(&mut self, format: TextureFormat) -> TextureId {
        let texture = TextureId(self.allocate_id());
        self.textures.insert(
            texture,
            GpuTexture {
                format,
                allocation: None,
                min_filter: ScaleMode::default(),
                mag_filter: ScaleMode::default(),
                wrap: WrapMode::default(),
            },
        );
        texture
    }

    fn bind_texture(&mut self, texture: TextureId, _unit: Option<u32>) {
        self.bound_texture = Some(texture);
    }

    fn upload_texture(&mut self, texture: TextureId, pixels: &[u8], width: u32, height: u32) {
        self.write_texture_pixels(texture, pixels, width, height);
    }

    fn set_texture_filter(&mut self, texture: TextureId, min: ScaleMode, mag: ScaleMode) {
        if let Some(gpu) = self.textures.get_mut(&texture) {
            gpu.min_filter = min;
            gpu.mag_filter = mag;
            self.texture_bind_groups.remove(&texture);
        }
    }

    fn set_texture_wrap(&mut self, texture: TextureId, wrap: WrapMode) {
        if let Some(gpu) = self.textures.get_mut(&texture) {
            gpu.wrap = wrap;
            self.texture_bind_groups.remove(&texture);
        }
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        let allocation = self.textures.get(&texture)?.allocation.as_ref()?;
        Some((allocation.width, allocation.height))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(gpu) = self.textures.remove(&texture) {
            if let Some(allocation) = gpu.allocation {
                allocation.texture.destroy();
            }
        }
        self.texture_bind_groups.remove(&texture);
        if self.bound_texture == Some(texture) {
            self.bound_texture = None;
        }
    }

    fn resize_render_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        self.allocate_texture(texture, width.max(1), height.max(1));
    }

    fn create_program(&mut self, kind: ShaderKind) -> Result<ProgramId, BackendError> {
        self.ensure_shader_module(kind)?;
        let program = ProgramId(self.allocate_id());
        self.programs.insert(
            program,
            Program {
                kind,
                projection: Matrix3::IDENTITY,
                uniform_offset: None,
            },
        );
        Ok(program)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn set_projection(&mut self, program: ProgramId, projection: &Matrix3) {
        if let Some(program) = self.programs.get_mut(&program) {
            if program.uniform_offset.is_none() || program.projection != *projection {
                program.projection = *projection;
                program.uniform_offset = None;
            }
        }
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        let kind = self.programs.get(&program)?.kind;
        crate::shaders::attribute_location(kind, name)
    }

    fn set_vertex_layout(&mut self, layout: &VertexLayout) {
        self.layout = layout.clone();
    }

    fn set_render_target(&mut self, target: Option<TextureId>) {
        self.render_target = target;
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.viewport = Viewport {
            x,
            y,
            width,
            height,
        };
    }

    fn set_blend(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        let clear = wgpu::Color { r, g, b, a };

        let target = self.render_target;
        match self.passes.last_mut() {
            Some(pass) if pass.target == target && pass.draws.is_empty() => {
                pass.clear = Some(clear);
            }
            _ => self.passes.push(RecordedPass {
                target,
                clear: Some(clear),
                draws: Vec::new(),
            }),
        }
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        if let Some(draw) = self.record_draw(index_count, first_index) {
            self.current_pass().draws.push(draw);
        }
    }
}
