use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use std::ops::Range;
use std::rc::Rc;

use super::*;

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    BeginFrame,
    EndFrame,
    CreateBuffer {
        buffer: BufferId,
        kind: BufferKind,
        usage: BufferUsage,
    },
    UploadBuffer {
        buffer: BufferId,
        len: usize,
    },
    UploadBufferSub {
        buffer: BufferId,
        offset: usize,
        len: usize,
    },
    BindBuffer(BufferId),
    DestroyBuffer(BufferId),
    CreateTexture {
        texture: TextureId,
        format: TextureFormat,
    },
    BindTexture {
        texture: TextureId,
        unit: Option<u32>,
    },
    UploadTexture {
        texture: TextureId,
        width: u32,
        height: u32,
    },
    SetTextureFilter {
        texture: TextureId,
        min: ScaleMode,
        mag: ScaleMode,
    },
    SetTextureWrap {
        texture: TextureId,
        wrap: WrapMode,
    },
    DestroyTexture(TextureId),
    ResizeRenderTexture {
        texture: TextureId,
        width: u32,
        height: u32,
    },
    CreateProgram {
        program: ProgramId,
        kind: ShaderKind,
    },
    UseProgram(ProgramId),
    SetProjection {
        program: ProgramId,
        projection: Matrix3,
    },
    SetVertexLayout(VertexLayout),
    SetRenderTarget(Option<TextureId>),
    SetViewport {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    SetBlend(BlendMode),
    Clear([f32; 4]),
    DrawIndexed {
        index_count: u32,
        first_index: u32,
    },
}

/// A draw together with the state it was issued under.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub index_count: u32,
    pub first_index: u32,
    pub program: Option<ProgramId>,
    pub projection: Option<Matrix3>,
    pub texture: Option<TextureId>,
    pub blend: BlendMode,
    pub render_target: Option<TextureId>,
    pub vertex_stride: u32,
    /// Contents of the bound vertex buffer when the draw was issued.
    pub vertices: Rc<[u8]>,
    /// Contents of the bound index buffer when the draw was issued.
    pub indices: Rc<[u8]>,
}

impl DrawCall {
    pub fn index_range(&self) -> Range<u32> {
        self.first_index..self.first_index + self.index_count
    }

    /// Vertex indices this draw reads, in index-buffer order.
    pub fn referenced_indices(&self) -> Vec<u16> {
        let indices: Vec<u16> = self
            .indices
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let range = self.index_range();
        indices
            .get(range.start as usize..range.end as usize)
            .map(<[u16]>::to_vec)
            .unwrap_or_default()
    }

    /// Range of vertices spanned by this draw's indices.
    pub fn vertex_range(&self) -> Range<usize> {
        let referenced = self.referenced_indices();
        match (referenced.iter().min(), referenced.iter().max()) {
            (Some(&min), Some(&max)) => min as usize..max as usize + 1,
            _ => 0..0,
        }
    }

    /// Bytes of vertex `index` under the draw's vertex stride.
    pub fn vertex_bytes(&self, index: usize) -> &[u8] {
        let stride = self.vertex_stride as usize;
        &self.vertices[index * stride..(index + 1) * stride]
    }
}

#[derive(Debug)]
struct RecordedBuffer {
    kind: BufferKind,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct RecordedTexture {
    size: Option<(u32, u32)>,
    wrap: WrapMode,
    filter: (ScaleMode, ScaleMode),
}

#[derive(Debug)]
struct RecordedProgram {
    kind: ShaderKind,
    projection: Option<Matrix3>,
}

/// A CPU-only backend that records every call.
///
/// Buffer uploads are applied to in-memory copies so each recorded [`DrawCall`] can show the
/// exact vertex and index bytes it consumed. Useful for tests, benchmarks and for inspecting
/// how a scene batches without a GPU.
#[derive(Debug)]
pub struct RecordingBackend {
    context: ContextId,
    next_id: u64,
    buffers: HashMap<BufferId, RecordedBuffer>,
    textures: HashMap<TextureId, RecordedTexture>,
    programs: HashMap<ProgramId, RecordedProgram>,
    failing_programs: HashSet<ShaderKind>,
    bound_vertex_buffer: Option<BufferId>,
    bound_index_buffer: Option<BufferId>,
    bound_texture: Option<TextureId>,
    current_program: Option<ProgramId>,
    blend: BlendMode,
    layout: VertexLayout,
    render_target: Option<TextureId>,
    calls: Vec<GpuCall>,
    draws: Vec<DrawCall>,
    frames_ended: usize,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            context: ContextId::next(),
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            failing_programs: HashSet::new(),
            bound_vertex_buffer: None,
            bound_index_buffer: None,
            bound_texture: None,
            current_program: None,
            blend: BlendMode::default(),
            layout: VertexLayout::default(),
            render_target: None,
            calls: Vec::new(),
            draws: Vec::new(),
            frames_ended: 0,
        }
    }

    /// Makes `create_program(kind)` fail, as a driver rejecting the shader would.
    pub fn with_failing_program(mut self, kind: ShaderKind) -> Self {
        self.failing_programs.insert(kind);
        self
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Forgets recorded calls and draws while keeping every resource alive.
    pub fn clear_recording(&mut self) {
        self.calls.clear();
        self.draws.clear();
    }

    pub fn frames_ended(&self) -> usize {
        self.frames_ended
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|buffer| buffer.data.as_slice())
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_wrap(&self, texture: TextureId) -> Option<WrapMode> {
        self.textures.get(&texture).map(|texture| texture.wrap)
    }

    pub fn texture_filter(&self, texture: TextureId) -> Option<(ScaleMode, ScaleMode)> {
        self.textures.get(&texture).map(|texture| texture.filter)
    }

    pub fn current_layout(&self) -> &VertexLayout {
        &self.layout
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn snapshot(&self, buffer: Option<BufferId>) -> Rc<[u8]> {
        buffer
            .and_then(|buffer| self.buffers.get(&buffer))
            .map(|buffer| Rc::from(buffer.data.as_slice()))
            .unwrap_or_else(|| Rc::from(Vec::new()))
    }
}

impl GpuBackend for RecordingBackend {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn begin_frame(&mut self) {
        self.calls.push(GpuCall::BeginFrame);
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.calls.push(GpuCall::EndFrame);
        self.frames_ended += 1;
        Ok(())
    }

    fn create_buffer(&mut self, kind: BufferKind, usage: BufferUsage) -> BufferId {
        let buffer = BufferId(self.allocate_id());
        self.buffers.insert(
            buffer,
            RecordedBuffer {
                kind,
                data: Vec::new(),
            },
        );
        self.calls.push(GpuCall::CreateBuffer {
            buffer,
            kind,
            usage,
        });
        buffer
    }

    fn upload_buffer(&mut self, buffer: BufferId, bytes: &[u8]) {
        if let Some(recorded) = self.buffers.get_mut(&buffer) {
            recorded.data.clear();
            recorded.data.extend_from_slice(bytes);
        }
        self.calls.push(GpuCall::UploadBuffer {
            buffer,
            len: bytes.len(),
        });
    }

    fn upload_buffer_sub(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]) {
        if let Some(recorded) = self.buffers.get_mut(&buffer) {
            let end = offset + bytes.len();
            if recorded.data.len() < end {
                recorded.data.resize(end, 0);
            }
            recorded.data[offset..end].copy_from_slice(bytes);
        }
        self.calls.push(GpuCall::UploadBufferSub {
            buffer,
            offset,
            len: bytes.len(),
        });
    }

    fn bind_buffer(&mut self, buffer: BufferId) {
        match self.buffers.get(&buffer).map(|recorded| recorded.kind) {
            Some(BufferKind::Vertex) => self.bound_vertex_buffer = Some(buffer),
            Some(BufferKind::Index) => self.bound_index_buffer = Some(buffer),
            None => {}
        }
        self.calls.push(GpuCall::BindBuffer(buffer));
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        if self.bound_vertex_buffer == Some(buffer) {
            self.bound_vertex_buffer = None;
        }
        if self.bound_index_buffer == Some(buffer) {
            self.bound_index_buffer = None;
        }
        self.calls.push(GpuCall::DestroyBuffer(buffer));
    }

    fn create_texture(&mut self, format: TextureFormat) -> TextureId {
        let texture = TextureId(self.allocate_id());
        self.textures.insert(texture, RecordedTexture::default());
        self.calls.push(GpuCall::CreateTexture { texture, format });
        texture
    }

    fn bind_texture(&mut self, texture: TextureId, unit: Option<u32>) {
        self.bound_texture = Some(texture);
        self.calls.push(GpuCall::BindTexture { texture, unit });
    }

    fn upload_texture(&mut self, texture: TextureId, _pixels: &[u8], width: u32, height: u32) {
        if let Some(recorded) = self.textures.get_mut(&texture) {
            recorded.size = Some((width, height));
        }
        self.calls.push(GpuCall::UploadTexture {
            texture,
            width,
            height,
        });
    }

    fn set_texture_filter(&mut self, texture: TextureId, min: ScaleMode, mag: ScaleMode) {
        if let Some(recorded) = self.textures.get_mut(&texture) {
            recorded.filter = (min, mag);
        }
        self.calls
            .push(GpuCall::SetTextureFilter { texture, min, mag });
    }

    fn set_texture_wrap(&mut self, texture: TextureId, wrap: WrapMode) {
        if let Some(recorded) = self.textures.get_mut(&texture) {
            recorded.wrap = wrap;
        }
        self.calls.push(GpuCall::SetTextureWrap { texture, wrap });
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).and_then(|recorded| recorded.size)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        if self.bound_texture == Some(texture) {
            self.bound_texture = None;
        }
        self.calls.push(GpuCall::DestroyTexture(texture));
    }

    fn resize_render_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        if let Some(recorded) = self.textures.get_mut(&texture) {
            recorded.size = Some((width, height));
        }
        self.calls.push(GpuCall::ResizeRenderTexture {
            texture,
            width,
            height,
        });
    }

    fn create_program(&mut self, kind: ShaderKind) -> Result<ProgramId, BackendError> {
        if self.failing_programs.contains(&kind) {
            return Err(BackendError::ProgramCreation {
                kind,
                message: "rejected by the recording backend".to_string(),
            });
        }

        let program = ProgramId(self.allocate_id());
        self.programs.insert(
            program,
            RecordedProgram {
                kind,
                projection: None,
            },
        );
        self.calls.push(GpuCall::CreateProgram { program, kind });
        Ok(program)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.calls.push(GpuCall::UseProgram(program));
    }

    fn set_projection(&mut self, program: ProgramId, projection: &Matrix3) {
        if let Some(recorded) = self.programs.get_mut(&program) {
            recorded.projection = Some(*projection);
        }
        self.calls.push(GpuCall::SetProjection {
            program,
            projection: *projection,
        });
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        let kind = self.programs.get(&program)?.kind;
        crate::shaders::attribute_location(kind, name)
    }

    fn set_vertex_layout(&mut self, layout: &VertexLayout) {
        self.layout = layout.clone();
        self.calls.push(GpuCall::SetVertexLayout(layout.clone()));
    }

    fn set_render_target(&mut self, target: Option<TextureId>) {
        self.render_target = target;
        self.calls.push(GpuCall::SetRenderTarget(target));
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.calls.push(GpuCall::SetViewport {
            x,
            y,
            width,
            height,
        });
    }

    fn set_blend(&mut self, blend: BlendMode) {
        self.blend = blend;
        self.calls.push(GpuCall::SetBlend(blend));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(GpuCall::Clear(color));
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        let projection = self
            .current_program
            .and_then(|program| self.programs.get(&program))
            .and_then(|program| program.projection);

        self.draws.push(DrawCall {
            index_count,
            first_index,
            program: self.current_program,
            projection,
            texture: self.bound_texture,
            blend: self.blend,
            render_target: self.render_target,
            vertex_stride: self.layout.stride,
            vertices: self.snapshot(self.bound_vertex_buffer),
            indices: self.snapshot(self.bound_index_buffer),
        });
        self.calls.push(GpuCall::DrawIndexed {
            index_count,
            first_index,
        });
    }
}
