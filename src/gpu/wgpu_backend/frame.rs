use super::*;
use resources::{align_to, create_buffer, write_padded};

/// Vertex buffer offsets must be multiples of this.
const VERTEX_OFFSET_ALIGNMENT: u64 = 4;

/// A recorded draw with every wgpu object it needs.
struct PreparedDraw {
    pipeline: Arc<wgpu::RenderPipeline>,
    texture: Arc<wgpu::BindGroup>,
    index_buffer: Arc<wgpu::Buffer>,
    vertex_offset: u64,
    uniform_offset: u32,
    indices: Range<u32>,
    viewport: Viewport,
}

struct PreparedPass {
    target: Option<TextureId>,
    clear: Option<wgpu::Color>,
    draws: Vec<PreparedDraw>,
}

/// Highest vertex index read by `indices` of a `u16` index buffer, plus one.
fn referenced_vertex_count(index_bytes: &[u8], indices: &Range<u32>) -> usize {
    index_bytes
        .chunks_exact(2)
        .skip(indices.start as usize)
        .take(indices.len())
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as usize + 1)
        .max()
        .unwrap_or(0)
}

/// Clamps `viewport` to a `width` x `height` target. `None` when nothing remains visible.
fn clamp_viewport(viewport: Viewport, width: u32, height: u32) -> Option<Viewport> {
    if viewport.x >= width || viewport.y >= height {
        return None;
    }
    let clamped = Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width.min(width - viewport.x),
        height: viewport.height.min(height - viewport.y),
    };
    (clamped.width > 0 && clamped.height > 0).then_some(clamped)
}

impl WgpuBackend {
    pub(super) fn reset_frame(&mut self) {
        self.passes.clear();
        self.vertex_arena.clear();
        self.uniform_arena.clear();
        for shadow in self.buffers.values_mut() {
            shadow.snapshot = None;
        }
        for program in self.programs.values_mut() {
            program.uniform_offset = None;
        }
    }

    /// Captures the bound state of a draw. Draws missing a program, buffer or texture are
    /// dropped with a warning.
    pub(super) fn record_draw(&mut self, index_count: u32, first_index: u32) -> Option<DrawCommand> {
        if index_count == 0 {
            return None;
        }
        let (Some(program), Some(vertex_buffer), Some(index_buffer), Some(texture)) = (
            self.current_program,
            self.bound_vertex_buffer,
            self.bound_index_buffer,
            self.bound_texture,
        ) else {
            warn!("Dropping draw issued without a program, buffers and a texture bound");
            return None;
        };

        let indices = first_index..first_index + index_count;
        let vertex_count = {
            let index_data = &self.buffers.get(&index_buffer)?.data;
            if (indices.end as usize) * 2 > index_data.len() {
                warn!(
                    "Dropping draw of indices {indices:?} past the end of index buffer {index_buffer}"
                );
                return None;
            }
            referenced_vertex_count(index_data, &indices)
        };
        let stride = self.layout.stride as usize;
        let vertex_offset = self.snapshot_vertices(vertex_buffer, vertex_count * stride)?;
        let uniform_offset = self.projection_slot(program)?;
        let shader = self.programs.get(&program)?.kind;

        Some(DrawCommand {
            pipeline: PipelineKey {
                shader,
                blend: self.blend,
                layout: self.layout.clone(),
                format: self.target_format(self.render_target),
            },
            texture,
            vertex_offset,
            index_buffer,
            indices,
            uniform_offset,
            viewport: self.viewport,
        })
    }

    /// Arena offset of the first `len` bytes of `buffer`, copying them unless a large enough
    /// snapshot was taken since the buffer was last written.
    fn snapshot_vertices(&mut self, buffer: BufferId, len: usize) -> Option<u64> {
        let shadow = self.buffers.get_mut(&buffer)?;
        if let Some((offset, snapshot_len)) = shadow.snapshot {
            if snapshot_len >= len {
                return Some(offset);
            }
        }

        let len = len.min(shadow.data.len());
        let offset = align_to(self.vertex_arena.len() as u64, VERTEX_OFFSET_ALIGNMENT);
        self.vertex_arena.resize(offset as usize, 0);
        self.vertex_arena.extend_from_slice(&shadow.data[..len]);
        shadow.snapshot = Some((offset, len));
        Some(offset)
    }

    /// Uniform arena offset holding the projection of `program`, appending it when it changed.
    fn projection_slot(&mut self, program: ProgramId) -> Option<u32> {
        let program = self.programs.get_mut(&program)?;
        if let Some(offset) = program.uniform_offset {
            return Some(offset);
        }

        let offset = align_to(self.uniform_arena.len() as u64, self.uniform_alignment);
        self.uniform_arena.resize(offset as usize, 0);
        self.uniform_arena
            .extend_from_slice(bytemuck::cast_slice(&program.projection.to_padded_columns()));
        let offset = offset as u32;
        program.uniform_offset = Some(offset);
        Some(offset)
    }

    /// Uploads both arenas into GPU buffers, growing them as needed.
    fn upload_arenas(&mut self) {
        let vertex_len = self.vertex_arena.len() as u64;
        if vertex_len > 0 {
            if self
                .vertex_buffer
                .as_ref()
                .is_none_or(|buffer| buffer.size() < align_to(vertex_len, wgpu::COPY_BUFFER_ALIGNMENT))
            {
                self.vertex_buffer = Some(create_buffer(
                    &self.device,
                    "vertex_arena",
                    vertex_len.next_power_of_two(),
                    wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                ));
            }
            if let Some(buffer) = &self.vertex_buffer {
                write_padded(&self.queue, buffer, &self.vertex_arena);
            }
        }

        // Every slot is read as a whole binding, so the last one needs its full size too.
        let uniform_len = (self.uniform_arena.len() as u64).max(PROJECTION_UNIFORM_SIZE);
        if self
            .uniform_buffer
            .as_ref()
            .is_none_or(|buffer| buffer.size() < uniform_len)
        {
            let buffer = create_buffer(
                &self.device,
                "projection_arena",
                align_to(uniform_len, self.uniform_alignment),
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            );
            self.projection_bind_group = Some(self.device.create_bind_group(
                &wgpu::BindGroupDescriptor {
                    label: Some("projection_bind_group"),
                    layout: &self.projection_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &buffer,
                            offset: 0,
                            size: wgpu::BufferSize::new(PROJECTION_UNIFORM_SIZE),
                        }),
                    }],
                },
            ));
            self.uniform_buffer = Some(buffer);
        }
        if let (Some(buffer), false) = (&self.uniform_buffer, self.uniform_arena.is_empty()) {
            write_padded(&self.queue, buffer, &self.uniform_arena);
        }
    }

    /// Resolves the recorded passes to pipelines, bind groups and GPU buffers.
    fn prepare_passes(&mut self) -> Vec<PreparedPass> {
        let passes = std::mem::take(&mut self.passes);
        let mut prepared = Vec::with_capacity(passes.len());

        for pass in passes {
            let mut draws = Vec::with_capacity(pass.draws.len());
            for draw in pass.draws {
                let Some(pipeline) = self.pipeline(&draw.pipeline) else {
                    warn!("No {:?} program for a recorded draw", draw.pipeline.shader);
                    continue;
                };
                let Some(texture) = self.texture_bind_group(draw.texture) else {
                    warn!("Skipping draw of texture {} without storage", draw.texture);
                    continue;
                };
                let Some(index_buffer) = self
                    .buffers
                    .get(&draw.index_buffer)
                    .and_then(|shadow| shadow.gpu.clone())
                else {
                    continue;
                };

                draws.push(PreparedDraw {
                    pipeline,
                    texture,
                    index_buffer,
                    vertex_offset: draw.vertex_offset,
                    uniform_offset: draw.uniform_offset,
                    indices: draw.indices,
                    viewport: draw.viewport,
                });
            }

            if pass.clear.is_some() || !draws.is_empty() {
                prepared.push(PreparedPass {
                    target: pass.target,
                    clear: pass.clear,
                    draws,
                });
            }
        }

        prepared
    }

    /// Encodes and submits the frame. A lost or outdated surface is reconfigured and the
    /// frame dropped.
    pub(super) fn submit_frame(&mut self) -> Result<(), BackendError> {
        let passes = self.prepare_passes();
        self.upload_arenas();

        let surface_texture = match &self.output {
            Output::Surface { surface, config } => match surface.get_current_texture() {
                Ok(frame) => Some(frame),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    surface.configure(&self.device, config);
                    warn!("Surface lost or outdated; reconfigured and dropped the frame");
                    return Ok(());
                }
                Err(error) => return Err(error.into()),
            },
            Output::Offscreen { .. } => None,
        };
        let output_view = match (&surface_texture, &self.output) {
            (Some(frame), _) => frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            (None, Output::Offscreen { texture, .. }) => {
                texture.create_view(&wgpu::TextureViewDescriptor::default())
            }
            (None, Output::Surface { .. }) => return Ok(()),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        for pass in &passes {
            let (view, (width, height)) = match pass.target {
                None => (&output_view, self.output.size()),
                Some(target) => match self
                    .textures
                    .get(&target)
                    .and_then(|gpu| gpu.allocation.as_ref())
                {
                    Some(allocation) => {
                        (&allocation.view, (allocation.width, allocation.height))
                    }
                    None => {
                        warn!("Skipping pass into render texture {target} without storage");
                        continue;
                    }
                },
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match pass.clear {
                            Some(color) => wgpu::LoadOp::Clear(color),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let (Some(vertex_buffer), Some(projection)) =
                (&self.vertex_buffer, &self.projection_bind_group)
            else {
                continue;
            };
            for draw in &pass.draws {
                let Some(viewport) = clamp_viewport(draw.viewport, width, height) else {
                    continue;
                };
                render_pass.set_viewport(
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.width as f32,
                    viewport.height as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_pipeline(&draw.pipeline);
                render_pass.set_bind_group(0, projection, &[draw.uniform_offset]);
                render_pass.set_bind_group(1, draw.texture.as_ref(), &[]);
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(draw.vertex_offset..));
                render_pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(draw.indices.clone(), 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(frame) = surface_texture {
            frame.present();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_vertex_count_covers_the_highest_index_in_range() {
        let indices: Vec<u16> = vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7];
        let bytes: &[u8] = bytemuck::cast_slice(&indices);

        assert_eq!(referenced_vertex_count(bytes, &(0..6)), 4);
        assert_eq!(referenced_vertex_count(bytes, &(0..12)), 8);
        assert_eq!(referenced_vertex_count(bytes, &(6..9)), 7);
        assert_eq!(referenced_vertex_count(bytes, &(3..3)), 0);
    }

    #[test]
    fn viewport_is_clamped_to_the_target() {
        let viewport = Viewport {
            x: 10,
            y: 0,
            width: 200,
            height: 50,
        };
        assert_eq!(
            clamp_viewport(viewport, 100, 100),
            Some(Viewport {
                x: 10,
                y: 0,
                width: 90,
                height: 50,
            })
        );
        assert_eq!(clamp_viewport(viewport, 10, 100), None);
    }
}
