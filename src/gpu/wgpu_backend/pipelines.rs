use std::borrow::Cow;

use super::*;
use crate::shaders;

/// Everything a render pipeline is specialized on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub(super) shader: ShaderKind,
    pub(super) blend: BlendMode,
    pub(super) layout: VertexLayout,
    pub(super) format: wgpu::TextureFormat,
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
    }
}

fn blend_state(blend: BlendMode) -> wgpu::BlendState {
    match blend {
        BlendMode::Normal => wgpu::BlendState::ALPHA_BLENDING,
        BlendMode::Premultiplied => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
    }
}

/// Group 0: the projection, read at a dynamic offset into the frame's uniform arena.
pub(super) fn create_projection_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("projection_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(PROJECTION_UNIFORM_SIZE),
            },
            count: None,
        }],
    })
}

/// Group 1: texture at binding 0, sampler at binding 1.
pub(super) fn create_texture_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("texture_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

impl WgpuBackend {
    /// Compiles the WGSL of `kind` once. Validation errors are captured and returned.
    pub(super) fn ensure_shader_module(&mut self, kind: ShaderKind) -> Result<(), BackendError> {
        if self.shader_modules.contains_key(&kind) {
            return Ok(());
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match kind {
                    ShaderKind::Sprite => "sprite_shader",
                    ShaderKind::Text => "text_shader",
                }),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shaders::source(kind))),
            });
        if let Some(error) = futures::executor::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::ProgramCreation {
                kind,
                message: error.to_string(),
            });
        }

        self.shader_modules.insert(kind, Arc::new(module));
        Ok(())
    }

    /// The render pipeline for `key`, built on first use.
    pub(super) fn pipeline(&mut self, key: &PipelineKey) -> Option<Arc<wgpu::RenderPipeline>> {
        if let Some(pipeline) = self.pipelines.get(key) {
            return Some(pipeline.clone());
        }

        let module = self.shader_modules.get(&key.shader)?.clone();
        let attributes: Vec<wgpu::VertexAttribute> = key
            .layout
            .attributes
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                format: vertex_format(attribute.format),
                offset: u64::from(attribute.offset),
                shader_location: attribute.location,
            })
            .collect();

        let pipeline = Arc::new(self.device.create_render_pipeline(
            &wgpu::RenderPipelineDescriptor {
                label: Some("scene_pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: u64::from(key.layout.stride),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: Some(blend_state(key.blend)),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            },
        ));

        tracing::debug!(
            "Built {:?} pipeline for {:?} with {:?} blending",
            key.shader,
            key.format,
            key.blend
        );
        self.pipelines.put(key.clone(), pipeline.clone());
        Some(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_blending_weights_by_source_alpha() {
        let color = blend_state(BlendMode::Normal).color;
        assert_eq!(color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn premultiplied_blending_adds_the_source() {
        let color = blend_state(BlendMode::Premultiplied).color;
        assert_eq!(color.src_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn attribute_formats_keep_their_sizes() {
        for format in [
            AttributeFormat::Float32x2,
            AttributeFormat::Float32x3,
            AttributeFormat::Unorm8x4,
        ] {
            assert_eq!(vertex_format(format).size(), u64::from(format.size()));
        }
    }
}
