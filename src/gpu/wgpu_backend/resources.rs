use super::*;

pub(super) fn wgpu_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

fn filter_mode(mode: ScaleMode) -> wgpu::FilterMode {
    match mode {
        ScaleMode::Linear => wgpu::FilterMode::Linear,
        ScaleMode::Nearest => wgpu::FilterMode::Nearest,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

/// Pads `len` up to a multiple of `alignment`.
pub(super) fn align_to(len: u64, alignment: u64) -> u64 {
    len.div_ceil(alignment) * alignment
}

/// Creates a buffer big enough for `len` bytes, rounded up to wgpu's copy alignment.
pub(super) fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    len: u64,
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: align_to(len.max(wgpu::COPY_BUFFER_ALIGNMENT), wgpu::COPY_BUFFER_ALIGNMENT),
        usage,
        mapped_at_creation: false,
    })
}

/// Writes `bytes` at the start of `buffer`, padding the tail to the copy alignment.
pub(super) fn write_padded(queue: &wgpu::Queue, buffer: &wgpu::Buffer, bytes: &[u8]) {
    let aligned = align_to(bytes.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize;
    if aligned == bytes.len() {
        queue.write_buffer(buffer, 0, bytes);
    } else {
        let mut padded = Vec::with_capacity(aligned);
        padded.extend_from_slice(bytes);
        padded.resize(aligned, 0);
        queue.write_buffer(buffer, 0, &padded);
    }
}

impl WgpuBackend {
    /// Mirrors an index buffer's shadow to the GPU, growing the GPU buffer when needed.
    pub(super) fn sync_index_buffer(&mut self, buffer: BufferId) {
        let Some(shadow) = self.buffers.get_mut(&buffer) else {
            return;
        };
        if shadow.kind != BufferKind::Index || shadow.data.is_empty() {
            return;
        }

        let required = align_to(shadow.data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        let gpu = match &shadow.gpu {
            Some(gpu) if gpu.size() >= required => gpu.clone(),
            _ => {
                let gpu = Arc::new(create_buffer(
                    &self.device,
                    "index_buffer",
                    required,
                    wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                ));
                if let Some(previous) = shadow.gpu.replace(gpu.clone()) {
                    previous.destroy();
                }
                gpu
            }
        };
        write_padded(&self.queue, &gpu, &shadow.data);
    }

    /// (Re)allocates the storage of `texture`. Any cached bind group is dropped.
    pub(super) fn allocate_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        let Some(gpu) = self.textures.get_mut(&texture) else {
            warn!("Allocation of unknown texture {texture}");
            return;
        };
        if gpu
            .allocation
            .as_ref()
            .is_some_and(|allocation| allocation.width == width && allocation.height == height)
        {
            return;
        }

        let allocated = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_texture_format(gpu.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = allocated.create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(previous) = gpu.allocation.replace(TextureAllocation {
            texture: allocated,
            view,
            width,
            height,
        }) {
            previous.texture.destroy();
        }
        self.texture_bind_groups.remove(&texture);
    }

    pub(super) fn write_texture_pixels(
        &mut self,
        texture: TextureId,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() < expected {
            warn!(
                "Skipping upload of {} bytes to texture {texture} as {width}x{height} RGBA",
                pixels.len()
            );
            return;
        }

        self.allocate_texture(texture, width, height);
        let Some(allocation) = self
            .textures
            .get(&texture)
            .and_then(|gpu| gpu.allocation.as_ref())
        else {
            return;
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &allocation.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels[..expected],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// The cached texture + sampler bind group of `texture`, or `None` if it has no storage yet.
    pub(super) fn texture_bind_group(&mut self, texture: TextureId) -> Option<Arc<wgpu::BindGroup>> {
        if let Some(bind_group) = self.texture_bind_groups.get(&texture) {
            return Some(bind_group.clone());
        }

        let Self {
            device,
            textures,
            samplers,
            texture_layout,
            texture_bind_groups,
            ..
        } = self;
        let gpu = textures.get(&texture)?;
        let allocation = gpu.allocation.as_ref()?;
        let sampler = samplers
            .entry((gpu.min_filter, gpu.mag_filter, gpu.wrap))
            .or_insert_with(|| create_sampler(device, gpu.min_filter, gpu.mag_filter, gpu.wrap));

        let bind_group = Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_texture_bind_group"),
            layout: texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&allocation.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }));
        texture_bind_groups.insert(texture, bind_group.clone());
        Some(bind_group)
    }

    /// The offscreen output of a headless backend is recreated; a surface is reconfigured.
    pub(super) fn resize_output_to(&mut self, width: u32, height: u32) {
        if self.output.size() == (width, height) {
            return;
        }

        match &mut self.output {
            Output::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            Output::Offscreen {
                texture,
                width: current_width,
                height: current_height,
            } => {
                texture.destroy();
                *texture = create_offscreen_texture(&self.device, width, height);
                *current_width = width;
                *current_height = height;
                self.readback_buffer = None;
            }
        }
        tracing::debug!("Resized output to {width}x{height}");
    }
}

fn create_sampler(
    device: &wgpu::Device,
    min: ScaleMode,
    mag: ScaleMode,
    wrap: WrapMode,
) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("scene_sampler"),
        address_mode_u: address_mode(wrap),
        address_mode_v: address_mode(wrap),
        address_mode_w: address_mode(wrap),
        mag_filter: filter_mode(mag),
        min_filter: filter_mode(min),
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

pub(super) fn create_offscreen_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_output"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up_to_the_next_multiple() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(6, 4), 8);
        assert_eq!(align_to(48, 256), 256);
        assert_eq!(align_to(512, 256), 512);
    }

    #[test]
    fn texture_formats_map_to_unorm_variants() {
        assert_eq!(
            wgpu_texture_format(TextureFormat::Rgba8),
            wgpu::TextureFormat::Rgba8Unorm
        );
        assert_eq!(
            wgpu_texture_format(TextureFormat::Rgba8Srgb),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }
}
