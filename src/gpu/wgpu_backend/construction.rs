use super::*;
use pipelines::{create_projection_bind_group_layout, create_texture_bind_group_layout};
use resources::create_offscreen_texture;

impl WgpuBackend {
    /// Creates a backend that presents to `window`.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| BackendError::AdapterUnavailable)?;
        let (device, queue) = adapter.request_device(&device_descriptor()).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Blending happens in gamma space, so prefer a format without sRGB encoding.
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(BackendError::IncompatibleSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        tracing::info!(
            "Created surface backend on {} ({format:?}, {}x{})",
            adapter.get_info().name,
            config.width,
            config.height
        );

        Ok(Self::from_device(
            instance,
            device,
            queue,
            Output::Surface { surface, config },
        ))
    }

    /// Creates a backend that renders into an offscreen texture, readable with
    /// [`WgpuBackend::read_pixels`].
    pub async fn new_headless(width: u32, height: u32) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| BackendError::AdapterUnavailable)?;
        let (device, queue) = adapter.request_device(&device_descriptor()).await?;

        let (width, height) = (width.max(1), height.max(1));
        let texture = create_offscreen_texture(&device, width, height);
        tracing::info!(
            "Created headless backend on {} ({width}x{height})",
            adapter.get_info().name
        );

        Ok(Self::from_device(
            instance,
            device,
            queue,
            Output::Offscreen {
                texture,
                width,
                height,
            },
        ))
    }

    /// Like [`WgpuBackend::new_headless`], but `None` when no adapter or device is available,
    /// so callers without a GPU (e.g. CI) can skip gracefully.
    pub async fn try_new_headless(width: u32, height: u32) -> Option<Self> {
        match Self::new_headless(width, height).await {
            Ok(backend) => Some(backend),
            Err(error) => {
                tracing::warn!("Headless backend unavailable: {error}");
                None
            }
        }
    }

    fn from_device(
        instance: wgpu::Instance,
        device: wgpu::Device,
        queue: wgpu::Queue,
        output: Output,
    ) -> Self {
        let projection_layout = create_projection_bind_group_layout(&device);
        let texture_layout = create_texture_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&projection_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let uniform_alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);

        Self {
            context: ContextId::next(),
            instance,
            device: Arc::new(device),
            queue: Arc::new(queue),
            output,
            uniform_alignment,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            shader_modules: HashMap::new(),
            projection_layout,
            texture_layout,
            pipeline_layout,
            pipelines: LruCache::new(PIPELINE_CACHE_SIZE),
            samplers: HashMap::new(),
            texture_bind_groups: HashMap::new(),
            bound_vertex_buffer: None,
            bound_index_buffer: None,
            bound_texture: None,
            current_program: None,
            blend: BlendMode::default(),
            layout: VertexLayout::default(),
            render_target: None,
            viewport: Viewport {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            },
            passes: Vec::new(),
            vertex_arena: Vec::new(),
            uniform_arena: Vec::new(),
            vertex_buffer: None,
            uniform_buffer: None,
            projection_bind_group: None,
            readback_buffer: None,
        }
    }
}

fn device_descriptor() -> wgpu::DeviceDescriptor<'static> {
    wgpu::DeviceDescriptor {
        label: Some("trellis_device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: Default::default(),
    }
}
