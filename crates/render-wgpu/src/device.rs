use crate::plan::{self, FramePlan, PipelineKey, PlannedDraw, TargetKind, UNIFORM_SLOTS, Version};
use crate::shaders;
use shadowcast_render::{
    AddressMode, BufferId, CommandList, CompareFunction, CullMode, DepthStateId, DepthStencilDesc,
    DeviceError, FilterMode, HazardTracker, MeshData, MeshId, ProgramDesc, ProgramId,
    RasterizerDesc, RasterizerId, RenderDevice, RenderTarget, Resource, ResourceKind, SamplerDesc,
    SamplerId, Semantic, ShaderSource, ShadowMapId, TextureId, TexturePixels, VertexFormat,
};
use shadowcast_scene::TextureSource;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Size of the placeholder bound to constant-buffer slots nothing uses.
const NULL_BUFFER_SIZE: u64 = 512;

struct Program {
    desc: ProgramDesc,
    modules: HashMap<ShaderSource, wgpu::ShaderModule>,
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// A constant buffer laid out as `capacity` slots of `stride` bytes so each
/// upload of a frame gets its own dynamic offset.
struct UniformSlots {
    buffer: wgpu::Buffer,
    byte_size: u64,
    stride: u64,
    capacity: u64,
    last: Vec<u8>,
}

struct ShadowMap {
    _texture: wgpu::Texture,
    /// Written in the shadow pass.
    depth_view: wgpu::TextureView,
    /// Sampled with a comparison sampler in the main pass.
    sample_view: wgpu::TextureView,
}

struct Layouts {
    globals: wgpu::BindGroupLayout,
    surface: wgpu::BindGroupLayout,
    shadow: wgpu::BindGroupLayout,
    lit: wgpu::PipelineLayout,
    depth_only: wgpu::PipelineLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniform = |binding, visibility| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: None,
            },
            count: None,
        };
        let globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_layout"),
            entries: &[
                uniform(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                uniform(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let surface = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("surface_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
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
        });
        let shadow = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_map_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let lit = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit_pipeline_layout"),
            bind_group_layouts: &[&globals, &surface, &shadow],
            push_constant_ranges: &[],
        });
        let depth_only = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depth_only_pipeline_layout"),
            bind_group_layouts: &[&globals],
            push_constant_ranges: &[],
        });
        Self {
            globals,
            surface,
            shadow,
            lit,
            depth_only,
        }
    }
}

fn compare_function(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(address: AddressMode) -> wgpu::AddressMode {
    match address {
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
    }
}

fn shader_location(semantic: Semantic) -> u32 {
    match semantic {
        Semantic::Position => 0,
        Semantic::Normal => 1,
        Semantic::TexCoord => 2,
    }
}

fn present_mode(sync_interval: u32) -> wgpu::PresentMode {
    if sync_interval == 0 {
        wgpu::PresentMode::AutoNoVsync
    } else {
        wgpu::PresentMode::AutoVsync
    }
}

/// The present mode to switch to before acquiring the next frame, if any.
/// The surface cannot be reconfigured while a frame is held.
fn present_mode_change(current: wgpu::PresentMode, sync_interval: u32) -> Option<wgpu::PresentMode> {
    let mode = present_mode(sync_interval);
    (mode != current).then_some(mode)
}

fn align_to(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

fn load_pixels(source: &TextureSource) -> Result<TexturePixels, DeviceError> {
    if let Some(pixels) = TexturePixels::procedural(source) {
        return Ok(pixels);
    }
    let TextureSource::File { path } = source else {
        return Err(DeviceError::TextureLoad {
            texture: format!("{source:?}"),
            reason: "unsupported texture source".into(),
        });
    };
    let image = image::open(path).map_err(|e| DeviceError::TextureLoad {
        texture: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let rgba = image.to_rgba8();
    Ok(TexturePixels {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// [`RenderDevice`] on top of wgpu, presenting to a window surface.
pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    layouts: Layouts,
    null_buffer: wgpu::Buffer,
    uniform_alignment: u64,
    next_id: u32,
    programs: HashMap<ProgramId, Program>,
    meshes: HashMap<MeshId, GpuMesh>,
    textures: HashMap<TextureId, wgpu::TextureView>,
    buffers: HashMap<BufferId, UniformSlots>,
    samplers: HashMap<SamplerId, wgpu::Sampler>,
    rasterizers: HashMap<RasterizerId, RasterizerDesc>,
    depth_states: HashMap<DepthStateId, DepthStencilDesc>,
    shadow_maps: HashMap<ShadowMapId, ShadowMap>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    surface_groups: HashMap<(TextureId, SamplerId), wgpu::BindGroup>,
    shadow_groups: HashMap<(ShadowMapId, SamplerId), wgpu::BindGroup>,
    hazards: HazardTracker,
    /// Last requested present interval.
    sync_interval: u32,
}

impl WgpuDevice {
    /// Create a device presenting to `target`.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(target)
            .map_err(|e| DeviceError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| DeviceError::Unavailable("no compatible graphics adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("shadowcast_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| DeviceError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = Self::create_depth_texture(&device, config.width, config.height);
        let layouts = Layouts::new(&device);
        let null_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("null_uniform_buffer"),
            size: NULL_BUFFER_SIZE,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });
        let uniform_alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);

        tracing::info!(
            backend = ?adapter.get_info().backend,
            adapter = %adapter.get_info().name,
            ?format,
            "wgpu device ready"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            layouts,
            null_buffer,
            uniform_alignment,
            next_id: 0,
            programs: HashMap::new(),
            meshes: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            samplers: HashMap::new(),
            rasterizers: HashMap::new(),
            depth_states: HashMap::new(),
            shadow_maps: HashMap::new(),
            pipelines: HashMap::new(),
            surface_groups: HashMap::new(),
            shadow_groups: HashMap::new(),
            hazards: HazardTracker::new(),
            sync_interval: 1,
        })
    }

    /// Reconfigure the swapchain and back-buffer depth. Zero sizes (a
    /// minimized window) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = Self::create_depth_texture(&self.device, width, height);
        tracing::debug!(width, height, "surface resized");
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Run `create` inside a validation error scope.
    fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<(), DeviceError> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let missing = |what: &str| DeviceError::InvalidCommand(format!("{what} is not live"));
        let program = self.programs.get(&key.program).ok_or_else(|| missing("program"))?;
        let raster = *self
            .rasterizers
            .get(&key.rasterizer)
            .ok_or_else(|| missing("rasterizer state"))?;
        let depth = *self
            .depth_states
            .get(&key.depth_state)
            .ok_or_else(|| missing("depth-stencil state"))?;

        let desc = &program.desc;
        let vertex_module = program
            .modules
            .get(&desc.vertex.source)
            .ok_or_else(|| missing("vertex module"))?;
        let attributes: Vec<wgpu::VertexAttribute> = desc
            .layout
            .iter()
            .map(|element| wgpu::VertexAttribute {
                format: vertex_format(element.format),
                offset: u64::from(element.offset),
                shader_location: shader_location(element.semantic),
            })
            .collect();
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: u64::from(desc.stride),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];

        let color_targets = [Some(wgpu::ColorTargetState {
            format: self.config.format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let fragment = match (&desc.pixel, key.target) {
            (Some(pixel), TargetKind::BackBuffer) => {
                let module = program
                    .modules
                    .get(&pixel.source)
                    .ok_or_else(|| missing("pixel module"))?;
                Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(pixel.entry),
                    compilation_options: Default::default(),
                    targets: &color_targets,
                })
            }
            _ => None,
        };
        let layout = if fragment.is_some() {
            &self.layouts.lit
        } else {
            &self.layouts.depth_only
        };
        let cull_mode = match raster.cull {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        };

        let label = format!("{}_{:?}", desc.label, key.target);
        let pipeline = self
            .scoped(|device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&label),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module: vertex_module,
                        entry_point: Some(desc.vertex.entry),
                        compilation_options: Default::default(),
                        buffers: &buffers,
                    },
                    fragment,
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        front_face: wgpu::FrontFace::Cw,
                        cull_mode,
                        ..Default::default()
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: depth.depth_write,
                        depth_compare: if depth.depth_test {
                            compare_function(depth.compare)
                        } else {
                            wgpu::CompareFunction::Always
                        },
                        stencil: Default::default(),
                        bias: wgpu::DepthBiasState {
                            constant: raster.depth_bias,
                            slope_scale: raster.slope_scaled_depth_bias,
                            clamp: 0.0,
                        },
                    }),
                    multisample: Default::default(),
                    multiview: None,
                    cache: None,
                })
            })
            .map_err(|reason| DeviceError::ShaderCompile {
                label: label.clone(),
                reason,
            })?;
        tracing::debug!(pipeline = %label, "pipeline created");
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Lay out this frame's uploads at dynamic offsets and write them.
    /// Returns the byte offset of each (buffer, version) pair.
    fn upload(&mut self, plan: &mut FramePlan) -> Result<HashMap<(BufferId, Version), u32>, DeviceError> {
        let mut offsets = HashMap::new();
        for buffer_id in plan.bound_buffers() {
            let reads_previous = plan.reads_previous(buffer_id);
            let versions = plan.uploads.remove(&buffer_id).unwrap_or_default();
            let slots = self.buffers.get_mut(&buffer_id).ok_or_else(|| {
                DeviceError::InvalidCommand(format!("buffer {} is not live", buffer_id.0))
            })?;
            if versions.iter().any(|v| v.len() as u64 != slots.byte_size) {
                return Err(DeviceError::InvalidCommand(format!(
                    "upload to buffer {} is not {} bytes",
                    buffer_id.0, slots.byte_size
                )));
            }

            let needed = versions.len() as u64 + u64::from(reads_previous);
            if needed > slots.capacity {
                let capacity = needed.next_power_of_two();
                slots.buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("constant_buffer"),
                    size: capacity * slots.stride,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                slots.capacity = capacity;
                tracing::debug!(buffer = buffer_id.0, capacity, "constant buffer grown");
            }

            let mut staging = vec![0u8; (needed * slots.stride) as usize];
            for (index, data) in versions.iter().enumerate() {
                let start = index * slots.stride as usize;
                staging[start..start + data.len()].copy_from_slice(data);
                offsets.insert(
                    (buffer_id, Version::Uploaded(index)),
                    (index as u64 * slots.stride) as u32,
                );
            }
            if reads_previous {
                let index = versions.len();
                let start = index * slots.stride as usize;
                staging[start..start + slots.last.len()].copy_from_slice(&slots.last);
                offsets.insert(
                    (buffer_id, Version::Previous),
                    (index as u64 * slots.stride) as u32,
                );
            }
            if !staging.is_empty() {
                self.queue.write_buffer(&slots.buffer, 0, &staging);
            }
            if let Some(latest) = versions.into_iter().last() {
                slots.last = latest;
            }
        }
        Ok(offsets)
    }

    fn globals_group(&self, draw: &PlannedDraw) -> Result<wgpu::BindGroup, DeviceError> {
        let mut entries = Vec::with_capacity(UNIFORM_SLOTS);
        for (binding, slot) in draw.uniforms.iter().enumerate() {
            let (buffer, size) = match slot {
                Some((id, _)) => {
                    let slots = self.buffers.get(id).ok_or_else(|| {
                        DeviceError::InvalidCommand(format!("buffer {} is not live", id.0))
                    })?;
                    (&slots.buffer, slots.byte_size)
                }
                None => (&self.null_buffer, NULL_BUFFER_SIZE),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(size),
                }),
            });
        }
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bind_group"),
            layout: &self.layouts.globals,
            entries: &entries,
        }))
    }

    fn ensure_material_groups(&mut self, draw: &PlannedDraw) -> Result<(), DeviceError> {
        let missing = |what: &str| DeviceError::InvalidCommand(format!("{what} is not live"));
        let (texture, sampler) = draw
            .texture
            .ok_or_else(|| DeviceError::InvalidCommand("lit draw without a texture".into()))?;
        let (shadow_map, shadow_sampler) = draw
            .shadow
            .ok_or_else(|| DeviceError::InvalidCommand("lit draw without a shadow map".into()))?;

        if !self.surface_groups.contains_key(&(texture, sampler)) {
            let view = self.textures.get(&texture).ok_or_else(|| missing("texture"))?;
            let sampler_obj = self.samplers.get(&sampler).ok_or_else(|| missing("sampler"))?;
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("surface_bind_group"),
                layout: &self.layouts.surface,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler_obj),
                    },
                ],
            });
            self.surface_groups.insert((texture, sampler), group);
        }

        if !self.shadow_groups.contains_key(&(shadow_map, shadow_sampler)) {
            let map = self
                .shadow_maps
                .get(&shadow_map)
                .ok_or_else(|| missing("shadow map"))?;
            let sampler_obj = self
                .samplers
                .get(&shadow_sampler)
                .ok_or_else(|| missing("comparison sampler"))?;
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("shadow_bind_group"),
                layout: &self.layouts.shadow,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&map.sample_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler_obj),
                    },
                ],
            });
            self.shadow_groups.insert((shadow_map, shadow_sampler), group);
        }
        Ok(())
    }

    /// Must run before `get_current_texture`.
    fn apply_sync_interval(&mut self, sync_interval: u32) {
        if sync_interval > 1 && self.sync_interval != sync_interval {
            tracing::warn!(
                sync_interval,
                "wgpu presents on every vblank at most; interval treated as 1"
            );
        }
        self.sync_interval = sync_interval;
        if let Some(mode) = present_mode_change(self.config.present_mode, sync_interval) {
            self.config.present_mode = mode;
            self.surface.configure(&self.device, &self.config);
            tracing::debug!(?mode, "present mode changed");
        }
    }
}

impl RenderDevice for WgpuDevice {
    fn is_valid(&self) -> bool {
        self.config.width > 0 && self.config.height > 0
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        if !desc.layout_is_consistent() {
            return Err(DeviceError::ShaderCompile {
                label: desc.label.into(),
                reason: "vertex layout elements overlap or exceed the stride".into(),
            });
        }
        let mut modules = HashMap::new();
        let sources = std::iter::once(desc.vertex.source).chain(desc.pixel.as_ref().map(|p| p.source));
        for source in sources {
            if modules.contains_key(&source) {
                continue;
            }
            let module = self
                .scoped(|device| {
                    device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(desc.label),
                        source: wgpu::ShaderSource::Wgsl(shaders::source(source).into()),
                    })
                })
                .map_err(|reason| DeviceError::ShaderCompile {
                    label: desc.label.into(),
                    reason,
                })?;
            modules.insert(source, module);
        }
        let id = ProgramId(self.allocate());
        self.programs.insert(
            id,
            Program {
                desc: desc.clone(),
                modules,
            },
        );
        tracing::debug!(program = desc.label, "program compiled");
        Ok(id)
    }

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, DeviceError> {
        if mesh.indices.is_empty() {
            return Err(DeviceError::Allocation {
                kind: ResourceKind::Mesh,
                reason: format!("mesh '{}' has no indices", mesh.label),
            });
        }
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(mesh.label),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(mesh.label),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let id = MeshId(self.allocate());
        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.index_count(),
            },
        );
        Ok(id)
    }

    fn create_texture(&mut self, source: &TextureSource) -> Result<TextureId, DeviceError> {
        let pixels = load_pixels(source)?;
        let texture = self
            .scoped(|device| {
                device.create_texture_with_data(
                    &self.queue,
                    &wgpu::TextureDescriptor {
                        label: Some("surface_texture"),
                        size: wgpu::Extent3d {
                            width: pixels.width,
                            height: pixels.height,
                            depth_or_array_layers: 1,
                        },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: wgpu::TextureFormat::Rgba8UnormSrgb,
                        usage: wgpu::TextureUsages::TEXTURE_BINDING,
                        view_formats: &[],
                    },
                    wgpu::util::TextureDataOrder::LayerMajor,
                    &pixels.rgba,
                )
            })
            .map_err(|reason| DeviceError::Allocation {
                kind: ResourceKind::Texture,
                reason,
            })?;
        let id = TextureId(self.allocate());
        self.textures
            .insert(id, texture.create_view(&Default::default()));
        Ok(id)
    }

    fn create_buffer(&mut self, byte_size: u64) -> Result<BufferId, DeviceError> {
        if byte_size == 0 || byte_size % 16 != 0 {
            return Err(DeviceError::Allocation {
                kind: ResourceKind::Buffer,
                reason: format!("constant buffer size {byte_size} is not a positive multiple of 16"),
            });
        }
        let stride = align_to(byte_size, self.uniform_alignment);
        let capacity = 4;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("constant_buffer"),
            size: capacity * stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = BufferId(self.allocate());
        self.buffers.insert(
            id,
            UniformSlots {
                buffer,
                byte_size,
                stride,
                capacity,
                last: vec![0; byte_size as usize],
            },
        );
        Ok(id)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, DeviceError> {
        let address = address_mode(desc.address);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(if desc.compare.is_some() {
                "comparison_sampler"
            } else {
                "surface_sampler"
            }),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter_mode(desc.filter),
            min_filter: filter_mode(desc.filter),
            compare: desc.compare.map(compare_function),
            ..Default::default()
        });
        let id = SamplerId(self.allocate());
        self.samplers.insert(id, sampler);
        Ok(id)
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<RasterizerId, DeviceError> {
        let id = RasterizerId(self.allocate());
        self.rasterizers.insert(id, *desc);
        Ok(id)
    }

    fn create_depth_state(&mut self, desc: &DepthStencilDesc) -> Result<DepthStateId, DeviceError> {
        let id = DepthStateId(self.allocate());
        self.depth_states.insert(id, *desc);
        Ok(id)
    }

    fn create_shadow_map(&mut self, size: u32) -> Result<ShadowMapId, DeviceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if size == 0 || size > max {
            return Err(DeviceError::Allocation {
                kind: ResourceKind::ShadowMap,
                reason: format!("shadow map size {size} outside 1..={max}"),
            });
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow_map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow_map_depth_view"),
            ..Default::default()
        });
        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow_map_sample_view"),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });
        let id = ShadowMapId(self.allocate());
        self.shadow_maps.insert(
            id,
            ShadowMap {
                _texture: texture,
                depth_view,
                sample_view,
            },
        );
        Ok(id)
    }

    fn execute(&mut self, commands: &CommandList) -> Result<(), DeviceError> {
        let mut plan = plan::plan(commands)?;
        self.hazards.validate(commands)?;

        let draws: Vec<PlannedDraw> = plan.passes.iter().flat_map(|p| p.draws.clone()).collect();
        for draw in &draws {
            self.ensure_pipeline(draw.pipeline)?;
            if self.samples_materials(draw) {
                self.ensure_material_groups(draw)?;
            }
        }
        let offsets = self.upload(&mut plan)?;

        let presents_to_surface = plan
            .passes
            .iter()
            .any(|p| p.target == RenderTarget::BackBuffer);
        if let Some(sync_interval) = plan.present {
            self.apply_sync_interval(sync_interval);
        }
        let frame = if presents_to_surface {
            match self.surface.get_current_texture() {
                Ok(frame) => Some(frame),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    self.surface.configure(&self.device, &self.config);
                    tracing::warn!("surface lost or outdated; frame skipped");
                    return Ok(());
                }
                Err(e) => return Err(DeviceError::Surface(e.to_string())),
            }
        } else {
            None
        };
        let frame_view = frame
            .as_ref()
            .map(|f| f.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        for pass_plan in &plan.passes {
            let depth_ops = wgpu::Operations {
                load: pass_plan
                    .clear_depth
                    .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                store: wgpu::StoreOp::Store,
            };
            let (color_view, depth_view) = match pass_plan.target {
                RenderTarget::ShadowMap(id) => {
                    let map = self.shadow_maps.get(&id).ok_or_else(|| {
                        DeviceError::InvalidCommand(format!("shadow map {} is not live", id.0))
                    })?;
                    (None, &map.depth_view)
                }
                RenderTarget::BackBuffer => (frame_view.as_ref(), &self.depth_view),
            };
            let color_attachment = color_view.map(|view| wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match pass_plan.clear_color {
                        Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                            r: r.into(),
                            g: g.into(),
                            b: b.into(),
                            a: a.into(),
                        }),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
            });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(match pass_plan.target {
                    RenderTarget::ShadowMap(_) => "shadow_pass",
                    RenderTarget::BackBuffer => "main_pass",
                }),
                color_attachments: &[color_attachment],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(depth_ops),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in &pass_plan.draws {
                let (Some(pipeline), Some(mesh)) =
                    (self.pipelines.get(&draw.pipeline), self.meshes.get(&draw.mesh))
                else {
                    return Err(DeviceError::InvalidCommand(format!(
                        "mesh {} or its pipeline is not live",
                        draw.mesh.0
                    )));
                };
                pass.set_pipeline(pipeline);
                if let Some(vp) = draw.viewport {
                    pass.set_viewport(vp.x, vp.y, vp.width, vp.height, vp.min_depth, vp.max_depth);
                }

                let globals = self.globals_group(draw)?;
                let dynamic_offsets: Vec<u32> = draw
                    .uniforms
                    .iter()
                    .map(|slot| slot.and_then(|key| offsets.get(&key).copied()).unwrap_or(0))
                    .collect();
                pass.set_bind_group(0, &globals, &dynamic_offsets);

                if self.samples_materials(draw) {
                    let (Some(texture), Some(shadow)) = (draw.texture, draw.shadow) else {
                        return Err(DeviceError::InvalidCommand(
                            "lit draw without texture and shadow map".into(),
                        ));
                    };
                    if let (Some(surface_group), Some(shadow_group)) =
                        (self.surface_groups.get(&texture), self.shadow_groups.get(&shadow))
                    {
                        pass.set_bind_group(1, surface_group, &[]);
                        pass.set_bind_group(2, shadow_group, &[]);
                    }
                }

                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));

        if let (Some(_), Some(frame)) = (plan.present, frame) {
            frame.present();
        }
        Ok(())
    }

    fn release(&mut self, resource: Resource) {
        let known = match resource {
            Resource::Program(id) => {
                self.pipelines.retain(|key, _| key.program != id);
                self.programs.remove(&id).is_some()
            }
            Resource::Mesh(id) => self.meshes.remove(&id).is_some(),
            Resource::Texture(id) => {
                self.surface_groups.retain(|(texture, _), _| *texture != id);
                self.textures.remove(&id).is_some()
            }
            Resource::Buffer(id) => self.buffers.remove(&id).is_some(),
            Resource::Sampler(id) => {
                self.surface_groups.retain(|(_, sampler), _| *sampler != id);
                self.shadow_groups.retain(|(_, sampler), _| *sampler != id);
                self.samplers.remove(&id).is_some()
            }
            Resource::Rasterizer(id) => {
                self.pipelines.retain(|key, _| key.rasterizer != id);
                self.rasterizers.remove(&id).is_some()
            }
            Resource::DepthState(id) => {
                self.pipelines.retain(|key, _| key.depth_state != id);
                self.depth_states.remove(&id).is_some()
            }
            Resource::ShadowMap(id) => {
                self.shadow_groups.retain(|(map, _), _| *map != id);
                self.shadow_maps.remove(&id).is_some()
            }
        };
        if !known {
            tracing::warn!(kind = %resource.kind(), id = resource.raw(), "release of unknown resource ignored");
        }
    }
}

impl WgpuDevice {
    /// Whether the draw runs with a fragment stage and so needs the texture
    /// and shadow bind groups.
    fn samples_materials(&self, draw: &PlannedDraw) -> bool {
        draw.pipeline.target == TargetKind::BackBuffer
            && self
                .programs
                .get(&draw.pipeline.program)
                .is_some_and(|p| p.desc.pixel.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_offset_stride() {
        assert_eq!(align_to(320, 256), 512);
        assert_eq!(align_to(400, 256), 512);
        assert_eq!(align_to(256, 256), 256);
    }

    #[test]
    fn sync_interval_selects_present_mode() {
        assert_eq!(present_mode(0), wgpu::PresentMode::AutoNoVsync);
        assert_eq!(present_mode(1), wgpu::PresentMode::AutoVsync);
    }

    #[test]
    fn present_mode_switches_only_on_change() {
        use wgpu::PresentMode::{AutoNoVsync, AutoVsync};
        assert_eq!(present_mode_change(AutoVsync, 0), Some(AutoNoVsync));
        assert_eq!(present_mode_change(AutoNoVsync, 0), None);
        assert_eq!(present_mode_change(AutoNoVsync, 1), Some(AutoVsync));
        assert_eq!(present_mode_change(AutoVsync, 1), None);
        assert_eq!(present_mode_change(AutoVsync, 4), None);
    }

    #[test]
    fn procedural_textures_skip_decoding() {
        let pixels = load_pixels(&TextureSource::Solid {
            color: [9, 8, 7, 6],
        })
        .unwrap();
        assert_eq!((pixels.width, pixels.height), (1, 1));
    }

    #[test]
    fn missing_file_is_texture_load_error() {
        let result = load_pixels(&TextureSource::File {
            path: "/nonexistent/shadowcast.png".into(),
        });
        assert!(matches!(result, Err(DeviceError::TextureLoad { .. })));
    }

    #[test]
    fn semantics_map_to_shader_locations() {
        let locations: Vec<u32> = shadowcast_render::Vertex::layout()
            .iter()
            .map(|e| shader_location(e.semantic))
            .collect();
        assert_eq!(locations, vec![0, 1, 2]);
    }
}
