use crate::command::{
    Command, CommandList, LIGHTS_SLOT, PER_OBJECT_SLOT, RenderTarget, SHADOW_MAP_SLOT,
    ShaderStage, TEXTURE_SLOT, Viewport,
};
use crate::config::{ConfigError, RendererConfig};
use crate::constant_buffer::ConstantBuffer;
use crate::device::{DeviceError, RenderDevice};
use crate::error::{InitStage, RenderError};
use crate::ids::{
    DepthStateId, ProgramId, RasterizerId, Resource, ResourceKind, SamplerId, ShadowMapId,
};
use crate::mesh::MeshData;
use crate::program::ProgramDesc;
use crate::records::{LightRecord, PerObjectRecord};
use crate::registry::ResourceRegistry;
use crate::shadow::LightSpace;
use crate::state::{DepthStencilDesc, RasterizerDesc, SamplerDesc};
use serde::Serialize;
use shadowcast_input::InputState;
use shadowcast_scene::{Camera, MAX_LIGHTS, MeshHandle, Primitive, Scene, TextureHandle};
use std::collections::BTreeSet;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    /// Every GPU resource exists; no frame rendered yet.
    Resourced,
    Rendering,
    /// Initialization aborted. Whatever was created stays owned until
    /// `release` or the next `initialize`.
    Failed,
    Released,
}

/// Summary of one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    /// One-based index of the frame.
    pub frame: u64,
    pub draw_calls: u32,
    pub uploads: u32,
}

/// Device objects the frame loop binds by id.
#[derive(Debug, Clone, Copy)]
struct Pipeline {
    lit_program: ProgramId,
    shadow_program: ProgramId,
    texture_sampler: SamplerId,
    shadow_sampler: SamplerId,
    standard_rasterizer: RasterizerId,
    shadow_rasterizer: RasterizerId,
    depth_state: DepthStateId,
    shadow_map: ShadowMapId,
}

fn failed_at(stage: InitStage) -> impl FnOnce(DeviceError) -> RenderError {
    move |source| RenderError::Initialization { stage, source }
}

/// Two-pass shadow-mapped renderer.
///
/// The device is borrowed per call; the renderer owns the scene and every
/// resource it created on the device, and frees them in `release`.
pub struct Renderer {
    config: RendererConfig,
    state: RendererState,
    scene: Scene,
    registry: ResourceRegistry,
    /// Every resource created on the device except the constant buffers.
    owned: Vec<Resource>,
    per_object: Option<ConstantBuffer<PerObjectRecord>>,
    lights: Option<ConstantBuffer<LightRecord>>,
    pipeline: Option<Pipeline>,
    frame: u64,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        let camera = Camera::from_settings(&config.camera);
        Self {
            config,
            state: RendererState::Uninitialized,
            scene: Scene::new(camera),
            registry: ResourceRegistry::new(),
            owned: Vec::new(),
            per_object: None,
            lights: None,
            pipeline: None,
            frame: 0,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Number of device resources currently owned, constant buffers included.
    pub fn owned_resource_count(&self) -> usize {
        self.owned.len()
            + self.per_object.as_ref().map_or(0, |cb| cb.is_live() as usize)
            + self.lights.as_ref().map_or(0, |cb| cb.is_live() as usize)
    }

    /// Build the scene and create every GPU resource, in stage order.
    ///
    /// Any failure aborts: nothing is rolled back, the renderer moves to
    /// [`RendererState::Failed`] and will not render.
    pub fn initialize<D: RenderDevice>(&mut self, device: &mut D) -> Result<(), RenderError> {
        match self.state {
            RendererState::Resourced | RendererState::Rendering => {
                return Err(RenderError::AlreadyInitialized);
            }
            RendererState::Released => return Err(RenderError::Released),
            RendererState::Failed => self.free_resources(device),
            RendererState::Uninitialized => {}
        }

        if !device.is_valid() {
            error!("renderer initialization refused: invalid graphics device");
            return Err(RenderError::InvalidDevice);
        }
        if let Err(err) = self.config.validate() {
            error!(error = %err, "renderer initialization refused: invalid config");
            return Err(err.into());
        }

        match self.create_resources(device) {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.state = RendererState::Resourced;
                info!(
                    objects = self.scene.objects().len(),
                    lights = self.scene.lights().len(),
                    resources = self.owned_resource_count(),
                    "renderer initialized"
                );
                Ok(())
            }
            Err(err) => {
                self.state = RendererState::Failed;
                error!(error = %err, "renderer initialization failed");
                Err(err)
            }
        }
    }

    fn track<T: Copy>(
        &mut self,
        created: Result<T, DeviceError>,
        wrap: fn(T) -> Resource,
    ) -> Result<T, DeviceError> {
        let id = created?;
        self.owned.push(wrap(id));
        Ok(id)
    }

    fn create_resources<D: RenderDevice>(&mut self, device: &mut D) -> Result<Pipeline, RenderError> {
        let camera = Camera::from_settings(&self.config.camera);
        self.scene =
            Scene::from_desc(&self.config.scene, camera).map_err(ConfigError::from)?;

        let stage = InitStage::Shaders;
        debug!(%stage, "initializing");
        let lit_program = self
            .track(device.create_program(&ProgramDesc::lit()), Resource::Program)
            .map_err(failed_at(stage))?;
        let shadow_program = self
            .track(device.create_program(&ProgramDesc::shadow()), Resource::Program)
            .map_err(failed_at(stage))?;

        let stage = InitStage::Meshes;
        debug!(%stage, "initializing");
        let handles: BTreeSet<MeshHandle> = self.scene.objects().iter().map(|o| o.mesh).collect();
        for handle in handles {
            let primitive = Primitive::from_handle(handle).ok_or_else(|| {
                failed_at(stage)(DeviceError::Allocation {
                    kind: ResourceKind::Mesh,
                    reason: format!("no primitive for mesh handle {}", handle.0),
                })
            })?;
            let id = self
                .track(device.create_mesh(&MeshData::for_primitive(primitive)), Resource::Mesh)
                .map_err(failed_at(stage))?;
            self.registry.insert_mesh(handle, id);
        }

        let stage = InitStage::ConstantBuffers;
        debug!(%stage, "initializing");
        self.per_object = Some(ConstantBuffer::create(device).map_err(failed_at(stage))?);
        self.lights = Some(ConstantBuffer::create(device).map_err(failed_at(stage))?);

        let stage = InitStage::Textures;
        debug!(%stage, "initializing");
        let sources: Vec<_> = self
            .config
            .scene
            .textures
            .iter()
            .map(|(name, source)| (name.clone(), source.clone()))
            .collect();
        for (index, (name, source)) in sources.iter().enumerate() {
            let id = self
                .track(device.create_texture(source), Resource::Texture)
                .map_err(failed_at(stage))?;
            debug!(texture = %name, "texture created");
            self.registry.insert_texture(TextureHandle(index as u32), id);
        }

        let stage = InitStage::Samplers;
        debug!(%stage, "initializing");
        let texture_sampler = self
            .track(device.create_sampler(&SamplerDesc::linear_repeat()), Resource::Sampler)
            .map_err(failed_at(stage))?;
        let shadow_sampler = self
            .track(
                device.create_sampler(&SamplerDesc::shadow_comparison()),
                Resource::Sampler,
            )
            .map_err(failed_at(stage))?;

        let stage = InitStage::RenderStates;
        debug!(%stage, "initializing");
        let shadow = self.config.shadow;
        let standard_rasterizer = self
            .track(
                device.create_rasterizer_state(&RasterizerDesc::standard()),
                Resource::Rasterizer,
            )
            .map_err(failed_at(stage))?;
        let shadow_rasterizer = self
            .track(
                device.create_rasterizer_state(&RasterizerDesc::shadow(
                    shadow.depth_bias,
                    shadow.slope_scaled_bias,
                )),
                Resource::Rasterizer,
            )
            .map_err(failed_at(stage))?;
        let depth_state = self
            .track(
                device.create_depth_state(&DepthStencilDesc::default()),
                Resource::DepthState,
            )
            .map_err(failed_at(stage))?;

        let stage = InitStage::ShadowMap;
        debug!(%stage, size = shadow.map_size, "initializing");
        let shadow_map = self
            .track(device.create_shadow_map(shadow.map_size), Resource::ShadowMap)
            .map_err(failed_at(stage))?;

        let stage = InitStage::Lights;
        let configured = self.scene.lights().len();
        debug!(%stage, configured, shaded = configured.min(MAX_LIGHTS), "initializing");

        Ok(Pipeline {
            lit_program,
            shadow_program,
            texture_sampler,
            shadow_sampler,
            standard_rasterizer,
            shadow_rasterizer,
            depth_state,
            shadow_map,
        })
    }

    /// Update the camera from `input`, record the shadow pass, the main pass
    /// and a present, and execute them on `device`.
    pub fn render<D: RenderDevice>(
        &mut self,
        device: &mut D,
        input: &mut InputState,
        dt: f32,
    ) -> Result<FrameStats, RenderError> {
        match self.state {
            RendererState::Released => return Err(RenderError::Released),
            RendererState::Uninitialized | RendererState::Failed => {
                return Err(RenderError::NotInitialized);
            }
            RendererState::Resourced | RendererState::Rendering => {}
        }

        let Self {
            config,
            scene,
            registry,
            per_object,
            lights,
            pipeline,
            ..
        } = self;
        let (Some(pipeline), Some(per_object), Some(light_buffer)) =
            (*pipeline, per_object.as_ref(), lights.as_ref())
        else {
            return Err(RenderError::NotInitialized);
        };
        let (Some(per_object_id), Some(light_buffer_id)) = (per_object.id(), light_buffer.id())
        else {
            return Err(RenderError::NotInitialized);
        };

        scene.camera.update(input, dt);
        let view = scene.camera.view_matrix();
        let projection = scene.camera.projection_matrix(device.aspect_ratio());
        let light_view_proj = LightSpace::new(scene.shadow_caster(), &config.shadow).view_projection();

        let mut list = CommandList::new();

        // Shadow pass: depth only, from the light.
        let map_size = config.shadow.map_size;
        list.push(Command::UnbindShaderResource {
            slot: SHADOW_MAP_SLOT,
        });
        list.push(Command::SetRasterizerState {
            state: pipeline.shadow_rasterizer,
        });
        list.push(Command::SetRenderTarget {
            target: RenderTarget::ShadowMap(pipeline.shadow_map),
        });
        list.push(Command::SetViewport {
            viewport: Viewport::full(map_size, map_size),
        });
        list.push(Command::ClearDepth {
            target: RenderTarget::ShadowMap(pipeline.shadow_map),
            depth: 1.0,
        });
        list.push(Command::BindProgram {
            program: pipeline.shadow_program,
        });
        list.push(Command::SetDepthStencilState {
            state: pipeline.depth_state,
        });
        list.push(Command::BindConstantBuffer {
            stage: ShaderStage::Vertex,
            slot: PER_OBJECT_SLOT,
            buffer: per_object_id,
        });
        for object in scene.objects() {
            let Some(mesh) = registry.mesh(object.mesh) else {
                warn!(object = %object.name, "mesh handle unresolved; skipped in shadow pass");
                continue;
            };
            let record = PerObjectRecord::new(
                object.transform.world_matrix(),
                view,
                projection,
                light_view_proj,
            );
            per_object.update(&mut list, &record);
            list.push(Command::DrawIndexed { mesh });
        }

        // Main pass: lit and shadowed, into the back buffer.
        let (width, height) = device.back_buffer_size();
        list.push(Command::SetRenderTarget {
            target: RenderTarget::BackBuffer,
        });
        list.push(Command::SetViewport {
            viewport: Viewport::full(width, height),
        });
        list.push(Command::ClearColor {
            color: config.clear_color,
        });
        list.push(Command::ClearDepth {
            target: RenderTarget::BackBuffer,
            depth: 1.0,
        });
        list.push(Command::SetRasterizerState {
            state: pipeline.standard_rasterizer,
        });
        list.push(Command::SetDepthStencilState {
            state: pipeline.depth_state,
        });
        light_buffer.update(
            &mut list,
            &LightRecord::pack(scene.camera.position, scene.lights()),
        );
        list.push(Command::BindConstantBuffer {
            stage: ShaderStage::Pixel,
            slot: LIGHTS_SLOT,
            buffer: light_buffer_id,
        });
        list.push(Command::BindProgram {
            program: pipeline.lit_program,
        });
        list.push(Command::BindConstantBuffer {
            stage: ShaderStage::Vertex,
            slot: PER_OBJECT_SLOT,
            buffer: per_object_id,
        });
        list.push(Command::BindShadowMap {
            slot: SHADOW_MAP_SLOT,
            shadow_map: pipeline.shadow_map,
            sampler: pipeline.shadow_sampler,
        });
        for object in scene.objects_mut() {
            object.animate(dt);
            let (Some(mesh), Some(texture)) =
                (registry.mesh(object.mesh), registry.texture(object.texture))
            else {
                warn!(object = %object.name, "resource handle unresolved; skipped in main pass");
                continue;
            };
            let record = PerObjectRecord::new(
                object.transform.world_matrix(),
                view,
                projection,
                light_view_proj,
            );
            per_object.update(&mut list, &record);
            list.push(Command::BindTexture {
                slot: TEXTURE_SLOT,
                texture,
                sampler: pipeline.texture_sampler,
            });
            list.push(Command::DrawIndexed { mesh });
        }

        list.push(Command::Present {
            sync_interval: config.vsync_interval,
        });

        device.execute(&list)?;

        self.state = RendererState::Rendering;
        self.frame += 1;
        let stats = FrameStats {
            frame: self.frame,
            draw_calls: list.count(|c| matches!(c, Command::DrawIndexed { .. })) as u32,
            uploads: list.count(|c| matches!(c, Command::UpdateBuffer { .. })) as u32,
        };
        trace!(
            frame = stats.frame,
            draw_calls = stats.draw_calls,
            uploads = stats.uploads,
            "frame rendered"
        );
        Ok(stats)
    }

    fn free_resources<D: RenderDevice>(&mut self, device: &mut D) {
        if let Some(mut buffer) = self.per_object.take() {
            buffer.release(device);
        }
        if let Some(mut buffer) = self.lights.take() {
            buffer.release(device);
        }
        for resource in self.owned.drain(..).rev() {
            device.release(resource);
        }
        self.registry.clear();
        self.pipeline = None;
    }

    /// Free every owned resource and drop the scene. Safe to call in any
    /// state and more than once.
    pub fn release<D: RenderDevice>(&mut self, device: &mut D) {
        if self.state == RendererState::Released {
            return;
        }
        self.free_resources(device);
        self.scene.clear();
        self.state = RendererState::Released;
        info!(frames = self.frame, "renderer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingDevice;
    use glam::{Mat4, Vec3};
    use shadowcast_common::Transform;
    use shadowcast_input::MouseButton;
    use shadowcast_scene::{Light, ObjectDesc, SceneDesc, TextureSource};

    fn solid_texture() -> TextureSource {
        TextureSource::Solid {
            color: [255, 255, 255, 255],
        }
    }

    fn config_with(objects: Vec<ObjectDesc>, lights: Vec<Light>) -> RendererConfig {
        let mut scene = SceneDesc::empty();
        scene.textures.insert("white".into(), solid_texture());
        scene.objects = objects;
        scene.lights = lights;
        RendererConfig {
            scene,
            ..RendererConfig::default()
        }
    }

    fn cube_at(name: &str, position: Vec3) -> ObjectDesc {
        ObjectDesc {
            name: name.into(),
            mesh: Primitive::Cube,
            texture: "white".into(),
            transform: Transform::from_position(position),
            spin: None,
        }
    }

    fn ready(config: RendererConfig) -> (Renderer, RecordingDevice) {
        let mut device = RecordingDevice::new(1280, 720);
        let mut renderer = Renderer::new(config);
        renderer.initialize(&mut device).unwrap();
        (renderer, device)
    }

    fn position_of(commands: &[Command], pred: impl Fn(&Command) -> bool) -> Vec<usize> {
        commands
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c))
            .map(|(i, _)| i)
            .collect()
    }

    /// Per-object records uploaded right before each draw of the main pass.
    fn main_pass_records(commands: &[Command]) -> Vec<PerObjectRecord> {
        let start = commands
            .iter()
            .position(|c| {
                matches!(
                    c,
                    Command::SetRenderTarget {
                        target: RenderTarget::BackBuffer
                    }
                )
            })
            .unwrap();
        let mut records = Vec::new();
        let mut last_upload = None;
        for command in &commands[start..] {
            match command {
                Command::UpdateBuffer { data, .. } if data.len() == 320 => {
                    last_upload = Some(bytemuck::pod_read_unaligned::<PerObjectRecord>(data));
                }
                Command::DrawIndexed { .. } => records.push(last_upload.take().unwrap()),
                _ => {}
            }
        }
        records
    }

    #[test]
    fn initialize_default_scene() {
        let (renderer, device) = ready(RendererConfig::default());
        assert_eq!(renderer.state(), RendererState::Resourced);
        assert_eq!(renderer.scene().objects().len(), 3);
        // 2 programs, 2 meshes, 2 buffers, 2 textures, 2 samplers, 3 states, 1 shadow map
        assert_eq!(renderer.owned_resource_count(), 14);
        assert_eq!(device.live_count(), 14);
    }

    #[test]
    fn one_frame_clears_and_presents_in_order() {
        for objects in [vec![], vec![cube_at("a", Vec3::ZERO)]] {
            let (mut renderer, mut device) =
                ready(config_with(objects, vec![Light::default()]));
            renderer
                .render(&mut device, &mut InputState::new(), 0.016)
                .unwrap();

            let commands = device.last_frame().unwrap().commands();
            let shadow_clears = position_of(commands, |c| {
                matches!(
                    c,
                    Command::ClearDepth {
                        target: RenderTarget::ShadowMap(_),
                        ..
                    }
                )
            });
            let color_clears = position_of(commands, |c| matches!(c, Command::ClearColor { .. }));
            let presents = position_of(commands, |c| matches!(c, Command::Present { .. }));
            assert_eq!(shadow_clears.len(), 1);
            assert_eq!(color_clears.len(), 1);
            assert_eq!(presents, vec![commands.len() - 1]);
            assert!(shadow_clears[0] < color_clears[0]);
            assert!(color_clears[0] < presents[0]);
            assert_eq!(
                commands[presents[0]],
                Command::Present { sync_interval: 1 }
            );
        }
    }

    #[test]
    fn shared_mesh_gets_distinct_uploads() {
        let (mut renderer, mut device) = ready(config_with(
            vec![
                cube_at("left", Vec3::ZERO),
                cube_at("right", Vec3::new(3.0, 0.0, 0.0)),
            ],
            vec![Light::default()],
        ));
        assert_eq!(device.live_count_of(ResourceKind::Mesh), 1);

        let stats = renderer
            .render(&mut device, &mut InputState::new(), 0.016)
            .unwrap();
        assert_eq!(stats.draw_calls, 4);
        assert_eq!(stats.uploads, 5);

        let commands = device.last_frame().unwrap().commands();
        let draws: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawIndexed { mesh } => Some(*mesh),
                _ => None,
            })
            .collect();
        assert!(draws.windows(2).all(|pair| pair[0] == pair[1]));

        let records = main_pass_records(commands);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].translation(), Vec3::ZERO);
        assert_eq!(records[1].translation(), Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(records[0].light_view_proj, records[1].light_view_proj);
    }

    #[test]
    fn light_space_matches_first_directional() {
        let dir = Vec3::new(-0.5, -1.0, 0.5);
        let config = config_with(
            vec![cube_at("a", Vec3::ZERO)],
            vec![Light::point(Vec3::ONE, 3.0), Light::directional(dir)],
        );
        let expected = LightSpace::new(Some(dir), &config.shadow).view_projection();
        let (mut renderer, mut device) = ready(config);
        renderer
            .render(&mut device, &mut InputState::new(), 0.016)
            .unwrap();
        let records = main_pass_records(device.last_frame().unwrap().commands());
        assert!(Mat4::from_cols_array_2d(&records[0].light_view_proj).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn shadow_map_unbound_before_every_shadow_pass() {
        let (mut renderer, mut device) = ready(RendererConfig::default());
        let mut input = InputState::new();
        for _ in 0..3 {
            renderer.render(&mut device, &mut input, 0.016).unwrap();
        }
        assert_eq!(renderer.frame_count(), 3);
        assert_eq!(renderer.state(), RendererState::Rendering);
        for frame in device.frames() {
            let commands = frame.commands();
            let unbind = position_of(commands, |c| {
                matches!(c, Command::UnbindShaderResource { slot } if *slot == SHADOW_MAP_SLOT)
            });
            let target = position_of(commands, |c| {
                matches!(
                    c,
                    Command::SetRenderTarget {
                        target: RenderTarget::ShadowMap(_)
                    }
                )
            });
            assert!(unbind[0] < target[0]);
        }
    }

    #[test]
    fn light_record_capped_at_capacity() {
        let lights: Vec<Light> = (0..11).map(|i| Light::point(Vec3::splat(i as f32), 2.0)).collect();
        let (mut renderer, mut device) = ready(config_with(vec![], lights));
        renderer
            .render(&mut device, &mut InputState::new(), 0.016)
            .unwrap();
        let uploaded = device
            .last_frame()
            .unwrap()
            .iter()
            .find_map(|c| match c {
                Command::UpdateBuffer { data, .. }
                    if data.len() == std::mem::size_of::<LightRecord>() =>
                {
                    Some(bytemuck::pod_read_unaligned::<LightRecord>(data))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(uploaded.light_count as usize, MAX_LIGHTS);
        assert_eq!(uploaded.camera_position, renderer.scene().camera.position.to_array());
    }

    #[test]
    fn back_buffer_resize_reaches_viewport_and_projection() {
        let (mut renderer, mut device) = ready(config_with(
            vec![cube_at("a", Vec3::ZERO)],
            vec![Light::default()],
        ));
        let mut input = InputState::new();
        renderer.render(&mut device, &mut input, 0.016).unwrap();
        device.set_back_buffer_size(800, 800);
        renderer.render(&mut device, &mut input, 0.016).unwrap();

        let commands = device.last_frame().unwrap().commands();
        let main_viewport = commands
            .iter()
            .rev()
            .find_map(|c| match c {
                Command::SetViewport { viewport } => Some(*viewport),
                _ => None,
            })
            .unwrap();
        assert_eq!(main_viewport, Viewport::full(800, 800));

        let expected = renderer.scene().camera.projection_matrix(1.0);
        let records = main_pass_records(commands);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].projection, expected.to_cols_array_2d());
    }

    #[test]
    fn render_updates_camera_and_consumes_wheel() {
        let (mut renderer, mut device) = ready(RendererConfig::default());
        let before = renderer.scene().camera.position;
        let mut input = InputState::new();
        input.add_wheel_delta(2.0);
        input.set_button(MouseButton::Right, true);
        input.add_mouse_delta(10.0, 0.0);
        renderer.render(&mut device, &mut input, 0.016).unwrap();
        assert_eq!(input.wheel_delta(), 0.0);
        assert_ne!(renderer.scene().camera.position, before);
        assert!(renderer.scene().camera.yaw > 0.0);
    }

    #[test]
    fn spinning_objects_advance() {
        let (mut renderer, mut device) = ready(RendererConfig::default());
        let before = renderer.scene().object("cube_a").unwrap().transform.rotation;
        renderer
            .render(&mut device, &mut InputState::new(), 0.5)
            .unwrap();
        let after = renderer.scene().object("cube_a").unwrap().transform.rotation;
        assert_ne!(before, after);
        assert!((after.length() - 1.0).abs() < 1e-5);
        let ground = renderer.scene().object("ground").unwrap();
        assert_eq!(ground.transform.rotation, glam::Quat::IDENTITY);
    }

    #[test]
    fn render_before_initialize_fails() {
        let mut renderer = Renderer::new(RendererConfig::default());
        let mut device = RecordingDevice::new(64, 64);
        assert!(matches!(
            renderer.render(&mut device, &mut InputState::new(), 0.016),
            Err(RenderError::NotInitialized)
        ));
        assert!(device.frames().is_empty());
    }

    #[test]
    fn invalid_device_refused() {
        let mut renderer = Renderer::new(RendererConfig::default());
        let mut device = RecordingDevice::invalid();
        assert!(matches!(
            renderer.initialize(&mut device),
            Err(RenderError::InvalidDevice)
        ));
        assert_eq!(renderer.state(), RendererState::Uninitialized);
    }

    #[test]
    fn invalid_config_refused() {
        let mut config = RendererConfig::default();
        config.shadow.map_size = 0;
        let mut renderer = Renderer::new(config);
        let mut device = RecordingDevice::new(64, 64);
        assert!(matches!(
            renderer.initialize(&mut device),
            Err(RenderError::Config(_))
        ));
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn creation_failure_reports_stage_and_release_frees_everything() {
        let cases = [
            (ResourceKind::Program, InitStage::Shaders),
            (ResourceKind::Mesh, InitStage::Meshes),
            (ResourceKind::Buffer, InitStage::ConstantBuffers),
            (ResourceKind::Texture, InitStage::Textures),
            (ResourceKind::Sampler, InitStage::Samplers),
            (ResourceKind::Rasterizer, InitStage::RenderStates),
            (ResourceKind::DepthState, InitStage::RenderStates),
            (ResourceKind::ShadowMap, InitStage::ShadowMap),
        ];
        for (kind, expected) in cases {
            let mut device = RecordingDevice::new(64, 64).fail_on(kind);
            let mut renderer = Renderer::new(RendererConfig::default());
            match renderer.initialize(&mut device) {
                Err(RenderError::Initialization { stage, .. }) => assert_eq!(stage, expected),
                other => panic!("expected failure at {expected}, got {other:?}"),
            }
            assert_eq!(renderer.state(), RendererState::Failed);
            assert!(matches!(
                renderer.render(&mut device, &mut InputState::new(), 0.016),
                Err(RenderError::NotInitialized)
            ));

            renderer.release(&mut device);
            assert_eq!(device.live_count(), 0);
            let released: BTreeSet<_> = device.released().iter().collect();
            assert_eq!(released.len(), device.released().len());
        }
    }

    #[test]
    fn retry_after_failure_does_not_leak() {
        let mut device = RecordingDevice::new(64, 64).fail_on(ResourceKind::ShadowMap);
        let mut renderer = Renderer::new(RendererConfig::default());
        assert!(renderer.initialize(&mut device).is_err());
        device.clear_failure();
        renderer.initialize(&mut device).unwrap();
        assert_eq!(device.live_count(), renderer.owned_resource_count());
    }

    #[test]
    fn release_is_idempotent_and_final() {
        let (mut renderer, mut device) = ready(RendererConfig::default());
        renderer
            .render(&mut device, &mut InputState::new(), 0.016)
            .unwrap();
        renderer.release(&mut device);
        let released = device.released().len();
        renderer.release(&mut device);

        assert_eq!(device.released().len(), released);
        assert_eq!(device.live_count(), 0);
        assert_eq!(renderer.state(), RendererState::Released);
        assert!(renderer.scene().objects().is_empty());
        assert!(matches!(
            renderer.render(&mut device, &mut InputState::new(), 0.016),
            Err(RenderError::Released)
        ));
        assert!(matches!(
            renderer.initialize(&mut device),
            Err(RenderError::Released)
        ));
    }

    #[test]
    fn double_initialize_rejected() {
        let (mut renderer, mut device) = ready(RendererConfig::default());
        assert!(matches!(
            renderer.initialize(&mut device),
            Err(RenderError::AlreadyInitialized)
        ));
    }
}
