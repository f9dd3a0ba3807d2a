use crate::command::{Command, CommandList, HazardTracker, RenderTarget};
use crate::device::{DeviceError, RenderDevice};
use crate::ids::{
    BufferId, DepthStateId, MeshId, ProgramId, RasterizerId, Resource, ResourceKind, SamplerId,
    ShadowMapId, TextureId,
};
use crate::mesh::MeshData;
use crate::program::ProgramDesc;
use crate::state::{DepthStencilDesc, RasterizerDesc, SamplerDesc};
use shadowcast_scene::TextureSource;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use tracing::warn;

/// Device that records every executed command list instead of drawing.
///
/// Validates what a real device would trip over: unknown resources,
/// mis-sized buffer uploads, and shadow-map hazards. Creation of one
/// resource kind can be made to fail.
#[derive(Debug)]
pub struct RecordingDevice {
    width: u32,
    height: u32,
    valid: bool,
    fail_on: Option<ResourceKind>,
    next_id: u32,
    live: BTreeSet<Resource>,
    released: Vec<Resource>,
    buffer_sizes: BTreeMap<BufferId, u64>,
    index_counts: BTreeMap<MeshId, u32>,
    frames: Vec<CommandList>,
    hazards: HazardTracker,
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            valid: true,
            fail_on: None,
            next_id: 0,
            live: BTreeSet::new(),
            released: Vec::new(),
            buffer_sizes: BTreeMap::new(),
            index_counts: BTreeMap::new(),
            frames: Vec::new(),
            hazards: HazardTracker::new(),
        }
    }

    /// A device whose handle is unusable: every call fails.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            ..Self::new(0, 0)
        }
    }

    /// Make every creation of `kind` fail.
    pub fn fail_on(mut self, kind: ResourceKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub fn clear_failure(&mut self) {
        self.fail_on = None;
    }

    pub fn set_back_buffer_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn buffer_size(&self, buffer: BufferId) -> Option<u64> {
        self.buffer_sizes.get(&buffer).copied()
    }

    pub fn index_count(&self, mesh: MeshId) -> Option<u32> {
        self.index_counts.get(&mesh).copied()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_count_of(&self, kind: ResourceKind) -> usize {
        self.live.iter().filter(|r| r.kind() == kind).count()
    }

    pub fn is_live(&self, resource: Resource) -> bool {
        self.live.contains(&resource)
    }

    /// Resources in the order they were released.
    pub fn released(&self) -> &[Resource] {
        &self.released
    }

    pub fn frames(&self) -> &[CommandList] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&CommandList> {
        self.frames.last()
    }

    /// Human-readable listing of every recorded frame.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        for (index, frame) in self.frames.iter().enumerate() {
            let _ = writeln!(out, "frame {index} ({} commands)", frame.len());
            for command in frame {
                match command {
                    Command::UpdateBuffer { buffer, data } => {
                        let _ = writeln!(out, "  UpdateBuffer {{ buffer: {buffer:?}, bytes: {} }}", data.len());
                    }
                    other => {
                        let _ = writeln!(out, "  {other:?}");
                    }
                }
            }
        }
        out
    }

    fn allocate(&mut self, kind: ResourceKind) -> Result<u32, DeviceError> {
        if !self.valid {
            return Err(DeviceError::InvalidDevice);
        }
        if self.fail_on == Some(kind) {
            return Err(DeviceError::Allocation {
                kind,
                reason: "injected failure".into(),
            });
        }
        self.next_id += 1;
        Ok(self.next_id)
    }

    fn adopt<T>(&mut self, id: T, wrap: fn(T) -> Resource) -> T
    where
        T: Copy,
    {
        self.live.insert(wrap(id));
        id
    }

    fn require(&self, resource: Resource) -> Result<(), DeviceError> {
        if self.live.contains(&resource) {
            Ok(())
        } else {
            Err(DeviceError::InvalidCommand(format!(
                "{} {} is not live",
                resource.kind(),
                resource.raw()
            )))
        }
    }

    fn check(&self, command: &Command) -> Result<(), DeviceError> {
        match *command {
            Command::SetRasterizerState { state } => self.require(Resource::Rasterizer(state)),
            Command::SetDepthStencilState { state } => self.require(Resource::DepthState(state)),
            Command::SetRenderTarget {
                target: RenderTarget::ShadowMap(map),
            }
            | Command::ClearDepth {
                target: RenderTarget::ShadowMap(map),
                ..
            } => self.require(Resource::ShadowMap(map)),
            Command::BindProgram { program } => self.require(Resource::Program(program)),
            Command::BindConstantBuffer { buffer, .. } => self.require(Resource::Buffer(buffer)),
            Command::UpdateBuffer { buffer, ref data } => {
                self.require(Resource::Buffer(buffer))?;
                match self.buffer_size(buffer) {
                    Some(size) if size == data.len() as u64 => Ok(()),
                    size => Err(DeviceError::InvalidCommand(format!(
                        "upload of {} bytes to buffer {} sized {size:?}",
                        data.len(),
                        buffer.0
                    ))),
                }
            }
            Command::BindShadowMap {
                shadow_map,
                sampler,
                ..
            } => {
                self.require(Resource::ShadowMap(shadow_map))?;
                self.require(Resource::Sampler(sampler))
            }
            Command::BindTexture {
                texture, sampler, ..
            } => {
                self.require(Resource::Texture(texture))?;
                self.require(Resource::Sampler(sampler))
            }
            Command::DrawIndexed { mesh } => self.require(Resource::Mesh(mesh)),
            _ => Ok(()),
        }
    }
}

impl RenderDevice for RecordingDevice {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        if !desc.layout_is_consistent() {
            return Err(DeviceError::ShaderCompile {
                label: desc.label.into(),
                reason: "vertex layout elements overlap or exceed the stride".into(),
            });
        }
        let id = ProgramId(self.allocate(ResourceKind::Program)?);
        Ok(self.adopt(id, Resource::Program))
    }

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, DeviceError> {
        if mesh.indices.is_empty() || mesh.vertices.is_empty() {
            return Err(DeviceError::Allocation {
                kind: ResourceKind::Mesh,
                reason: format!("mesh '{}' is empty", mesh.label),
            });
        }
        let id = MeshId(self.allocate(ResourceKind::Mesh)?);
        self.index_counts.insert(id, mesh.index_count());
        Ok(self.adopt(id, Resource::Mesh))
    }

    fn create_texture(&mut self, source: &TextureSource) -> Result<TextureId, DeviceError> {
        if let TextureSource::File { path } = source {
            if path.as_os_str().is_empty() {
                return Err(DeviceError::TextureLoad {
                    texture: String::new(),
                    reason: "empty path".into(),
                });
            }
        }
        let id = TextureId(self.allocate(ResourceKind::Texture)?);
        Ok(self.adopt(id, Resource::Texture))
    }

    fn create_buffer(&mut self, byte_size: u64) -> Result<BufferId, DeviceError> {
        if byte_size == 0 || byte_size % 16 != 0 {
            return Err(DeviceError::Allocation {
                kind: ResourceKind::Buffer,
                reason: format!("constant buffer size {byte_size} is not a positive multiple of 16"),
            });
        }
        let id = BufferId(self.allocate(ResourceKind::Buffer)?);
        self.buffer_sizes.insert(id, byte_size);
        Ok(self.adopt(id, Resource::Buffer))
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc) -> Result<SamplerId, DeviceError> {
        let id = SamplerId(self.allocate(ResourceKind::Sampler)?);
        Ok(self.adopt(id, Resource::Sampler))
    }

    fn create_rasterizer_state(
        &mut self,
        _desc: &RasterizerDesc,
    ) -> Result<RasterizerId, DeviceError> {
        let id = RasterizerId(self.allocate(ResourceKind::Rasterizer)?);
        Ok(self.adopt(id, Resource::Rasterizer))
    }

    fn create_depth_state(&mut self, _desc: &DepthStencilDesc) -> Result<DepthStateId, DeviceError> {
        let id = DepthStateId(self.allocate(ResourceKind::DepthState)?);
        Ok(self.adopt(id, Resource::DepthState))
    }

    fn create_shadow_map(&mut self, size: u32) -> Result<ShadowMapId, DeviceError> {
        if size == 0 {
            return Err(DeviceError::Allocation {
                kind: ResourceKind::ShadowMap,
                reason: "shadow map size must be non-zero".into(),
            });
        }
        let id = ShadowMapId(self.allocate(ResourceKind::ShadowMap)?);
        Ok(self.adopt(id, Resource::ShadowMap))
    }

    fn execute(&mut self, commands: &CommandList) -> Result<(), DeviceError> {
        if !self.valid {
            return Err(DeviceError::InvalidDevice);
        }
        for command in commands {
            self.check(command)?;
        }
        self.hazards.validate(commands)?;
        self.frames.push(commands.clone());
        Ok(())
    }

    fn release(&mut self, resource: Resource) {
        if !self.live.remove(&resource) {
            warn!(kind = %resource.kind(), id = resource.raw(), "release of unknown resource ignored");
            return;
        }
        if let Resource::Buffer(buffer) = resource {
            self.buffer_sizes.remove(&buffer);
        }
        if let Resource::Mesh(mesh) = resource {
            self.index_counts.remove(&mesh);
        }
        self.released.push(resource);
    }
}
